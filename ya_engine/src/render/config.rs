/// Render configuration, consumed at init and swapchain recreate time

use crate::error::{Error, Result};
use crate::render::{DescriptorPoolDesc, FeatureRequest, RenderPassDesc, SwapchainCreateInfo};

/// Which validation messages are displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything including info and verbose messages
    All,
}

/// Where validation messages go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    Console,
    /// Append to a log file
    File(String),
    /// Console and log file
    Both(String),
}

/// Message categories to display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Validation layer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugConfig {
    pub severity: DebugSeverity,
    pub output: DebugOutput,
    pub message_filter: DebugMessageFilter,
    /// Trap into an attached debugger on validation errors
    pub break_on_error: bool,
    /// Panic on validation errors (tests / CI)
    pub panic_on_error: bool,
    /// Count messages per severity
    pub enable_stats: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            severity: DebugSeverity::ErrorsAndWarnings,
            output: DebugOutput::Console,
            message_filter: DebugMessageFilter::default(),
            break_on_error: false,
            panic_on_error: false,
            enable_stats: true,
        }
    }
}

/// Validation message counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

/// Renderer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Enable validation layers and the debug messenger (optional features)
    pub enable_validation: bool,
    pub debug: DebugConfig,
    /// Forces FIFO presentation
    pub vsync: bool,
    /// Frames the CPU may record ahead of the GPU
    pub frames_in_flight: u32,
    pub graphics_queue_count: u32,
    pub present_queue_count: u32,
    /// Extra instance extensions; the window's required ones are always added
    pub instance_extensions: Vec<FeatureRequest>,
    pub instance_layers: Vec<FeatureRequest>,
    /// Extra device extensions; the swapchain extension is always required
    pub device_extensions: Vec<FeatureRequest>,
    pub device_layers: Vec<FeatureRequest>,
    pub swapchain: SwapchainCreateInfo,
    /// Empty means the minimal color-only pass
    pub render_pass: RenderPassDesc,
    pub descriptor_pool: DescriptorPoolDesc,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            app_name: "Ya Application".to_string(),
            app_version: (1, 0, 0),
            enable_validation: cfg!(debug_assertions),
            debug: DebugConfig::default(),
            vsync: false,
            frames_in_flight: 2,
            graphics_queue_count: 1,
            present_queue_count: 1,
            instance_extensions: Vec::new(),
            instance_layers: Vec::new(),
            device_extensions: Vec::new(),
            device_layers: Vec::new(),
            swapchain: SwapchainCreateInfo::default(),
            render_pass: RenderPassDesc::default(),
            descriptor_pool: DescriptorPoolDesc::default(),
        }
    }
}

impl RenderConfig {
    /// Reject values no device could satisfy, before anything is created
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::InvalidResource("frames_in_flight must be at least 1".to_string()));
        }
        if self.graphics_queue_count == 0 || self.present_queue_count == 0 {
            return Err(Error::InvalidResource(format!(
                "Queue counts must be at least 1 (graphics {}, present {})",
                self.graphics_queue_count, self.present_queue_count
            )));
        }
        if self.swapchain.min_image_count == 0 {
            return Err(Error::InvalidResource("swapchain.min_image_count must be at least 1".to_string()));
        }
        if self.swapchain.image_array_layers == 0 {
            return Err(Error::InvalidResource("swapchain.image_array_layers must be at least 1".to_string()));
        }
        if !self.render_pass.is_empty() {
            self.render_pass.validate()?;
        }
        if self.descriptor_pool.max_sets == 0 {
            return Err(Error::InvalidResource("descriptor_pool.max_sets must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Swapchain parameters, surface negotiation and lifecycle
///
/// The backend queries `SurfaceSupport` and the window size, then
/// `negotiate_swapchain` decides every creation parameter. A swapchain is
/// never mutated: resize, out-of-date and configuration changes all go
/// through a full recreate after the device is idle.

use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::render::{
    ColorSpace, Extent2D, Format, ImageUsage, PresentMode, QueueFamilySelection, SurfaceFormat,
};

/// Swapchain creation request
#[derive(Debug, Clone, PartialEq)]
pub struct SwapchainCreateInfo {
    /// Requested width; 0 uses the window size
    pub width: u32,
    /// Requested height; 0 uses the window size
    pub height: u32,
    pub min_image_count: u32,
    /// Caller-provided format, validated against the surface. `None` lets the
    /// swapchain pick (BGRA8-UNORM + sRGB-nonlinear if available).
    pub image_format: Option<Format>,
    /// Color space paired with `image_format`
    pub color_space: ColorSpace,
    /// Preferred present mode, used when available and V-Sync is off
    pub present_mode: PresentMode,
    pub image_array_layers: u32,
    pub image_usage: ImageUsage,
    pub clipped: bool,
}

impl Default for SwapchainCreateInfo {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            min_image_count: 3,
            image_format: None,
            color_space: ColorSpace::SrgbNonlinear,
            present_mode: PresentMode::Mailbox,
            image_array_layers: 1,
            image_usage: ImageUsage::COLOR_ATTACHMENT,
            clipped: true,
        }
    }
}

impl SwapchainCreateInfo {
    /// Caller-provided surface format, if any
    pub fn requested_surface_format(&self) -> Option<SurfaceFormat> {
        self.image_format.map(|format| SurfaceFormat { format, color_space: self.color_space })
    }
}

bitflags! {
    /// Composite alpha modes (Vulkan bit values)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompositeAlpha: u32 {
        const OPAQUE = 0x1;
        const PRE_MULTIPLIED = 0x2;
        const POST_MULTIPLIED = 0x4;
        const INHERIT = 0x8;
    }
}

/// Surface capabilities relevant to swapchain creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means no maximum
    pub max_image_count: u32,
    /// `None` when the surface leaves the extent to the swapchain
    pub current_extent: Option<Extent2D>,
    pub min_image_extent: Extent2D,
    pub max_image_extent: Extent2D,
    pub supported_composite_alpha: CompositeAlpha,
}

/// What a surface supports on the selected adapter
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSupport {
    pub capabilities: SurfaceCapabilities,
    pub formats: Vec<SurfaceFormat>,
    pub present_modes: Vec<PresentMode>,
}

/// Image sharing across queue families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingMode {
    Exclusive,
    Concurrent { families: [u32; 2] },
}

/// Negotiated swapchain parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapchainParams {
    pub surface_format: SurfaceFormat,
    pub present_mode: PresentMode,
    /// Empty when the window is minimized; no images are created then
    pub extent: Extent2D,
    pub image_count: u32,
    pub composite_alpha: CompositeAlpha,
    pub sharing: SharingMode,
}

/// Pick the surface format
///
/// # Errors
///
/// `Error::UnsupportedSurfaceFormat` when a caller-provided format is not in
/// `available`, or when the surface reports no format at all.
pub fn choose_surface_format(
    available: &[SurfaceFormat],
    requested: Option<SurfaceFormat>,
) -> Result<SurfaceFormat> {
    if let Some(requested) = requested {
        if available.contains(&requested) {
            return Ok(requested);
        }
        crate::engine_error!(
            "ya::Swapchain",
            "Requested surface format {:?}/{:?} not supported by the surface",
            requested.format, requested.color_space
        );
        return Err(Error::UnsupportedSurfaceFormat(format!(
            "{:?}/{:?}",
            requested.format, requested.color_space
        )));
    }

    if available.contains(&SurfaceFormat::PREFERRED) {
        return Ok(SurfaceFormat::PREFERRED);
    }

    match available.first() {
        Some(&first) => {
            crate::engine_warn!(
                "ya::Swapchain",
                "Preferred surface format unavailable, using {:?}/{:?}",
                first.format, first.color_space
            );
            Ok(first)
        }
        None => Err(Error::UnsupportedSurfaceFormat("surface reports no formats".to_string())),
    }
}

/// Pick the present mode
///
/// V-Sync always yields FIFO. Otherwise the preferred mode if available, then
/// mailbox, immediate and finally FIFO, which every surface supports.
pub fn choose_present_mode(available: &[PresentMode], preferred: PresentMode, vsync: bool) -> PresentMode {
    if vsync {
        return PresentMode::Fifo;
    }
    [preferred, PresentMode::Mailbox, PresentMode::Immediate]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(PresentMode::Fifo)
}

/// Pick the extent: the surface's current extent when defined, else `desired`
/// clamped into the surface bounds. An empty `desired` (minimized) stays empty.
pub fn choose_extent(capabilities: &SurfaceCapabilities, desired: Extent2D) -> Extent2D {
    if desired.is_empty() {
        return Extent2D::default();
    }
    match capabilities.current_extent {
        Some(current) => current,
        None => desired.clamp(capabilities.min_image_extent, capabilities.max_image_extent),
    }
}

/// `max(requested, surface min)`, clamped to the surface max when it has one
pub fn choose_image_count(capabilities: &SurfaceCapabilities, requested: u32) -> u32 {
    let count = requested.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// First supported of OPAQUE, PRE_MULTIPLIED, INHERIT, POST_MULTIPLIED
pub fn choose_composite_alpha(supported: CompositeAlpha) -> CompositeAlpha {
    [
        CompositeAlpha::OPAQUE,
        CompositeAlpha::PRE_MULTIPLIED,
        CompositeAlpha::INHERIT,
        CompositeAlpha::POST_MULTIPLIED,
    ]
    .into_iter()
    .find(|mode| supported.contains(*mode))
    .unwrap_or(CompositeAlpha::OPAQUE)
}

/// Concurrent sharing when graphics and present families differ
pub fn choose_sharing_mode(families: QueueFamilySelection) -> SharingMode {
    if families.is_shared() {
        SharingMode::Exclusive
    } else {
        SharingMode::Concurrent { families: [families.graphics_family, families.present_family] }
    }
}

/// Decide every swapchain parameter
pub fn negotiate_swapchain(
    support: &SurfaceSupport,
    create_info: &SwapchainCreateInfo,
    window_extent: Extent2D,
    vsync: bool,
    families: QueueFamilySelection,
) -> Result<SwapchainParams> {
    let surface_format = choose_surface_format(&support.formats, create_info.requested_surface_format())?;
    let present_mode = choose_present_mode(&support.present_modes, create_info.present_mode, vsync);

    let desired = if create_info.width > 0 && create_info.height > 0 && !window_extent.is_empty() {
        Extent2D::new(create_info.width, create_info.height)
    } else {
        window_extent
    };
    let extent = choose_extent(&support.capabilities, desired);

    Ok(SwapchainParams {
        surface_format,
        present_mode,
        extent,
        image_count: choose_image_count(&support.capabilities, create_info.min_image_count),
        composite_alpha: choose_composite_alpha(support.capabilities.supported_composite_alpha),
        sharing: choose_sharing_mode(families),
    })
}

// ===== LIFECYCLE =====

/// Swapchain lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    Uninitialized,
    Created,
    Recreating,
    Destroyed,
}

/// Observable properties of one swapchain generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapchainSnapshot {
    pub extent: Extent2D,
    pub present_mode: PresentMode,
    pub surface_format: SurfaceFormat,
    pub image_count: u32,
}

/// Passed to recreate listeners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapchainDiff {
    pub old: SwapchainSnapshot,
    pub new: SwapchainSnapshot,
}

impl SwapchainDiff {
    pub fn extent_changed(&self) -> bool {
        self.old.extent != self.new.extent
    }

    pub fn format_changed(&self) -> bool {
        self.old.surface_format != self.new.surface_format
    }
}

/// State machine shared by swapchain implementations
///
/// `Uninitialized -> Created -> Recreating -> Created -> Destroyed`. A failed
/// recreate returns to the previous state, so no half-created swapchain is
/// ever observable.
#[derive(Debug, Clone)]
pub struct SwapchainLifecycle {
    state: SwapchainState,
    version: u32,
    current: Option<SwapchainSnapshot>,
}

impl Default for SwapchainLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl SwapchainLifecycle {
    pub fn new() -> Self {
        Self { state: SwapchainState::Uninitialized, version: 0, current: None }
    }

    pub fn state(&self) -> SwapchainState {
        self.state
    }

    /// Number of committed generations
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn current(&self) -> Option<&SwapchainSnapshot> {
        self.current.as_ref()
    }

    /// Debug name of the generation being built
    pub fn debug_name(&self) -> String {
        format!("SwapChain_{}", self.version)
    }

    /// Enter `Recreating`
    pub fn begin(&mut self) -> Result<()> {
        match self.state {
            SwapchainState::Uninitialized | SwapchainState::Created => {
                self.state = SwapchainState::Recreating;
                Ok(())
            }
            SwapchainState::Recreating => {
                Err(Error::InvalidState("Swapchain recreate already in progress".to_string()))
            }
            SwapchainState::Destroyed => {
                Err(Error::InvalidState("Swapchain already destroyed".to_string()))
            }
        }
    }

    /// Leave `Recreating` with a new generation; returns the diff against the previous one
    pub fn commit(&mut self, snapshot: SwapchainSnapshot) -> Result<Option<SwapchainDiff>> {
        if self.state != SwapchainState::Recreating {
            return Err(Error::InvalidState(format!("Swapchain commit from {:?}", self.state)));
        }
        let diff = self.current.map(|old| SwapchainDiff { old, new: snapshot });
        self.current = Some(snapshot);
        self.version += 1;
        self.state = SwapchainState::Created;
        Ok(diff)
    }

    /// Leave `Recreating` without a new generation
    pub fn abort(&mut self) {
        if self.state == SwapchainState::Recreating {
            self.state = if self.current.is_some() {
                SwapchainState::Created
            } else {
                SwapchainState::Uninitialized
            };
        }
    }

    pub fn destroy(&mut self) {
        self.state = SwapchainState::Destroyed;
    }
}

/// Backend-agnostic swapchain interface
pub trait Swapchain {
    fn state(&self) -> SwapchainState;

    /// Number of presentable images (0 while the window is minimized)
    fn image_count(&self) -> u32;

    fn extent(&self) -> Extent2D;

    fn surface_format(&self) -> SurfaceFormat;

    fn present_mode(&self) -> PresentMode;

    fn create_info(&self) -> &SwapchainCreateInfo;

    /// Recreate with `create_info`. The caller guarantees the device is idle.
    fn recreate(&mut self, create_info: &SwapchainCreateInfo) -> Result<()>;
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;

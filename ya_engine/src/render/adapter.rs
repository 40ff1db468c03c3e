/// Adapter (physical device) data model and selection
///
/// Adapters are queried once by the backend against a given surface, so
/// per-family present support and the surface format list already reflect
/// that surface. Selection itself is pure and deterministic.

use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::render::{MemoryType, SurfaceFormat};

/// Kind of GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterType {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

impl AdapterType {
    /// Base selection score for this adapter type
    pub fn base_score(&self) -> u32 {
        match self {
            AdapterType::Discrete => 1000,
            AdapterType::Integrated => 500,
            AdapterType::Virtual => 100,
            AdapterType::Cpu => 50,
            AdapterType::Other => 0,
        }
    }
}

bitflags! {
    /// Queue family capabilities
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct QueueCapabilities: u32 {
        const GRAPHICS = 1 << 0;
        const COMPUTE = 1 << 1;
        const TRANSFER = 1 << 2;
    }
}

/// One queue family of an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    pub index: u32,
    pub queue_count: u32,
    pub capabilities: QueueCapabilities,
    /// Can present to the surface the adapter was queried against
    pub supports_present: bool,
}

impl QueueFamilyInfo {
    pub fn supports_graphics(&self) -> bool {
        self.queue_count > 0 && self.capabilities.contains(QueueCapabilities::GRAPHICS)
    }

    pub fn can_present(&self) -> bool {
        self.queue_count > 0 && self.supports_present
    }
}

/// API version triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Immutable description of one GPU
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub api_version: ApiVersion,
    pub adapter_type: AdapterType,
    pub geometry_shader: bool,
    pub extensions: Vec<String>,
    pub queue_families: Vec<QueueFamilyInfo>,
    pub memory_types: Vec<MemoryType>,
    pub surface_formats: Vec<SurfaceFormat>,
}

impl AdapterInfo {
    pub fn queue_family(&self, index: u32) -> Option<&QueueFamilyInfo> {
        self.queue_families.iter().find(|family| family.index == index)
    }
}

/// Graphics and present family chosen for an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilySelection {
    pub graphics_family: u32,
    pub present_family: u32,
}

impl QueueFamilySelection {
    /// Graphics and present share one family
    pub fn is_shared(&self) -> bool {
        self.graphics_family == self.present_family
    }
}

/// Outcome of adapter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterSelection {
    /// Index into the adapter list given to `select_adapter`
    pub adapter_index: usize,
    pub score: u32,
    pub queue_families: QueueFamilySelection,
}

/// Score an adapter (eligibility is checked separately)
pub fn score_adapter(adapter: &AdapterInfo) -> u32 {
    let mut score = adapter.adapter_type.base_score();
    if adapter.geometry_shader {
        score += 100;
    }
    if adapter.surface_formats.contains(&SurfaceFormat::PREFERRED) {
        score += 100;
    }
    score
}

/// Pick graphics and present families, preferring two distinct families
///
/// Returns `None` when the adapter lacks either capability. Families with zero
/// queues are ignored.
pub fn select_queue_families(adapter: &AdapterInfo) -> Option<QueueFamilySelection> {
    let graphics: Vec<u32> = adapter
        .queue_families
        .iter()
        .filter(|family| family.supports_graphics())
        .map(|family| family.index)
        .collect();
    let present: Vec<u32> = adapter
        .queue_families
        .iter()
        .filter(|family| family.can_present())
        .map(|family| family.index)
        .collect();

    let first_graphics = *graphics.first()?;
    let first_present = *present.first()?;

    for &graphics_family in &graphics {
        if let Some(&present_family) = present.iter().find(|&&p| p != graphics_family) {
            return Some(QueueFamilySelection { graphics_family, present_family });
        }
    }

    Some(QueueFamilySelection {
        graphics_family: first_graphics,
        present_family: first_present,
    })
}

/// Select the best eligible adapter
///
/// Highest score wins; ties keep the first adapter in list order.
///
/// # Errors
///
/// `Error::NoSuitableAdapter` if no adapter has both a graphics and a present family.
pub fn select_adapter(adapters: &[AdapterInfo]) -> Result<AdapterSelection> {
    let mut best: Option<AdapterSelection> = None;

    for (adapter_index, adapter) in adapters.iter().enumerate() {
        let score = score_adapter(adapter);
        let Some(queue_families) = select_queue_families(adapter) else {
            crate::engine_debug!(
                "ya::AdapterSelector",
                "Skipping {} ({:?}): no graphics+present queue families",
                adapter.name, adapter.adapter_type
            );
            continue;
        };

        crate::engine_debug!(
            "ya::AdapterSelector",
            "Candidate {} ({:?}, vendor {:#06x}, device {:#06x}, API {}) score {}",
            adapter.name, adapter.adapter_type, adapter.vendor_id, adapter.device_id,
            adapter.api_version, score
        );

        if best.map_or(true, |current| score > current.score) {
            best = Some(AdapterSelection { adapter_index, score, queue_families });
        }
    }

    let selection = best.ok_or_else(|| {
        crate::engine_error!("ya::AdapterSelector", "No adapter supports graphics and presentation");
        Error::NoSuitableAdapter
    })?;

    let adapter = &adapters[selection.adapter_index];
    crate::engine_info!(
        "ya::AdapterSelector",
        "Selected {} (score {}, graphics family {}, present family {})",
        adapter.name, selection.score,
        selection.queue_families.graphics_family, selection.queue_families.present_family
    );

    Ok(selection)
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;

/// Logical device planning
///
/// Everything that can fail for configuration reasons is decided here, before
/// the backend creates the device: queue counts against family capacity,
/// merged create entries for shared families, queue tags and debug names, and
/// the device extension/layer set.

use crate::error::{Error, Result};
use crate::render::feature::{self, AvailableFeatures, FeatureRequests, FeatureScope, NegotiatedFeatures};
use crate::render::{AdapterInfo, QueueFamilySelection};

/// Priority of graphics queues
pub const GRAPHICS_QUEUE_PRIORITY: f32 = 0.0;
/// Priority of present queues (presentation must not starve)
pub const PRESENT_QUEUE_PRIORITY: f32 = 1.0;

/// One queue create entry (one per unique family)
#[derive(Debug, Clone, PartialEq)]
pub struct QueueCreatePlan {
    pub family_index: u32,
    /// One priority per queue created in the family
    pub priorities: Vec<f32>,
}

/// What a queue is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueRole {
    Graphics,
    Present,
}

/// Tag of one created queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSlot {
    pub role: QueueRole,
    pub family_index: u32,
    /// Queue index inside the family
    pub index: u32,
    pub can_present: bool,
    pub debug_name: String,
}

/// Queue layout of a logical device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceQueuePlan {
    pub create_infos: Vec<QueueCreatePlan>,
    pub graphics: Vec<QueueSlot>,
    pub present: Vec<QueueSlot>,
}

/// Everything needed to create a logical device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCreatePlan {
    pub queue_families: QueueFamilySelection,
    pub queues: DeviceQueuePlan,
    pub features: NegotiatedFeatures,
}

fn check_capacity(adapter: &AdapterInfo, family_index: u32, requested: u32) -> Result<()> {
    let available = adapter
        .queue_family(family_index)
        .map(|family| family.queue_count)
        .unwrap_or(0);
    if requested > available {
        crate::engine_error!(
            "ya::DeviceFactory",
            "Queue family {} exposes {} queue(s), {} requested",
            family_index, available, requested
        );
        return Err(Error::RequestExceedsAvailable { family_index, requested, available });
    }
    Ok(())
}

/// Plan queue creation for the selected families
///
/// When graphics and present share a family a single create entry carries
/// `graphics_count + present_count` queues: graphics take slots `0..g`, present
/// take slots `g..g+p`.
///
/// # Errors
///
/// `Error::RequestExceedsAvailable` if a family cannot hold the requested queues.
pub fn plan_queues(
    adapter: &AdapterInfo,
    families: QueueFamilySelection,
    graphics_count: u32,
    present_count: u32,
) -> Result<DeviceQueuePlan> {
    if graphics_count == 0 || present_count == 0 {
        return Err(Error::InvalidResource(format!(
            "At least one graphics and one present queue required ({} / {} requested)",
            graphics_count, present_count
        )));
    }

    check_capacity(adapter, families.graphics_family, graphics_count)?;
    check_capacity(adapter, families.present_family, present_count)?;

    let graphics_can_present = adapter
        .queue_family(families.graphics_family)
        .map(|family| family.can_present())
        .unwrap_or(false);

    let (create_infos, present_base) = if families.is_shared() {
        check_capacity(adapter, families.graphics_family, graphics_count + present_count)?;

        let mut priorities = vec![GRAPHICS_QUEUE_PRIORITY; graphics_count as usize];
        priorities.extend(std::iter::repeat(PRESENT_QUEUE_PRIORITY).take(present_count as usize));
        (
            vec![QueueCreatePlan { family_index: families.graphics_family, priorities }],
            graphics_count,
        )
    } else {
        (
            vec![
                QueueCreatePlan {
                    family_index: families.graphics_family,
                    priorities: vec![GRAPHICS_QUEUE_PRIORITY; graphics_count as usize],
                },
                QueueCreatePlan {
                    family_index: families.present_family,
                    priorities: vec![PRESENT_QUEUE_PRIORITY; present_count as usize],
                },
            ],
            0,
        )
    };

    let graphics = (0..graphics_count)
        .map(|i| QueueSlot {
            role: QueueRole::Graphics,
            family_index: families.graphics_family,
            index: i,
            can_present: graphics_can_present,
            debug_name: format!("GraphicsQueue_{}", i),
        })
        .collect();

    let present = (0..present_count)
        .map(|i| QueueSlot {
            role: QueueRole::Present,
            family_index: families.present_family,
            index: present_base + i,
            can_present: true,
            debug_name: format!("PresentQueue_{}", i),
        })
        .collect();

    Ok(DeviceQueuePlan { create_infos, graphics, present })
}

/// Plan the whole logical device: queues first, then device features
///
/// # Errors
///
/// - `Error::RequestExceedsAvailable` for queue counts
/// - `Error::ExtensionUnsupported` for a missing required device extension
/// - `Error::MissingRequiredFeature` for a missing required device layer
pub fn plan_device(
    adapter: &AdapterInfo,
    families: QueueFamilySelection,
    graphics_count: u32,
    present_count: u32,
    available_layers: &[String],
    requested: &FeatureRequests,
) -> Result<DeviceCreatePlan> {
    let queues = plan_queues(adapter, families, graphics_count, present_count)?;

    let available = AvailableFeatures {
        extensions: adapter.extensions.clone(),
        layers: available_layers.to_vec(),
    };
    let features = feature::negotiate(FeatureScope::Device, &available, requested).map_err(|err| match err {
        Error::MissingRequiredFeature { name, .. } if adapter_lacks_extension(adapter, requested, &name) => {
            Error::ExtensionUnsupported(name)
        }
        other => other,
    })?;

    Ok(DeviceCreatePlan { queue_families: families, queues, features })
}

fn adapter_lacks_extension(adapter: &AdapterInfo, requested: &FeatureRequests, name: &str) -> bool {
    requested.extensions.iter().any(|request| request.name == name)
        && !adapter.extensions.iter().any(|extension| extension == name)
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;

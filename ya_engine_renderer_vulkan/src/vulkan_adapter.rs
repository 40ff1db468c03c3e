/// Physical device queries feeding the adapter selector

use ash::vk;
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::{
    select_adapter, AdapterInfo, AdapterSelection, CompositeAlpha, MemoryType, QueueFamilyInfo,
    SurfaceCapabilities, SurfaceFormat, SurfaceSupport,
};
use ya_engine::{engine_err, engine_error, engine_trace};

use crate::vulkan_format::{
    vk_to_adapter_type, vk_to_color_space, vk_to_composite_alpha, vk_to_extent, vk_to_format,
    vk_to_memory_properties, vk_to_present_mode, vk_to_queue_capabilities,
};
use crate::vulkan_instance::{api_version_of, name_of, VulkanInstance};

/// A physical device together with its engine-side description
#[derive(Debug, Clone)]
pub struct PhysicalAdapter {
    pub handle: vk::PhysicalDevice,
    pub info: AdapterInfo,
}

/// Enumerate every physical device and pick the best one for `surface`
pub fn select_physical_adapter(
    instance: &VulkanInstance,
    surface: vk::SurfaceKHR,
) -> Result<(PhysicalAdapter, AdapterSelection)> {
    let handles = unsafe { instance.instance.enumerate_physical_devices() }.map_err(|e| {
        engine_error!("ya::vulkan", "Failed to enumerate physical devices: {:?}", e);
        Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
    })?;

    let mut adapters = Vec::with_capacity(handles.len());
    for handle in handles {
        adapters.push(PhysicalAdapter { handle, info: describe_adapter(instance, handle, surface)? });
    }

    let infos: Vec<AdapterInfo> = adapters.iter().map(|adapter| adapter.info.clone()).collect();
    let selection = select_adapter(&infos)?;
    let adapter = adapters.swap_remove(selection.adapter_index);
    Ok((adapter, selection))
}

fn describe_adapter(
    instance: &VulkanInstance,
    handle: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<AdapterInfo> {
    let vk_instance = &instance.instance;
    let properties = unsafe { vk_instance.get_physical_device_properties(handle) };
    let features = unsafe { vk_instance.get_physical_device_features(handle) };
    let memory = unsafe { vk_instance.get_physical_device_memory_properties(handle) };
    let families = unsafe { vk_instance.get_physical_device_queue_family_properties(handle) };

    let extensions = unsafe { vk_instance.enumerate_device_extension_properties(handle) }
        .map_err(|e| engine_err!("ya::vulkan", "Failed to enumerate device extensions: {:?}", e))?
        .iter()
        .filter_map(|p| p.extension_name_as_c_str().ok().map(name_of))
        .collect();

    let mut queue_families = Vec::with_capacity(families.len());
    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        let supports_present = unsafe {
            instance
                .surface_loader
                .get_physical_device_surface_support(handle, index, surface)
        }
        .map_err(|e| engine_err!("ya::vulkan", "Failed to query present support: {:?}", e))?;

        queue_families.push(QueueFamilyInfo {
            index,
            queue_count: family.queue_count,
            capabilities: vk_to_queue_capabilities(family.queue_flags),
            supports_present,
        });
    }

    let memory_types = memory
        .memory_types_as_slice()
        .iter()
        .map(|memory_type| MemoryType {
            property_flags: vk_to_memory_properties(memory_type.property_flags),
            heap_index: memory_type.heap_index,
        })
        .collect();

    let surface_formats = query_surface_formats(&instance.surface_loader, handle, surface)?;

    let name = properties
        .device_name_as_c_str()
        .map(name_of)
        .unwrap_or_else(|_| "Unknown device".to_string());

    Ok(AdapterInfo {
        name,
        vendor_id: properties.vendor_id,
        device_id: properties.device_id,
        api_version: api_version_of(properties.api_version),
        adapter_type: vk_to_adapter_type(properties.device_type),
        geometry_shader: features.geometry_shader == vk::TRUE,
        extensions,
        queue_families,
        memory_types,
        surface_formats,
    })
}

fn query_surface_formats(
    loader: &ash::khr::surface::Instance,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<Vec<SurfaceFormat>> {
    let formats = unsafe { loader.get_physical_device_surface_formats(physical_device, surface) }
        .map_err(|e| engine_err!("ya::vulkan", "Failed to query surface formats: {:?}", e))?;

    Ok(formats
        .iter()
        .filter_map(|f| match (vk_to_format(f.format), vk_to_color_space(f.color_space)) {
            (Some(format), Some(color_space)) => Some(SurfaceFormat { format, color_space }),
            _ => {
                engine_trace!("ya::vulkan", "Ignoring surface format {:?}/{:?}", f.format, f.color_space);
                None
            }
        })
        .collect())
}

/// Capabilities, formats and present modes of `surface` on `physical_device`
pub fn query_surface_support(
    loader: &ash::khr::surface::Instance,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<SurfaceSupport> {
    let caps = unsafe { loader.get_physical_device_surface_capabilities(physical_device, surface) }
        .map_err(|e| engine_err!("ya::vulkan", "Failed to get surface capabilities: {:?}", e))?;
    let present_modes = unsafe { loader.get_physical_device_surface_present_modes(physical_device, surface) }
        .map_err(|e| engine_err!("ya::vulkan", "Failed to query present modes: {:?}", e))?;

    Ok(SurfaceSupport {
        capabilities: surface_capabilities(&caps),
        formats: query_surface_formats(loader, physical_device, surface)?,
        present_modes: present_modes.into_iter().filter_map(vk_to_present_mode).collect(),
    })
}

pub(crate) fn surface_capabilities(caps: &vk::SurfaceCapabilitiesKHR) -> SurfaceCapabilities {
    // u32::MAX means the surface size follows the swapchain extent
    let current_extent = if caps.current_extent.width == u32::MAX {
        None
    } else {
        Some(vk_to_extent(caps.current_extent))
    };

    SurfaceCapabilities {
        min_image_count: caps.min_image_count,
        max_image_count: caps.max_image_count,
        current_extent,
        min_image_extent: vk_to_extent(caps.min_image_extent),
        max_image_extent: vk_to_extent(caps.max_image_extent),
        supported_composite_alpha: if caps.supported_composite_alpha.is_empty() {
            CompositeAlpha::OPAQUE
        } else {
            vk_to_composite_alpha(caps.supported_composite_alpha)
        },
    }
}

#[cfg(test)]
#[path = "vulkan_adapter_tests.rs"]
mod tests;

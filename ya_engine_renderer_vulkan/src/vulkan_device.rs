/// Logical device built from a core `DeviceCreatePlan`

use ash::vk;
use std::ffi::CString;
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::{
    plan_device, AdapterInfo, AdapterSelection, FeatureRequest, FeatureRequests, NegotiatedFeatures,
    QueueFamilySelection, QueueSlot, RenderConfig,
};
use ya_engine::{engine_err, engine_error, engine_info, engine_warn};

use crate::vulkan_adapter::PhysicalAdapter;
use crate::vulkan_instance::{name_of, to_c_strings, VulkanInstance};

/// A device queue tagged with its role
#[derive(Debug, Clone)]
pub struct Queue {
    pub handle: vk::Queue,
    pub slot: QueueSlot,
}

pub struct LogicalDevice {
    pub(crate) device: ash::Device,
    pub(crate) physical_device: vk::PhysicalDevice,
    adapter: AdapterInfo,
    queue_families: QueueFamilySelection,
    graphics_queues: Vec<Queue>,
    present_queues: Vec<Queue>,
    pipeline_cache: vk::PipelineCache,
    debug_utils: Option<ash::ext::debug_utils::Device>,
    features: NegotiatedFeatures,
    non_coherent_atom_size: u64,
    max_sampler_anisotropy: Option<f32>,
}

/// Device feature requests: the swapchain extension first, then the config lists
pub(crate) fn device_requests(config: &RenderConfig) -> FeatureRequests {
    let mut extensions = vec![FeatureRequest::required(name_of(ash::khr::swapchain::NAME))];
    extensions.extend(config.device_extensions.iter().cloned());
    FeatureRequests { extensions, layers: config.device_layers.clone() }
}

impl LogicalDevice {
    pub fn new(
        instance: &VulkanInstance,
        adapter: PhysicalAdapter,
        selection: &AdapterSelection,
        config: &RenderConfig,
    ) -> Result<Self> {
        let plan = plan_device(
            &adapter.info,
            selection.queue_families,
            config.graphics_queue_count,
            config.present_queue_count,
            instance.available_layers(),
            &device_requests(config),
        )?;

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = plan
            .queues
            .create_infos
            .iter()
            .map(|info| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(info.family_index)
                    .queue_priorities(&info.priorities)
            })
            .collect();

        let extension_names = to_c_strings(&plan.features.extension_names)?;
        let layer_names = to_c_strings(&plan.features.layer_names)?;
        let extension_ptrs: Vec<_> = extension_names.iter().map(|name| name.as_ptr()).collect();
        let layer_ptrs: Vec<_> = layer_names.iter().map(|name| name.as_ptr()).collect();

        let supported = unsafe { instance.instance.get_physical_device_features(adapter.handle) };
        let enabled_features = vk::PhysicalDeviceFeatures::default()
            .geometry_shader(supported.geometry_shader == vk::TRUE)
            .sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE);

        // Device layers are deprecated but still honored by older loaders
        #[allow(deprecated)]
        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs)
            .enabled_features(&enabled_features);

        let device = unsafe { instance.instance.create_device(adapter.handle, &device_create_info, None) }
            .map_err(|e| {
                engine_error!("ya::vulkan", "Failed to create logical device: {:?}", e);
                Error::InitializationFailed(format!("Failed to create device: {:?}", e))
            })?;

        let debug_utils = instance
            .debug_utils_enabled()
            .then(|| ash::ext::debug_utils::Device::new(&instance.instance, &device));

        let pipeline_cache = match unsafe {
            device.create_pipeline_cache(&vk::PipelineCacheCreateInfo::default(), None)
        } {
            Ok(cache) => cache,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                engine_error!("ya::vulkan", "Failed to create pipeline cache: {:?}", e);
                return Err(Error::InitializationFailed(format!("Failed to create pipeline cache: {:?}", e)));
            }
        };

        let fetch = |slot: &QueueSlot| Queue {
            handle: unsafe { device.get_device_queue(slot.family_index, slot.index) },
            slot: slot.clone(),
        };
        let graphics_queues: Vec<Queue> = plan.queues.graphics.iter().map(fetch).collect();
        let present_queues: Vec<Queue> = plan.queues.present.iter().map(fetch).collect();

        let properties = unsafe { instance.instance.get_physical_device_properties(adapter.handle) };

        let logical = Self {
            device,
            physical_device: adapter.handle,
            adapter: adapter.info,
            queue_families: plan.queue_families,
            graphics_queues,
            present_queues,
            pipeline_cache,
            debug_utils,
            features: plan.features,
            non_coherent_atom_size: properties.limits.non_coherent_atom_size,
            max_sampler_anisotropy: (supported.sampler_anisotropy == vk::TRUE)
                .then_some(properties.limits.max_sampler_anisotropy),
        };

        for queue in logical.graphics_queues.iter().chain(logical.present_queues.iter()) {
            logical.set_debug_name(queue.handle, &queue.slot.debug_name);
        }

        engine_info!(
            "ya::vulkan",
            "Logical device created on {} ({} graphics queue(s) on family {}, {} present queue(s) on family {})",
            logical.adapter.name,
            logical.graphics_queues.len(),
            logical.queue_families.graphics_family,
            logical.present_queues.len(),
            logical.queue_families.present_family
        );

        Ok(logical)
    }

    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    pub fn adapter(&self) -> &AdapterInfo {
        &self.adapter
    }

    pub fn queue_families(&self) -> QueueFamilySelection {
        self.queue_families
    }

    pub fn graphics_queues(&self) -> &[Queue] {
        &self.graphics_queues
    }

    pub fn present_queues(&self) -> &[Queue] {
        &self.present_queues
    }

    pub fn pipeline_cache(&self) -> vk::PipelineCache {
        self.pipeline_cache
    }

    pub fn features(&self) -> &NegotiatedFeatures {
        &self.features
    }

    pub fn non_coherent_atom_size(&self) -> u64 {
        self.non_coherent_atom_size
    }

    /// Anisotropy limit, `None` when the feature is not enabled
    pub fn max_sampler_anisotropy(&self) -> Option<f32> {
        self.max_sampler_anisotropy
    }

    /// Attach a debug name to a Vulkan object (no-op without debug utils)
    pub fn set_debug_name<H: vk::Handle>(&self, handle: H, name: &str) {
        let Some(loader) = &self.debug_utils else {
            return;
        };
        let Ok(name_c) = CString::new(name) else {
            engine_warn!("ya::vulkan", "Debug name contains a NUL byte: {:?}", name);
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(handle)
            .object_name(&name_c);
        if let Err(e) = unsafe { loader.set_debug_utils_object_name(&info) } {
            engine_warn!("ya::vulkan", "Failed to set debug name '{}': {:?}", name, e);
        }
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to wait for device idle: {:?}", e))
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_cache(self.pipeline_cache, None);
            self.device.destroy_device(None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_device_tests.rs"]
mod tests;

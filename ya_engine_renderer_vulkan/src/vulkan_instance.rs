/// Vulkan instance with negotiated extensions and layers
///
/// Window extensions are required. `VK_EXT_debug_utils` and the Khronos
/// validation layer are optional, so a machine without the SDK simply runs
/// without validation.

use ash::vk;
use std::ffi::{CStr, CString};
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::{
    self as render, ApiVersion, AvailableFeatures, FeatureRequest, FeatureRequests, FeatureScope,
    NegotiatedFeatures, RenderConfig,
};
use ya_engine::{engine_error, engine_info, engine_warn};

use crate::debug;
use crate::vulkan_window::WindowBackend;

pub(crate) const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Highest API version the backend asks for
pub(crate) const TARGET_API_VERSION: u32 = vk::API_VERSION_1_3;

pub struct VulkanInstance {
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) surface_loader: ash::khr::surface::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    api_version: u32,
    features: NegotiatedFeatures,
    available_layers: Vec<String>,
}

/// Clamp the requested API version to what the loader reports
pub(crate) fn clamp_api_version(loader_version: Option<u32>) -> u32 {
    loader_version.unwrap_or(vk::API_VERSION_1_0).min(TARGET_API_VERSION)
}

pub(crate) fn api_version_of(version: u32) -> ApiVersion {
    ApiVersion {
        major: vk::api_version_major(version),
        minor: vk::api_version_minor(version),
        patch: vk::api_version_patch(version),
    }
}

/// Instance feature requests: window extensions, optional validation, then config lists
pub(crate) fn instance_requests(
    window_extensions: Vec<String>,
    validation: bool,
    config: &RenderConfig,
) -> FeatureRequests {
    let mut extensions: Vec<FeatureRequest> =
        window_extensions.into_iter().map(FeatureRequest::required).collect();
    let mut layers = Vec::new();

    if validation {
        extensions.push(FeatureRequest::optional(name_of(ash::ext::debug_utils::NAME)));
        layers.push(FeatureRequest::optional(VALIDATION_LAYER));
    }

    extensions.extend(config.instance_extensions.iter().cloned());
    layers.extend(config.instance_layers.iter().cloned());

    FeatureRequests { extensions, layers }
}

pub(crate) fn name_of(name: &CStr) -> String {
    name.to_string_lossy().into_owned()
}

pub(crate) fn to_c_strings(names: &[String]) -> Result<Vec<CString>> {
    names
        .iter()
        .map(|name| {
            CString::new(name.as_str())
                .map_err(|e| Error::InvalidResource(format!("Invalid feature name '{}': {}", name, e)))
        })
        .collect()
}

impl VulkanInstance {
    pub fn new(window: &dyn WindowBackend, config: &RenderConfig) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            engine_error!("ya::vulkan", "Failed to load Vulkan library: {:?}", e);
            Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
        })?;

        let loader_version = unsafe { entry.try_enumerate_instance_version() }.map_err(|e| {
            engine_error!("ya::vulkan", "Failed to query instance version: {:?}", e);
            Error::InitializationFailed(format!("Failed to query instance version: {:?}", e))
        })?;
        let api_version = clamp_api_version(loader_version);
        if api_version < TARGET_API_VERSION {
            engine_warn!(
                "ya::vulkan",
                "Loader supports Vulkan {} only, requesting it instead of {}",
                api_version_of(api_version), api_version_of(TARGET_API_VERSION)
            );
        }

        let available = Self::available_features(&entry)?;
        let validation = cfg!(feature = "vulkan-validation") && config.enable_validation;
        let requests = instance_requests(window.required_extensions()?, validation, config);
        let features = render::negotiate(FeatureScope::Instance, &available, &requests)?;

        let app_name = CString::new(config.app_name.as_str())
            .map_err(|e| Error::InitializationFailed(format!("Invalid app name: {}", e)))?;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(
                0,
                config.app_version.0,
                config.app_version.1,
                config.app_version.2,
            ))
            .engine_name(c"Ya")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(api_version);

        let extension_names = to_c_strings(&features.extension_names)?;
        let layer_names = to_c_strings(&features.layer_names)?;
        let extension_ptrs: Vec<_> = extension_names.iter().map(|name| name.as_ptr()).collect();
        let layer_ptrs: Vec<_> = layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
            engine_error!("ya::vulkan", "Failed to create Vulkan instance: {:?}", e);
            Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
        })?;

        let has_debug_utils = features.extension_names.iter().any(|name| *name == name_of(ash::ext::debug_utils::NAME));
        let debug_utils = if has_debug_utils {
            match Self::create_messenger(&entry, &instance, config) {
                Ok(pair) => Some(pair),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        engine_info!(
            "ya::vulkan",
            "Vulkan instance created (API {}, {} extension(s), {} layer(s), validation {})",
            api_version_of(api_version),
            features.extension_names.len(),
            features.layer_names.len(),
            if debug_utils.is_some() { "on" } else { "off" }
        );

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        Ok(Self {
            entry,
            instance,
            surface_loader,
            debug_utils,
            api_version,
            features,
            available_layers: available.layers,
        })
    }

    fn available_features(entry: &ash::Entry) -> Result<AvailableFeatures> {
        let extensions = unsafe { entry.enumerate_instance_extension_properties(None) }.map_err(|e| {
            engine_error!("ya::vulkan", "Failed to enumerate instance extensions: {:?}", e);
            Error::InitializationFailed(format!("Failed to enumerate instance extensions: {:?}", e))
        })?;
        let layers = unsafe { entry.enumerate_instance_layer_properties() }.map_err(|e| {
            engine_error!("ya::vulkan", "Failed to enumerate instance layers: {:?}", e);
            Error::InitializationFailed(format!("Failed to enumerate instance layers: {:?}", e))
        })?;

        Ok(AvailableFeatures {
            extensions: extensions
                .iter()
                .filter_map(|p| p.extension_name_as_c_str().ok().map(name_of))
                .collect(),
            layers: layers
                .iter()
                .filter_map(|p| p.layer_name_as_c_str().ok().map(name_of))
                .collect(),
        })
    }

    fn create_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &RenderConfig,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
        debug::init_debug_config(config.debug.clone());

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(debug::severity_flags(config.debug.severity))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug::vulkan_debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&debug_info, None) }.map_err(|e| {
            engine_error!("ya::vulkan", "Failed to create debug messenger: {:?}", e);
            Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
        })?;

        Ok((debug_utils, messenger))
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn features(&self) -> &NegotiatedFeatures {
        &self.features
    }

    /// Layers the loader exposes, offered again for device-level negotiation
    pub fn available_layers(&self) -> &[String] {
        &self.available_layers
    }

    /// True when the debug messenger is installed
    pub fn debug_utils_enabled(&self) -> bool {
        self.debug_utils.is_some()
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                debug::cleanup_debug_config();
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_instance_tests.rs"]
mod tests;

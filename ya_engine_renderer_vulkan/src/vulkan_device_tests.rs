//! Unit tests for device feature requests

use ya_engine::ya::render::{FeatureRequest, RenderConfig};
use crate::vulkan_device::device_requests;

#[test]
fn test_swapchain_extension_always_required() {
    let requests = device_requests(&RenderConfig::default());
    assert_eq!(requests.extensions, vec![FeatureRequest::required("VK_KHR_swapchain")]);
    assert!(requests.layers.is_empty());
}

#[test]
fn test_config_device_requests_follow() {
    let config = RenderConfig {
        device_extensions: vec![
            FeatureRequest::optional("VK_EXT_memory_budget"),
            FeatureRequest::required("VK_KHR_swapchain"),
        ],
        device_layers: vec![FeatureRequest::optional("VK_LAYER_KHRONOS_validation")],
        ..Default::default()
    };
    let requests = device_requests(&config);
    assert_eq!(requests.extensions.len(), 3);
    assert_eq!(requests.extensions[1], FeatureRequest::optional("VK_EXT_memory_budget"));
    assert_eq!(requests.layers.len(), 1);
}

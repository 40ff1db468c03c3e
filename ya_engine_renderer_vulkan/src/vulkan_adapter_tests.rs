//! Unit tests for surface capability conversion

use ash::vk;
use ya_engine::ya::render::{CompositeAlpha, Extent2D};
use crate::vulkan_adapter::surface_capabilities;

fn caps(current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        min_image_count: 2,
        max_image_count: 8,
        current_extent: current,
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
        supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE | vk::CompositeAlphaFlagsKHR::INHERIT,
        ..Default::default()
    }
}

#[test]
fn test_defined_current_extent() {
    let converted = surface_capabilities(&caps(vk::Extent2D { width: 800, height: 600 }));
    assert_eq!(converted.current_extent, Some(Extent2D::new(800, 600)));
    assert_eq!(converted.min_image_count, 2);
    assert_eq!(converted.max_image_count, 8);
    assert_eq!(converted.max_image_extent, Extent2D::new(4096, 4096));
    assert_eq!(converted.supported_composite_alpha, CompositeAlpha::OPAQUE | CompositeAlpha::INHERIT);
}

#[test]
fn test_undefined_current_extent() {
    let converted = surface_capabilities(&caps(vk::Extent2D { width: u32::MAX, height: u32::MAX }));
    assert_eq!(converted.current_extent, None);
}

#[test]
fn test_minimized_current_extent_is_kept() {
    let converted = surface_capabilities(&caps(vk::Extent2D { width: 0, height: 0 }));
    assert_eq!(converted.current_extent, Some(Extent2D::new(0, 0)));
}

//! Unit tests for error.rs
//!
//! Tests all Error variants and their implementations (Display, Debug, Clone, std::error::Error).

use crate::error::{Error, Result};
use crate::render::{ImageLayout, MemoryPropertyFlags};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit failed".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("vkQueueSubmit failed"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_missing_required_feature_names_item() {
    let err = Error::MissingRequiredFeature {
        scope: "device".to_string(),
        name: "VK_KHR_swapchain".to_string(),
    };
    let display = format!("{}", err);
    assert!(display.contains("device"));
    assert!(display.contains("VK_KHR_swapchain"));
}

#[test]
fn test_request_exceeds_available_display() {
    let err = Error::RequestExceedsAvailable { family_index: 2, requested: 4, available: 1 };
    let display = format!("{}", err);
    assert!(display.contains("family 2"));
    assert!(display.contains("4 requested"));
}

#[test]
fn test_invalid_attachment_reference_display() {
    let err = Error::InvalidAttachmentReference { subpass: 0, index: 3, attachment_count: 2 };
    let display = format!("{}", err);
    assert!(display.contains("attachment 3"));
    assert!(display.contains("2 attachment(s)"));
}

#[test]
fn test_layout_transition_display() {
    let err = Error::UnsupportedLayoutTransition {
        old: ImageLayout::PresentSrc,
        new: ImageLayout::TransferDst,
    };
    let display = format!("{}", err);
    assert!(display.contains("PresentSrc"));
    assert!(display.contains("TransferDst"));
}

#[test]
fn test_no_suitable_memory_type_display() {
    let err = Error::NoSuitableMemoryType {
        type_bits: 0b101,
        properties: MemoryPropertyFlags::DEVICE_LOCAL,
    };
    let display = format!("{}", err);
    assert!(display.contains("0b101"));
    assert!(display.contains("DEVICE_LOCAL"));
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::NoSuitableAdapter;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_clone() {
    let err = Error::DescriptorPoolExhausted { max_sets: 8 };
    let cloned = err.clone();
    assert!(matches!(cloned, Error::DescriptorPoolExhausted { max_sets: 8 }));
}

#[test]
fn test_result_alias() {
    fn fails() -> Result<u32> {
        Err(Error::InvalidState("not recording".to_string()))
    }
    assert!(fails().is_err());
}

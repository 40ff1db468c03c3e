//! Unit tests for swapchain result mapping
//!
//! Creation and recreation need a surface; see tests/vulkan_render_tests.rs.

use ash::vk;
use ya_engine::ya::Error;
use ya_engine::ya::render::{AcquireOutcome, PresentOutcome, SharingMode};
use crate::vulkan_swapchain::*;

// ============================================================================
// SHARING MODE
// ============================================================================

#[test]
fn test_exclusive_sharing_has_no_families() {
    let (mode, families) = sharing_to_vk(SharingMode::Exclusive);
    assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
    assert!(families.is_empty());
}

#[test]
fn test_concurrent_sharing_lists_both_families() {
    let (mode, families) = sharing_to_vk(SharingMode::Concurrent { families: [0, 2] });
    assert_eq!(mode, vk::SharingMode::CONCURRENT);
    assert_eq!(families, vec![0, 2]);
}

// ============================================================================
// ACQUIRE / PRESENT
// ============================================================================

#[test]
fn test_acquire_outcome_mapping() {
    assert_eq!(
        acquire_outcome(Ok((2, false))).unwrap(),
        AcquireOutcome::Acquired { image_index: 2, suboptimal: false }
    );
    assert_eq!(
        acquire_outcome(Ok((0, true))).unwrap(),
        AcquireOutcome::Acquired { image_index: 0, suboptimal: true }
    );
    assert_eq!(
        acquire_outcome(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
        AcquireOutcome::OutOfDate
    );
}

#[test]
fn test_acquire_device_lost_is_backend_error() {
    let result = acquire_outcome(Err(vk::Result::ERROR_DEVICE_LOST));
    assert!(matches!(result, Err(Error::BackendError(_))));
}

#[test]
fn test_present_outcome_mapping() {
    assert_eq!(present_outcome(Ok(false)).unwrap(), PresentOutcome::Presented);
    assert_eq!(present_outcome(Ok(true)).unwrap(), PresentOutcome::Suboptimal);
    assert_eq!(
        present_outcome(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
        PresentOutcome::OutOfDate
    );
    assert!(matches!(
        present_outcome(Err(vk::Result::ERROR_SURFACE_LOST_KHR)),
        Err(Error::BackendError(_))
    ));
}

// ============================================================================
// GENERATION STAGING
// ============================================================================

#[test]
fn test_stage_generation_returns_new_handle_and_images() {
    let mut destroyed = Vec::new();
    let (handle, images) = stage_generation(
        7u64,
        |handle| Ok(vec![handle * 10, handle * 10 + 1]),
        |handle| destroyed.push(handle),
    )
    .unwrap();

    assert_eq!(handle, 7);
    assert_eq!(images, vec![70, 71]);
    assert!(destroyed.is_empty());
}

#[test]
fn test_failed_image_build_keeps_previous_generation() {
    let mut current: (u64, Vec<&str>) = (1, vec!["old_view0", "old_view1"]);
    let mut destroyed = Vec::new();

    let result = stage_generation(
        2u64,
        |_| Err::<Vec<&str>, _>(Error::BackendError("Failed to create image view".to_string())),
        |handle| destroyed.push(handle),
    );
    let failed = result.is_err();
    if let Ok(next) = result {
        current = next;
    }

    assert!(failed);
    // Only the new handle is released; the old generation is still whole
    assert_eq!(destroyed, vec![2]);
    assert_eq!(current, (1, vec!["old_view0", "old_view1"]));
}

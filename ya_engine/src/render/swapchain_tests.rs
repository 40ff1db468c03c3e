//! Unit tests for swapchain negotiation and lifecycle

use crate::error::Error;
use crate::render::mock_render::{mock_surface_support, MockSwapchain};
use crate::render::swapchain::*;
use crate::render::{ColorSpace, Extent2D, Format, PresentMode, QueueFamilySelection, SurfaceFormat};

const SHARED: QueueFamilySelection = QueueFamilySelection { graphics_family: 0, present_family: 0 };

fn capabilities() -> SurfaceCapabilities {
    mock_surface_support().capabilities
}

fn snapshot(width: u32) -> SwapchainSnapshot {
    SwapchainSnapshot {
        extent: Extent2D::new(width, 600),
        present_mode: PresentMode::Fifo,
        surface_format: SurfaceFormat::PREFERRED,
        image_count: 3,
    }
}

// ============================================================================
// SURFACE FORMAT
// ============================================================================

#[test]
fn test_prefers_bgra_unorm_srgb_nonlinear() {
    let available = vec![
        SurfaceFormat { format: Format::R8G8B8A8_SRGB, color_space: ColorSpace::SrgbNonlinear },
        SurfaceFormat::PREFERRED,
    ];
    assert_eq!(choose_surface_format(&available, None).unwrap(), SurfaceFormat::PREFERRED);
}

#[test]
fn test_falls_back_to_first_format() {
    let first = SurfaceFormat { format: Format::R8G8B8A8_UNORM, color_space: ColorSpace::SrgbNonlinear };
    let available = vec![first, SurfaceFormat { format: Format::B8G8R8A8_SRGB, color_space: ColorSpace::SrgbNonlinear }];
    assert_eq!(choose_surface_format(&available, None).unwrap(), first);
    assert!(choose_surface_format(&[], None).is_err());
}

#[test]
fn test_requested_format_must_be_supported() {
    let available = vec![SurfaceFormat::PREFERRED];
    let requested = SurfaceFormat { format: Format::A2B10G10R10_UNORM_PACK32, color_space: ColorSpace::Hdr10St2084 };
    assert!(matches!(
        choose_surface_format(&available, Some(requested)),
        Err(Error::UnsupportedSurfaceFormat(_))
    ));
    assert_eq!(choose_surface_format(&available, Some(SurfaceFormat::PREFERRED)).unwrap(), SurfaceFormat::PREFERRED);
}

// ============================================================================
// PRESENT MODE / EXTENT / IMAGE COUNT
// ============================================================================

#[test]
fn test_present_mode_order() {
    let all = [PresentMode::Fifo, PresentMode::Immediate, PresentMode::Mailbox];
    assert_eq!(choose_present_mode(&all, PresentMode::Mailbox, false), PresentMode::Mailbox);
    assert_eq!(choose_present_mode(&all, PresentMode::Immediate, false), PresentMode::Immediate);
    assert_eq!(
        choose_present_mode(&[PresentMode::Fifo, PresentMode::Immediate], PresentMode::Mailbox, false),
        PresentMode::Immediate
    );
    assert_eq!(choose_present_mode(&[PresentMode::Fifo], PresentMode::Mailbox, false), PresentMode::Fifo);
}

#[test]
fn test_vsync_forces_fifo() {
    let all = [PresentMode::Fifo, PresentMode::Immediate, PresentMode::Mailbox];
    assert_eq!(choose_present_mode(&all, PresentMode::Mailbox, true), PresentMode::Fifo);
}

#[test]
fn test_extent_uses_current_when_defined() {
    let mut caps = capabilities();
    caps.current_extent = Some(Extent2D::new(1024, 768));
    assert_eq!(choose_extent(&caps, Extent2D::new(800, 600)), Extent2D::new(1024, 768));
}

#[test]
fn test_extent_clamped_into_bounds() {
    let mut caps = capabilities();
    caps.min_image_extent = Extent2D::new(64, 64);
    caps.max_image_extent = Extent2D::new(1920, 1080);
    assert_eq!(choose_extent(&caps, Extent2D::new(4000, 10)), Extent2D::new(1920, 64));
    assert_eq!(choose_extent(&caps, Extent2D::new(0, 0)), Extent2D::default());
}

#[test]
fn test_image_count_clamping() {
    let mut caps = capabilities();
    caps.min_image_count = 2;
    caps.max_image_count = 3;
    assert_eq!(choose_image_count(&caps, 1), 2);
    assert_eq!(choose_image_count(&caps, 3), 3);
    assert_eq!(choose_image_count(&caps, 5), 3);

    caps.max_image_count = 0;
    assert_eq!(choose_image_count(&caps, 5), 5);
}

#[test]
fn test_composite_alpha_and_sharing() {
    assert_eq!(
        choose_composite_alpha(CompositeAlpha::INHERIT | CompositeAlpha::PRE_MULTIPLIED),
        CompositeAlpha::PRE_MULTIPLIED
    );
    assert_eq!(choose_composite_alpha(CompositeAlpha::POST_MULTIPLIED), CompositeAlpha::POST_MULTIPLIED);

    assert_eq!(choose_sharing_mode(SHARED), SharingMode::Exclusive);
    let split = QueueFamilySelection { graphics_family: 0, present_family: 2 };
    assert_eq!(choose_sharing_mode(split), SharingMode::Concurrent { families: [0, 2] });
}

#[test]
fn test_negotiate_prefers_create_info_size() {
    let support = mock_surface_support();
    let create_info = SwapchainCreateInfo { width: 320, height: 240, ..Default::default() };
    let params = negotiate_swapchain(&support, &create_info, Extent2D::new(800, 600), false, SHARED).unwrap();
    assert_eq!(params.extent, Extent2D::new(320, 240));
    assert_eq!(params.present_mode, PresentMode::Mailbox);
    assert_eq!(params.image_count, 3);

    // A minimized window wins over an explicit size
    let params = negotiate_swapchain(&support, &create_info, Extent2D::new(0, 0), false, SHARED).unwrap();
    assert!(params.extent.is_empty());
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_lifecycle_transitions() {
    let mut lifecycle = SwapchainLifecycle::new();
    assert_eq!(lifecycle.state(), SwapchainState::Uninitialized);
    assert_eq!(lifecycle.debug_name(), "SwapChain_0");

    lifecycle.begin().unwrap();
    assert_eq!(lifecycle.state(), SwapchainState::Recreating);
    assert!(lifecycle.begin().is_err());
    assert!(lifecycle.commit(snapshot(800)).unwrap().is_none());
    assert_eq!(lifecycle.state(), SwapchainState::Created);
    assert_eq!(lifecycle.version(), 1);

    lifecycle.begin().unwrap();
    let diff = lifecycle.commit(snapshot(1024)).unwrap().unwrap();
    assert!(diff.extent_changed());
    assert!(!diff.format_changed());
    assert_eq!(diff.old.extent.width, 800);
    assert_eq!(lifecycle.debug_name(), "SwapChain_2");

    lifecycle.destroy();
    assert!(lifecycle.begin().is_err());
}

#[test]
fn test_abort_restores_previous_state() {
    let mut lifecycle = SwapchainLifecycle::new();
    lifecycle.begin().unwrap();
    lifecycle.abort();
    assert_eq!(lifecycle.state(), SwapchainState::Uninitialized);

    lifecycle.begin().unwrap();
    lifecycle.commit(snapshot(800)).unwrap();
    lifecycle.begin().unwrap();
    lifecycle.abort();
    assert_eq!(lifecycle.state(), SwapchainState::Created);
    assert_eq!(lifecycle.current(), Some(&snapshot(800)));
    assert!(lifecycle.commit(snapshot(900)).is_err());
}

#[test]
fn test_recreate_round_trip_is_idempotent() {
    let create_info = SwapchainCreateInfo::default();
    let mut swapchain =
        MockSwapchain::new(mock_surface_support(), create_info.clone(), Extent2D::new(800, 600), false).unwrap();
    let image_count = swapchain.image_count();
    let format = swapchain.surface_format();

    swapchain.recreate(&create_info).unwrap();
    assert_eq!(swapchain.image_count(), image_count);
    assert_eq!(swapchain.surface_format(), format);
    assert_eq!(swapchain.state(), SwapchainState::Created);
    assert_eq!(swapchain.version(), 2);
    assert!(!swapchain.diffs[0].extent_changed());
}

#[test]
fn test_minimized_recreate_reports_zero_images() {
    let create_info = SwapchainCreateInfo::default();
    let mut swapchain =
        MockSwapchain::new(mock_surface_support(), create_info.clone(), Extent2D::new(800, 600), false).unwrap();

    swapchain.set_window_extent(Extent2D::new(0, 0));
    assert!(swapchain.recreate(&create_info).is_ok());
    assert_eq!(swapchain.image_count(), 0);
    assert!(swapchain.extent().is_empty());
    assert_eq!(swapchain.state(), SwapchainState::Created);
}

#[test]
fn test_failed_recreate_keeps_previous_swapchain() {
    let create_info = SwapchainCreateInfo::default();
    let mut swapchain =
        MockSwapchain::new(mock_surface_support(), create_info.clone(), Extent2D::new(800, 600), false).unwrap();

    swapchain.support_mut().formats.clear();
    assert!(swapchain.recreate(&create_info).is_err());
    assert_eq!(swapchain.state(), SwapchainState::Created);
    assert_eq!(swapchain.image_count(), 3);
    assert_eq!(swapchain.version(), 1);
}

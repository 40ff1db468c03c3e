//! Unit tests for the command buffer lifecycle

use crate::error::Error;
use crate::render::command_buffer::{CommandBufferLifecycle, CommandBufferState, Rect2D, Viewport};
use crate::render::Extent2D;

fn executable(one_time: bool) -> CommandBufferLifecycle {
    let mut lifecycle = CommandBufferLifecycle::new(one_time);
    lifecycle.begin().unwrap();
    lifecycle.end().unwrap();
    lifecycle
}

// ============================================================================
// BEGIN / END
// ============================================================================

#[test]
fn test_new_buffer_is_initial() {
    let lifecycle = CommandBufferLifecycle::new(false);
    assert_eq!(lifecycle.state(), CommandBufferState::Initial);
    assert!(!lifecycle.is_one_time_submit());
}

#[test]
fn test_begin_twice_fails() {
    let mut lifecycle = CommandBufferLifecycle::new(false);
    assert!(lifecycle.begin().is_ok());
    assert!(matches!(lifecycle.begin(), Err(Error::InvalidState(_))));
    // The failed call leaves the buffer recording
    assert_eq!(lifecycle.state(), CommandBufferState::Recording);
}

#[test]
fn test_end_without_begin_fails() {
    let mut lifecycle = CommandBufferLifecycle::new(false);
    assert!(matches!(lifecycle.end(), Err(Error::InvalidState(_))));
    assert_eq!(lifecycle.state(), CommandBufferState::Initial);
}

#[test]
fn test_end_twice_fails() {
    let mut lifecycle = executable(false);
    assert!(lifecycle.end().is_err());
    assert_eq!(lifecycle.state(), CommandBufferState::Executable);
}

#[test]
fn test_rerecord_executable() {
    let mut lifecycle = executable(false);
    assert!(lifecycle.begin().is_ok());
    assert_eq!(lifecycle.state(), CommandBufferState::Recording);
}

// ============================================================================
// SUBMISSION
// ============================================================================

#[test]
fn test_submit_requires_executable() {
    let mut lifecycle = CommandBufferLifecycle::new(false);
    assert!(lifecycle.submit().is_err());
    lifecycle.begin().unwrap();
    assert!(lifecycle.submit().is_err());
    lifecycle.end().unwrap();
    assert!(lifecycle.submit().is_ok());
    assert_eq!(lifecycle.state(), CommandBufferState::Pending);
}

#[test]
fn test_pending_rejects_begin_and_reset() {
    let mut lifecycle = executable(false);
    lifecycle.submit().unwrap();
    assert!(lifecycle.begin().is_err());
    assert!(lifecycle.reset().is_err());
    assert!(lifecycle.submit().is_err());
}

#[test]
fn test_reusable_buffer_returns_to_executable() {
    let mut lifecycle = executable(false);
    lifecycle.submit().unwrap();
    lifecycle.complete();
    assert_eq!(lifecycle.state(), CommandBufferState::Executable);
    assert!(lifecycle.submit().is_ok());
}

#[test]
fn test_one_time_buffer_becomes_invalid() {
    let mut lifecycle = executable(true);
    lifecycle.submit().unwrap();
    lifecycle.complete();
    assert_eq!(lifecycle.state(), CommandBufferState::Invalid);
    assert!(lifecycle.submit().is_err());

    // Re-recording brings it back
    lifecycle.begin().unwrap();
    lifecycle.end().unwrap();
    assert!(lifecycle.submit().is_ok());
}

#[test]
fn test_complete_outside_pending_is_noop() {
    let mut lifecycle = CommandBufferLifecycle::new(true);
    lifecycle.complete();
    assert_eq!(lifecycle.state(), CommandBufferState::Initial);
}

#[test]
fn test_reset_to_initial() {
    let mut lifecycle = executable(true);
    lifecycle.reset().unwrap();
    assert_eq!(lifecycle.state(), CommandBufferState::Initial);
}

// ============================================================================
// RECORDING GUARD
// ============================================================================

#[test]
fn test_commands_require_recording() {
    let mut lifecycle = CommandBufferLifecycle::new(false);
    assert!(lifecycle.require_recording("draw").is_err());
    lifecycle.begin().unwrap();
    assert!(lifecycle.require_recording("draw").is_ok());
    lifecycle.end().unwrap();
    assert!(lifecycle.require_recording("draw").is_err());
}

#[test]
fn test_full_viewport_and_scissor() {
    let viewport = Viewport::full(1280, 720);
    assert_eq!(viewport.width, 1280.0);
    assert_eq!(viewport.max_depth, 1.0);
    assert_eq!(
        Rect2D::from_extent(Extent2D::new(1280, 720)),
        Rect2D { x: 0, y: 0, width: 1280, height: 720 }
    );
}

//! Integration tests for Engine logging as seen by render code
//!
//! These tests verify that render-side failures reach the installed logger.
//! No GPU required.
//!
//! Run with: cargo test --test logging_integration_tests

use ya_engine::ya::{Engine, Error, Result};
use ya_engine::ya::log::{Logger, LogEntry, LogSeverity};
use ya_engine::ya::render::{Format, RenderPassDesc};
use ya_engine::{engine_bail, engine_err};
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST LOGGER IMPLEMENTATION
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLogger {
    fn new() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        (Self { entries: entries.clone() }, entries)
    }
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(LogEntry {
            severity: entry.severity,
            timestamp: entry.timestamp,
            source: entry.source.clone(),
            message: entry.message.clone(),
            file: entry.file,
            line: entry.line,
        });
    }
}

fn submit_frame(device_lost: bool) -> Result<u32> {
    if device_lost {
        engine_bail!("ya::vulkan", "Failed to submit frame {}: {}", 3, "ERROR_DEVICE_LOST");
    }
    Ok(3)
}

// ============================================================================
// ERROR MACROS
// ============================================================================

#[test]
#[serial]
fn test_integration_engine_err_logs_and_builds_backend_error() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    let err = engine_err!("ya::vulkan", "Failed to create fence: {}", "ERROR_OUT_OF_DEVICE_MEMORY");

    match err {
        Error::BackendError(message) => assert_eq!(message, "Failed to create fence: ERROR_OUT_OF_DEVICE_MEMORY"),
        other => panic!("Expected BackendError, got {:?}", other),
    }

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert_eq!(captured[0].source, "ya::vulkan");
    assert!(captured[0].file.is_some_and(|file| file.ends_with("logging_integration_tests.rs")));
    assert!(captured[0].line.is_some());

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_engine_bail_returns_early() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    assert_eq!(submit_frame(false).unwrap(), 3);
    assert!(entries.lock().unwrap().is_empty());

    let err = submit_frame(true).unwrap_err();
    assert!(matches!(err, Error::BackendError(_)));
    assert_eq!(entries.lock().unwrap().len(), 1);

    Engine::reset_logger();
}

// ============================================================================
// RENDER POLICIES
// ============================================================================

#[test]
#[serial]
fn test_integration_swapchain_format_mismatch_is_logged() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    let desc = RenderPassDesc::default_for(Format::R8G8B8A8_UNORM);
    let err = desc.check_swapchain_format(Format::B8G8R8A8_SRGB).unwrap_err();
    assert!(matches!(err, Error::UnsupportedSurfaceFormat(_)));

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert_eq!(captured[0].source, "ya::RenderPass");

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_empty_render_pass_falls_back_with_warning() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    let resolved = RenderPassDesc::default().resolve(Format::B8G8R8A8_SRGB);
    assert_eq!(resolved, RenderPassDesc::default_for(Format::B8G8R8A8_SRGB));

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Warn);
    assert!(captured[0].file.is_none());

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_logger_reset() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    Engine::log(LogSeverity::Info, "ya::test", "Message 1".to_string());
    assert_eq!(entries.lock().unwrap().len(), 1);

    Engine::reset_logger();

    // Goes to the default logger
    Engine::log(LogSeverity::Info, "ya::test", "Message 2".to_string());
    assert_eq!(entries.lock().unwrap().len(), 1);
}

//! Unit tests for the Engine logging hub
//!
//! IMPORTANT: LOGGER is a global OnceLock shared across all tests.
//! Every test swapping the logger is marked #[serial].

use crate::ya::Engine;
use crate::ya::log::{Logger, LogEntry, LogSeverity};
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Test logger that captures log entries for verification
pub(crate) struct TestLogger {
    pub(crate) entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLogger {
    pub(crate) fn new() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        (Self { entries: entries.clone() }, entries)
    }
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        // Other test modules log concurrently; keep only this module's entries
        if entry.source == "ya::engine_test" {
            self.entries.lock().unwrap().push(entry.clone());
        }
    }
}

// ============================================================================
// LOGGER TESTS
// ============================================================================

#[test]
#[serial]
fn test_set_logger_captures_entries() {
    let (logger, entries) = TestLogger::new();
    Engine::set_logger(logger);

    crate::engine_info!("ya::engine_test", "hello {}", 1);
    crate::engine_warn!("ya::engine_test", "careful");

    Engine::reset_logger();

    let entries = entries.lock().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].severity, LogSeverity::Info);
    assert_eq!(entries[0].message, "hello 1");
    assert_eq!(entries[1].severity, LogSeverity::Warn);
    assert_eq!(entries[1].message, "careful");
}

#[test]
#[serial]
fn test_error_macro_records_location() {
    let (logger, entries) = TestLogger::new();
    Engine::set_logger(logger);

    crate::engine_error!("ya::engine_test", "boom");

    Engine::reset_logger();

    let entries = entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].file.is_some());
    assert!(entries[0].line.is_some());
}

#[test]
#[serial]
fn test_engine_err_logs_once() {
    let (logger, entries) = TestLogger::new();
    Engine::set_logger(logger);

    let _err = crate::engine_err!("ya::engine_test", "Failed to submit: {}", "DEVICE_LOST");

    Engine::reset_logger();

    let entries = entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, LogSeverity::Error);
    assert_eq!(entries[0].message, "Failed to submit: DEVICE_LOST");
}

#[test]
#[serial]
fn test_reset_logger_stops_capture() {
    let (logger, entries) = TestLogger::new();
    Engine::set_logger(logger);
    Engine::reset_logger();

    crate::engine_debug!("ya::engine_test", "not captured");

    assert!(entries.lock().unwrap().is_empty());
}

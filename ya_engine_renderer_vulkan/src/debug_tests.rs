//! Unit tests for the validation message filter and counters
//!
//! The callback state is global, so tests touching it run serially.

use ash::vk;
use serial_test::serial;
use ya_engine::ya::render::{DebugConfig, DebugMessageFilter, DebugSeverity};
use crate::debug::*;

fn send(severity: vk::DebugUtilsMessageSeverityFlagsEXT, message_type: vk::DebugUtilsMessageTypeFlagsEXT, text: &std::ffi::CStr) {
    let data = vk::DebugUtilsMessengerCallbackDataEXT::default()
        .message_id_name(c"Test-Message")
        .message(text);
    unsafe {
        vulkan_debug_callback(severity, message_type, &data, std::ptr::null_mut());
    }
}

// ============================================================================
// FILTERS
// ============================================================================

#[test]
fn test_severity_flags() {
    assert_eq!(severity_flags(DebugSeverity::ErrorsOnly), vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);
    assert!(severity_flags(DebugSeverity::ErrorsAndWarnings).contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
    assert!(!severity_flags(DebugSeverity::ErrorsAndWarnings).contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
    assert!(severity_flags(DebugSeverity::All).contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
}

// ============================================================================
// CALLBACK
// ============================================================================

#[test]
#[serial]
fn test_callback_counts_by_severity() {
    init_debug_config(DebugConfig { severity: DebugSeverity::All, ..Default::default() });

    let validation = vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION;
    send(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, validation, c"error one");
    send(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING, validation, c"warning one");
    send(vk::DebugUtilsMessageSeverityFlagsEXT::INFO, validation, c"info one");
    send(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, validation, c"error one");

    let stats = get_validation_stats();
    assert_eq!(stats.errors, 2);
    assert_eq!(stats.warnings, 1);
    assert_eq!(stats.info, 1);
    assert_eq!(stats.total(), 4);
}

#[test]
#[serial]
fn test_callback_respects_filters() {
    init_debug_config(DebugConfig {
        severity: DebugSeverity::ErrorsOnly,
        message_filter: DebugMessageFilter { show_performance: false, ..Default::default() },
        ..Default::default()
    });

    send(
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
        c"filtered by severity",
    );
    send(
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        c"filtered by category",
    );
    assert_eq!(get_validation_stats().total(), 0);

    send(
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
        c"kept",
    );
    assert_eq!(get_validation_stats().errors, 1);
}

#[test]
#[serial]
fn test_cleanup_silences_callback() {
    init_debug_config(DebugConfig::default());
    cleanup_debug_config();
    send(
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
        c"after teardown",
    );
    assert_eq!(get_validation_stats().total(), 0);
}

#[test]
#[serial]
fn test_stats_disabled() {
    init_debug_config(DebugConfig { enable_stats: false, ..Default::default() });
    send(
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
        c"not counted",
    );
    assert_eq!(get_validation_stats().total(), 0);
}

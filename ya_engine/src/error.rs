//! Error types for the Ya engine
//!
//! This module defines the error types used throughout the engine:
//! configuration errors detected eagerly at `create`/`negotiate` time,
//! driver errors surfaced by the backend, and resource-exhaustion errors.

use std::fmt;
use crate::render::{ImageLayout, MemoryPropertyFlags};

/// Result type for Ya engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ya engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (unexpected driver return code, lost device, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (buffer, pipeline, render pass, etc.)
    InvalidResource(String),

    /// Initialization failed (engine, renderer, subsystems)
    InitializationFailed(String),

    /// A feature requested with `required = true` is not available
    MissingRequiredFeature {
        /// "instance" or "device"
        scope: String,
        /// Name of the missing extension or layer
        name: String,
    },

    /// No adapter exposes both a graphics and a present queue family
    NoSuitableAdapter,

    /// More queues requested than the family exposes
    RequestExceedsAvailable {
        family_index: u32,
        requested: u32,
        available: u32,
    },

    /// A device extension could not be enabled
    ExtensionUnsupported(String),

    /// A subpass references an attachment index outside the attachment list
    InvalidAttachmentReference {
        subpass: u32,
        index: u32,
        attachment_count: u32,
    },

    /// A caller-provided surface format is not supported by the surface
    UnsupportedSurfaceFormat(String),

    /// Operation not allowed in the current object state
    InvalidState(String),

    /// No memory type satisfies the requirement mask and property flags
    NoSuitableMemoryType {
        type_bits: u32,
        properties: MemoryPropertyFlags,
    },

    /// The descriptor pool has no sets left
    DescriptorPoolExhausted {
        max_sets: u32,
    },

    /// The (old, new) layout pair has no known barrier mapping
    UnsupportedLayoutTransition {
        old: ImageLayout,
        new: ImageLayout,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::MissingRequiredFeature { scope, name } => {
                write!(f, "Missing required {} feature: {}", scope, name)
            }
            Error::NoSuitableAdapter => {
                write!(f, "No adapter supports both graphics and presentation")
            }
            Error::RequestExceedsAvailable { family_index, requested, available } => write!(
                f,
                "Queue family {} exposes {} queue(s), {} requested",
                family_index, available, requested
            ),
            Error::ExtensionUnsupported(name) => write!(f, "Extension unsupported: {}", name),
            Error::InvalidAttachmentReference { subpass, index, attachment_count } => write!(
                f,
                "Subpass {} references attachment {} but only {} attachment(s) are declared",
                subpass, index, attachment_count
            ),
            Error::UnsupportedSurfaceFormat(msg) => write!(f, "Unsupported surface format: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::NoSuitableMemoryType { type_bits, properties } => write!(
                f,
                "No memory type matches bits {:#b} with properties {:?}",
                type_bits, properties
            ),
            Error::DescriptorPoolExhausted { max_sets } => {
                write!(f, "Descriptor pool exhausted (max {} sets)", max_sets)
            }
            Error::UnsupportedLayoutTransition { old, new } => {
                write!(f, "Unsupported layout transition: {:?} -> {:?}", old, new)
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

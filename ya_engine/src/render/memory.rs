/// Memory properties, memory-type selection and buffer descriptions
///
/// Flag bit values mirror the Vulkan ones so backends convert with a raw copy.

use bitflags::bitflags;
use crate::error::{Error, Result};

bitflags! {
    /// Memory property flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryPropertyFlags: u32 {
        const DEVICE_LOCAL = 0x1;
        const HOST_VISIBLE = 0x2;
        const HOST_COHERENT = 0x4;
        const HOST_CACHED = 0x8;
        const LAZILY_ALLOCATED = 0x10;
    }
}

impl MemoryPropertyFlags {
    pub fn is_host_visible(&self) -> bool {
        self.contains(MemoryPropertyFlags::HOST_VISIBLE)
    }
}

/// Entry of an adapter's memory-type table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub property_flags: MemoryPropertyFlags,
    pub heap_index: u32,
}

/// First memory type allowed by `type_bits` whose flags are a superset of `properties`
///
/// # Errors
///
/// `Error::NoSuitableMemoryType` when no entry qualifies.
pub fn find_memory_type(
    memory_types: &[MemoryType],
    type_bits: u32,
    properties: MemoryPropertyFlags,
) -> Result<u32> {
    memory_types
        .iter()
        .enumerate()
        .take(32)
        .find(|(index, memory_type)| {
            type_bits & (1 << index) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(index, _)| index as u32)
        .ok_or_else(|| {
            crate::engine_error!(
                "ya::Memory",
                "No memory type for bits {:#b} with properties {:?}",
                type_bits, properties
            );
            Error::NoSuitableMemoryType { type_bits, properties }
        })
}

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 0x1;
        const TRANSFER_DST = 0x2;
        const UNIFORM = 0x10;
        const STORAGE = 0x20;
        const INDEX = 0x40;
        const VERTEX = 0x80;
        const INDIRECT = 0x100;
    }
}

/// How initial data reaches a new buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPath {
    /// No initial data
    None,
    /// Memory is host visible: map and copy
    Mapped,
    /// Copy into a temporary host-visible buffer, then a GPU-side copy
    Staged,
}

/// Buffer creation parameters
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Debug name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub usage: BufferUsage,
    pub memory: MemoryPropertyFlags,
}

impl BufferDesc {
    /// Temporary upload buffer used by the staging path
    pub fn staging(size: u64) -> Self {
        Self {
            name: "StagingBuffer".to_string(),
            size,
            usage: BufferUsage::TRANSFER_SRC,
            memory: MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
        }
    }

    pub fn upload_path(&self, has_data: bool) -> UploadPath {
        match (has_data, self.memory.is_host_visible()) {
            (false, _) => UploadPath::None,
            (true, true) => UploadPath::Mapped,
            (true, false) => UploadPath::Staged,
        }
    }

    /// Usage the buffer is actually created with (staged uploads need TRANSFER_DST)
    pub fn effective_usage(&self, has_data: bool) -> BufferUsage {
        match self.upload_path(has_data) {
            UploadPath::Staged => self.usage | BufferUsage::TRANSFER_DST,
            _ => self.usage,
        }
    }

    /// Check the description and optional initial data before any GPU call
    pub fn validate(&self, initial_data: Option<&[u8]>) -> Result<()> {
        if self.size == 0 {
            return Err(Error::InvalidResource(format!("Buffer '{}' has zero size", self.name)));
        }
        if self.usage.is_empty() {
            return Err(Error::InvalidResource(format!("Buffer '{}' has no usage flags", self.name)));
        }
        if let Some(data) = initial_data {
            if data.len() as u64 > self.size {
                return Err(Error::InvalidResource(format!(
                    "Buffer '{}': initial data ({} bytes) exceeds size ({} bytes)",
                    self.name, data.len(), self.size
                )));
            }
        }
        Ok(())
    }
}

/// Check that `[offset, offset + len)` fits in a buffer of `size` bytes
pub fn check_range(size: u64, offset: u64, len: u64) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(Error::InvalidResource(format!(
            "Range {}..{} out of bounds (buffer size: {})",
            offset, offset.saturating_add(len), size
        ))),
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

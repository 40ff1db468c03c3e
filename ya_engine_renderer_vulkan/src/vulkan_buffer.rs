/// Buffer - GPU buffer backed by a gpu-allocator allocation
///
/// Initial data goes through a mapped write when the memory is host-visible
/// and through a staging buffer plus a one-shot copy otherwise.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::{check_range, find_memory_type, BufferDesc, BufferUsage, UploadPath};
use ya_engine::{engine_err, engine_error, engine_trace};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::buffer_usage_to_vk;

/// Requirements narrowed to the one memory type `memory_type_index`
///
/// Paired with `MemoryLocation::Unknown`, gpu-allocator has no preference of
/// its own left and allocates from exactly that type. Host-visible types are
/// still mapped persistently.
pub(crate) fn pinned_requirements(
    mut requirements: vk::MemoryRequirements,
    memory_type_index: u32,
) -> vk::MemoryRequirements {
    requirements.memory_type_bits &= 1u32.checked_shl(memory_type_index).unwrap_or(0);
    requirements
}

/// Expand `[offset, offset + len)` to `atom` boundaries, clamped to the allocation
///
/// Offsets are relative to the start of the `VkDeviceMemory` block.
pub(crate) fn atom_aligned_range(
    allocation_offset: u64,
    allocation_size: u64,
    offset: u64,
    len: u64,
    atom: u64,
) -> (u64, u64) {
    let atom = atom.max(1);
    let start = allocation_offset + offset;
    let end = start + len;
    let aligned_start = start - start % atom;
    let aligned_end = end.div_ceil(atom) * atom;
    let limit = (allocation_offset + allocation_size).div_ceil(atom) * atom;
    let aligned_end = aligned_end.min(limit.max(aligned_start));
    (aligned_start, aligned_end - aligned_start)
}

pub struct Buffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    desc: BufferDesc,
    usage: BufferUsage,
    memory_type_index: u32,
    coherent: bool,
}

impl Buffer {
    /// Create a buffer and upload `initial_data` when given
    ///
    /// # Errors
    ///
    /// - `Error::InvalidResource` for a zero size, empty usage or oversized data
    /// - `Error::NoSuitableMemoryType` when no memory type matches `desc.memory`
    /// - `Error::OutOfMemory` when the allocator cannot serve the request
    pub fn new(ctx: Arc<GpuContext>, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Self> {
        desc.validate(initial_data)?;
        let has_data = initial_data.is_some_and(|data| !data.is_empty());
        let usage = desc.effective_usage(has_data);

        let device = ctx.device();
        let create_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(buffer_usage_to_vk(usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&create_info, None) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to create buffer '{}' ({} bytes): {:?}", desc.name, desc.size, e))?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let allocation = find_memory_type(ctx.memory_types(), requirements.memory_type_bits, desc.memory)
            .and_then(|memory_type_index| {
                ctx.allocator()?
                    .allocate(&AllocationCreateDesc {
                        name: &desc.name,
                        requirements: pinned_requirements(requirements, memory_type_index),
                        location: MemoryLocation::Unknown,
                        linear: true,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| {
                        let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                        engine_error!(
                            "ya::vulkan",
                            "Out of GPU memory for buffer '{}' (required: {:.2} MB): {:?}",
                            desc.name, size_mb, e
                        );
                        Error::OutOfMemory
                    })
                    .map(|allocation| (allocation, memory_type_index))
            });
        let (allocation, memory_type_index) = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let coherent = allocation.memory_properties().contains(vk::MemoryPropertyFlags::HOST_COHERENT);
        let bind = unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) };

        let mut created = Self {
            ctx: Arc::clone(&ctx),
            buffer,
            allocation: Some(allocation),
            desc: desc.clone(),
            usage,
            memory_type_index,
            coherent,
        };
        bind.map_err(|e| engine_err!("ya::vulkan", "Failed to bind buffer memory for '{}': {:?}", desc.name, e))?;

        ctx.set_debug_name(buffer, &desc.name);

        if let Some(data) = initial_data.filter(|data| !data.is_empty()) {
            match desc.upload_path(true) {
                UploadPath::Mapped => created.write(0, data)?,
                UploadPath::Staged => created.upload_staged(data)?,
                UploadPath::None => {}
            }
        }

        Ok(created)
    }

    fn upload_staged(&mut self, data: &[u8]) -> Result<()> {
        engine_trace!("ya::vulkan", "Staging {} bytes into '{}'", data.len(), self.desc.name);
        let staging = Buffer::new(Arc::clone(&self.ctx), &BufferDesc::staging(data.len() as u64), Some(data))?;
        let (src, dst, size) = (staging.buffer, self.buffer, data.len() as u64);

        self.ctx.one_shot("buffer upload", |device, command_buffer| {
            let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size };
            unsafe { device.cmd_copy_buffer(command_buffer, src, dst, &[region]) };
            Ok(())
        })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn size(&self) -> u64 {
        self.desc.size
    }

    /// Usage flags the buffer was created with (including staging additions)
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Memory type the allocation lives in
    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    pub fn is_host_visible(&self) -> bool {
        self.allocation.as_ref().is_some_and(|a| a.mapped_ptr().is_some())
    }

    fn mapped(&self, operation: &str) -> Result<(&Allocation, *mut u8)> {
        let allocation = self
            .allocation
            .as_ref()
            .ok_or_else(|| engine_err!("ya::vulkan", "Buffer '{}' has no allocation", self.desc.name))?;
        let ptr = allocation.mapped_ptr().ok_or_else(|| {
            engine_error!("ya::vulkan", "Buffer '{}' {}: memory is not host-visible", self.desc.name, operation);
            Error::InvalidResource(format!("Buffer '{}' is not host-visible", self.desc.name))
        })?;
        Ok((allocation, ptr.as_ptr() as *mut u8))
    }

    /// Copy `data` into the buffer at `offset`; host-visible memory only
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        check_range(self.desc.size, offset, data.len() as u64)?;
        let (_, ptr) = self.mapped("write")?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset as usize), data.len());
        }
        self.flush(offset, data.len() as u64)
    }

    /// Read `len` bytes at `offset`; host-visible memory only
    pub fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        check_range(self.desc.size, offset, len)?;
        let (allocation, ptr) = self.mapped("read")?;

        if !self.coherent {
            let range = self.memory_range(allocation, offset, len);
            unsafe { self.ctx.device().invalidate_mapped_memory_ranges(&[range]) }
                .map_err(|e| engine_err!("ya::vulkan", "Failed to invalidate '{}': {:?}", self.desc.name, e))?;
        }

        let mut out = vec![0u8; len as usize];
        unsafe {
            std::ptr::copy_nonoverlapping(ptr.add(offset as usize), out.as_mut_ptr(), len as usize);
        }
        Ok(out)
    }

    /// Make host writes in `[offset, offset + len)` visible to the device
    ///
    /// No-op for host-coherent memory.
    pub fn flush(&self, offset: u64, len: u64) -> Result<()> {
        check_range(self.desc.size, offset, len)?;
        if self.coherent {
            return Ok(());
        }
        let (allocation, _) = self.mapped("flush")?;
        let range = self.memory_range(allocation, offset, len);
        unsafe { self.ctx.device().flush_mapped_memory_ranges(&[range]) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to flush '{}': {:?}", self.desc.name, e))
    }

    fn memory_range(&self, allocation: &Allocation, offset: u64, len: u64) -> vk::MappedMemoryRange<'static> {
        let (start, size) = atom_aligned_range(
            allocation.offset(),
            allocation.size(),
            offset,
            len,
            self.ctx.non_coherent_atom_size(),
        );
        vk::MappedMemoryRange::default()
            .memory(unsafe { allocation.memory() })
            .offset(start)
            .size(size)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if the lock fails - the buffer still has to go
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device().destroy_buffer(self.buffer, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_buffer_tests.rs"]
mod tests;

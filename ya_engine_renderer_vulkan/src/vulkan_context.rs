/// GpuContext - Shared GPU state for all Vulkan objects
///
/// Every buffer, image, pipeline and swapchain holds an `Arc<GpuContext>`,
/// so the device outlives everything created from it. Teardown order when
/// the last reference goes away:
///
/// 1. allocator (frees every `VkDeviceMemory` block)
/// 2. upload command pool
/// 3. logical device (pipeline cache, then `VkDevice`)
/// 4. instance (debug messenger, then `VkInstance`)

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::MemoryType;
use ya_engine::{engine_err, engine_error};

use crate::vulkan_device::{LogicalDevice, Queue};
use crate::vulkan_instance::VulkanInstance;

/// Allocator and upload pool of a context not yet assembled
pub(crate) struct ContextParts {
    allocator: Allocator,
    upload_pool: vk::CommandPool,
}

pub struct GpuContext {
    /// Dropped by hand before the device
    allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Reusable pool for one-shot transfers (TRANSIENT + RESET_COMMAND_BUFFER)
    upload_pool: Mutex<vk::CommandPool>,

    // Field order is drop order: device before instance
    device: LogicalDevice,
    instance: VulkanInstance,
}

impl GpuContext {
    /// Build the allocator and upload pool for `device`
    ///
    /// Nothing is consumed, so on failure the caller still owns the
    /// instance and can release what must go before it.
    pub(crate) fn create_parts(instance: &VulkanInstance, device: &LogicalDevice) -> Result<ContextParts> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.instance.clone(),
            device: device.device.clone(),
            physical_device: device.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| {
            engine_error!("ya::vulkan", "Failed to create GPU allocator: {:?}", e);
            Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
        })?;

        let graphics_family = device.queue_families().graphics_family;
        let upload_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(graphics_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let upload_pool = unsafe { device.device.create_command_pool(&upload_pool_info, None) }.map_err(|e| {
            engine_error!("ya::vulkan", "Failed to create upload command pool: {:?}", e);
            Error::InitializationFailed(format!("Failed to create upload command pool: {:?}", e))
        })?;
        device.set_debug_name(upload_pool, "UploadCommandPool");

        Ok(ContextParts { allocator, upload_pool })
    }

    /// Take ownership of `instance` and `device`
    pub(crate) fn from_parts(instance: VulkanInstance, device: LogicalDevice, parts: ContextParts) -> Arc<Self> {
        Arc::new(Self {
            allocator: ManuallyDrop::new(Mutex::new(parts.allocator)),
            upload_pool: Mutex::new(parts.upload_pool),
            device,
            instance,
        })
    }

    pub fn device(&self) -> &ash::Device {
        &self.device.device
    }

    pub fn logical_device(&self) -> &LogicalDevice {
        &self.device
    }

    pub fn instance(&self) -> &VulkanInstance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.device.physical_device
    }

    /// First graphics queue; frame submission and uploads go there
    pub fn graphics_queue(&self) -> Result<&Queue> {
        self.device
            .graphics_queues()
            .first()
            .ok_or_else(|| Error::InvalidState("Device has no graphics queue".to_string()))
    }

    /// First present queue
    pub fn present_queue(&self) -> Result<&Queue> {
        self.device
            .present_queues()
            .first()
            .ok_or_else(|| Error::InvalidState("Device has no present queue".to_string()))
    }

    pub fn memory_types(&self) -> &[MemoryType] {
        &self.device.adapter().memory_types
    }

    pub fn non_coherent_atom_size(&self) -> u64 {
        self.device.non_coherent_atom_size()
    }

    pub fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| engine_err!("ya::vulkan", "GPU allocator lock poisoned"))
    }

    pub fn set_debug_name<H: vk::Handle>(&self, handle: H, name: &str) {
        self.device.set_debug_name(handle, name);
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }

    /// Record `record` into a transient command buffer, submit it on the
    /// graphics queue and block until it completes
    pub fn one_shot<F>(&self, label: &str, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer) -> Result<()>,
    {
        let device = self.device();
        let queue = self.graphics_queue()?.handle;
        let pool = self
            .upload_pool
            .lock()
            .map_err(|_| engine_err!("ya::vulkan", "Upload command pool lock poisoned"))?;

        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(*pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe { device.allocate_command_buffers(&allocate_info) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to allocate command buffer for {}: {:?}", label, e))?
            .into_iter()
            .next()
            .ok_or_else(|| engine_err!("ya::vulkan", "Driver returned no command buffer for {}", label))?;

        let result = Self::submit_and_wait(device, queue, command_buffer, label, record);

        unsafe { device.free_command_buffers(*pool, &[command_buffer]) };
        result
    }

    fn submit_and_wait<F>(
        device: &ash::Device,
        queue: vk::Queue,
        command_buffer: vk::CommandBuffer,
        label: &str,
        record: F,
    ) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer) -> Result<()>,
    {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { device.begin_command_buffer(command_buffer, &begin_info) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to begin command buffer for {}: {:?}", label, e))?;

        record(device, command_buffer)?;

        unsafe { device.end_command_buffer(command_buffer) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to end command buffer for {}: {:?}", label, e))?;

        let fence = unsafe { device.create_fence(&vk::FenceCreateInfo::default(), None) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to create fence for {}: {:?}", label, e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        let result = unsafe { device.queue_submit(queue, &[submit_info], fence) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to submit {}: {:?}", label, e))
            .and_then(|_| {
                unsafe { device.wait_for_fences(&[fence], true, u64::MAX) }
                    .map_err(|e| engine_err!("ya::vulkan", "Failed to wait for {}: {:?}", label, e))
            });

        unsafe { device.destroy_fence(fence, None) };
        result
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device.device_wait_idle().ok();

            ManuallyDrop::drop(&mut self.allocator);

            if let Ok(pool) = self.upload_pool.get_mut() {
                if *pool != vk::CommandPool::null() {
                    self.device.device.destroy_command_pool(*pool, None);
                    *pool = vk::CommandPool::null();
                }
            }
        }
    }
}

/// Frame synchronization objects and the `FrameDevice` the frame protocol drives
///
/// Fences and "image available" semaphores exist once per frame-in-flight
/// slot. "Render finished" semaphores exist once per swapchain image and are
/// rebuilt whenever the image count changes.

use ash::vk;
use std::sync::Arc;
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::{
    AcquireOutcome, FrameDevice, FrameSubmission, PresentOutcome, SemaphoreRef, Swapchain as RenderSwapchain,
};
use ya_engine::{engine_debug, engine_err, engine_error};

use crate::vulkan_command_buffer::{CommandBuffer, SlotEpoch};
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::stage_flags_to_vk;
use crate::vulkan_render_pass::{RenderPass, RenderTargets};
use crate::vulkan_swapchain::Swapchain;

/// Pick the semaphore `reference` names from the two index spaces
pub(crate) fn resolve_semaphore<'a, T>(
    image_available: &'a [T],
    render_finished: &'a [T],
    reference: SemaphoreRef,
) -> Option<&'a T> {
    match reference {
        SemaphoreRef::ImageAvailable(slot) => image_available.get(slot as usize),
        SemaphoreRef::RenderFinished(image) => render_finished.get(image as usize),
    }
}

fn create_semaphore(ctx: &GpuContext, name: &str) -> Result<vk::Semaphore> {
    let semaphore = unsafe { ctx.device().create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
        .map_err(|e| engine_err!("ya::vulkan", "Failed to create semaphore '{}': {:?}", name, e))?;
    ctx.set_debug_name(semaphore, name);
    Ok(semaphore)
}

pub struct FrameSyncObjects {
    ctx: Arc<GpuContext>,
    image_available: Vec<vk::Semaphore>,
    /// Created signaled so the first wait of each slot returns immediately
    in_flight: Vec<vk::Fence>,
    epochs: Vec<Arc<SlotEpoch>>,
    render_finished: Vec<vk::Semaphore>,
}

impl FrameSyncObjects {
    pub fn new(ctx: Arc<GpuContext>, flight_frame_count: u32, image_count: u32) -> Result<Self> {
        let mut objects = Self {
            ctx,
            image_available: Vec::with_capacity(flight_frame_count as usize),
            in_flight: Vec::with_capacity(flight_frame_count as usize),
            epochs: Vec::with_capacity(flight_frame_count as usize),
            render_finished: Vec::new(),
        };

        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        for slot in 0..flight_frame_count {
            let semaphore = create_semaphore(&objects.ctx, &format!("ImageAvailable_{}", slot)).map_err(|e| {
                engine_error!("ya::vulkan", "Failed to create frame sync objects: {}", e);
                Error::InitializationFailed(e.to_string())
            })?;
            objects.image_available.push(semaphore);

            let fence = unsafe { objects.ctx.device().create_fence(&fence_info, None) }.map_err(|e| {
                engine_error!("ya::vulkan", "Failed to create in-flight fence: {:?}", e);
                Error::InitializationFailed(format!("Failed to create fence: {:?}", e))
            })?;
            objects.ctx.set_debug_name(fence, &format!("InFlightFence_{}", slot));
            objects.in_flight.push(fence);
            objects.epochs.push(Arc::new(SlotEpoch::default()));
        }

        objects.resize_render_finished(image_count)?;
        Ok(objects)
    }

    /// Rebuild the per-image semaphores. The device must be idle.
    pub fn resize_render_finished(&mut self, image_count: u32) -> Result<()> {
        if self.render_finished.len() == image_count as usize {
            return Ok(());
        }
        for semaphore in self.render_finished.drain(..) {
            unsafe { self.ctx.device().destroy_semaphore(semaphore, None) };
        }
        for image in 0..image_count {
            let semaphore = create_semaphore(&self.ctx, &format!("RenderFinished_{}", image))?;
            self.render_finished.push(semaphore);
        }
        engine_debug!("ya::vulkan", "Render-finished semaphores resized to {}", image_count);
        Ok(())
    }

    pub fn semaphore(&self, reference: SemaphoreRef) -> Result<vk::Semaphore> {
        resolve_semaphore(&self.image_available, &self.render_finished, reference)
            .copied()
            .ok_or_else(|| Error::InvalidState(format!("No semaphore for {:?}", reference)))
    }

    pub fn fence(&self, slot: u32) -> Result<vk::Fence> {
        self.in_flight
            .get(slot as usize)
            .copied()
            .ok_or_else(|| Error::InvalidState(format!("No fence for frame slot {}", slot)))
    }

    pub fn epoch(&self, slot: u32) -> Result<&Arc<SlotEpoch>> {
        self.epochs
            .get(slot as usize)
            .ok_or_else(|| Error::InvalidState(format!("No epoch for frame slot {}", slot)))
    }

    pub fn flight_frame_count(&self) -> u32 {
        self.in_flight.len() as u32
    }

    /// Mark every submission complete; only valid once the device is idle
    pub fn retire_all(&self) {
        for epoch in &self.epochs {
            epoch.retire_submitted();
        }
    }
}

impl Drop for FrameSyncObjects {
    fn drop(&mut self) {
        let device = self.ctx.device();
        unsafe {
            for semaphore in self.image_available.drain(..).chain(self.render_finished.drain(..)) {
                device.destroy_semaphore(semaphore, None);
            }
            for fence in self.in_flight.drain(..) {
                device.destroy_fence(fence, None);
            }
        }
    }
}

/// Bring per-image objects in line with a freshly recreated swapchain
///
/// Resizes the render-finished semaphores, follows a surface format change
/// with a render pass rebuild and rebuilds the render targets. Returns the
/// new image count. The device must be idle.
pub(crate) fn refresh_swapchain_dependents(
    ctx: &Arc<GpuContext>,
    sync: &mut FrameSyncObjects,
    swapchain: &Swapchain,
    render_pass: &mut RenderPass,
    targets: &mut RenderTargets,
) -> Result<u32> {
    sync.retire_all();
    *targets = RenderTargets::empty();

    let image_count = swapchain.image_count();
    sync.resize_render_finished(image_count)?;
    if image_count == 0 {
        return Ok(0);
    }

    let format = swapchain.surface_format().format;
    let drifted = render_pass.desc().attachments.first().is_some_and(|first| first.format != format);
    if drifted {
        engine_debug!("ya::vulkan", "Swapchain format changed to {:?}, rebuilding render pass", format);
        let desc = render_pass.desc().with_swapchain_format(format);
        render_pass.recreate(&desc)?;
    }

    *targets = RenderTargets::build(ctx, render_pass, swapchain)?;
    Ok(image_count)
}

/// Borrowed view over the renderer state one frame operation needs
pub(crate) struct VulkanFrameDevice<'a> {
    pub ctx: &'a Arc<GpuContext>,
    pub sync: &'a mut FrameSyncObjects,
    pub swapchain: &'a mut Swapchain,
    pub render_pass: &'a mut RenderPass,
    pub targets: &'a mut RenderTargets,
}

impl FrameDevice for VulkanFrameDevice<'_> {
    type CommandBuffer = CommandBuffer;

    fn wait_for_fence(&mut self, slot: u32) -> Result<()> {
        let fence = self.sync.fence(slot)?;
        unsafe { self.ctx.device().wait_for_fences(&[fence], true, u64::MAX) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to wait for in-flight fence {}: {:?}", slot, e))?;
        self.sync.epoch(slot)?.retire_submitted();
        Ok(())
    }

    fn reset_fence(&mut self, slot: u32) -> Result<()> {
        let fence = self.sync.fence(slot)?;
        unsafe { self.ctx.device().reset_fences(&[fence]) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to reset in-flight fence {}: {:?}", slot, e))
    }

    fn acquire_next_image(&mut self, slot: u32) -> Result<AcquireOutcome> {
        let semaphore = self.sync.semaphore(SemaphoreRef::ImageAvailable(slot))?;
        self.swapchain.acquire_next_image(semaphore)
    }

    fn submit(&mut self, submission: &FrameSubmission, command_buffers: &mut [CommandBuffer]) -> Result<()> {
        let wait_semaphores = [self.sync.semaphore(submission.wait_semaphore)?];
        let wait_stages = [stage_flags_to_vk(submission.wait_stage)];
        let signal_semaphores = [self.sync.semaphore(submission.signal_semaphore)?];
        let fence = self.sync.fence(submission.fence_slot)?;
        let handles: Vec<vk::CommandBuffer> = command_buffers.iter().map(|cb| cb.handle()).collect();

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&handles)
            .signal_semaphores(&signal_semaphores);

        let queue = self.ctx.graphics_queue()?.handle;
        unsafe { self.ctx.device().queue_submit(queue, std::slice::from_ref(&submit_info), fence) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to submit frame {}: {:?}", submission.frame_slot, e))?;

        let slot = self.sync.epoch(submission.fence_slot)?;
        let epoch = slot.next_submission();
        for command_buffer in command_buffers.iter_mut() {
            command_buffer.mark_submitted(Arc::clone(slot), epoch)?;
        }
        Ok(())
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreRef) -> Result<PresentOutcome> {
        let semaphore = self.sync.semaphore(wait)?;
        let queue = self.ctx.present_queue()?.handle;
        self.swapchain.present(queue, image_index, semaphore)
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.ctx.wait_idle()?;
        self.sync.retire_all();
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> Result<u32> {
        // Framebuffers reference the old image views
        *self.targets = RenderTargets::empty();

        let create_info = self.swapchain.create_info().clone();
        self.swapchain.recreate(&create_info)?;
        refresh_swapchain_dependents(self.ctx, self.sync, self.swapchain, self.render_pass, self.targets)
    }

    fn swapchain_image_count(&self) -> u32 {
        self.swapchain.image_count()
    }
}

#[cfg(test)]
#[path = "vulkan_frame_sync_tests.rs"]
mod tests;

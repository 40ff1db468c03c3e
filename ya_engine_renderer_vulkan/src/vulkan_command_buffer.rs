/// CommandBuffer - Vulkan implementation of the CommandList trait
///
/// Buffers come from a `CommandPool` created with `RESET_COMMAND_BUFFER`, so
/// each one is re-recorded without touching the pool. Completion of a
/// submitted buffer is observed through the epoch counter of the
/// frame-in-flight slot it was submitted on: once the slot's fence has been
/// waited, every buffer submitted on it before that wait is complete.

use ash::vk;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::{
    ClearValue, CommandBufferLifecycle, CommandBufferState, CommandList, IndexType, LayoutTransition, Rect2D,
    ShaderStageFlags, Viewport,
};
use ya_engine::{engine_debug, engine_err, engine_error};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_set::DescriptorSet;
use crate::vulkan_format::{index_type_to_vk, rect_to_vk, shader_stages_to_vk, viewport_to_vk};
use crate::vulkan_image::record_layout_transition;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_render_pass::{Framebuffer, RenderPass};

/// Submission counters of one frame-in-flight slot
#[derive(Debug, Default)]
pub struct SlotEpoch {
    submitted: AtomicU64,
    retired: AtomicU64,
}

impl SlotEpoch {
    /// Epoch assigned to the next submission on this slot
    pub(crate) fn next_submission(&self) -> u64 {
        self.submitted.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Everything submitted so far has completed
    pub(crate) fn retire_submitted(&self) {
        let submitted = self.submitted.load(Ordering::Acquire);
        self.retired.fetch_max(submitted, Ordering::AcqRel);
    }

    pub(crate) fn is_retired(&self, epoch: u64) -> bool {
        self.retired.load(Ordering::Acquire) >= epoch
    }
}

struct PendingTicket {
    slot: Arc<SlotEpoch>,
    epoch: u64,
}

/// Submissions still on the GPU and reset count of one command pool
///
/// Buffers remember the reset epoch they were allocated or last reconciled
/// at; a newer epoch means the pool reset moved them back to Initial.
#[derive(Debug, Default)]
pub(crate) struct PoolTracker {
    reset_epoch: AtomicU64,
    in_flight: Mutex<Vec<(Arc<SlotEpoch>, u64)>>,
}

impl PoolTracker {
    pub(crate) fn reset_epoch(&self) -> u64 {
        self.reset_epoch.load(Ordering::Acquire)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<(Arc<SlotEpoch>, u64)>>> {
        self.in_flight
            .lock()
            .map_err(|_| engine_err!("ya::vulkan", "Command pool tracker lock poisoned"))
    }

    /// Record a submission of one of the pool's buffers
    pub(crate) fn track(&self, slot: Arc<SlotEpoch>, epoch: u64) -> Result<()> {
        let mut in_flight = self.lock()?;
        in_flight.retain(|(slot, epoch)| !slot.is_retired(*epoch));
        in_flight.push((slot, epoch));
        Ok(())
    }

    /// Submissions not yet retired
    pub(crate) fn outstanding(&self) -> Result<usize> {
        let mut in_flight = self.lock()?;
        in_flight.retain(|(slot, epoch)| !slot.is_retired(*epoch));
        Ok(in_flight.len())
    }

    /// Run `reset` when nothing is outstanding, then start a new epoch
    ///
    /// The epoch only advances when `reset` succeeds.
    pub(crate) fn reset_with<F>(&self, name: &str, reset: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut in_flight = self.lock()?;
        in_flight.retain(|(slot, epoch)| !slot.is_retired(*epoch));
        if !in_flight.is_empty() {
            return Err(Error::InvalidState(format!(
                "Cannot reset command pool '{}': {} submission(s) still pending",
                name,
                in_flight.len()
            )));
        }
        reset()?;
        self.reset_epoch.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

struct PoolInner {
    ctx: Arc<GpuContext>,
    pool: Mutex<vk::CommandPool>,
    tracker: PoolTracker,
    name: String,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        if let Ok(pool) = self.pool.get_mut() {
            unsafe { self.ctx.device().destroy_command_pool(*pool, None) };
        }
    }
}

/// Command pool bound to one queue family
///
/// Cheap to clone; the pool lives until the last clone and the last buffer
/// allocated from it are gone.
#[derive(Clone)]
pub struct CommandPool {
    inner: Arc<PoolInner>,
}

impl CommandPool {
    pub fn new(ctx: Arc<GpuContext>, queue_family_index: u32, name: &str) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { ctx.device().create_command_pool(&create_info, None) }.map_err(|e| {
            engine_error!("ya::vulkan", "Failed to create command pool '{}': {:?}", name, e);
            Error::BackendError(format!("Failed to create command pool: {:?}", e))
        })?;
        ctx.set_debug_name(pool, name);

        Ok(Self {
            inner: Arc::new(PoolInner {
                ctx,
                pool: Mutex::new(pool),
                tracker: PoolTracker::default(),
                name: name.to_string(),
            }),
        })
    }

    pub fn handle(&self) -> Result<vk::CommandPool> {
        Ok(*self.lock()?)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, vk::CommandPool>> {
        self.inner
            .pool
            .lock()
            .map_err(|_| engine_err!("ya::vulkan", "Command pool '{}' lock poisoned", self.inner.name))
    }

    /// Allocate `count` primary buffers: all of them or an error
    pub fn allocate(&self, count: u32, one_time_submit: bool) -> Result<Vec<CommandBuffer>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let pool = self.lock()?;
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(*pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        // vkAllocateCommandBuffers frees everything itself on failure
        let handles = unsafe { self.inner.ctx.device().allocate_command_buffers(&allocate_info) }.map_err(|e| {
            engine_error!("ya::vulkan", "Failed to allocate {} command buffer(s): {:?}", count, e);
            Error::BackendError(format!("Failed to allocate command buffers: {:?}", e))
        })?;
        drop(pool);

        let pool_epoch = self.inner.tracker.reset_epoch();
        engine_debug!("ya::vulkan", "Allocated {} command buffer(s) from '{}'", count, self.inner.name);

        Ok(handles
            .into_iter()
            .enumerate()
            .map(|(i, handle)| {
                self.inner.ctx.set_debug_name(handle, &format!("{}_CommandBuffer{}", self.inner.name, i));
                CommandBuffer {
                    pool: Arc::clone(&self.inner),
                    handle,
                    lifecycle: CommandBufferLifecycle::new(one_time_submit),
                    pending: None,
                    pool_epoch,
                    in_render_pass: false,
                }
            })
            .collect())
    }

    /// Reset every buffer of the pool back to Initial
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` while any buffer of the pool is pending on the GPU.
    pub fn reset(&self) -> Result<()> {
        let pool = self.lock()?;
        self.inner.tracker.reset_with(&self.inner.name, || {
            unsafe { self.inner.ctx.device().reset_command_pool(*pool, vk::CommandPoolResetFlags::empty()) }
                .map_err(|e| engine_err!("ya::vulkan", "Failed to reset command pool '{}': {:?}", self.inner.name, e))
        })?;
        engine_debug!("ya::vulkan", "Command pool '{}' reset", self.inner.name);
        Ok(())
    }

    /// Submissions from this pool the GPU has not finished yet
    pub fn pending_submissions(&self) -> Result<usize> {
        self.inner.tracker.outstanding()
    }
}

pub struct CommandBuffer {
    pool: Arc<PoolInner>,
    handle: vk::CommandBuffer,
    lifecycle: CommandBufferLifecycle,
    pending: Option<PendingTicket>,
    pool_epoch: u64,
    in_render_pass: bool,
}

impl CommandBuffer {
    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    pub fn is_one_time_submit(&self) -> bool {
        self.lifecycle.is_one_time_submit()
    }

    fn device(&self) -> &ash::Device {
        self.pool.ctx.device()
    }

    fn is_complete(&self) -> bool {
        self.pending.as_ref().is_some_and(|ticket| ticket.slot.is_retired(ticket.epoch))
    }

    fn reset_by_pool(&self) -> bool {
        self.pool_epoch != self.pool.tracker.reset_epoch()
    }

    /// Fold a pool reset or a finished submission into the lifecycle
    fn poll(&mut self) {
        if self.reset_by_pool() {
            self.lifecycle = CommandBufferLifecycle::new(self.lifecycle.is_one_time_submit());
            self.pending = None;
            self.in_render_pass = false;
            self.pool_epoch = self.pool.tracker.reset_epoch();
        }
        if self.is_complete() {
            self.lifecycle.complete();
            self.pending = None;
        }
    }

    /// `Executable -> Pending`, completing once `slot` retires `epoch`
    pub(crate) fn mark_submitted(&mut self, slot: Arc<SlotEpoch>, epoch: u64) -> Result<()> {
        self.poll();
        self.lifecycle.submit()?;
        self.pool.tracker.track(Arc::clone(&slot), epoch)?;
        self.pending = Some(PendingTicket { slot, epoch });
        Ok(())
    }

    fn require_recording(&self, command: &str) -> Result<()> {
        if self.reset_by_pool() {
            return Err(Error::InvalidState(format!("{} on a buffer whose pool was reset", command)));
        }
        self.lifecycle.require_recording(command)
    }

    fn require_render_pass(&self, command: &str) -> Result<()> {
        self.require_recording(command)?;
        if !self.in_render_pass {
            return Err(Error::InvalidState(format!("{} recorded outside a render pass", command)));
        }
        Ok(())
    }

    pub fn begin_render_pass(
        &mut self,
        render_pass: &RenderPass,
        framebuffer: &Framebuffer,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.require_recording("begin_render_pass()")?;
        if self.in_render_pass {
            return Err(Error::InvalidState("Already inside a render pass".to_string()));
        }

        let vk_clear_values: Vec<vk::ClearValue> = clear_values
            .iter()
            .map(|value| match value {
                ClearValue::Color(color) => vk::ClearValue {
                    color: vk::ClearColorValue { float32: *color },
                },
                ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth: *depth, stencil: *stencil },
                },
            })
            .collect();

        let extent = framebuffer.extent();
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass.handle())
            .framebuffer(framebuffer.handle())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D { width: extent.width, height: extent.height },
            })
            .clear_values(&vk_clear_values);

        unsafe { self.device().cmd_begin_render_pass(self.handle, &begin_info, vk::SubpassContents::INLINE) };
        self.in_render_pass = true;
        Ok(())
    }

    pub fn next_subpass(&mut self) -> Result<()> {
        self.require_render_pass("next_subpass()")?;
        unsafe { self.device().cmd_next_subpass(self.handle, vk::SubpassContents::INLINE) };
        Ok(())
    }

    pub fn end_render_pass(&mut self) -> Result<()> {
        self.require_render_pass("end_render_pass()")?;
        unsafe { self.device().cmd_end_render_pass(self.handle) };
        self.in_render_pass = false;
        Ok(())
    }

    pub fn bind_pipeline(&mut self, pipeline: &Pipeline) -> Result<()> {
        self.require_recording("bind_pipeline()")?;
        if pipeline.handle() == vk::Pipeline::null() {
            return Err(Error::InvalidState(format!(
                "Pipeline '{}' has no handle after a failed rebuild",
                pipeline.desc().name
            )));
        }
        unsafe {
            self.device()
                .cmd_bind_pipeline(self.handle, vk::PipelineBindPoint::GRAPHICS, pipeline.handle())
        };
        Ok(())
    }

    /// Bind `sets` starting at set index `first_set` of `pipeline`'s layout
    pub fn bind_descriptor_sets(&mut self, pipeline: &Pipeline, first_set: u32, sets: &[&DescriptorSet]) -> Result<()> {
        self.require_recording("bind_descriptor_sets()")?;
        let handles: Vec<vk::DescriptorSet> = sets.iter().map(|set| set.handle()).collect();
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                self.handle,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.layout().handle(),
                first_set,
                &handles,
                &[],
            );
        }
        Ok(())
    }

    pub fn push_constants(
        &mut self,
        pipeline: &Pipeline,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.require_recording("push_constants()")?;
        if data.len() % 4 != 0 || offset % 4 != 0 {
            return Err(Error::InvalidResource(format!(
                "Push constants {}+{} must be 4-byte aligned",
                offset, data.len()
            )));
        }
        unsafe {
            self.device().cmd_push_constants(
                self.handle,
                pipeline.layout().handle(),
                shader_stages_to_vk(stages),
                offset,
                data,
            );
        }
        Ok(())
    }

    pub fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[&Buffer], offsets: &[u64]) -> Result<()> {
        self.require_recording("bind_vertex_buffers()")?;
        if buffers.len() != offsets.len() {
            return Err(Error::InvalidResource(format!(
                "{} vertex buffer(s) but {} offset(s)",
                buffers.len(), offsets.len()
            )));
        }
        let handles: Vec<vk::Buffer> = buffers.iter().map(|buffer| buffer.handle()).collect();
        unsafe { self.device().cmd_bind_vertex_buffers(self.handle, first_binding, &handles, offsets) };
        Ok(())
    }

    pub fn bind_index_buffer(&mut self, buffer: &Buffer, offset: u64, index_type: IndexType) -> Result<()> {
        self.require_recording("bind_index_buffer()")?;
        unsafe {
            self.device()
                .cmd_bind_index_buffer(self.handle, buffer.handle(), offset, index_type_to_vk(index_type))
        };
        Ok(())
    }

    /// Record a GPU-side copy of `size` bytes
    pub fn copy_buffer(&mut self, src: &Buffer, src_offset: u64, dst: &Buffer, dst_offset: u64, size: u64) -> Result<()> {
        self.require_recording("copy_buffer()")?;
        if self.in_render_pass {
            return Err(Error::InvalidState("copy_buffer() recorded inside a render pass".to_string()));
        }
        ya_engine::ya::render::check_range(src.size(), src_offset, size)?;
        ya_engine::ya::render::check_range(dst.size(), dst_offset, size)?;
        let region = vk::BufferCopy { src_offset, dst_offset, size };
        unsafe { self.device().cmd_copy_buffer(self.handle, src.handle(), dst.handle(), &[region]) };
        Ok(())
    }

    /// Record the barrier for a layout transition of `image`
    pub fn transition_image(&mut self, image: vk::Image, transition: &LayoutTransition, mip_levels: u32) -> Result<()> {
        self.require_recording("transition_image()")?;
        record_layout_transition(self.device(), self.handle, image, transition, mip_levels);
        Ok(())
    }
}

impl CommandList for CommandBuffer {
    fn begin(&mut self) -> Result<()> {
        self.poll();
        let mut next = self.lifecycle;
        next.begin()?;

        let flags = if self.lifecycle.is_one_time_submit() {
            vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT
        } else {
            vk::CommandBufferUsageFlags::empty()
        };
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
        unsafe { self.device().begin_command_buffer(self.handle, &begin_info) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to begin command buffer: {:?}", e))?;

        self.lifecycle = next;
        self.in_render_pass = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.poll();
        let mut next = self.lifecycle;
        next.end()?;
        if self.in_render_pass {
            return Err(Error::InvalidState("Render pass not ended before end()".to_string()));
        }

        unsafe { self.device().end_command_buffer(self.handle) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to end command buffer: {:?}", e))?;

        self.lifecycle = next;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.poll();
        let mut next = self.lifecycle;
        next.reset()?;

        unsafe { self.device().reset_command_buffer(self.handle, vk::CommandBufferResetFlags::empty()) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to reset command buffer: {:?}", e))?;

        self.lifecycle = next;
        self.in_render_pass = false;
        Ok(())
    }

    fn state(&self) -> CommandBufferState {
        if self.reset_by_pool() {
            return CommandBufferState::Initial;
        }
        match self.lifecycle.state() {
            CommandBufferState::Pending if self.is_complete() => {
                let mut completed = self.lifecycle;
                completed.complete();
                completed.state()
            }
            state => state,
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.require_recording("set_viewport()")?;
        unsafe { self.device().cmd_set_viewport(self.handle, 0, &[viewport_to_vk(viewport)]) };
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.require_recording("set_scissor()")?;
        unsafe { self.device().cmd_set_scissor(self.handle, 0, &[rect_to_vk(scissor)]) };
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.require_render_pass("draw()")?;
        unsafe { self.device().cmd_draw(self.handle, vertex_count, 1, first_vertex, 0) };
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.require_render_pass("draw_indexed()")?;
        unsafe { self.device().cmd_draw_indexed(self.handle, index_count, 1, first_index, vertex_offset, 0) };
        Ok(())
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        // A buffer still on the GPU is left to the pool, which outlives it
        if self.lifecycle.state() == CommandBufferState::Pending && !self.is_complete() {
            return;
        }
        if let Ok(pool) = self.pool.pool.lock() {
            unsafe { self.pool.ctx.device().free_command_buffers(*pool, &[self.handle]) };
        }
    }
}

#[cfg(test)]
#[path = "vulkan_command_buffer_tests.rs"]
mod tests;

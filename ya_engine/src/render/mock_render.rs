/// Mock frame device for unit tests (no GPU required)
///
/// The mock GPU finishes every submission instantly. Acquire and present
/// results can be scripted to drive out-of-date and suboptimal paths.

use std::collections::VecDeque;
use crate::error::{Error, Result};
use crate::render::{
    negotiate_swapchain, AcquireOutcome, CommandBufferLifecycle, CommandBufferState, CommandList,
    CompositeAlpha, Extent2D, FrameDevice, FrameSubmission, PresentMode, PresentOutcome,
    QueueFamilySelection, Rect2D, SemaphoreRef, SurfaceCapabilities, SurfaceFormat, SurfaceSupport,
    Swapchain, SwapchainCreateInfo, SwapchainDiff, SwapchainLifecycle, SwapchainParams,
    SwapchainSnapshot, SwapchainState, Viewport, Format, ColorSpace,
};

// ============================================================================
// Mock Command List
// ============================================================================

#[derive(Debug)]
pub struct MockCommandList {
    lifecycle: CommandBufferLifecycle,
    pub commands: Vec<String>,
}

impl MockCommandList {
    pub fn new(one_time_submit: bool) -> Self {
        Self { lifecycle: CommandBufferLifecycle::new(one_time_submit), commands: Vec::new() }
    }

    /// Begin + end with a single draw
    pub fn recorded() -> Self {
        let mut cb = Self::new(false);
        cb.record_frame();
        cb
    }

    pub fn record_frame(&mut self) {
        self.begin().ok();
        self.draw(3, 0).ok();
        self.end().ok();
    }

    fn mark_submitted(&mut self) -> Result<()> {
        self.lifecycle.submit()?;
        self.lifecycle.complete();
        Ok(())
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        self.lifecycle.begin()?;
        self.commands.clear();
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.lifecycle.end()
    }

    fn reset(&mut self) -> Result<()> {
        self.lifecycle.reset()?;
        self.commands.clear();
        Ok(())
    }

    fn state(&self) -> CommandBufferState {
        self.lifecycle.state()
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.lifecycle.require_recording("set_viewport")?;
        self.commands.push(format!("viewport {}x{}", viewport.width, viewport.height));
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.lifecycle.require_recording("set_scissor")?;
        self.commands.push(format!("scissor {}x{}", scissor.width, scissor.height));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.lifecycle.require_recording("draw")?;
        self.commands.push(format!("draw {} {}", vertex_count, first_vertex));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.lifecycle.require_recording("draw_indexed")?;
        self.commands.push(format!("draw_indexed {} {} {}", index_count, first_index, vertex_offset));
        Ok(())
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

/// Surface supporting the preferred format, mailbox and FIFO, 2..=8 images
pub fn mock_surface_support() -> SurfaceSupport {
    SurfaceSupport {
        capabilities: SurfaceCapabilities {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: None,
            min_image_extent: Extent2D::new(1, 1),
            max_image_extent: Extent2D::new(4096, 4096),
            supported_composite_alpha: CompositeAlpha::OPAQUE,
        },
        formats: vec![
            SurfaceFormat::PREFERRED,
            SurfaceFormat { format: Format::R8G8B8A8_SRGB, color_space: ColorSpace::SrgbNonlinear },
        ],
        present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
    }
}

#[derive(Debug)]
pub struct MockSwapchain {
    support: SurfaceSupport,
    window_extent: Extent2D,
    vsync: bool,
    families: QueueFamilySelection,
    create_info: SwapchainCreateInfo,
    lifecycle: SwapchainLifecycle,
    params: SwapchainParams,
    image_count: u32,
    pub diffs: Vec<SwapchainDiff>,
}

impl MockSwapchain {
    pub fn new(
        support: SurfaceSupport,
        create_info: SwapchainCreateInfo,
        window_extent: Extent2D,
        vsync: bool,
    ) -> Result<Self> {
        let families = QueueFamilySelection { graphics_family: 0, present_family: 0 };
        let params = negotiate_swapchain(&support, &create_info, window_extent, vsync, families)?;
        let mut swapchain = Self {
            support,
            window_extent,
            vsync,
            families,
            create_info: create_info.clone(),
            lifecycle: SwapchainLifecycle::new(),
            params,
            image_count: 0,
            diffs: Vec::new(),
        };
        swapchain.recreate(&create_info)?;
        Ok(swapchain)
    }

    /// Simulate a window resize; takes effect on the next recreate
    pub fn set_window_extent(&mut self, extent: Extent2D) {
        self.window_extent = extent;
    }

    /// Simulate a surface that loses formats, making recreate fail
    pub fn support_mut(&mut self) -> &mut SurfaceSupport {
        &mut self.support
    }

    pub fn version(&self) -> u32 {
        self.lifecycle.version()
    }
}

impl Swapchain for MockSwapchain {
    fn state(&self) -> SwapchainState {
        self.lifecycle.state()
    }

    fn image_count(&self) -> u32 {
        self.image_count
    }

    fn extent(&self) -> Extent2D {
        self.params.extent
    }

    fn surface_format(&self) -> SurfaceFormat {
        self.params.surface_format
    }

    fn present_mode(&self) -> PresentMode {
        self.params.present_mode
    }

    fn create_info(&self) -> &SwapchainCreateInfo {
        &self.create_info
    }

    fn recreate(&mut self, create_info: &SwapchainCreateInfo) -> Result<()> {
        self.lifecycle.begin()?;
        let params = match negotiate_swapchain(&self.support, create_info, self.window_extent, self.vsync, self.families) {
            Ok(params) => params,
            Err(e) => {
                self.lifecycle.abort();
                return Err(e);
            }
        };

        let image_count = if params.extent.is_empty() { 0 } else { params.image_count };
        let snapshot = SwapchainSnapshot {
            extent: params.extent,
            present_mode: params.present_mode,
            surface_format: params.surface_format,
            image_count,
        };
        if let Some(diff) = self.lifecycle.commit(snapshot)? {
            self.diffs.push(diff);
        }
        self.params = params;
        self.image_count = image_count;
        self.create_info = create_info.clone();
        Ok(())
    }
}

// ============================================================================
// Mock Frame Device
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockFence {
    Signaled,
    Unsignaled,
    Pending,
}

#[derive(Debug)]
pub struct MockFrameDevice {
    pub swapchain: MockSwapchain,
    fences: Vec<MockFence>,
    next_image: u32,
    /// Consumed before the default round-robin acquire
    pub acquire_script: VecDeque<AcquireOutcome>,
    /// Consumed before the default `Presented`
    pub present_script: VecDeque<PresentOutcome>,
    pub submissions: Vec<FrameSubmission>,
    pub presents: Vec<(u32, SemaphoreRef)>,
    pub fence_waits: Vec<u32>,
    pub wait_idle_count: u32,
    pub recreate_count: u32,
    /// Size of the per-image semaphore set
    pub render_finished_count: u32,
}

impl MockFrameDevice {
    pub fn new(flight_frame_count: u32, swapchain: MockSwapchain) -> Self {
        let render_finished_count = swapchain.image_count();
        Self {
            swapchain,
            fences: vec![MockFence::Signaled; flight_frame_count as usize],
            next_image: 0,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            submissions: Vec::new(),
            presents: Vec::new(),
            fence_waits: Vec::new(),
            wait_idle_count: 0,
            recreate_count: 0,
            render_finished_count,
        }
    }

    /// `flight_frame_count` slots over a swapchain of exactly `image_count` images
    pub fn with_images(flight_frame_count: u32, image_count: u32) -> Self {
        let mut support = mock_surface_support();
        support.capabilities.min_image_count = image_count;
        support.capabilities.max_image_count = image_count;
        let create_info = SwapchainCreateInfo { min_image_count: image_count, ..Default::default() };
        let swapchain = MockSwapchain::new(support, create_info, Extent2D::new(800, 600), false)
            .expect("mock swapchain");
        Self::new(flight_frame_count, swapchain)
    }

    fn fence(&mut self, slot: u32) -> Result<&mut MockFence> {
        self.fences
            .get_mut(slot as usize)
            .ok_or_else(|| Error::InvalidResource(format!("No fence for slot {}", slot)))
    }
}

impl FrameDevice for MockFrameDevice {
    type CommandBuffer = MockCommandList;

    fn wait_for_fence(&mut self, slot: u32) -> Result<()> {
        self.fence_waits.push(slot);
        let fence = self.fence(slot)?;
        match *fence {
            MockFence::Unsignaled => Err(Error::InvalidState(format!(
                "Waiting on fence {} which nothing will signal",
                slot
            ))),
            _ => {
                *fence = MockFence::Signaled;
                Ok(())
            }
        }
    }

    fn reset_fence(&mut self, slot: u32) -> Result<()> {
        let fence = self.fence(slot)?;
        if *fence == MockFence::Pending {
            return Err(Error::InvalidState(format!("Resetting fence {} while pending", slot)));
        }
        *fence = MockFence::Unsignaled;
        Ok(())
    }

    fn acquire_next_image(&mut self, _slot: u32) -> Result<AcquireOutcome> {
        if let Some(outcome) = self.acquire_script.pop_front() {
            return Ok(outcome);
        }
        let image_count = self.swapchain.image_count();
        if image_count == 0 {
            return Ok(AcquireOutcome::OutOfDate);
        }
        let image_index = self.next_image % image_count;
        self.next_image += 1;
        Ok(AcquireOutcome::Acquired { image_index, suboptimal: false })
    }

    fn submit(&mut self, submission: &FrameSubmission, command_buffers: &mut [MockCommandList]) -> Result<()> {
        if let SemaphoreRef::RenderFinished(index) = submission.signal_semaphore {
            if index >= self.render_finished_count {
                return Err(Error::InvalidResource(format!("No render-finished semaphore {}", index)));
            }
        }
        for cb in command_buffers.iter_mut() {
            cb.mark_submitted()?;
        }
        *self.fence(submission.fence_slot)? = MockFence::Pending;
        self.submissions.push(*submission);
        Ok(())
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreRef) -> Result<PresentOutcome> {
        self.presents.push((image_index, wait));
        Ok(self.present_script.pop_front().unwrap_or(PresentOutcome::Presented))
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.wait_idle_count += 1;
        for fence in self.fences.iter_mut() {
            if *fence == MockFence::Pending {
                *fence = MockFence::Signaled;
            }
        }
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> Result<u32> {
        self.recreate_count += 1;
        let create_info = self.swapchain.create_info().clone();
        self.swapchain.recreate(&create_info)?;
        self.render_finished_count = self.swapchain.image_count();
        self.next_image = 0;
        Ok(self.swapchain.image_count())
    }

    fn swapchain_image_count(&self) -> u32 {
        self.swapchain.image_count()
    }
}

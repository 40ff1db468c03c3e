/// VulkanRender - Vulkan implementation of the Render trait
///
/// Owns the whole device stack: instance, logical device, swapchain, the
/// default render pass with its framebuffers, frame synchronization, the
/// graphics command pool and the descriptor pool.

use std::sync::Arc;
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::{
    FrameStatus, FrameSync, FrameToken, GraphicsPipelineDesc, PipelineLayoutDesc, PresentMode, Render,
    RenderConfig, RenderPassDesc, ShaderProcessor, Swapchain as RenderSwapchain, SwapchainCreateInfo,
};
use ya_engine::{engine_debug, engine_info, engine_warn};

use crate::vulkan_adapter::select_physical_adapter;
use crate::vulkan_command_buffer::{CommandBuffer, CommandPool};
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_set::DescriptorHelper;
use crate::vulkan_device::LogicalDevice;
use crate::vulkan_frame_sync::{refresh_swapchain_dependents, FrameSyncObjects, VulkanFrameDevice};
use crate::vulkan_instance::VulkanInstance;
use crate::vulkan_pipeline::{Pipeline, PipelineLayout};
use crate::vulkan_render_pass::{Framebuffer, RenderPass, RenderTargets};
use crate::vulkan_resource::ResourceManager;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_window::{SurfaceGuard, WindowBackend};

/// Borrow the frame-loop state field by field so `frame_sync` stays free
macro_rules! frame_device {
    ($render:expr) => {
        VulkanFrameDevice {
            ctx: &$render.ctx,
            sync: &mut $render.sync_objects,
            swapchain: &mut $render.swapchain,
            render_pass: &mut $render.render_pass,
            targets: &mut $render.targets,
        }
    };
}

/// Vulkan renderer
///
/// Fields are declared in destruction order: everything built on the
/// device goes before the swapchain, the swapchain before the context.
pub struct VulkanRender {
    targets: RenderTargets,
    descriptors: DescriptorHelper,
    command_pool: CommandPool,
    sync_objects: FrameSyncObjects,
    frame_sync: FrameSync,
    render_pass: RenderPass,
    swapchain: Swapchain,
    resources: ResourceManager,
    config: RenderConfig,
    ctx: Arc<GpuContext>,
}

impl VulkanRender {
    /// Initialize Vulkan for `window`
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` when any stage of device bring-up
    /// fails, `Error::UnsupportedSurfaceFormat` when the configured render
    /// pass cannot target the negotiated swapchain format.
    pub fn new(window: Arc<dyn WindowBackend>, config: RenderConfig) -> Result<Self> {
        config.validate()?;

        let instance = VulkanInstance::new(window.as_ref(), &config)?;
        let surface = SurfaceGuard::new(
            &instance.surface_loader,
            window.create_surface(&instance.entry, &instance.instance)?,
        );

        // Until the swapchain owns it, an early return drops the surface before the instance
        let (adapter, selection) = select_physical_adapter(&instance, surface.handle())?;
        let device = LogicalDevice::new(&instance, adapter, &selection, &config)?;
        let parts = GpuContext::create_parts(&instance, &device)?;
        let ctx = GpuContext::from_parts(instance, device, parts);

        let swapchain = Swapchain::new(
            Arc::clone(&ctx),
            window,
            surface.release(),
            config.swapchain.clone(),
            config.vsync,
        )?;

        let format = swapchain.surface_format().format;
        let pass_desc = config.render_pass.resolve(format);
        pass_desc.check_swapchain_format(format)?;
        let render_pass = RenderPass::new(Arc::clone(&ctx), &pass_desc)?;
        let targets = RenderTargets::build(&ctx, &render_pass, &swapchain)?;

        let sync_objects = FrameSyncObjects::new(Arc::clone(&ctx), config.frames_in_flight, swapchain.image_count())?;
        let frame_sync = FrameSync::new(config.frames_in_flight)?;

        let graphics_family = ctx.graphics_queue()?.slot.family_index;
        let command_pool = CommandPool::new(Arc::clone(&ctx), graphics_family, "GraphicsCommandPool")?;
        let descriptors = DescriptorHelper::new(Arc::clone(&ctx), &config.descriptor_pool)?;
        let resources = ResourceManager::new(Arc::clone(&ctx));

        engine_info!(
            "ya::vulkan",
            "VulkanRender initialized on '{}' ({} image(s) {}x{}, {} frame(s) in flight)",
            ctx.logical_device().adapter().name,
            swapchain.image_count(),
            swapchain.extent().width,
            swapchain.extent().height,
            config.frames_in_flight
        );

        Ok(Self {
            targets,
            descriptors,
            command_pool,
            sync_objects,
            frame_sync,
            render_pass,
            swapchain,
            resources,
            config,
            ctx,
        })
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn descriptor_helper(&self) -> &DescriptorHelper {
        &self.descriptors
    }

    pub fn descriptor_helper_mut(&mut self) -> &mut DescriptorHelper {
        &mut self.descriptors
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    pub fn render_targets(&self) -> &RenderTargets {
        &self.targets
    }

    /// Pool behind `allocate_command_buffers`
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    pub fn frame_sync(&self) -> &FrameSync {
        &self.frame_sync
    }

    /// Framebuffer for the acquired swapchain image
    pub fn framebuffer(&self, image_index: u32) -> Result<&Framebuffer> {
        self.targets.framebuffer(image_index).ok_or_else(|| {
            Error::InvalidState(format!(
                "No framebuffer for image {} ({} available)",
                image_index,
                self.targets.framebuffers().len()
            ))
        })
    }

    /// Allocate one-time-submit command buffers, e.g. for uploads recorded by the caller
    pub fn allocate_one_time_command_buffers(&mut self, count: u32) -> Result<Vec<CommandBuffer>> {
        self.command_pool.allocate(count, true)
    }

    pub fn set_vsync(&mut self, vsync: bool) -> Result<()> {
        self.apply_swapchain_change(|swapchain| swapchain.set_vsync(vsync))
    }

    pub fn set_present_mode(&mut self, present_mode: PresentMode) -> Result<()> {
        self.apply_swapchain_change(|swapchain| swapchain.set_present_mode(present_mode))
    }

    /// Recreate the swapchain with new parameters, e.g. after a window resize
    pub fn recreate_swapchain(&mut self, create_info: &SwapchainCreateInfo) -> Result<()> {
        self.apply_swapchain_change(|swapchain| swapchain.recreate(create_info))
    }

    /// Targets are rebuilt even when `change` fails, from whatever
    /// generation the swapchain kept.
    fn apply_swapchain_change<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Swapchain) -> Result<()>,
    {
        if self.frame_sync.in_progress().is_some() {
            return Err(Error::InvalidState("Cannot change the swapchain while a frame is in progress".to_string()));
        }
        self.ctx.wait_idle()?;
        self.targets = RenderTargets::empty();

        let changed = change(&mut self.swapchain);
        let refreshed = refresh_swapchain_dependents(
            &self.ctx,
            &mut self.sync_objects,
            &self.swapchain,
            &mut self.render_pass,
            &mut self.targets,
        );
        changed?;
        let image_count = refreshed?;
        engine_debug!("ya::vulkan", "Swapchain dependents rebuilt for {} image(s)", image_count);
        Ok(())
    }

    /// Replace the default render pass
    ///
    /// Returns `true` when the attachment shape changed; pipelines built
    /// against the previous pass are stale then and must be recreated.
    pub fn recreate_render_pass(&mut self, desc: &RenderPassDesc) -> Result<bool> {
        if self.frame_sync.in_progress().is_some() {
            return Err(Error::InvalidState("Cannot change the render pass while a frame is in progress".to_string()));
        }
        let format = self.swapchain.surface_format().format;
        let desc = desc.resolve(format);
        desc.check_swapchain_format(format)?;

        self.ctx.wait_idle()?;
        self.sync_objects.retire_all();
        self.targets = RenderTargets::empty();
        let changed = self.render_pass.recreate(&desc);
        if self.swapchain.image_count() > 0 {
            self.targets = RenderTargets::build(&self.ctx, &self.render_pass, &self.swapchain)?;
        }
        changed
    }

    pub fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<Arc<PipelineLayout>> {
        Ok(Arc::new(PipelineLayout::new(Arc::clone(&self.ctx), desc)?))
    }

    /// Build a graphics pipeline against the default render pass
    pub fn create_pipeline(
        &self,
        shaders: &dyn ShaderProcessor,
        layout: Arc<PipelineLayout>,
        desc: &GraphicsPipelineDesc,
    ) -> Result<Pipeline> {
        Pipeline::new(Arc::clone(&self.ctx), shaders, layout, &self.render_pass, desc)
    }

    /// Rebuild `pipeline` if the default render pass changed shape since it was built
    ///
    /// Returns `true` when a rebuild happened.
    pub fn refresh_pipeline(&self, shaders: &dyn ShaderProcessor, pipeline: &mut Pipeline) -> Result<bool> {
        if !pipeline.is_stale(&self.render_pass) {
            return Ok(false);
        }
        pipeline.recreate(shaders, &self.render_pass)?;
        Ok(true)
    }
}

impl Render for VulkanRender {
    type CommandBuffer = CommandBuffer;
    type Swapchain = Swapchain;

    fn begin_frame(&mut self) -> Result<FrameStatus> {
        let mut device = frame_device!(self);
        self.frame_sync.begin_frame(&mut device)
    }

    fn end_frame(&mut self, token: FrameToken, command_buffers: &mut [CommandBuffer]) -> Result<bool> {
        let mut device = frame_device!(self);
        self.frame_sync.end_frame(&mut device, token, command_buffers)
    }

    fn allocate_command_buffers(&mut self, count: u32) -> Result<Vec<CommandBuffer>> {
        self.command_pool.allocate(count, false)
    }

    fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    fn wait_idle(&self) -> Result<()> {
        self.ctx.wait_idle()?;
        self.sync_objects.retire_all();
        Ok(())
    }
}

impl Drop for VulkanRender {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_idle() {
            engine_warn!("ya::vulkan", "wait_idle failed during shutdown: {}", e);
        }
        self.sync_objects.retire_all();
    }
}

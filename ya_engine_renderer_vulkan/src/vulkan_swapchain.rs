/// Swapchain - presentation surface, images and recreation
///
/// Every parameter comes from `negotiate_swapchain`. A recreate builds the
/// new swapchain with the old one as `old_swapchain`, then releases the old
/// images. While the window is minimized the swapchain has no handle and no
/// images, and the frame loop skips rendering.

use ash::prelude::VkResult;
use ash::vk;
use std::sync::Arc;
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::{
    negotiate_swapchain, AcquireOutcome, Extent2D, Format, PresentMode, PresentOutcome, SharingMode,
    Swapchain as RenderSwapchain, SurfaceFormat, SwapchainCreateInfo, SwapchainDiff, SwapchainLifecycle,
    SwapchainParams, SwapchainSnapshot, SwapchainState,
};
use ya_engine::{engine_debug, engine_err, engine_info};

use crate::vulkan_adapter::query_surface_support;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    color_space_to_vk, composite_alpha_to_vk, extent_to_vk, format_to_vk, image_usage_to_vk, present_mode_to_vk,
};
use crate::vulkan_image::SwapchainImage;
use crate::vulkan_window::WindowBackend;

/// Called after every successful recreate with the old and new properties
pub type RecreateListener = Box<dyn FnMut(&SwapchainDiff) + Send>;

/// Vulkan sharing mode and the family list it needs
pub(crate) fn sharing_to_vk(sharing: SharingMode) -> (vk::SharingMode, Vec<u32>) {
    match sharing {
        SharingMode::Exclusive => (vk::SharingMode::EXCLUSIVE, Vec::new()),
        SharingMode::Concurrent { families } => (vk::SharingMode::CONCURRENT, families.to_vec()),
    }
}

pub(crate) fn acquire_outcome(result: VkResult<(u32, bool)>) -> Result<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(e) => Err(engine_err!("ya::vulkan", "Failed to acquire swapchain image: {:?}", e)),
    }
}

pub(crate) fn present_outcome(result: VkResult<bool>) -> Result<PresentOutcome> {
    match result {
        Ok(false) => Ok(PresentOutcome::Presented),
        Ok(true) => Ok(PresentOutcome::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
        Err(e) => Err(engine_err!("ya::vulkan", "Failed to present swapchain image: {:?}", e)),
    }
}

/// Finish a freshly created swapchain `handle` by building its images
///
/// On failure the partial images are dropped, `destroy` releases `handle`
/// and the error is returned; the caller's current generation is never
/// touched before this succeeds.
pub(crate) fn stage_generation<H: Copy, I>(
    handle: H,
    build_images: impl FnOnce(H) -> Result<Vec<I>>,
    destroy: impl FnOnce(H),
) -> Result<(H, Vec<I>)> {
    match build_images(handle) {
        Ok(images) => Ok((handle, images)),
        Err(e) => {
            destroy(handle);
            Err(e)
        }
    }
}

pub struct Swapchain {
    ctx: Arc<GpuContext>,
    window: Arc<dyn WindowBackend>,
    surface: vk::SurfaceKHR,
    loader: ash::khr::swapchain::Device,
    /// Null while the window is minimized
    handle: vk::SwapchainKHR,
    images: Vec<SwapchainImage>,
    create_info: SwapchainCreateInfo,
    vsync: bool,
    lifecycle: SwapchainLifecycle,
    listeners: Vec<RecreateListener>,
}

impl Swapchain {
    /// Build the first generation
    ///
    /// Takes ownership of `surface`; it is destroyed with the swapchain,
    /// including when creation fails.
    pub fn new(
        ctx: Arc<GpuContext>,
        window: Arc<dyn WindowBackend>,
        surface: vk::SurfaceKHR,
        create_info: SwapchainCreateInfo,
        vsync: bool,
    ) -> Result<Self> {
        let loader = ash::khr::swapchain::Device::new(&ctx.instance().instance, ctx.device());
        let mut swapchain = Self {
            ctx,
            window,
            surface,
            loader,
            handle: vk::SwapchainKHR::null(),
            images: Vec::new(),
            create_info,
            vsync,
            lifecycle: SwapchainLifecycle::new(),
            listeners: Vec::new(),
        };
        swapchain.rebuild().map_err(|e| match e {
            Error::BackendError(message) => Error::InitializationFailed(message),
            other => other,
        })?;
        Ok(swapchain)
    }

    fn rebuild(&mut self) -> Result<()> {
        self.lifecycle.begin()?;
        let snapshot = match self.create_generation() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.lifecycle.abort();
                return Err(e);
            }
        };

        if let Some(diff) = self.lifecycle.commit(snapshot)? {
            engine_debug!(
                "ya::vulkan",
                "Swapchain recreated: {}x{} -> {}x{}, {} image(s), {:?}",
                diff.old.extent.width, diff.old.extent.height,
                diff.new.extent.width, diff.new.extent.height,
                diff.new.image_count, diff.new.present_mode
            );
            for listener in self.listeners.iter_mut() {
                listener(&diff);
            }
        } else {
            engine_info!(
                "ya::vulkan",
                "Swapchain created: {}x{}, {} image(s), {:?}, {:?}",
                snapshot.extent.width, snapshot.extent.height,
                snapshot.image_count, snapshot.surface_format.format, snapshot.present_mode
            );
        }
        Ok(())
    }

    fn create_generation(&mut self) -> Result<SwapchainSnapshot> {
        let ctx = Arc::clone(&self.ctx);
        let surface_loader = &ctx.instance().surface_loader;
        let physical_device = ctx.physical_device();
        let support = query_surface_support(surface_loader, physical_device, self.surface)?;
        let params = negotiate_swapchain(
            &support,
            &self.create_info,
            self.window.window_size(),
            self.vsync,
            ctx.logical_device().queue_families(),
        )?;

        if params.extent.is_empty() {
            engine_debug!("ya::vulkan", "Surface extent is empty, swapchain has no images");
            self.release_current();
            return Ok(Self::snapshot(&params, 0));
        }

        let current_transform = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, self.surface)
        }
        .map_err(|e| engine_err!("ya::vulkan", "Failed to query surface capabilities: {:?}", e))?
        .current_transform;

        let (sharing_mode, family_indices) = sharing_to_vk(params.sharing);
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(params.image_count)
            .image_format(format_to_vk(params.surface_format.format))
            .image_color_space(color_space_to_vk(params.surface_format.color_space))
            .image_extent(extent_to_vk(params.extent))
            .image_array_layers(self.create_info.image_array_layers.max(1))
            .image_usage(image_usage_to_vk(self.create_info.image_usage))
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(current_transform)
            .composite_alpha(composite_alpha_to_vk(params.composite_alpha))
            .present_mode(present_mode_to_vk(params.present_mode))
            .clipped(self.create_info.clipped)
            .old_swapchain(self.handle);

        let handle = unsafe { self.loader.create_swapchain(&create_info, None) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to create swapchain: {:?}", e))?;

        let name = self.lifecycle.debug_name();
        let format = params.surface_format.format;
        let (handle, images) = stage_generation(
            handle,
            |handle| self.create_images(handle, format, &name),
            |handle| unsafe { self.loader.destroy_swapchain(handle, None) },
        )?;

        // The old swapchain was retired by the create call above
        self.release_current();
        self.handle = handle;
        self.images = images;
        self.ctx.set_debug_name(handle, &name);

        Ok(Self::snapshot(&params, self.images.len() as u32))
    }

    fn create_images(&self, handle: vk::SwapchainKHR, format: Format, name: &str) -> Result<Vec<SwapchainImage>> {
        let raw_images = unsafe { self.loader.get_swapchain_images(handle) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to get swapchain images: {:?}", e))?;
        raw_images
            .into_iter()
            .enumerate()
            .map(|(i, image)| {
                SwapchainImage::new(Arc::clone(&self.ctx), image, format, &format!("{}_Image{}", name, i))
            })
            .collect()
    }

    fn snapshot(params: &SwapchainParams, image_count: u32) -> SwapchainSnapshot {
        SwapchainSnapshot {
            extent: params.extent,
            present_mode: params.present_mode,
            surface_format: params.surface_format,
            image_count,
        }
    }

    fn release_current(&mut self) {
        self.images.clear();
        if self.handle != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(self.handle, None) };
            self.handle = vk::SwapchainKHR::null();
        }
    }

    /// Acquire the next image, signaling `semaphore`
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<AcquireOutcome> {
        if self.handle == vk::SwapchainKHR::null() {
            return Ok(AcquireOutcome::OutOfDate);
        }
        acquire_outcome(unsafe {
            self.loader.acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null())
        })
    }

    /// Queue `image_index` for presentation once `wait` is signaled
    pub fn present(&self, queue: vk::Queue, image_index: u32, wait: vk::Semaphore) -> Result<PresentOutcome> {
        if self.handle == vk::SwapchainKHR::null() {
            return Ok(PresentOutcome::OutOfDate);
        }
        let wait_semaphores = [wait];
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        present_outcome(unsafe { self.loader.queue_present(queue, &present_info) })
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn images(&self) -> &[SwapchainImage] {
        &self.images
    }

    pub fn vsync(&self) -> bool {
        self.vsync
    }

    /// Number of committed generations
    pub fn version(&self) -> u32 {
        self.lifecycle.version()
    }

    /// Toggle V-Sync; recreates when the value changes
    pub fn set_vsync(&mut self, vsync: bool) -> Result<()> {
        if self.vsync == vsync {
            return Ok(());
        }
        let previous = self.vsync;
        self.vsync = vsync;
        let create_info = self.create_info.clone();
        self.recreate(&create_info).inspect_err(|_| self.vsync = previous)
    }

    /// Change the preferred present mode and recreate
    pub fn set_present_mode(&mut self, present_mode: PresentMode) -> Result<()> {
        let create_info = SwapchainCreateInfo { present_mode, ..self.create_info.clone() };
        self.recreate(&create_info)
    }

    pub fn add_recreate_listener<F>(&mut self, listener: F)
    where
        F: FnMut(&SwapchainDiff) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn current(&self) -> Option<&SwapchainSnapshot> {
        self.lifecycle.current()
    }
}

impl RenderSwapchain for Swapchain {
    fn state(&self) -> SwapchainState {
        self.lifecycle.state()
    }

    fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    fn extent(&self) -> Extent2D {
        self.current().map(|s| s.extent).unwrap_or(Extent2D::new(0, 0))
    }

    fn surface_format(&self) -> SurfaceFormat {
        self.current().map(|s| s.surface_format).unwrap_or(SurfaceFormat::PREFERRED)
    }

    fn present_mode(&self) -> PresentMode {
        self.current().map(|s| s.present_mode).unwrap_or(self.create_info.present_mode)
    }

    fn create_info(&self) -> &SwapchainCreateInfo {
        &self.create_info
    }

    fn recreate(&mut self, create_info: &SwapchainCreateInfo) -> Result<()> {
        self.ctx.wait_idle()?;
        let previous = std::mem::replace(&mut self.create_info, create_info.clone());
        self.rebuild().inspect_err(|_| self.create_info = previous)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.lifecycle.destroy();
        self.release_current();
        unsafe { self.ctx.instance().surface_loader.destroy_surface(self.surface, None) };
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;

/// Window seam for surface creation and resize queries

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CStr;
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::Extent2D;
use ya_engine::engine_error;

/// A presentable window
///
/// The render device keeps the window alive for as long as the surface
/// exists and queries its size on every swapchain recreate.
pub trait WindowBackend: Send + Sync {
    /// Current framebuffer size in pixels (zero when minimized)
    fn window_size(&self) -> Extent2D;

    /// Instance extensions the platform needs to present to this window
    fn required_extensions(&self) -> Result<Vec<String>>;

    /// Create a `VkSurfaceKHR` for this window
    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<vk::SurfaceKHR>;
}

impl WindowBackend for winit::window::Window {
    fn window_size(&self) -> Extent2D {
        let size = self.inner_size();
        Extent2D::new(size.width, size.height)
    }

    fn required_extensions(&self) -> Result<Vec<String>> {
        let display_handle = self.display_handle().map_err(|e| {
            engine_error!("ya::vulkan", "Failed to get display handle: {}", e);
            Error::InitializationFailed(format!("Failed to get display handle: {}", e))
        })?;
        let names = ash_window::enumerate_required_extensions(display_handle.as_raw()).map_err(|e| {
            engine_error!("ya::vulkan", "Failed to get required extensions: {:?}", e);
            Error::InitializationFailed(format!("Failed to get required extensions: {:?}", e))
        })?;

        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
            .collect())
    }

    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<vk::SurfaceKHR> {
        let display_handle = self.display_handle().map_err(|e| {
            engine_error!("ya::vulkan", "Failed to get display handle: {}", e);
            Error::InitializationFailed(format!("Failed to get display handle: {}", e))
        })?;
        let window_handle = self.window_handle().map_err(|e| {
            engine_error!("ya::vulkan", "Failed to get window handle: {}", e);
            Error::InitializationFailed(format!("Failed to get window handle: {}", e))
        })?;

        unsafe {
            ash_window::create_surface(entry, instance, display_handle.as_raw(), window_handle.as_raw(), None)
        }
        .map_err(|e| {
            engine_error!("ya::vulkan", "Failed to create surface: {:?}", e);
            Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
        })
    }
}

/// Owns a surface until the swapchain takes it over
///
/// Must be dropped before the instance that created the surface.
pub(crate) struct SurfaceGuard {
    loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
}

impl SurfaceGuard {
    pub(crate) fn new(loader: &ash::khr::surface::Instance, surface: vk::SurfaceKHR) -> Self {
        Self { loader: loader.clone(), surface }
    }

    pub(crate) fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Hand the surface on; the new owner destroys it
    pub(crate) fn release(mut self) -> vk::SurfaceKHR {
        std::mem::replace(&mut self.surface, vk::SurfaceKHR::null())
    }
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        if self.surface != vk::SurfaceKHR::null() {
            unsafe { self.loader.destroy_surface(self.surface, None) };
        }
    }
}

#[cfg(test)]
#[path = "vulkan_window_tests.rs"]
mod tests;

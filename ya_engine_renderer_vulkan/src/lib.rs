/*!
# YA Engine - Vulkan Render Backend

Vulkan implementation of the ya_engine render device.

This crate brings a Vulkan device up for a window (instance, adapter
selection, logical device, swapchain) and exposes the frame loop through the
`ya_engine::ya::render::Render` trait. Bindings come from Ash, memory from
gpu-allocator and shader reflection from spirq.

# Example

```no_run
use std::sync::Arc;
use ya_engine::ya::render::{FrameStatus, Render, RenderConfig};
use ya_engine_renderer_vulkan::{VulkanRender, WindowBackend};

fn run(window: Arc<dyn WindowBackend>) -> ya_engine::ya::Result<()> {
    let mut render = VulkanRender::new(window, RenderConfig::default())?;
    let mut command_buffers = render.allocate_command_buffers(1)?;
    if let FrameStatus::Ready(token) = render.begin_frame()? {
        // record into command_buffers[0]
        render.end_frame(token, &mut command_buffers)?;
    }
    render.wait_idle()
}
```
*/

// Device bring-up
mod debug;
mod vulkan_format;
mod vulkan_window;
mod vulkan_instance;
mod vulkan_adapter;
mod vulkan_device;
mod vulkan_context;

// Resources
mod vulkan_buffer;
mod vulkan_image;
mod vulkan_descriptor_set;
mod vulkan_shader;
mod vulkan_resource;

// Presentation and recording
mod vulkan_swapchain;
mod vulkan_render_pass;
mod vulkan_pipeline;
mod vulkan_command_buffer;
mod vulkan_frame_sync;
mod vulkan;

pub use vulkan::VulkanRender;
pub use vulkan_window::WindowBackend;
pub use vulkan_instance::VulkanInstance;
pub use vulkan_adapter::{query_surface_support, select_physical_adapter, PhysicalAdapter};
pub use vulkan_device::{LogicalDevice, Queue};
pub use vulkan_context::GpuContext;
pub use vulkan_buffer::Buffer;
pub use vulkan_image::{Image, Sampler, SamplerKind, SwapchainImage};
pub use vulkan_descriptor_set::{
    DescriptorHelper, DescriptorResource, DescriptorSet, DescriptorSetLayout, DescriptorWrite,
};
pub use vulkan_shader::SpirvShaderProcessor;
pub use vulkan_resource::ResourceManager;
pub use vulkan_swapchain::Swapchain;
pub use vulkan_render_pass::{Framebuffer, RenderPass, RenderTargets};
pub use vulkan_pipeline::{Pipeline, PipelineLayout};
pub use vulkan_command_buffer::{CommandBuffer, CommandPool};
pub use vulkan_frame_sync::FrameSyncObjects;

// Re-export debug utilities
pub use debug::{get_validation_stats, print_validation_stats_report};

/// Render module - backend-agnostic device, swapchain and frame model

pub mod format;
pub mod feature;
pub mod adapter;
pub mod device;
pub mod memory;
pub mod image;
pub mod barrier;
pub mod descriptor;
pub mod shader;
pub mod swapchain;
pub mod render_pass;
pub mod pipeline;
pub mod command_buffer;
pub mod frame_sync;
pub mod config;
pub mod render;

#[cfg(test)]
pub mod mock_render;

pub use format::*;
pub use feature::*;
pub use adapter::*;
pub use device::*;
pub use memory::*;
pub use image::*;
pub use barrier::*;
pub use descriptor::*;
pub use shader::*;
pub use swapchain::*;
pub use render_pass::*;
pub use pipeline::*;
pub use command_buffer::*;
pub use frame_sync::*;
pub use config::*;
pub use render::*;

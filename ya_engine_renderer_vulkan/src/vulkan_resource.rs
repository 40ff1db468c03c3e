/// ResourceManager - buffers, images and samplers created against one GpuContext
///
/// Every operation that touches the GPU outside the frame loop (copies,
/// layout transitions, image uploads) runs as a blocking one-shot submission
/// on the graphics queue.

use ash::vk;
use std::sync::Arc;
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::{
    check_range, layout_transition, BufferDesc, BufferUsage, ImageDesc, ImageLayout, ImageUsage, MemoryType,
};
use ya_engine::{engine_debug, engine_trace};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::aspect_to_vk;
use crate::vulkan_image::{record_layout_transition, Image, Sampler, SamplerKind};

/// Check a GPU-side copy of `size` bytes between two buffers
pub(crate) fn validate_copy(
    src_usage: BufferUsage,
    src_size: u64,
    src_offset: u64,
    dst_usage: BufferUsage,
    dst_size: u64,
    dst_offset: u64,
    size: u64,
) -> Result<()> {
    if !src_usage.contains(BufferUsage::TRANSFER_SRC) {
        return Err(Error::InvalidResource("Copy source lacks TRANSFER_SRC usage".to_string()));
    }
    if !dst_usage.contains(BufferUsage::TRANSFER_DST) {
        return Err(Error::InvalidResource("Copy destination lacks TRANSFER_DST usage".to_string()));
    }
    if size == 0 {
        return Err(Error::InvalidResource("Zero-sized buffer copy".to_string()));
    }
    check_range(src_size, src_offset, size)?;
    check_range(dst_size, dst_offset, size)
}

/// Bytes an upload into the first mip level of `desc` must provide
pub(crate) fn image_upload_size(desc: &ImageDesc) -> Result<u64> {
    if !desc.usage.contains(ImageUsage::TRANSFER_DST) {
        return Err(Error::InvalidResource(format!("Image '{}' lacks TRANSFER_DST usage", desc.name)));
    }
    let texel = desc.format.texel_size().ok_or_else(|| {
        Error::InvalidResource(format!("Image '{}': {:?} cannot be uploaded", desc.name, desc.format))
    })?;
    Ok(desc.extent.width as u64 * desc.extent.height as u64 * texel as u64)
}

pub struct ResourceManager {
    ctx: Arc<GpuContext>,
}

impl ResourceManager {
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self { ctx }
    }

    /// Create a buffer, optionally filled with `initial_data`
    ///
    /// Data for device-local memory goes through a temporary staging
    /// buffer; the call looks the same either way.
    pub fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Buffer> {
        let buffer = Buffer::new(Arc::clone(&self.ctx), desc, initial_data)?;
        engine_debug!(
            "ya::vulkan",
            "Buffer '{}' created ({} bytes, {:?}, {:?})",
            desc.name, desc.size, buffer.usage(), desc.memory
        );
        Ok(buffer)
    }

    /// Copy `size` bytes on the GPU and wait for completion
    pub fn copy_buffer(&self, src: &Buffer, src_offset: u64, dst: &Buffer, dst_offset: u64, size: u64) -> Result<()> {
        validate_copy(src.usage(), src.size(), src_offset, dst.usage(), dst.size(), dst_offset, size)?;
        let (src_handle, dst_handle) = (src.handle(), dst.handle());

        self.ctx.one_shot("buffer copy", |device, command_buffer| {
            let region = vk::BufferCopy { src_offset, dst_offset, size };
            unsafe { device.cmd_copy_buffer(command_buffer, src_handle, dst_handle, &[region]) };
            Ok(())
        })
    }

    pub fn create_image(&self, desc: &ImageDesc) -> Result<Image> {
        Image::new(Arc::clone(&self.ctx), desc)
    }

    /// Move `image` to `new_layout` with the barrier the transition table defines
    ///
    /// # Errors
    ///
    /// `Error::UnsupportedLayoutTransition` for a pair without a defined barrier.
    pub fn transition_image_layout(&self, image: &mut Image, new_layout: ImageLayout) -> Result<()> {
        let old_layout = image.layout();
        if old_layout == new_layout {
            return Ok(());
        }
        let transition = layout_transition(old_layout, new_layout, image.format())?;
        let (handle, mip_levels) = (image.handle(), image.desc().mip_levels);

        self.ctx.one_shot("layout transition", |device, command_buffer| {
            record_layout_transition(device, command_buffer, handle, &transition, mip_levels);
            Ok(())
        })?;
        image.set_layout(new_layout);

        engine_trace!("ya::vulkan", "Image '{}': {:?} -> {:?}", image.desc().name, old_layout, new_layout);
        Ok(())
    }

    /// Fill mip level 0 of a freshly created image and leave it shader-readable
    pub fn upload_image(&self, image: &mut Image, data: &[u8]) -> Result<()> {
        let expected = image_upload_size(image.desc())?;
        if data.len() as u64 != expected {
            return Err(Error::InvalidResource(format!(
                "Image '{}' upload: {} bytes given, {} expected",
                image.desc().name, data.len(), expected
            )));
        }

        let to_transfer = layout_transition(image.layout(), ImageLayout::TransferDst, image.format())?;
        let to_shader = layout_transition(ImageLayout::TransferDst, ImageLayout::ShaderReadOnly, image.format())?;

        let staging = Buffer::new(Arc::clone(&self.ctx), &BufferDesc::staging(expected), Some(data))?;
        let (src, dst, mip_levels) = (staging.handle(), image.handle(), image.desc().mip_levels);
        let extent = image.extent();
        let aspect = aspect_to_vk(to_transfer.aspect);

        self.ctx.one_shot("image upload", |device, command_buffer| {
            record_layout_transition(device, command_buffer, dst, &to_transfer, mip_levels);
            let region = vk::BufferImageCopy::default()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: aspect,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_extent(vk::Extent3D { width: extent.width, height: extent.height, depth: 1 });
            unsafe {
                device.cmd_copy_buffer_to_image(
                    command_buffer,
                    src,
                    dst,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }
            record_layout_transition(device, command_buffer, dst, &to_shader, mip_levels);
            Ok(())
        })?;
        image.set_layout(ImageLayout::ShaderReadOnly);

        engine_debug!("ya::vulkan", "Image '{}' uploaded ({} bytes)", image.desc().name, expected);
        Ok(())
    }

    pub fn create_sampler(&self, kind: SamplerKind) -> Result<Sampler> {
        Sampler::new(Arc::clone(&self.ctx), kind)
    }

    pub fn memory_types(&self) -> &[MemoryType] {
        self.ctx.memory_types()
    }
}

#[cfg(test)]
#[path = "vulkan_resource_tests.rs"]
mod tests;

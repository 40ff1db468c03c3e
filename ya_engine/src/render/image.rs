/// Image layouts, aspects, usages and image descriptions

use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::render::{Extent2D, Format, MemoryPropertyFlags, SampleCount};

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents undefined (initial layout)
    Undefined,
    /// Any access, suboptimal
    General,
    /// Color attachment optimal
    ColorAttachment,
    /// Depth/stencil attachment optimal
    DepthStencilAttachment,
    /// Depth/stencil read-only
    DepthStencilReadOnly,
    /// Shader read-only (sampled)
    ShaderReadOnly,
    /// Transfer source
    TransferSrc,
    /// Transfer destination
    TransferDst,
    /// Ready for presentation
    PresentSrc,
}

bitflags! {
    /// Image aspects touched by a view or barrier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspectFlags: u32 {
        const COLOR = 0x1;
        const DEPTH = 0x2;
        const STENCIL = 0x4;
    }
}

impl ImageAspectFlags {
    /// Aspects of a whole image of `format`
    pub fn for_format(format: Format) -> Self {
        if format.is_depth() {
            if format.has_stencil() {
                ImageAspectFlags::DEPTH | ImageAspectFlags::STENCIL
            } else {
                ImageAspectFlags::DEPTH
            }
        } else {
            ImageAspectFlags::COLOR
        }
    }
}

bitflags! {
    /// Image usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 0x1;
        const TRANSFER_DST = 0x2;
        const SAMPLED = 0x4;
        const STORAGE = 0x8;
        const COLOR_ATTACHMENT = 0x10;
        const DEPTH_STENCIL_ATTACHMENT = 0x20;
        const TRANSIENT_ATTACHMENT = 0x40;
        const INPUT_ATTACHMENT = 0x80;
    }
}

/// Owned image creation parameters
#[derive(Debug, Clone)]
pub struct ImageDesc {
    /// Debug name
    pub name: String,
    pub extent: Extent2D,
    pub format: Format,
    pub usage: ImageUsage,
    pub samples: SampleCount,
    pub mip_levels: u32,
    pub memory: MemoryPropertyFlags,
}

impl ImageDesc {
    /// Render-target image for a render pass attachment of `format`
    pub fn attachment(name: impl Into<String>, extent: Extent2D, format: Format, samples: SampleCount) -> Self {
        let usage = if format.is_depth() {
            ImageUsage::DEPTH_STENCIL_ATTACHMENT
        } else {
            ImageUsage::COLOR_ATTACHMENT
        };
        Self {
            name: name.into(),
            extent,
            format,
            usage,
            samples,
            mip_levels: 1,
            memory: MemoryPropertyFlags::DEVICE_LOCAL,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.extent.is_empty() {
            return Err(Error::InvalidResource(format!(
                "Image '{}' has empty extent {}x{}",
                self.name, self.extent.width, self.extent.height
            )));
        }
        if self.mip_levels == 0 {
            return Err(Error::InvalidResource(format!("Image '{}' has zero mip levels", self.name)));
        }
        if self.usage.is_empty() {
            return Err(Error::InvalidResource(format!("Image '{}' has no usage flags", self.name)));
        }
        if self.usage.contains(ImageUsage::DEPTH_STENCIL_ATTACHMENT) && !self.format.is_depth() {
            return Err(Error::InvalidResource(format!(
                "Image '{}': depth attachment usage with color format {:?}",
                self.name, self.format
            )));
        }
        Ok(())
    }
}

/// Pipeline stages, access masks and the image layout transition table
///
/// Only layout pairs listed in `layout_transition` have defined barrier
/// semantics. Anything else is rejected rather than guessed.

use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::render::{Format, ImageAspectFlags, ImageLayout};

bitflags! {
    /// Pipeline stage flags (Vulkan bit values)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStageFlags: u32 {
        const TOP_OF_PIPE = 0x1;
        const DRAW_INDIRECT = 0x2;
        const VERTEX_INPUT = 0x4;
        const VERTEX_SHADER = 0x8;
        const GEOMETRY_SHADER = 0x40;
        const FRAGMENT_SHADER = 0x80;
        const EARLY_FRAGMENT_TESTS = 0x100;
        const LATE_FRAGMENT_TESTS = 0x200;
        const COLOR_ATTACHMENT_OUTPUT = 0x400;
        const COMPUTE_SHADER = 0x800;
        const TRANSFER = 0x1000;
        const BOTTOM_OF_PIPE = 0x2000;
        const HOST = 0x4000;
        const ALL_GRAPHICS = 0x8000;
        const ALL_COMMANDS = 0x10000;
    }
}

bitflags! {
    /// Memory access flags (Vulkan bit values)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const INDIRECT_COMMAND_READ = 0x1;
        const INDEX_READ = 0x2;
        const VERTEX_ATTRIBUTE_READ = 0x4;
        const UNIFORM_READ = 0x8;
        const INPUT_ATTACHMENT_READ = 0x10;
        const SHADER_READ = 0x20;
        const SHADER_WRITE = 0x40;
        const COLOR_ATTACHMENT_READ = 0x80;
        const COLOR_ATTACHMENT_WRITE = 0x100;
        const DEPTH_STENCIL_ATTACHMENT_READ = 0x200;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 0x400;
        const TRANSFER_READ = 0x800;
        const TRANSFER_WRITE = 0x1000;
        const HOST_READ = 0x2000;
        const HOST_WRITE = 0x4000;
        const MEMORY_READ = 0x8000;
        const MEMORY_WRITE = 0x10000;
    }
}

/// Barrier parameters for one layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub src_stage: PipelineStageFlags,
    pub dst_stage: PipelineStageFlags,
    pub aspect: ImageAspectFlags,
}

/// Barrier masks for `old -> new` on an image of `format`
///
/// # Errors
///
/// `Error::UnsupportedLayoutTransition` for pairs without a known mapping.
pub fn layout_transition(old: ImageLayout, new: ImageLayout, format: Format) -> Result<LayoutTransition> {
    let (src_access, dst_access, src_stage, dst_stage) = match (old, new) {
        (ImageLayout::Undefined, ImageLayout::TransferDst) => (
            AccessFlags::empty(),
            AccessFlags::TRANSFER_WRITE,
            PipelineStageFlags::TOP_OF_PIPE,
            PipelineStageFlags::TRANSFER,
        ),
        (ImageLayout::TransferDst, ImageLayout::ShaderReadOnly) => (
            AccessFlags::TRANSFER_WRITE,
            AccessFlags::SHADER_READ,
            PipelineStageFlags::TRANSFER,
            PipelineStageFlags::FRAGMENT_SHADER,
        ),
        (ImageLayout::Undefined, ImageLayout::DepthStencilAttachment) => (
            AccessFlags::empty(),
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            PipelineStageFlags::TOP_OF_PIPE,
            PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        ),
        (ImageLayout::Undefined, ImageLayout::ColorAttachment) => (
            AccessFlags::empty(),
            AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
            PipelineStageFlags::TOP_OF_PIPE,
            PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ),
        (ImageLayout::ColorAttachment, ImageLayout::ShaderReadOnly) => (
            AccessFlags::COLOR_ATTACHMENT_WRITE,
            AccessFlags::SHADER_READ,
            PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            PipelineStageFlags::FRAGMENT_SHADER,
        ),
        _ => {
            crate::engine_error!("ya::Barrier", "Unsupported layout transition {:?} -> {:?}", old, new);
            return Err(Error::UnsupportedLayoutTransition { old, new });
        }
    };

    let aspect = if new == ImageLayout::DepthStencilAttachment {
        if format.has_stencil() {
            ImageAspectFlags::DEPTH | ImageAspectFlags::STENCIL
        } else {
            ImageAspectFlags::DEPTH
        }
    } else {
        ImageAspectFlags::for_format(format)
    };

    Ok(LayoutTransition {
        old_layout: old,
        new_layout: new,
        src_access,
        dst_access,
        src_stage,
        dst_stage,
        aspect,
    })
}

#[cfg(test)]
#[path = "barrier_tests.rs"]
mod tests;

/// Render pass description, validation and default synthesis
///
/// A `RenderPassDesc` is validated completely before any GPU object exists.

use crate::error::{Error, Result};
use crate::render::{AccessFlags, Format, ImageLayout, PipelineStageFlags, SampleCount};

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    /// Load previous contents
    Load,
    /// Clear to a value
    Clear,
    /// Contents undefined
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// Store contents
    Store,
    /// Contents may be discarded
    DontCare,
}

/// One attachment of a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentDesc {
    pub format: Format,
    pub samples: SampleCount,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

impl AttachmentDesc {
    /// Presented color attachment: cleared, stored, ends in `PresentSrc`
    pub fn presented_color(format: Format) -> Self {
        Self {
            format,
            samples: SampleCount::S1,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::PresentSrc,
        }
    }

    /// Depth attachment: cleared, discarded after the pass
    pub fn depth(format: Format) -> Self {
        Self {
            format,
            samples: SampleCount::S1,
            load_op: LoadOp::Clear,
            store_op: StoreOp::DontCare,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::DepthStencilAttachment,
        }
    }
}

/// Reference from a subpass into the attachment list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentRef {
    pub attachment: u32,
    pub layout: ImageLayout,
}

/// One subpass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubpassDesc {
    pub color_attachments: Vec<AttachmentRef>,
    pub depth_stencil_attachment: Option<AttachmentRef>,
    pub input_attachments: Vec<AttachmentRef>,
    pub resolve_attachment: Option<AttachmentRef>,
}

impl SubpassDesc {
    fn references(&self) -> impl Iterator<Item = &AttachmentRef> + '_ {
        self.color_attachments
            .iter()
            .chain(self.depth_stencil_attachment.iter())
            .chain(self.input_attachments.iter())
            .chain(self.resolve_attachment.iter())
    }
}

/// Endpoint of a subpass dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubpassRef {
    /// Work outside the render pass
    External,
    Index(u32),
}

/// Execution/memory dependency between subpasses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubpassDependency {
    pub src_subpass: SubpassRef,
    pub dst_subpass: SubpassRef,
    pub src_stage_mask: PipelineStageFlags,
    pub dst_stage_mask: PipelineStageFlags,
    pub src_access_mask: AccessFlags,
    pub dst_access_mask: AccessFlags,
    pub by_region: bool,
}

/// Render pass description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderPassDesc {
    pub attachments: Vec<AttachmentDesc>,
    pub subpasses: Vec<SubpassDesc>,
    pub dependencies: Vec<SubpassDependency>,
}

/// Attachment shape of a render pass: what pipelines built against it depend on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderPassShape {
    pub attachment_formats: Vec<Format>,
    pub attachment_samples: Vec<SampleCount>,
    pub subpass_color_counts: Vec<u32>,
    pub subpass_has_depth: Vec<bool>,
}

impl RenderPassDesc {
    /// Nothing declared at all
    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty() && self.subpasses.is_empty() && self.dependencies.is_empty()
    }

    /// Minimal pass: one presented color attachment, one subpass, no depth
    pub fn default_for(format: Format) -> Self {
        Self {
            attachments: vec![AttachmentDesc::presented_color(format)],
            subpasses: vec![SubpassDesc {
                color_attachments: vec![AttachmentRef {
                    attachment: 0,
                    layout: ImageLayout::ColorAttachment,
                }],
                ..Default::default()
            }],
            dependencies: vec![SubpassDependency {
                src_subpass: SubpassRef::External,
                dst_subpass: SubpassRef::Index(0),
                src_stage_mask: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                dst_stage_mask: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                src_access_mask: AccessFlags::empty(),
                dst_access_mask: AccessFlags::COLOR_ATTACHMENT_WRITE,
                by_region: false,
            }],
        }
    }

    /// The description to build: `self`, or the minimal default pass when empty
    pub fn resolve(&self, swapchain_format: Format) -> RenderPassDesc {
        if self.is_empty() {
            crate::engine_warn!(
                "ya::RenderPass",
                "Empty render pass description, using the minimal color-only pass ({:?})",
                swapchain_format
            );
            Self::default_for(swapchain_format)
        } else {
            self.clone()
        }
    }

    /// Check every reference before any GPU object is created
    ///
    /// # Errors
    ///
    /// - `Error::InvalidAttachmentReference` when a subpass references an index >= attachment count
    /// - `Error::InvalidResource` when attachments, subpasses or dependencies are missing, or a
    ///   dependency names a subpass that does not exist
    pub fn validate(&self) -> Result<()> {
        if self.attachments.is_empty() {
            return Err(Error::InvalidResource("Render pass declares no attachment".to_string()));
        }
        if self.subpasses.is_empty() {
            return Err(Error::InvalidResource("Render pass declares no subpass".to_string()));
        }
        if self.dependencies.is_empty() {
            return Err(Error::InvalidResource("Render pass declares no dependency".to_string()));
        }

        let attachment_count = self.attachments.len() as u32;
        for (subpass, desc) in self.subpasses.iter().enumerate() {
            if let Some(bad) = desc.references().find(|r| r.attachment >= attachment_count) {
                crate::engine_error!(
                    "ya::RenderPass",
                    "Subpass {} references attachment {} (only {} declared)",
                    subpass, bad.attachment, attachment_count
                );
                return Err(Error::InvalidAttachmentReference {
                    subpass: subpass as u32,
                    index: bad.attachment,
                    attachment_count,
                });
            }
        }

        let subpass_count = self.subpasses.len() as u32;
        for (i, dependency) in self.dependencies.iter().enumerate() {
            for endpoint in [dependency.src_subpass, dependency.dst_subpass] {
                if let SubpassRef::Index(index) = endpoint {
                    if index >= subpass_count {
                        return Err(Error::InvalidResource(format!(
                            "Dependency {} references subpass {} (only {} declared)",
                            i, index, subpass_count
                        )));
                    }
                }
            }
            if dependency.src_subpass == SubpassRef::External && dependency.dst_subpass == SubpassRef::External {
                return Err(Error::InvalidResource(format!(
                    "Dependency {} is external on both ends",
                    i
                )));
            }
        }

        Ok(())
    }

    /// The first attachment is the presented one and must match the swapchain format
    pub fn check_swapchain_format(&self, swapchain_format: Format) -> Result<()> {
        match self.attachments.first() {
            Some(first) if first.format != swapchain_format => {
                crate::engine_error!(
                    "ya::RenderPass",
                    "Attachment 0 format {:?} differs from swapchain format {:?}",
                    first.format, swapchain_format
                );
                Err(Error::UnsupportedSurfaceFormat(format!(
                    "render pass attachment 0 uses {:?}, swapchain uses {:?}",
                    first.format, swapchain_format
                )))
            }
            _ => Ok(()),
        }
    }

    /// Copy with the presented attachment switched to `swapchain_format`
    pub fn with_swapchain_format(&self, swapchain_format: Format) -> RenderPassDesc {
        let mut desc = self.clone();
        if let Some(first) = desc.attachments.first_mut() {
            first.format = swapchain_format;
        }
        desc
    }

    /// Number of color attachments of `subpass`
    pub fn color_attachment_count(&self, subpass: u32) -> Option<u32> {
        self.subpasses
            .get(subpass as usize)
            .map(|desc| desc.color_attachments.len() as u32)
    }

    pub fn shape(&self) -> RenderPassShape {
        RenderPassShape {
            attachment_formats: self.attachments.iter().map(|a| a.format).collect(),
            attachment_samples: self.attachments.iter().map(|a| a.samples).collect(),
            subpass_color_counts: self.subpasses.iter().map(|s| s.color_attachments.len() as u32).collect(),
            subpass_has_depth: self.subpasses.iter().map(|s| s.depth_stencil_attachment.is_some()).collect(),
        }
    }
}

#[cfg(test)]
#[path = "render_pass_tests.rs"]
mod tests;

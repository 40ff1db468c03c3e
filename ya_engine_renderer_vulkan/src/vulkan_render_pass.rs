/// RenderPass - validated render pass, framebuffers and render targets
///
/// A description is validated completely before `vkCreateRenderPass`, so an
/// invalid reference never leaves a half-built pass behind. Recreating the
/// pass bumps its generation only when the attachment shape changes; pipelines
/// compare generations to know when they must be rebuilt.

use ash::vk;
use std::sync::Arc;
use ya_engine::ya::Result;
use ya_engine::ya::render::{
    Extent2D, ImageDesc, ImageUsage, RenderPassDesc, RenderPassShape, SubpassDesc, Swapchain as RenderSwapchain,
};
use ya_engine::{engine_debug, engine_err, engine_info};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    access_flags_to_vk, extent_to_vk, format_to_vk, image_layout_to_vk, load_op_to_vk, sample_count_to_vk,
    stage_flags_to_vk, store_op_to_vk, subpass_ref_to_vk,
};
use crate::vulkan_image::Image;
use crate::vulkan_swapchain::Swapchain;

/// Attachment references of one subpass, kept alive while the pass is created
#[derive(Debug, Default)]
pub(crate) struct SubpassRefs {
    pub color: Vec<vk::AttachmentReference>,
    pub depth_stencil: Option<vk::AttachmentReference>,
    pub input: Vec<vk::AttachmentReference>,
    /// Empty, or exactly one entry per color attachment
    pub resolve: Vec<vk::AttachmentReference>,
}

pub(crate) fn subpass_refs(subpass: &SubpassDesc) -> SubpassRefs {
    let to_vk = |r: &ya_engine::ya::render::AttachmentRef| vk::AttachmentReference {
        attachment: r.attachment,
        layout: image_layout_to_vk(r.layout),
    };
    let color: Vec<_> = subpass.color_attachments.iter().map(to_vk).collect();

    // Only the first color attachment resolves; the others are marked unused
    let resolve = match &subpass.resolve_attachment {
        Some(resolve) if !color.is_empty() => {
            let mut refs = vec![
                vk::AttachmentReference {
                    attachment: vk::ATTACHMENT_UNUSED,
                    layout: vk::ImageLayout::UNDEFINED,
                };
                color.len()
            ];
            refs[0] = to_vk(resolve);
            refs
        }
        _ => Vec::new(),
    };

    SubpassRefs {
        color,
        depth_stencil: subpass.depth_stencil_attachment.as_ref().map(to_vk),
        input: subpass.input_attachments.iter().map(to_vk).collect(),
        resolve,
    }
}

/// Usage for the renderer-owned image backing attachment `index`
pub(crate) fn attachment_usage(desc: &RenderPassDesc, index: u32) -> ImageUsage {
    let mut usage = ImageUsage::empty();
    for subpass in &desc.subpasses {
        if subpass.color_attachments.iter().any(|r| r.attachment == index)
            || subpass.resolve_attachment.is_some_and(|r| r.attachment == index)
        {
            usage |= ImageUsage::COLOR_ATTACHMENT;
        }
        if subpass.depth_stencil_attachment.is_some_and(|r| r.attachment == index) {
            usage |= ImageUsage::DEPTH_STENCIL_ATTACHMENT;
        }
        if subpass.input_attachments.iter().any(|r| r.attachment == index) {
            usage |= ImageUsage::INPUT_ATTACHMENT;
        }
    }
    usage
}

fn create_handle(ctx: &GpuContext, desc: &RenderPassDesc) -> Result<vk::RenderPass> {
    let attachments: Vec<vk::AttachmentDescription> = desc
        .attachments
        .iter()
        .map(|a| {
            vk::AttachmentDescription::default()
                .format(format_to_vk(a.format))
                .samples(sample_count_to_vk(a.samples))
                .load_op(load_op_to_vk(a.load_op))
                .store_op(store_op_to_vk(a.store_op))
                .stencil_load_op(load_op_to_vk(a.stencil_load_op))
                .stencil_store_op(store_op_to_vk(a.stencil_store_op))
                .initial_layout(image_layout_to_vk(a.initial_layout))
                .final_layout(image_layout_to_vk(a.final_layout))
        })
        .collect();

    let refs: Vec<SubpassRefs> = desc.subpasses.iter().map(subpass_refs).collect();
    let subpasses: Vec<vk::SubpassDescription> = refs
        .iter()
        .map(|r| {
            let mut subpass = vk::SubpassDescription::default()
                .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                .input_attachments(&r.input);
            if !r.resolve.is_empty() {
                subpass = subpass.resolve_attachments(&r.resolve);
            }
            subpass = subpass.color_attachments(&r.color);
            if let Some(depth) = &r.depth_stencil {
                subpass = subpass.depth_stencil_attachment(depth);
            }
            subpass
        })
        .collect();

    let dependencies: Vec<vk::SubpassDependency> = desc
        .dependencies
        .iter()
        .map(|d| vk::SubpassDependency {
            src_subpass: subpass_ref_to_vk(d.src_subpass),
            dst_subpass: subpass_ref_to_vk(d.dst_subpass),
            src_stage_mask: stage_flags_to_vk(d.src_stage_mask),
            dst_stage_mask: stage_flags_to_vk(d.dst_stage_mask),
            src_access_mask: access_flags_to_vk(d.src_access_mask),
            dst_access_mask: access_flags_to_vk(d.dst_access_mask),
            dependency_flags: if d.by_region {
                vk::DependencyFlags::BY_REGION
            } else {
                vk::DependencyFlags::empty()
            },
        })
        .collect();

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe { ctx.device().create_render_pass(&create_info, None) }
        .map_err(|e| engine_err!("ya::vulkan", "Failed to create render pass: {:?}", e))
}

pub struct RenderPass {
    ctx: Arc<GpuContext>,
    handle: vk::RenderPass,
    desc: RenderPassDesc,
    shape: RenderPassShape,
    generation: u64,
}

impl RenderPass {
    /// # Errors
    ///
    /// Validation errors from `RenderPassDesc::validate`, before any GPU call.
    pub fn new(ctx: Arc<GpuContext>, desc: &RenderPassDesc) -> Result<Self> {
        desc.validate()?;
        let handle = create_handle(&ctx, desc)?;
        ctx.set_debug_name(handle, "RenderPass_0");

        engine_info!(
            "ya::vulkan",
            "Render pass created: {} attachment(s), {} subpass(es), {} dependency(ies)",
            desc.attachments.len(), desc.subpasses.len(), desc.dependencies.len()
        );

        Ok(Self { ctx, handle, desc: desc.clone(), shape: desc.shape(), generation: 0 })
    }

    /// Replace the pass with one built from `desc`
    ///
    /// Waits for the device to go idle before destroying the old handle.
    /// Returns `true` when the attachment shape changed, meaning every
    /// pipeline built against the old pass must be recreated.
    pub fn recreate(&mut self, desc: &RenderPassDesc) -> Result<bool> {
        desc.validate()?;
        self.ctx.wait_idle()?;

        let handle = create_handle(&self.ctx, desc)?;
        unsafe { self.ctx.device().destroy_render_pass(self.handle, None) };
        self.handle = handle;

        let shape = desc.shape();
        let shape_changed = shape != self.shape;
        if shape_changed {
            self.generation += 1;
        }
        self.ctx.set_debug_name(handle, &format!("RenderPass_{}", self.generation));
        self.desc = desc.clone();
        self.shape = shape;

        engine_debug!(
            "ya::vulkan",
            "Render pass recreated (generation {}, shape {})",
            self.generation,
            if shape_changed { "changed" } else { "unchanged" }
        );
        Ok(shape_changed)
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }

    pub fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }

    pub fn shape(&self) -> &RenderPassShape {
        &self.shape
    }

    /// Incremented whenever a recreate changes the attachment shape
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe { self.ctx.device().destroy_render_pass(self.handle, None) };
    }
}

pub struct Framebuffer {
    ctx: Arc<GpuContext>,
    handle: vk::Framebuffer,
    extent: Extent2D,
}

impl Framebuffer {
    pub fn new(
        ctx: Arc<GpuContext>,
        render_pass: &RenderPass,
        views: &[vk::ImageView],
        extent: Extent2D,
        name: &str,
    ) -> Result<Self> {
        let vk_extent = extent_to_vk(extent);
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(views)
            .width(vk_extent.width)
            .height(vk_extent.height)
            .layers(1);

        let handle = unsafe { ctx.device().create_framebuffer(&create_info, None) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to create framebuffer '{}': {:?}", name, e))?;
        ctx.set_debug_name(handle, name);

        Ok(Self { ctx, handle, extent })
    }

    pub fn handle(&self) -> vk::Framebuffer {
        self.handle
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe { self.ctx.device().destroy_framebuffer(self.handle, None) };
    }
}

/// One framebuffer per swapchain image, plus renderer-owned images for
/// every attachment after the presented one
pub struct RenderTargets {
    // Framebuffers go before the images they reference
    framebuffers: Vec<Framebuffer>,
    attachments: Vec<Image>,
    extent: Extent2D,
}

impl RenderTargets {
    pub fn empty() -> Self {
        Self { framebuffers: Vec::new(), attachments: Vec::new(), extent: Extent2D::new(0, 0) }
    }

    /// Build targets for the current swapchain generation; empty when it has no images
    pub fn build(ctx: &Arc<GpuContext>, render_pass: &RenderPass, swapchain: &Swapchain) -> Result<Self> {
        let images = swapchain.images();
        if images.is_empty() {
            return Ok(Self::empty());
        }
        let extent = swapchain.extent();
        let desc = render_pass.desc();

        let attachments = desc
            .attachments
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, attachment)| {
                let mut image_desc = ImageDesc::attachment(
                    format!("RenderTarget_Attachment{}", index),
                    extent,
                    attachment.format,
                    attachment.samples,
                );
                image_desc.usage |= attachment_usage(desc, index as u32);
                Image::new(Arc::clone(ctx), &image_desc)
            })
            .collect::<Result<Vec<_>>>()?;

        let framebuffers = images
            .iter()
            .enumerate()
            .map(|(i, image)| {
                let views: Vec<vk::ImageView> = std::iter::once(image.view())
                    .chain(attachments.iter().map(|a| a.view()))
                    .collect();
                Framebuffer::new(Arc::clone(ctx), render_pass, &views, extent, &format!("Framebuffer_{}", i))
            })
            .collect::<Result<Vec<_>>>()?;

        engine_debug!(
            "ya::vulkan",
            "Render targets built: {} framebuffer(s), {} owned attachment(s), {}x{}",
            framebuffers.len(), attachments.len(), extent.width, extent.height
        );

        Ok(Self { framebuffers, attachments, extent })
    }

    pub fn framebuffer(&self, image_index: u32) -> Option<&Framebuffer> {
        self.framebuffers.get(image_index as usize)
    }

    pub fn framebuffers(&self) -> &[Framebuffer] {
        &self.framebuffers
    }

    /// Renderer-owned images, in attachment order starting at attachment 1
    pub fn attachments(&self) -> &[Image] {
        &self.attachments
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }
}

#[cfg(test)]
#[path = "vulkan_render_pass_tests.rs"]
mod tests;

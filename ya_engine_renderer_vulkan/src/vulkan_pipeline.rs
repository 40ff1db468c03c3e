/// Pipeline - pipeline layouts and graphics pipelines
///
/// A pipeline is bound to one render pass and subpass. It records the
/// render pass generation it was built against and is rebuilt, never
/// patched, once that generation moves. Shader modules only live for the
/// duration of a build.

use ash::vk;
use std::sync::Arc;
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::{
    ColorBlendAttachment, DynamicState, GraphicsPipelineDesc, PipelineLayoutDesc, Rect2D, ShaderBinaries,
    ShaderProcessor, ShaderStage, VertexInputMode, VertexLayout, Viewport,
};
use ya_engine::{engine_debug, engine_err, engine_info};

use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_set::DescriptorSetLayout;
use crate::vulkan_format::{
    blend_factor_to_vk, blend_op_to_vk, color_write_mask_to_vk, compare_op_to_vk, cull_mode_to_vk,
    dynamic_state_to_vk, front_face_to_vk, input_rate_to_vk, polygon_mode_to_vk, rect_to_vk, sample_count_to_vk,
    shader_stage_to_vk, shader_stages_to_vk, stencil_state_to_vk, topology_to_vk, vertex_format_to_vk,
    viewport_to_vk,
};
use crate::vulkan_render_pass::RenderPass;

const ENTRY_POINT: &std::ffi::CStr = c"main";

pub(crate) fn blend_attachment_to_vk(blend: &ColorBlendAttachment) -> vk::PipelineColorBlendAttachmentState {
    let mut attachment = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(color_write_mask_to_vk(blend.color_write_mask))
        .blend_enable(blend.blend_enable);
    if blend.blend_enable {
        attachment = attachment
            .src_color_blend_factor(blend_factor_to_vk(blend.src_color_factor))
            .dst_color_blend_factor(blend_factor_to_vk(blend.dst_color_factor))
            .color_blend_op(blend_op_to_vk(blend.color_blend_op))
            .src_alpha_blend_factor(blend_factor_to_vk(blend.src_alpha_factor))
            .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst_alpha_factor))
            .alpha_blend_op(blend_op_to_vk(blend.alpha_blend_op));
    }
    attachment
}

pub(crate) fn vertex_input_to_vk(
    layout: &VertexLayout,
) -> (Vec<vk::VertexInputBindingDescription>, Vec<vk::VertexInputAttributeDescription>) {
    let bindings = layout
        .bindings
        .iter()
        .map(|binding| vk::VertexInputBindingDescription {
            binding: binding.binding,
            stride: binding.stride,
            input_rate: input_rate_to_vk(binding.input_rate),
        })
        .collect();
    let attributes = layout
        .attributes
        .iter()
        .map(|attribute| vk::VertexInputAttributeDescription {
            location: attribute.location,
            binding: attribute.binding,
            format: vertex_format_to_vk(attribute.format),
            offset: attribute.offset,
        })
        .collect();
    (bindings, attributes)
}

/// Graphics stages of `binaries`, in pipeline order
///
/// # Errors
///
/// `Error::InvalidResource` when there is no vertex stage.
pub(crate) fn graphics_stages<'a>(shader: &str, binaries: &'a ShaderBinaries) -> Result<Vec<(ShaderStage, &'a [u32])>> {
    if !binaries.contains_key(&ShaderStage::Vertex) {
        return Err(Error::InvalidResource(format!("Shader '{}' has no vertex stage", shader)));
    }
    Ok(binaries
        .iter()
        .filter(|(stage, _)| **stage != ShaderStage::Compute)
        .map(|(stage, code)| (*stage, code.as_slice()))
        .collect())
}

/// Static viewport and scissor, or placeholders when they are dynamic
pub(crate) fn viewport_state(desc: &GraphicsPipelineDesc) -> (Viewport, Rect2D) {
    let viewport = match desc.viewport {
        Some(viewport) if !desc.is_dynamic(DynamicState::Viewport) => viewport,
        _ => Viewport { x: 0.0, y: 0.0, width: 1.0, height: 1.0, min_depth: 0.0, max_depth: 1.0 },
    };
    let scissor = match desc.scissor {
        Some(scissor) if !desc.is_dynamic(DynamicState::Scissor) => scissor,
        _ => Rect2D { x: 0, y: 0, width: 1, height: 1 },
    };
    (viewport, scissor)
}

/// Shader modules destroyed as soon as the pipeline build returns
struct TransientModules<'a> {
    device: &'a ash::Device,
    modules: Vec<vk::ShaderModule>,
}

impl Drop for TransientModules<'_> {
    fn drop(&mut self) {
        for module in self.modules.drain(..) {
            unsafe { self.device.destroy_shader_module(module, None) };
        }
    }
}

// ===== PIPELINE LAYOUT =====

pub struct PipelineLayout {
    ctx: Arc<GpuContext>,
    handle: vk::PipelineLayout,
    // Destroyed after the pipeline layout
    set_layouts: Vec<DescriptorSetLayout>,
    desc: PipelineLayoutDesc,
}

impl PipelineLayout {
    pub fn new(ctx: Arc<GpuContext>, desc: &PipelineLayoutDesc) -> Result<Self> {
        desc.validate()?;

        let set_layouts = desc
            .set_layouts
            .iter()
            .map(|set| DescriptorSetLayout::new(Arc::clone(&ctx), set))
            .collect::<Result<Vec<_>>>()?;
        let set_handles: Vec<vk::DescriptorSetLayout> = set_layouts.iter().map(|set| set.handle()).collect();

        let push_constant_ranges: Vec<vk::PushConstantRange> = desc
            .push_constant_ranges
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: shader_stages_to_vk(range.stages),
                offset: range.offset,
                size: range.size,
            })
            .collect();

        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_handles)
            .push_constant_ranges(&push_constant_ranges);

        let handle = unsafe { ctx.device().create_pipeline_layout(&create_info, None) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to create pipeline layout: {:?}", e))?;

        Ok(Self { ctx, handle, set_layouts, desc: desc.clone() })
    }

    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }

    /// Descriptor set layouts, in set index order
    pub fn set_layouts(&self) -> &[DescriptorSetLayout] {
        &self.set_layouts
    }

    pub fn desc(&self) -> &PipelineLayoutDesc {
        &self.desc
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe { self.ctx.device().destroy_pipeline_layout(self.handle, None) };
    }
}

// ===== GRAPHICS PIPELINE =====

pub struct Pipeline {
    ctx: Arc<GpuContext>,
    /// Null between a teardown and a failed rebuild
    handle: vk::Pipeline,
    layout: Arc<PipelineLayout>,
    desc: GraphicsPipelineDesc,
    vertex_layout: VertexLayout,
    render_pass_generation: u64,
}

impl Pipeline {
    /// Build a graphics pipeline for `desc.subpass` of `render_pass`
    ///
    /// # Errors
    ///
    /// Description errors (subpass, blend count, vertex layout, static
    /// viewport) are reported before any shader is loaded.
    pub fn new(
        ctx: Arc<GpuContext>,
        shaders: &dyn ShaderProcessor,
        layout: Arc<PipelineLayout>,
        render_pass: &RenderPass,
        desc: &GraphicsPipelineDesc,
    ) -> Result<Self> {
        let (handle, vertex_layout) = build(&ctx, shaders, &layout, render_pass, desc)?;

        engine_info!(
            "ya::vulkan",
            "Pipeline '{}' created (shader '{}', subpass {}, {} vertex attribute(s))",
            desc.name, desc.shader, desc.subpass, vertex_layout.attributes.len()
        );

        Ok(Self {
            ctx,
            handle,
            layout,
            desc: desc.clone(),
            vertex_layout,
            render_pass_generation: render_pass.generation(),
        })
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    pub fn layout(&self) -> &PipelineLayout {
        &self.layout
    }

    pub fn desc(&self) -> &GraphicsPipelineDesc {
        &self.desc
    }

    /// Vertex layout the pipeline was built with (explicit or derived)
    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    pub fn render_pass_generation(&self) -> u64 {
        self.render_pass_generation
    }

    /// True when `render_pass` changed shape since this pipeline was built
    pub fn is_stale(&self, render_pass: &RenderPass) -> bool {
        self.handle == vk::Pipeline::null() || self.render_pass_generation != render_pass.generation()
    }

    /// Tear the pipeline down and rebuild it against `render_pass`
    ///
    /// The description is revalidated against the new pass first; a
    /// description that no longer fits leaves the current pipeline intact.
    pub fn recreate(&mut self, shaders: &dyn ShaderProcessor, render_pass: &RenderPass) -> Result<()> {
        self.desc.validate(render_pass.desc())?;
        self.ctx.wait_idle()?;

        if self.handle != vk::Pipeline::null() {
            unsafe { self.ctx.device().destroy_pipeline(self.handle, None) };
            self.handle = vk::Pipeline::null();
        }

        let (handle, vertex_layout) = build(&self.ctx, shaders, &self.layout, render_pass, &self.desc)?;
        self.handle = handle;
        self.vertex_layout = vertex_layout;
        self.render_pass_generation = render_pass.generation();

        engine_debug!(
            "ya::vulkan",
            "Pipeline '{}' recreated for render pass generation {}",
            self.desc.name, self.render_pass_generation
        );
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("handle", &self.handle)
            .field("desc", &self.desc)
            .field("vertex_layout", &self.vertex_layout)
            .field("render_pass_generation", &self.render_pass_generation)
            .finish_non_exhaustive()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.handle != vk::Pipeline::null() {
            unsafe { self.ctx.device().destroy_pipeline(self.handle, None) };
        }
    }
}

fn build(
    ctx: &GpuContext,
    shaders: &dyn ShaderProcessor,
    layout: &PipelineLayout,
    render_pass: &RenderPass,
    desc: &GraphicsPipelineDesc,
) -> Result<(vk::Pipeline, VertexLayout)> {
    desc.validate(render_pass.desc())?;

    let binaries = shaders.process(&desc.shader)?;
    let stages = graphics_stages(&desc.shader, &binaries)?;

    let vertex_reflection = match desc.vertex_input {
        VertexInputMode::FromShader => {
            let code = binaries.get(&ShaderStage::Vertex).map(|code| code.as_slice()).unwrap_or(&[]);
            Some(shaders.reflect(ShaderStage::Vertex, code)?)
        }
        VertexInputMode::Explicit(_) => None,
    };
    let vertex_layout = desc.resolve_vertex_layout(vertex_reflection.as_ref())?;

    let device = ctx.device();
    let mut modules = TransientModules { device, modules: Vec::with_capacity(stages.len()) };
    let mut stage_infos = Vec::with_capacity(stages.len());
    for (stage, code) in &stages {
        let module_info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe { device.create_shader_module(&module_info, None) }.map_err(|e| {
            engine_err!("ya::vulkan", "Failed to create {:?} shader module for '{}': {:?}", stage, desc.shader, e)
        })?;
        modules.modules.push(module);
        stage_infos.push(
            vk::PipelineShaderStageCreateInfo::default()
                .stage(shader_stage_to_vk(*stage))
                .module(module)
                .name(ENTRY_POINT),
        );
    }

    let (vertex_bindings, vertex_attributes) = vertex_input_to_vk(&vertex_layout);
    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&vertex_bindings)
        .vertex_attribute_descriptions(&vertex_attributes);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(topology_to_vk(desc.topology))
        .primitive_restart_enable(false);

    let (viewport, scissor) = viewport_state(desc);
    let viewports = [viewport_to_vk(viewport)];
    let scissors = [rect_to_vk(scissor)];
    let viewport_info = vk::PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let rasterization = &desc.rasterization;
    let mut rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(polygon_mode_to_vk(rasterization.polygon_mode))
        .line_width(rasterization.line_width)
        .cull_mode(cull_mode_to_vk(rasterization.cull_mode))
        .front_face(front_face_to_vk(rasterization.front_face));
    if let Some(bias) = rasterization.depth_bias {
        rasterization_state = rasterization_state
            .depth_bias_enable(true)
            .depth_bias_constant_factor(bias.constant_factor)
            .depth_bias_slope_factor(bias.slope_factor)
            .depth_bias_clamp(bias.clamp);
    }

    let depth_stencil = &desc.depth_stencil;
    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(depth_stencil.depth_test_enable)
        .depth_write_enable(depth_stencil.depth_write_enable)
        .depth_compare_op(compare_op_to_vk(depth_stencil.depth_compare_op))
        .depth_bounds_test_enable(false)
        .stencil_test_enable(depth_stencil.stencil_test_enable)
        .front(stencil_state_to_vk(&depth_stencil.front))
        .back(stencil_state_to_vk(&depth_stencil.back));

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(sample_count_to_vk(desc.multisample.sample_count))
        .alpha_to_coverage_enable(desc.multisample.alpha_to_coverage);

    let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> =
        desc.color_blend.attachments.iter().map(blend_attachment_to_vk).collect();
    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&blend_attachments)
        .blend_constants(desc.color_blend.blend_constants);

    let dynamic_states: Vec<vk::DynamicState> = desc.dynamic_states.iter().map(|s| dynamic_state_to_vk(*s)).collect();
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stage_infos)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_info)
        .rasterization_state(&rasterization_state)
        .depth_stencil_state(&depth_stencil_state)
        .multisample_state(&multisample_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(layout.handle())
        .render_pass(render_pass.handle())
        .subpass(desc.subpass);

    let pipelines = unsafe {
        device.create_graphics_pipelines(
            ctx.logical_device().pipeline_cache(),
            std::slice::from_ref(&create_info),
            None,
        )
    }
    .map_err(|(_, e)| engine_err!("ya::vulkan", "Failed to create graphics pipeline '{}': {:?}", desc.name, e))?;

    let pipeline = pipelines
        .into_iter()
        .next()
        .ok_or_else(|| engine_err!("ya::vulkan", "No pipeline returned for '{}'", desc.name))?;
    ctx.set_debug_name(pipeline, &desc.name);

    Ok((pipeline, vertex_layout))
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;

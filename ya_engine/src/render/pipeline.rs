/// Pipeline layout and graphics pipeline descriptions
///
/// A graphics pipeline is bound to one render pass and subpass. Its colour
/// blend attachment list must match that subpass's colour attachment count,
/// and a render pass shape change means the pipeline is rebuilt, never patched.

use crate::error::{Error, Result};
use crate::render::{
    pack_inputs, DescriptorSetLayoutDesc, Rect2D, RenderPassDesc, SampleCount, ShaderReflection,
    ShaderStageFlags, VertexFormat, Viewport,
};

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    /// Triangle list
    TriangleList,
    /// Triangle strip
    TriangleStrip,
    /// Line list
    LineList,
    /// Point list
    PointList,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

// ===== VERTEX INPUT =====

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    /// Data is per-vertex
    Vertex,
    /// Data is per-instance
    Instance,
}

/// Vertex attribute: `{location, buffer slot, format, offset}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute location in shader
    pub location: u32,
    /// Buffer slot (binding index)
    pub binding: u32,
    pub format: VertexFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Vertex buffer slot: `{slot, stride}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    pub binding: u32,
    /// Stride in bytes between consecutive elements
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

/// Vertex input layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Each attribute must name a declared buffer slot and fit inside its stride;
    /// locations and slots must be unique
    pub fn validate(&self) -> Result<()> {
        for (i, binding) in self.bindings.iter().enumerate() {
            if self.bindings[..i].iter().any(|b| b.binding == binding.binding) {
                return Err(Error::InvalidResource(format!(
                    "Vertex buffer slot {} declared twice",
                    binding.binding
                )));
            }
        }
        for (i, attribute) in self.attributes.iter().enumerate() {
            if self.attributes[..i].iter().any(|a| a.location == attribute.location) {
                return Err(Error::InvalidResource(format!(
                    "Vertex location {} declared twice",
                    attribute.location
                )));
            }
            let binding = self
                .bindings
                .iter()
                .find(|b| b.binding == attribute.binding)
                .ok_or_else(|| {
                    Error::InvalidResource(format!(
                        "Vertex location {} uses undeclared buffer slot {}",
                        attribute.location, attribute.binding
                    ))
                })?;
            if attribute.offset + attribute.format.size_bytes() > binding.stride {
                return Err(Error::InvalidResource(format!(
                    "Vertex location {} ends past stride {} of slot {}",
                    attribute.location, binding.stride, binding.binding
                )));
            }
        }
        Ok(())
    }
}

/// How the pipeline's vertex input is described. The two modes are exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VertexInputMode {
    /// Caller-supplied buffer slots and attributes
    Explicit(VertexLayout),
    /// One tightly packed per-vertex buffer at slot 0, from vertex shader reflection
    FromShader,
}

/// Build the single-binding layout for reflected vertex inputs
///
/// Inputs are packed by ascending location; the stride ends at the last input.
pub fn derive_vertex_layout(reflection: &ShaderReflection) -> VertexLayout {
    let mut inputs = reflection.inputs.clone();
    pack_inputs(&mut inputs);

    let stride = inputs.last().map(|last| last.offset + last.size).unwrap_or(0);
    let attributes = inputs
        .iter()
        .map(|input| VertexAttribute {
            location: input.location,
            binding: 0,
            format: input.format,
            offset: input.offset,
        })
        .collect::<Vec<_>>();

    let bindings = if attributes.is_empty() {
        Vec::new()
    } else {
        vec![VertexBinding { binding: 0, stride, input_rate: VertexInputRate::Vertex }]
    };

    VertexLayout { bindings, attributes }
}

// ===== PIPELINE LAYOUT =====

/// Push constant range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    /// Offset in bytes
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
}

/// Pipeline layout description, shareable by many pipelines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineLayoutDesc {
    pub set_layouts: Vec<DescriptorSetLayoutDesc>,
    pub push_constant_ranges: Vec<PushConstantRange>,
}

impl PipelineLayoutDesc {
    pub fn validate(&self) -> Result<()> {
        for set in &self.set_layouts {
            set.validate()?;
        }
        for range in &self.push_constant_ranges {
            if range.size == 0 || range.size % 4 != 0 || range.offset % 4 != 0 {
                return Err(Error::InvalidResource(format!(
                    "Push constant range {}+{} must be non-empty and 4-byte aligned",
                    range.offset, range.size
                )));
            }
            if range.stages.is_empty() {
                return Err(Error::InvalidResource("Push constant range visible to no stage".to_string()));
            }
        }
        Ok(())
    }
}

// ===== RASTERIZATION =====

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

/// Polygon rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    /// Fill polygons
    Fill,
    /// Wireframe
    Line,
    /// Vertices only
    Point,
}

/// Depth bias parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    pub constant_factor: f32,
    pub slope_factor: f32,
    pub clamp: f32,
}

/// Rasterization state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
    /// None = disabled
    pub depth_bias: Option<DepthBias>,
    pub line_width: f32,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            polygon_mode: PolygonMode::Fill,
            depth_bias: None,
            line_width: 1.0,
        }
    }
}

// ===== DEPTH / STENCIL =====

/// Comparison operator for depth and stencil tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Stencil operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

/// Per-face stencil state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilOpState {
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub compare_op: CompareOp,
    pub compare_mask: u32,
    pub write_mask: u32,
    pub reference: u32,
}

impl Default for StencilOpState {
    fn default() -> Self {
        Self {
            fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            compare_op: CompareOp::Always,
            compare_mask: 0xFF,
            write_mask: 0xFF,
            reference: 0,
        }
    }
}

/// Depth and stencil testing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
    pub stencil_test_enable: bool,
    pub front: StencilOpState,
    pub back: StencilOpState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::Less,
            stencil_test_enable: false,
            front: StencilOpState::default(),
            back: StencilOpState::default(),
        }
    }
}

// ===== COLOR BLEND =====

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    SrcAlphaSaturate,
}

/// Blend operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Color write mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorWriteMask {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    pub a: bool,
}

impl ColorWriteMask {
    pub const ALL: Self = Self { r: true, g: true, b: true, a: true };
    pub const NONE: Self = Self { r: false, g: false, b: false, a: false };
}

impl Default for ColorWriteMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Blend state of one color attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorBlendAttachment {
    pub blend_enable: bool,
    pub src_color_factor: BlendFactor,
    pub dst_color_factor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_blend_op: BlendOp,
    pub color_write_mask: ColorWriteMask,
}

impl Default for ColorBlendAttachment {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_color_factor: BlendFactor::One,
            dst_color_factor: BlendFactor::Zero,
            color_blend_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
            color_write_mask: ColorWriteMask::ALL,
        }
    }
}

impl ColorBlendAttachment {
    /// Straight alpha blending: `src.a * src + (1 - src.a) * dst`
    pub fn alpha_blend() -> Self {
        Self {
            blend_enable: true,
            src_color_factor: BlendFactor::SrcAlpha,
            dst_color_factor: BlendFactor::OneMinusSrcAlpha,
            color_blend_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::OneMinusSrcAlpha,
            alpha_blend_op: BlendOp::Add,
            color_write_mask: ColorWriteMask::ALL,
        }
    }
}

/// Color blend state: one entry per color attachment of the target subpass
#[derive(Debug, Clone, PartialEq)]
pub struct ColorBlendState {
    pub attachments: Vec<ColorBlendAttachment>,
    pub blend_constants: [f32; 4],
}

impl ColorBlendState {
    /// `count` copies of `attachment`
    pub fn uniform(attachment: ColorBlendAttachment, count: u32) -> Self {
        Self {
            attachments: vec![attachment; count as usize],
            blend_constants: [0.0; 4],
        }
    }
}

// ===== MULTISAMPLE =====

/// Multisampling state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultisampleState {
    pub sample_count: SampleCount,
    pub alpha_to_coverage: bool,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            sample_count: SampleCount::S1,
            alpha_to_coverage: false,
        }
    }
}

// ===== PRESETS / DYNAMIC STATE =====

/// State set at record time instead of baked into the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicState {
    Viewport,
    Scissor,
    LineWidth,
    DepthBias,
    BlendConstants,
}

/// Fixed-function preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePreset {
    /// Back-face culling, CCW front face, depth test+write, `Less`
    Default3D,
    /// No depth test, no culling, alpha blending
    Overlay2D,
    /// Depth test without write, no culling, alpha blending
    Transparent3D,
}

/// Fixed-function state excluding per-attachment blend count
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedFunctionState {
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationState,
    pub depth_stencil: DepthStencilState,
    pub multisample: MultisampleState,
    /// Applied to every color attachment of the subpass
    pub blend: ColorBlendAttachment,
}

impl Default for FixedFunctionState {
    fn default() -> Self {
        Self::preset(PipelinePreset::Default3D)
    }
}

impl FixedFunctionState {
    pub fn preset(preset: PipelinePreset) -> Self {
        let base = Self {
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: DepthStencilState::default(),
            multisample: MultisampleState::default(),
            blend: ColorBlendAttachment::default(),
        };
        match preset {
            PipelinePreset::Default3D => base,
            PipelinePreset::Overlay2D => Self {
                rasterization: RasterizationState { cull_mode: CullMode::None, ..base.rasterization },
                depth_stencil: DepthStencilState {
                    depth_test_enable: false,
                    depth_write_enable: false,
                    ..base.depth_stencil
                },
                blend: ColorBlendAttachment::alpha_blend(),
                ..base
            },
            PipelinePreset::Transparent3D => Self {
                rasterization: RasterizationState { cull_mode: CullMode::None, ..base.rasterization },
                depth_stencil: DepthStencilState {
                    depth_test_enable: true,
                    depth_write_enable: false,
                    ..base.depth_stencil
                },
                blend: ColorBlendAttachment::alpha_blend(),
                ..base
            },
        }
    }
}

// ===== GRAPHICS PIPELINE DESC =====

/// Graphics pipeline creation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineDesc {
    /// Debug name
    pub name: String,
    /// Shader name resolved by the `ShaderProcessor`
    pub shader: String,
    pub subpass: u32,
    pub vertex_input: VertexInputMode,
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationState,
    pub depth_stencil: DepthStencilState,
    pub multisample: MultisampleState,
    pub color_blend: ColorBlendState,
    pub dynamic_states: Vec<DynamicState>,
    /// Required when `Viewport` is not dynamic
    pub viewport: Option<Viewport>,
    /// Required when `Scissor` is not dynamic
    pub scissor: Option<Rect2D>,
}

impl GraphicsPipelineDesc {
    /// Description with `fixed` state applied to each color attachment of `subpass`
    pub fn new(
        name: impl Into<String>,
        shader: impl Into<String>,
        render_pass: &RenderPassDesc,
        subpass: u32,
        vertex_input: VertexInputMode,
        fixed: FixedFunctionState,
    ) -> Self {
        let color_count = render_pass.color_attachment_count(subpass).unwrap_or(0);
        Self {
            name: name.into(),
            shader: shader.into(),
            subpass,
            vertex_input,
            topology: fixed.topology,
            rasterization: fixed.rasterization,
            depth_stencil: fixed.depth_stencil,
            multisample: fixed.multisample,
            color_blend: ColorBlendState::uniform(fixed.blend, color_count),
            dynamic_states: vec![DynamicState::Viewport, DynamicState::Scissor],
            viewport: None,
            scissor: None,
        }
    }

    pub fn is_dynamic(&self, state: DynamicState) -> bool {
        self.dynamic_states.contains(&state)
    }

    /// Check the description against the render pass it targets
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` when the subpass does not exist, the blend
    /// attachment count differs from the subpass color count, the explicit
    /// vertex layout is inconsistent, or a static viewport/scissor is missing.
    pub fn validate(&self, render_pass: &RenderPassDesc) -> Result<()> {
        let color_count = render_pass.color_attachment_count(self.subpass).ok_or_else(|| {
            Error::InvalidResource(format!(
                "Pipeline '{}' targets subpass {} but the render pass has {}",
                self.name, self.subpass, render_pass.subpasses.len()
            ))
        })?;

        if self.color_blend.attachments.len() as u32 != color_count {
            crate::engine_error!(
                "ya::Pipeline",
                "Pipeline '{}': {} blend attachment(s) for {} color attachment(s) in subpass {}",
                self.name, self.color_blend.attachments.len(), color_count, self.subpass
            );
            return Err(Error::InvalidResource(format!(
                "Pipeline '{}': {} blend attachment(s) but subpass {} declares {} color attachment(s)",
                self.name, self.color_blend.attachments.len(), self.subpass, color_count
            )));
        }

        if let VertexInputMode::Explicit(layout) = &self.vertex_input {
            layout.validate()?;
        }

        if !self.is_dynamic(DynamicState::Viewport) && self.viewport.is_none() {
            return Err(Error::InvalidResource(format!(
                "Pipeline '{}': static viewport not provided",
                self.name
            )));
        }
        if !self.is_dynamic(DynamicState::Scissor) && self.scissor.is_none() {
            return Err(Error::InvalidResource(format!(
                "Pipeline '{}': static scissor not provided",
                self.name
            )));
        }

        Ok(())
    }

    /// Final vertex layout, consulting reflection only in `FromShader` mode
    pub fn resolve_vertex_layout(&self, vertex_reflection: Option<&ShaderReflection>) -> Result<VertexLayout> {
        match &self.vertex_input {
            VertexInputMode::Explicit(layout) => Ok(layout.clone()),
            VertexInputMode::FromShader => {
                let reflection = vertex_reflection.ok_or_else(|| {
                    Error::InvalidResource(format!(
                        "Pipeline '{}' derives vertex input from a shader without a vertex stage",
                        self.name
                    ))
                })?;
                Ok(derive_vertex_layout(reflection))
            }
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;

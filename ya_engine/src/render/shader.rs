/// Shader stages and the external shader processor contract
///
/// The engine never compiles shaders. A `ShaderProcessor` resolves a shader
/// name to per-stage binaries and reflects their interface.

use std::collections::BTreeMap;
use bitflags::bitflags;
use crate::error::Result;
use crate::render::VertexFormat;

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Geometry,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub fn flag(&self) -> ShaderStageFlags {
        match self {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::Geometry => ShaderStageFlags::GEOMETRY,
            ShaderStage::Fragment => ShaderStageFlags::FRAGMENT,
            ShaderStage::Compute => ShaderStageFlags::COMPUTE,
        }
    }
}

bitflags! {
    /// Set of shader stages (Vulkan bit values)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 0x1;
        const GEOMETRY = 0x8;
        const FRAGMENT = 0x10;
        const COMPUTE = 0x20;
        const ALL_GRAPHICS = 0x1F;
    }
}

/// SPIR-V words per stage, ordered by stage
pub type ShaderBinaries = BTreeMap<ShaderStage, Vec<u32>>;

/// One reflected vertex shader input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectedInput {
    pub location: u32,
    /// Offset inside a tightly packed vertex (filled by the processor)
    pub offset: u32,
    pub format: VertexFormat,
    /// Size in bytes
    pub size: u32,
}

/// One reflected uniform buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedUniformBuffer {
    pub name: String,
    pub set: u32,
    pub binding: u32,
    /// Size in bytes, when known
    pub size: Option<u32>,
}

/// Reflected interface of one stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    pub inputs: Vec<ReflectedInput>,
    pub uniform_buffers: Vec<ReflectedUniformBuffer>,
}

/// External shader processor
pub trait ShaderProcessor {
    /// Resolve `name` into per-stage binaries
    fn process(&self, name: &str) -> Result<ShaderBinaries>;

    /// Reflect the interface of one stage binary
    fn reflect(&self, stage: ShaderStage, code: &[u32]) -> Result<ShaderReflection>;
}

/// Assign tightly packed offsets to inputs, ordered by location
pub fn pack_inputs(inputs: &mut [ReflectedInput]) {
    inputs.sort_by_key(|input| input.location);
    let mut offset = 0;
    for input in inputs.iter_mut() {
        input.offset = offset;
        offset += input.size;
    }
}

/// SpirvShaderProcessor - loads precompiled SPIR-V and reflects it with spirq
///
/// A shader named `basic` resolves to `{root}/basic.vert.spv`,
/// `{root}/basic.geom.spv`, `{root}/basic.frag.spv` and `{root}/basic.comp.spv`;
/// stages whose file does not exist are skipped.

use std::fs::File;
use std::path::{Path, PathBuf};
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::{
    pack_inputs, ReflectedInput, ReflectedUniformBuffer, ShaderBinaries, ShaderProcessor, ShaderReflection,
    ShaderStage, VertexFormat,
};
use ya_engine::{engine_bail, engine_debug, engine_err};

/// File extension of a stage binary, without the trailing `.spv`
pub(crate) fn stage_extension(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vert",
        ShaderStage::Geometry => "geom",
        ShaderStage::Fragment => "frag",
        ShaderStage::Compute => "comp",
    }
}

/// Vertex attribute format for a scalar type with `components` lanes
///
/// Only 32-bit floats and integers map to an attribute format.
pub(crate) fn scalar_format(scalar: &spirq::ty::ScalarType, components: u32) -> Option<VertexFormat> {
    use spirq::ty::ScalarType;
    match scalar {
        ScalarType::Float { bits: 32 } => VertexFormat::float_vector(components),
        ScalarType::Integer { bits: 32, is_signed: true } => VertexFormat::sint_vector(components),
        ScalarType::Integer { bits: 32, is_signed: false } => VertexFormat::uint_vector(components),
        _ => None,
    }
}

fn input_format(ty: &spirq::ty::Type) -> Option<VertexFormat> {
    use spirq::ty::Type;
    match ty {
        Type::Scalar(scalar) => scalar_format(scalar, 1),
        Type::Vector(vector) => scalar_format(&vector.scalar_ty, vector.nscalar),
        _ => None,
    }
}

pub struct SpirvShaderProcessor {
    root: PathBuf,
}

impl SpirvShaderProcessor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stage_path(&self, name: &str, stage: ShaderStage) -> PathBuf {
        self.root.join(format!("{}.{}.spv", name, stage_extension(stage)))
    }
}

impl ShaderProcessor for SpirvShaderProcessor {
    fn process(&self, name: &str) -> Result<ShaderBinaries> {
        let mut binaries = ShaderBinaries::new();

        for stage in [ShaderStage::Vertex, ShaderStage::Geometry, ShaderStage::Fragment, ShaderStage::Compute] {
            let path = self.stage_path(name, stage);
            if !path.is_file() {
                continue;
            }
            let mut file = File::open(&path)
                .map_err(|e| engine_err!("ya::vulkan", "Failed to open shader '{}': {}", path.display(), e))?;
            let code = ash::util::read_spv(&mut file)
                .map_err(|e| engine_err!("ya::vulkan", "Invalid SPIR-V in '{}': {}", path.display(), e))?;
            binaries.insert(stage, code);
        }

        if binaries.is_empty() {
            return Err(Error::InvalidResource(format!(
                "Shader '{}' has no stage binary under '{}'",
                name,
                self.root.display()
            )));
        }

        engine_debug!("ya::vulkan", "Shader '{}' loaded: {:?}", name, binaries.keys().collect::<Vec<_>>());
        Ok(binaries)
    }

    fn reflect(&self, stage: ShaderStage, code: &[u32]) -> Result<ShaderReflection> {
        let entry_points = spirq::ReflectConfig::new()
            .spv(code)
            .ref_all_rscs(true)
            .reflect()
            .map_err(|e| engine_err!("ya::vulkan", "SPIR-V reflection failed: {:?}", e))?;

        let mut reflection = ShaderReflection::default();

        for entry_point in &entry_points {
            for var in entry_point.vars.iter() {
                match var {
                    // Only vertex inputs describe vertex buffer contents
                    spirq::var::Variable::Input { name, location, ty } if stage == ShaderStage::Vertex => {
                        let Some(format) = input_format(ty) else {
                            engine_bail!(
                                "ya::vulkan",
                                "Unsupported vertex input '{}' at location {}: {:?}",
                                name.clone().unwrap_or_default(), location.loc(), ty
                            );
                        };
                        reflection.inputs.push(ReflectedInput {
                            location: location.loc(),
                            offset: 0,
                            format,
                            size: format.size_bytes(),
                        });
                    }
                    spirq::var::Variable::Descriptor { name, desc_bind, desc_ty, ty, .. }
                        if matches!(desc_ty, spirq::ty::DescriptorType::UniformBuffer()) =>
                    {
                        reflection.uniform_buffers.push(ReflectedUniformBuffer {
                            name: name.clone().unwrap_or_default(),
                            set: desc_bind.set(),
                            binding: desc_bind.bind(),
                            size: ty.nbyte().map(|s| s as u32),
                        });
                    }
                    _ => {}
                }
            }
        }

        pack_inputs(&mut reflection.inputs);
        reflection.uniform_buffers.sort_by_key(|ub| (ub.set, ub.binding));
        Ok(reflection)
    }
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;

//! Unit tests for shader file resolution and input format mapping

use spirq::ty::ScalarType;
use std::path::PathBuf;
use ya_engine::ya::Error;
use ya_engine::ya::render::{ShaderProcessor, ShaderStage, VertexFormat};
use crate::vulkan_shader::*;

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ya_shader_tests_{}_{}", tag, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ============================================================================
// FILE RESOLUTION
// ============================================================================

#[test]
fn test_stage_path_uses_stage_extension() {
    let processor = SpirvShaderProcessor::new("shaders");
    assert_eq!(processor.stage_path("basic", ShaderStage::Vertex), PathBuf::from("shaders/basic.vert.spv"));
    assert_eq!(processor.stage_path("basic", ShaderStage::Geometry), PathBuf::from("shaders/basic.geom.spv"));
    assert_eq!(processor.stage_path("basic", ShaderStage::Fragment), PathBuf::from("shaders/basic.frag.spv"));
    assert_eq!(processor.stage_path("basic", ShaderStage::Compute), PathBuf::from("shaders/basic.comp.spv"));
}

#[test]
fn test_process_missing_shader_fails() {
    let processor = SpirvShaderProcessor::new(scratch_dir("missing"));
    let err = processor.process("does_not_exist").unwrap_err();
    assert!(matches!(err, Error::InvalidResource(_)));
}

#[test]
fn test_process_loads_present_stages_only() {
    let dir = scratch_dir("present");
    // Magic number alone is enough for read_spv
    std::fs::write(dir.join("quad.vert.spv"), 0x0723_0203u32.to_le_bytes()).unwrap();
    std::fs::write(dir.join("quad.frag.spv"), 0x0723_0203u32.to_le_bytes()).unwrap();

    let binaries = SpirvShaderProcessor::new(&dir).process("quad").unwrap();
    assert_eq!(binaries.keys().copied().collect::<Vec<_>>(), vec![ShaderStage::Vertex, ShaderStage::Fragment]);
    assert_eq!(binaries[&ShaderStage::Vertex], vec![0x0723_0203]);
}

#[test]
fn test_process_rejects_truncated_binary() {
    let dir = scratch_dir("truncated");
    std::fs::write(dir.join("broken.vert.spv"), [0x03u8, 0x02, 0x23]).unwrap();

    let err = SpirvShaderProcessor::new(&dir).process("broken").unwrap_err();
    assert!(matches!(err, Error::BackendError(_)));
}

// ============================================================================
// INPUT FORMATS
// ============================================================================

#[test]
fn test_float_inputs_map_to_sfloat() {
    let float = ScalarType::Float { bits: 32 };
    assert_eq!(scalar_format(&float, 1), Some(VertexFormat::R32_SFLOAT));
    assert_eq!(scalar_format(&float, 3), Some(VertexFormat::R32G32B32_SFLOAT));
    assert_eq!(scalar_format(&float, 4), Some(VertexFormat::R32G32B32A32_SFLOAT));
}

#[test]
fn test_integer_inputs_keep_signedness() {
    let int = ScalarType::Integer { bits: 32, is_signed: true };
    let uint = ScalarType::Integer { bits: 32, is_signed: false };
    assert_eq!(scalar_format(&int, 2), Some(VertexFormat::R32G32_SINT));
    assert_eq!(scalar_format(&uint, 4), Some(VertexFormat::R32G32B32A32_UINT));
}

#[test]
fn test_unsupported_inputs_have_no_format() {
    assert_eq!(scalar_format(&ScalarType::Float { bits: 64 }, 2), None);
    assert_eq!(scalar_format(&ScalarType::Integer { bits: 16, is_signed: true }, 1), None);
    assert_eq!(scalar_format(&ScalarType::Boolean, 1), None);
    assert_eq!(scalar_format(&ScalarType::Float { bits: 32 }, 5), None);
}

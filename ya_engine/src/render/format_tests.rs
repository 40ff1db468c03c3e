//! Unit tests for format.rs

use crate::render::{Extent2D, Format, VertexFormat};

// ============================================================================
// FORMAT TESTS
// ============================================================================

#[test]
fn test_depth_formats() {
    assert!(Format::D32_SFLOAT.is_depth());
    assert!(Format::D24_UNORM_S8_UINT.is_depth());
    assert!(!Format::B8G8R8A8_UNORM.is_depth());
}

#[test]
fn test_stencil_formats() {
    assert!(Format::D24_UNORM_S8_UINT.has_stencil());
    assert!(Format::D32_SFLOAT_S8_UINT.has_stencil());
    assert!(!Format::D32_SFLOAT.has_stencil());
    assert!(!Format::R8G8B8A8_SRGB.has_stencil());
}

#[test]
fn test_texel_sizes() {
    assert_eq!(Format::R8G8B8A8_SRGB.texel_size(), Some(4));
    assert_eq!(Format::R16G16B16A16_SFLOAT.texel_size(), Some(8));
    assert_eq!(Format::R32G32B32A32_SFLOAT.texel_size(), Some(16));
    assert_eq!(Format::D32_SFLOAT.texel_size(), None);
    assert_eq!(Format::UNDEFINED.texel_size(), None);
}

// ============================================================================
// EXTENT TESTS
// ============================================================================

#[test]
fn test_extent_is_empty() {
    assert!(Extent2D::new(0, 0).is_empty());
    assert!(Extent2D::new(800, 0).is_empty());
    assert!(!Extent2D::new(1, 1).is_empty());
}

#[test]
fn test_extent_clamp() {
    let min = Extent2D::new(16, 16);
    let max = Extent2D::new(4096, 2048);
    assert_eq!(Extent2D::new(8, 5000).clamp(min, max), Extent2D::new(16, 2048));
    assert_eq!(Extent2D::new(1280, 720).clamp(min, max), Extent2D::new(1280, 720));
}

// ============================================================================
// VERTEX FORMAT TESTS
// ============================================================================

#[test]
fn test_vertex_format_sizes() {
    assert_eq!(VertexFormat::R32_SFLOAT.size_bytes(), 4);
    assert_eq!(VertexFormat::R32G32_SFLOAT.size_bytes(), 8);
    assert_eq!(VertexFormat::R32G32B32_SFLOAT.size_bytes(), 12);
    assert_eq!(VertexFormat::R32G32B32A32_UINT.size_bytes(), 16);
}

#[test]
fn test_float_vector_lookup() {
    assert_eq!(VertexFormat::float_vector(2), Some(VertexFormat::R32G32_SFLOAT));
    assert_eq!(VertexFormat::float_vector(4), Some(VertexFormat::R32G32B32A32_SFLOAT));
    assert_eq!(VertexFormat::float_vector(5), None);
    assert_eq!(VertexFormat::sint_vector(3), Some(VertexFormat::R32G32B32_SINT));
    assert_eq!(VertexFormat::uint_vector(0), None);
}

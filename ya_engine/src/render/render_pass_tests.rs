//! Unit tests for render pass descriptions

use crate::error::Error;
use crate::render::render_pass::{
    AttachmentDesc, AttachmentRef, LoadOp, RenderPassDesc, StoreOp, SubpassDependency, SubpassDesc, SubpassRef,
};
use crate::render::{AccessFlags, Format, ImageLayout, PipelineStageFlags};

fn color_ref(attachment: u32) -> AttachmentRef {
    AttachmentRef { attachment, layout: ImageLayout::ColorAttachment }
}

fn external_dependency() -> SubpassDependency {
    SubpassDependency {
        src_subpass: SubpassRef::External,
        dst_subpass: SubpassRef::Index(0),
        src_stage_mask: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_stage_mask: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        src_access_mask: AccessFlags::empty(),
        dst_access_mask: AccessFlags::COLOR_ATTACHMENT_WRITE,
        by_region: false,
    }
}

/// Color + depth pass
fn forward_pass() -> RenderPassDesc {
    RenderPassDesc {
        attachments: vec![
            AttachmentDesc::presented_color(Format::B8G8R8A8_UNORM),
            AttachmentDesc::depth(Format::D32_SFLOAT),
        ],
        subpasses: vec![SubpassDesc {
            color_attachments: vec![color_ref(0)],
            depth_stencil_attachment: Some(AttachmentRef {
                attachment: 1,
                layout: ImageLayout::DepthStencilAttachment,
            }),
            ..Default::default()
        }],
        dependencies: vec![external_dependency()],
    }
}

// ============================================================================
// DEFAULT PASS
// ============================================================================

#[test]
fn test_default_pass_shape() {
    let desc = RenderPassDesc::default_for(Format::B8G8R8A8_SRGB);
    assert_eq!(desc.attachments.len(), 1);
    assert_eq!(desc.attachments[0].format, Format::B8G8R8A8_SRGB);
    assert_eq!(desc.attachments[0].load_op, LoadOp::Clear);
    assert_eq!(desc.attachments[0].store_op, StoreOp::Store);
    assert_eq!(desc.attachments[0].final_layout, ImageLayout::PresentSrc);
    assert_eq!(desc.subpasses.len(), 1);
    assert!(desc.subpasses[0].depth_stencil_attachment.is_none());
    assert_eq!(desc.dependencies.len(), 1);
    assert_eq!(desc.dependencies[0].src_subpass, SubpassRef::External);
    assert!(desc.validate().is_ok());
}

#[test]
fn test_resolve_only_replaces_empty() {
    let empty = RenderPassDesc::default();
    assert_eq!(empty.resolve(Format::B8G8R8A8_UNORM), RenderPassDesc::default_for(Format::B8G8R8A8_UNORM));

    let forward = forward_pass();
    assert_eq!(forward.resolve(Format::B8G8R8A8_UNORM), forward);
}

// ============================================================================
// VALIDATION
// ============================================================================

#[test]
fn test_valid_forward_pass() {
    assert!(forward_pass().validate().is_ok());
}

#[test]
fn test_color_reference_out_of_range() {
    let mut desc = forward_pass();
    desc.subpasses[0].color_attachments.push(color_ref(2));
    let err = desc.validate().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidAttachmentReference { subpass: 0, index: 2, attachment_count: 2 }
    ));
}

#[test]
fn test_every_reference_kind_checked() {
    let bad = AttachmentRef { attachment: 5, layout: ImageLayout::ShaderReadOnly };

    let mut depth = forward_pass();
    depth.subpasses[0].depth_stencil_attachment = Some(bad);
    assert!(matches!(depth.validate(), Err(Error::InvalidAttachmentReference { index: 5, .. })));

    let mut input = forward_pass();
    input.subpasses[0].input_attachments.push(bad);
    assert!(matches!(input.validate(), Err(Error::InvalidAttachmentReference { index: 5, .. })));

    let mut resolve = forward_pass();
    resolve.subpasses[0].resolve_attachment = Some(bad);
    assert!(matches!(resolve.validate(), Err(Error::InvalidAttachmentReference { index: 5, .. })));
}

#[test]
fn test_reference_error_names_second_subpass() {
    let mut desc = forward_pass();
    desc.subpasses.push(SubpassDesc {
        color_attachments: vec![color_ref(0)],
        input_attachments: vec![AttachmentRef { attachment: 9, layout: ImageLayout::ShaderReadOnly }],
        ..Default::default()
    });
    assert!(matches!(
        desc.validate(),
        Err(Error::InvalidAttachmentReference { subpass: 1, index: 9, .. })
    ));
}

#[test]
fn test_missing_declarations_rejected() {
    let mut no_deps = forward_pass();
    no_deps.dependencies.clear();
    assert!(matches!(no_deps.validate(), Err(Error::InvalidResource(_))));

    let mut no_subpass = forward_pass();
    no_subpass.subpasses.clear();
    assert!(no_subpass.validate().is_err());

    assert!(RenderPassDesc::default().validate().is_err());
}

#[test]
fn test_dependency_subpass_out_of_range() {
    let mut desc = forward_pass();
    desc.dependencies[0].dst_subpass = SubpassRef::Index(3);
    assert!(matches!(desc.validate(), Err(Error::InvalidResource(_))));

    let mut both_external = forward_pass();
    both_external.dependencies[0].dst_subpass = SubpassRef::External;
    assert!(both_external.validate().is_err());
}

// ============================================================================
// SWAPCHAIN FORMAT / SHAPE
// ============================================================================

#[test]
fn test_swapchain_format_drift_detected() {
    let desc = forward_pass();
    assert!(desc.check_swapchain_format(Format::B8G8R8A8_UNORM).is_ok());
    assert!(matches!(
        desc.check_swapchain_format(Format::R8G8B8A8_SRGB),
        Err(Error::UnsupportedSurfaceFormat(_))
    ));
}

#[test]
fn test_with_swapchain_format_changes_shape() {
    let desc = forward_pass();
    let switched = desc.with_swapchain_format(Format::R8G8B8A8_UNORM);
    assert_eq!(switched.attachments[0].format, Format::R8G8B8A8_UNORM);
    assert_eq!(switched.attachments[1].format, Format::D32_SFLOAT);
    assert_ne!(desc.shape(), switched.shape());
}

#[test]
fn test_color_attachment_count() {
    let desc = forward_pass();
    assert_eq!(desc.color_attachment_count(0), Some(1));
    assert_eq!(desc.color_attachment_count(1), None);
    assert_eq!(desc.shape().subpass_has_depth, vec![true]);
}

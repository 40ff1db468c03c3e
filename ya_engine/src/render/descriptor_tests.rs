//! Unit tests for descriptor layouts and the pool budget

use crate::error::Error;
use crate::render::descriptor::{
    DescriptorBinding, DescriptorPoolBudget, DescriptorPoolDesc, DescriptorSetLayoutDesc, DescriptorType,
};
use crate::render::ShaderStageFlags;

// ============================================================================
// POOL BUDGET
// ============================================================================

#[test]
fn test_budget_reserve_until_exhausted() {
    let mut budget = DescriptorPoolBudget::new(3);
    budget.reserve(2).unwrap();
    budget.reserve(1).unwrap();
    assert_eq!(budget.remaining(), 0);

    let err = budget.reserve(1).unwrap_err();
    assert!(matches!(err, Error::DescriptorPoolExhausted { max_sets: 3 }));
}

#[test]
fn test_budget_all_or_nothing() {
    let mut budget = DescriptorPoolBudget::new(4);
    budget.reserve(3).unwrap();
    assert!(budget.reserve(2).is_err());
    // The failed request reserved nothing
    assert_eq!(budget.allocated(), 3);
    budget.reserve(1).unwrap();
}

#[test]
fn test_budget_reset() {
    let mut budget = DescriptorPoolBudget::new(2);
    budget.reserve(2).unwrap();
    budget.reset();
    assert_eq!(budget.remaining(), 2);
    assert_eq!(budget.max_sets(), 2);
}

#[test]
fn test_default_pool_desc() {
    let desc = DescriptorPoolDesc::default();
    assert_eq!(desc.max_sets, 1024);
    assert!(desc
        .pool_sizes
        .iter()
        .any(|size| size.descriptor_type == DescriptorType::UniformBuffer));
}

// ============================================================================
// SET LAYOUT VALIDATION
// ============================================================================

fn binding(slot: u32, descriptor_type: DescriptorType) -> DescriptorBinding {
    DescriptorBinding { binding: slot, descriptor_type, count: 1, stages: ShaderStageFlags::VERTEX }
}

#[test]
fn test_layout_valid() {
    let desc = DescriptorSetLayoutDesc {
        bindings: vec![
            binding(0, DescriptorType::UniformBuffer),
            binding(1, DescriptorType::CombinedImageSampler),
        ],
    };
    assert!(desc.validate().is_ok());
}

#[test]
fn test_layout_duplicate_slot() {
    let desc = DescriptorSetLayoutDesc {
        bindings: vec![binding(0, DescriptorType::UniformBuffer), binding(0, DescriptorType::StorageBuffer)],
    };
    assert!(desc.validate().is_err());
}

#[test]
fn test_layout_zero_count_or_no_stage() {
    let mut b = binding(0, DescriptorType::UniformBuffer);
    b.count = 0;
    assert!(DescriptorSetLayoutDesc { bindings: vec![b] }.validate().is_err());

    let mut b = binding(0, DescriptorType::UniformBuffer);
    b.stages = ShaderStageFlags::empty();
    assert!(DescriptorSetLayoutDesc { bindings: vec![b] }.validate().is_err());
}

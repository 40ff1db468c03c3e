/// Descriptor types, set layouts and the fixed-size pool budget

use rustc_hash::FxHashSet;
use crate::error::{Error, Result};
use crate::render::ShaderStageFlags;

/// Descriptor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
}

/// One binding slot of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    /// Array size (1 for a single descriptor)
    pub count: u32,
    pub stages: ShaderStageFlags,
}

/// Descriptor set layout description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorSetLayoutDesc {
    pub bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetLayoutDesc {
    /// Binding slots must be unique, with a nonzero count and at least one stage
    pub fn validate(&self) -> Result<()> {
        let mut seen = FxHashSet::default();
        for binding in &self.bindings {
            if !seen.insert(binding.binding) {
                return Err(Error::InvalidResource(format!(
                    "Descriptor binding {} declared twice",
                    binding.binding
                )));
            }
            if binding.count == 0 {
                return Err(Error::InvalidResource(format!(
                    "Descriptor binding {} has zero count",
                    binding.binding
                )));
            }
            if binding.stages.is_empty() {
                return Err(Error::InvalidResource(format!(
                    "Descriptor binding {} is visible to no stage",
                    binding.binding
                )));
            }
        }
        Ok(())
    }
}

/// Descriptor count reserved per type in a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolSize {
    pub descriptor_type: DescriptorType,
    pub count: u32,
}

/// Descriptor pool creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorPoolDesc {
    /// Hard ceiling on allocated sets; the pool never grows
    pub max_sets: u32,
    pub pool_sizes: Vec<DescriptorPoolSize>,
}

impl Default for DescriptorPoolDesc {
    fn default() -> Self {
        Self {
            max_sets: 1024,
            pool_sizes: vec![
                DescriptorPoolSize { descriptor_type: DescriptorType::CombinedImageSampler, count: 2048 },
                DescriptorPoolSize { descriptor_type: DescriptorType::UniformBuffer, count: 1024 },
                DescriptorPoolSize { descriptor_type: DescriptorType::StorageBuffer, count: 1024 },
            ],
        }
    }
}

/// Set accounting for a fixed-size descriptor pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolBudget {
    max_sets: u32,
    allocated: u32,
}

impl DescriptorPoolBudget {
    pub fn new(max_sets: u32) -> Self {
        Self { max_sets, allocated: 0 }
    }

    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    pub fn remaining(&self) -> u32 {
        self.max_sets - self.allocated
    }

    /// Reserve `count` sets, all or nothing
    ///
    /// # Errors
    ///
    /// `Error::DescriptorPoolExhausted` if fewer than `count` sets remain.
    pub fn reserve(&mut self, count: u32) -> Result<()> {
        if count > self.remaining() {
            crate::engine_error!(
                "ya::DescriptorPool",
                "Descriptor pool exhausted: {} requested, {} of {} remaining",
                count, self.remaining(), self.max_sets
            );
            return Err(Error::DescriptorPoolExhausted { max_sets: self.max_sets });
        }
        self.allocated += count;
        Ok(())
    }

    /// Return every set to the pool
    pub fn reset(&mut self) {
        self.allocated = 0;
    }
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;

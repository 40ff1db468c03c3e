/// Descriptor sets - layouts, the fixed-size pool and batched updates
///
/// The pool never grows: once `max_sets` sets are allocated, further
/// allocations fail with `Error::DescriptorPoolExhausted` until `reset`.
/// Sets allocated before a reset are stale afterwards and are rejected by
/// `update_descriptor_sets`.

use ash::vk;
use std::sync::Arc;
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::{
    BufferUsage, DescriptorPoolBudget, DescriptorPoolDesc, DescriptorSetLayoutDesc, DescriptorType, ImageLayout,
};
use ya_engine::{engine_debug, engine_err, engine_error, engine_info};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{descriptor_type_to_vk, image_layout_to_vk, shader_stages_to_vk};
use crate::vulkan_image::{Image, Sampler};

pub struct DescriptorSetLayout {
    ctx: Arc<GpuContext>,
    handle: vk::DescriptorSetLayout,
    desc: DescriptorSetLayoutDesc,
}

impl DescriptorSetLayout {
    pub fn new(ctx: Arc<GpuContext>, desc: &DescriptorSetLayoutDesc) -> Result<Self> {
        desc.validate()?;

        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
            .bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_type_to_vk(b.descriptor_type))
                    .descriptor_count(b.count)
                    .stage_flags(shader_stages_to_vk(b.stages))
            })
            .collect();
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        let handle = unsafe { ctx.device().create_descriptor_set_layout(&create_info, None) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to create descriptor set layout: {:?}", e))?;

        Ok(Self { ctx, handle, desc: desc.clone() })
    }

    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }

    pub fn desc(&self) -> &DescriptorSetLayoutDesc {
        &self.desc
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe { self.ctx.device().destroy_descriptor_set_layout(self.handle, None) };
    }
}

/// Descriptor set owned by the helper's pool
///
/// Freed in bulk by `DescriptorHelper::reset` or when the pool is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSet {
    handle: vk::DescriptorSet,
    pool_epoch: u64,
}

impl DescriptorSet {
    pub fn handle(&self) -> vk::DescriptorSet {
        self.handle
    }
}

/// Resource written into one descriptor
pub enum DescriptorResource<'a> {
    UniformBuffer { buffer: &'a Buffer, offset: u64, range: u64 },
    StorageBuffer { buffer: &'a Buffer, offset: u64, range: u64 },
    CombinedImageSampler { image: &'a Image, sampler: &'a Sampler, layout: ImageLayout },
    InputAttachment { image: &'a Image, layout: ImageLayout },
}

impl DescriptorResource<'_> {
    fn descriptor_type(&self) -> DescriptorType {
        match self {
            DescriptorResource::UniformBuffer { .. } => DescriptorType::UniformBuffer,
            DescriptorResource::StorageBuffer { .. } => DescriptorType::StorageBuffer,
            DescriptorResource::CombinedImageSampler { .. } => DescriptorType::CombinedImageSampler,
            DescriptorResource::InputAttachment { .. } => DescriptorType::InputAttachment,
        }
    }
}

/// One descriptor update
pub struct DescriptorWrite<'a> {
    pub set: &'a DescriptorSet,
    pub binding: u32,
    pub array_element: u32,
    pub resource: DescriptorResource<'a>,
}

impl<'a> DescriptorWrite<'a> {
    /// Whole buffer as a uniform buffer
    pub fn uniform_buffer(set: &'a DescriptorSet, binding: u32, buffer: &'a Buffer) -> Self {
        Self {
            set,
            binding,
            array_element: 0,
            resource: DescriptorResource::UniformBuffer { buffer, offset: 0, range: vk::WHOLE_SIZE },
        }
    }

    /// Whole buffer as a storage buffer
    pub fn storage_buffer(set: &'a DescriptorSet, binding: u32, buffer: &'a Buffer) -> Self {
        Self {
            set,
            binding,
            array_element: 0,
            resource: DescriptorResource::StorageBuffer { buffer, offset: 0, range: vk::WHOLE_SIZE },
        }
    }

    /// Sampled image in `ShaderReadOnly` layout
    pub fn combined_image_sampler(set: &'a DescriptorSet, binding: u32, image: &'a Image, sampler: &'a Sampler) -> Self {
        Self {
            set,
            binding,
            array_element: 0,
            resource: DescriptorResource::CombinedImageSampler { image, sampler, layout: ImageLayout::ShaderReadOnly },
        }
    }
}

fn require_buffer_usage(buffer: &Buffer, usage: BufferUsage, binding: u32) -> Result<()> {
    if !buffer.usage().contains(usage) {
        return Err(Error::InvalidResource(format!(
            "Buffer '{}' bound at binding {} lacks {:?} usage",
            buffer.desc().name, binding, usage
        )));
    }
    Ok(())
}

/// Fixed-size descriptor pool plus layout creation and batched updates
pub struct DescriptorHelper {
    ctx: Arc<GpuContext>,
    pool: vk::DescriptorPool,
    desc: DescriptorPoolDesc,
    budget: DescriptorPoolBudget,
    /// Incremented by every reset
    epoch: u64,
}

impl DescriptorHelper {
    pub fn new(ctx: Arc<GpuContext>, desc: &DescriptorPoolDesc) -> Result<Self> {
        if desc.max_sets == 0 {
            return Err(Error::InvalidResource("Descriptor pool with max_sets = 0".to_string()));
        }
        if desc.pool_sizes.iter().any(|size| size.count == 0) || desc.pool_sizes.is_empty() {
            return Err(Error::InvalidResource("Descriptor pool sizes must be non-empty and nonzero".to_string()));
        }

        let pool_sizes: Vec<vk::DescriptorPoolSize> = desc
            .pool_sizes
            .iter()
            .map(|size| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(size.descriptor_type),
                descriptor_count: size.count,
            })
            .collect();
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&pool_sizes)
            .max_sets(desc.max_sets);

        let pool = unsafe { ctx.device().create_descriptor_pool(&create_info, None) }.map_err(|e| {
            engine_error!("ya::vulkan", "Failed to create descriptor pool: {:?}", e);
            Error::InitializationFailed(format!("Failed to create descriptor pool: {:?}", e))
        })?;
        ctx.set_debug_name(pool, "DescriptorPool");

        engine_info!("ya::vulkan", "Descriptor pool created ({} set(s) max)", desc.max_sets);

        Ok(Self { ctx, pool, desc: desc.clone(), budget: DescriptorPoolBudget::new(desc.max_sets), epoch: 0 })
    }

    pub fn create_layout(&self, desc: &DescriptorSetLayoutDesc) -> Result<DescriptorSetLayout> {
        DescriptorSetLayout::new(Arc::clone(&self.ctx), desc)
    }

    /// Allocate one set per layout, all or nothing
    ///
    /// # Errors
    ///
    /// `Error::DescriptorPoolExhausted` when the pool cannot hold them.
    pub fn allocate(&mut self, layouts: &[&DescriptorSetLayout]) -> Result<Vec<DescriptorSet>> {
        if layouts.is_empty() {
            return Ok(Vec::new());
        }
        let before = self.budget;
        self.budget.reserve(layouts.len() as u32)?;

        let handles: Vec<vk::DescriptorSetLayout> = layouts.iter().map(|layout| layout.handle()).collect();
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&handles);

        match unsafe { self.ctx.device().allocate_descriptor_sets(&allocate_info) } {
            Ok(sets) => Ok(sets
                .into_iter()
                .map(|handle| DescriptorSet { handle, pool_epoch: self.epoch })
                .collect()),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                self.budget = before;
                engine_error!(
                    "ya::vulkan",
                    "Descriptor pool out of descriptors for {} set(s) ({} of {} sets used)",
                    layouts.len(), before.allocated(), before.max_sets()
                );
                Err(Error::DescriptorPoolExhausted { max_sets: self.desc.max_sets })
            }
            Err(e) => {
                self.budget = before;
                Err(engine_err!("ya::vulkan", "Failed to allocate descriptor sets: {:?}", e))
            }
        }
    }

    /// Return every set to the pool; previously allocated sets become stale
    pub fn reset(&mut self) -> Result<()> {
        unsafe { self.ctx.device().reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty()) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to reset descriptor pool: {:?}", e))?;
        self.budget.reset();
        self.epoch += 1;
        engine_debug!("ya::vulkan", "Descriptor pool reset (epoch {})", self.epoch);
        Ok(())
    }

    pub fn budget(&self) -> DescriptorPoolBudget {
        self.budget
    }

    /// Apply every write in one `vkUpdateDescriptorSets` call
    pub fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) -> Result<()> {
        let mut buffer_infos: Vec<vk::DescriptorBufferInfo> = Vec::with_capacity(writes.len());
        let mut image_infos: Vec<vk::DescriptorImageInfo> = Vec::with_capacity(writes.len());

        for write in writes {
            if write.set.pool_epoch != self.epoch {
                return Err(Error::InvalidState(format!(
                    "Descriptor set written at binding {} was allocated before the last pool reset",
                    write.binding
                )));
            }
            match &write.resource {
                DescriptorResource::UniformBuffer { buffer, offset, range } => {
                    require_buffer_usage(buffer, BufferUsage::UNIFORM, write.binding)?;
                    buffer_infos.push(vk::DescriptorBufferInfo { buffer: buffer.handle(), offset: *offset, range: *range });
                }
                DescriptorResource::StorageBuffer { buffer, offset, range } => {
                    require_buffer_usage(buffer, BufferUsage::STORAGE, write.binding)?;
                    buffer_infos.push(vk::DescriptorBufferInfo { buffer: buffer.handle(), offset: *offset, range: *range });
                }
                DescriptorResource::CombinedImageSampler { image, sampler, layout } => {
                    image_infos.push(vk::DescriptorImageInfo {
                        sampler: sampler.handle(),
                        image_view: image.view(),
                        image_layout: image_layout_to_vk(*layout),
                    });
                }
                DescriptorResource::InputAttachment { image, layout } => {
                    image_infos.push(vk::DescriptorImageInfo {
                        sampler: vk::Sampler::null(),
                        image_view: image.view(),
                        image_layout: image_layout_to_vk(*layout),
                    });
                }
            }
        }

        // Second pass: the info vectors no longer move
        let mut buffer_index = 0usize;
        let mut image_index = 0usize;
        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .map(|write| {
                let base = vk::WriteDescriptorSet::default()
                    .dst_set(write.set.handle)
                    .dst_binding(write.binding)
                    .dst_array_element(write.array_element)
                    .descriptor_type(descriptor_type_to_vk(write.resource.descriptor_type()));
                match write.resource {
                    DescriptorResource::UniformBuffer { .. } | DescriptorResource::StorageBuffer { .. } => {
                        buffer_index += 1;
                        base.buffer_info(std::slice::from_ref(&buffer_infos[buffer_index - 1]))
                    }
                    DescriptorResource::CombinedImageSampler { .. } | DescriptorResource::InputAttachment { .. } => {
                        image_index += 1;
                        base.image_info(std::slice::from_ref(&image_infos[image_index - 1]))
                    }
                }
            })
            .collect();

        unsafe { self.ctx.device().update_descriptor_sets(&vk_writes, &[]) };
        Ok(())
    }
}

impl Drop for DescriptorHelper {
    fn drop(&mut self) {
        unsafe { self.ctx.device().destroy_descriptor_pool(self.pool, None) };
    }
}

/// Image - owned GPU images, swapchain image views and samplers

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;
use ya_engine::ya::{Error, Result};
use ya_engine::ya::render::{
    find_memory_type, Extent2D, Format, ImageAspectFlags, ImageDesc, ImageLayout, LayoutTransition,
};
use ya_engine::{engine_err, engine_error};

use crate::vulkan_buffer::pinned_requirements;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    access_flags_to_vk, aspect_to_vk, format_to_vk, image_layout_to_vk, image_usage_to_vk,
    sample_count_to_vk, stage_flags_to_vk,
};

/// 2D view over every mip level of `image`
pub(crate) fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: Format,
    mip_levels: u32,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format_to_vk(format))
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect_to_vk(ImageAspectFlags::for_format(format)),
            base_mip_level: 0,
            level_count: mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe { device.create_image_view(&create_info, None) }
        .map_err(|e| engine_err!("ya::vulkan", "Failed to create image view ({:?}): {:?}", format, e))
}

/// Record a pipeline barrier performing `transition` on every mip level of `image`
pub(crate) fn record_layout_transition(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    transition: &LayoutTransition,
    mip_levels: u32,
) {
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(image_layout_to_vk(transition.old_layout))
        .new_layout(image_layout_to_vk(transition.new_layout))
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect_to_vk(transition.aspect),
            base_mip_level: 0,
            level_count: mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        })
        .src_access_mask(access_flags_to_vk(transition.src_access))
        .dst_access_mask(access_flags_to_vk(transition.dst_access));

    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            stage_flags_to_vk(transition.src_stage),
            stage_flags_to_vk(transition.dst_stage),
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

/// Image with its own memory, view and tracked layout
pub struct Image {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    desc: ImageDesc,
    layout: ImageLayout,
}

impl Image {
    /// Create a 2D optimal-tiling image in `Undefined` layout
    ///
    /// # Errors
    ///
    /// - `Error::InvalidResource` for an empty extent, zero mips or bad usage
    /// - `Error::NoSuitableMemoryType` when no memory type matches `desc.memory`
    /// - `Error::OutOfMemory` when the allocator cannot serve the request
    pub fn new(ctx: Arc<GpuContext>, desc: &ImageDesc) -> Result<Self> {
        desc.validate()?;
        let device = ctx.device();

        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format_to_vk(desc.format))
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .samples(sample_count_to_vk(desc.samples))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(image_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.create_image(&create_info, None) }.map_err(|e| {
            engine_err!(
                "ya::vulkan",
                "Failed to create image '{}' ({}x{} {:?}): {:?}",
                desc.name, desc.extent.width, desc.extent.height, desc.format, e
            )
        })?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };

        let allocation = find_memory_type(ctx.memory_types(), requirements.memory_type_bits, desc.memory)
            .and_then(|memory_type_index| {
                ctx.allocator()?
                    .allocate(&AllocationCreateDesc {
                        name: &desc.name,
                        requirements: pinned_requirements(requirements, memory_type_index),
                        location: MemoryLocation::Unknown,
                        linear: false,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| {
                        let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                        engine_error!(
                            "ya::vulkan",
                            "Out of GPU memory for image '{}' ({}x{}, required: {:.2} MB): {:?}",
                            desc.name, desc.extent.width, desc.extent.height, size_mb, e
                        );
                        Error::OutOfMemory
                    })
            });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let bind = unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) };

        // From here on Drop releases whatever was created
        let mut created = Self {
            ctx: Arc::clone(&ctx),
            image,
            view: vk::ImageView::null(),
            allocation: Some(allocation),
            desc: desc.clone(),
            layout: ImageLayout::Undefined,
        };
        bind.map_err(|e| engine_err!("ya::vulkan", "Failed to bind image memory for '{}': {:?}", desc.name, e))?;

        created.view = create_image_view(device, image, desc.format, desc.mip_levels)?;

        ctx.set_debug_name(image, &desc.name);
        ctx.set_debug_name(created.view, &format!("{}_View", desc.name));

        Ok(created)
    }

    pub fn handle(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    pub fn extent(&self) -> Extent2D {
        self.desc.extent
    }

    pub fn format(&self) -> Format {
        self.desc.format
    }

    /// Layout after the last transition recorded through the resource manager
    pub fn layout(&self) -> ImageLayout {
        self.layout
    }

    pub(crate) fn set_layout(&mut self, layout: ImageLayout) {
        self.layout = layout;
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            let device = self.ctx.device();
            if self.view != vk::ImageView::null() {
                device.destroy_image_view(self.view, None);
            }
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }
            device.destroy_image(self.image, None);
        }
    }
}

/// View over an image owned by the swapchain
///
/// Only the view is destroyed on drop; the image goes away with the swapchain.
pub struct SwapchainImage {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
}

impl SwapchainImage {
    pub(crate) fn new(ctx: Arc<GpuContext>, image: vk::Image, format: Format, name: &str) -> Result<Self> {
        let view = create_image_view(ctx.device(), image, format, 1)?;
        ctx.set_debug_name(image, name);
        ctx.set_debug_name(view, &format!("{}_View", name));
        Ok(Self { ctx, image, view })
    }

    pub fn handle(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for SwapchainImage {
    fn drop(&mut self) {
        unsafe { self.ctx.device().destroy_image_view(self.view, None) };
    }
}

/// Sampler presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    LinearRepeat,
    LinearClamp,
    NearestRepeat,
    NearestClamp,
}

impl SamplerKind {
    fn filter(&self) -> (vk::Filter, vk::SamplerMipmapMode) {
        match self {
            SamplerKind::LinearRepeat | SamplerKind::LinearClamp => (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR),
            SamplerKind::NearestRepeat | SamplerKind::NearestClamp => {
                (vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST)
            }
        }
    }

    fn address_mode(&self) -> vk::SamplerAddressMode {
        match self {
            SamplerKind::LinearRepeat | SamplerKind::NearestRepeat => vk::SamplerAddressMode::REPEAT,
            SamplerKind::LinearClamp | SamplerKind::NearestClamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        }
    }

    fn is_linear(&self) -> bool {
        matches!(self, SamplerKind::LinearRepeat | SamplerKind::LinearClamp)
    }
}

pub struct Sampler {
    ctx: Arc<GpuContext>,
    pub(crate) sampler: vk::Sampler,
    kind: SamplerKind,
}

impl Sampler {
    /// Linear presets use anisotropic filtering when the device enables it
    pub fn new(ctx: Arc<GpuContext>, kind: SamplerKind) -> Result<Self> {
        let (filter, mipmap) = kind.filter();
        let address = kind.address_mode();

        let mut create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(mipmap)
            .address_mode_u(address)
            .address_mode_v(address)
            .address_mode_w(address)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .unnormalized_coordinates(false);

        match ctx.logical_device().max_sampler_anisotropy().filter(|_| kind.is_linear()) {
            Some(max_anisotropy) => {
                create_info = create_info.anisotropy_enable(true).max_anisotropy(max_anisotropy.min(16.0));
            }
            None => {
                create_info = create_info.anisotropy_enable(false).max_anisotropy(1.0);
            }
        }

        let sampler = unsafe { ctx.device().create_sampler(&create_info, None) }
            .map_err(|e| engine_err!("ya::vulkan", "Failed to create {:?} sampler: {:?}", kind, e))?;
        ctx.set_debug_name(sampler, &format!("Sampler_{:?}", kind));

        Ok(Self { ctx, sampler, kind })
    }

    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }

    pub fn kind(&self) -> SamplerKind {
        self.kind
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe { self.ctx.device().destroy_sampler(self.sampler, None) };
    }
}

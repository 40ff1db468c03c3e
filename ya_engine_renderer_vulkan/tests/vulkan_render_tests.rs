//! Integration tests for VulkanRender
//!
//! These tests bring up a real device on a hidden window.
//! All tests require a GPU and are marked with #[ignore].
//!
//! Run with: cargo test --test vulkan_render_tests -- --ignored

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use serial_test::serial;
use winit::event_loop::EventLoop;
use winit::window::Window;
use ya_engine::ya::Error;
use ya_engine::ya::render::{
    find_memory_type, BufferDesc, BufferUsage, ClearValue, CommandBufferState, CommandList, DescriptorBinding,
    DescriptorSetLayoutDesc, DescriptorType, Extent2D, FixedFunctionState, FrameStatus, GraphicsPipelineDesc, MemoryPropertyFlags, PipelineLayoutDesc,
    PresentMode, Render, RenderConfig, ShaderStageFlags, Swapchain as _, SwapchainState, VertexInputMode,
};
use ya_engine_renderer_vulkan::{DescriptorWrite, SpirvShaderProcessor, VulkanRender, WindowBackend};

/// Helper to create a hidden test window for Vulkan
#[allow(deprecated)]
fn create_test_window() -> (Arc<dyn WindowBackend>, EventLoop<()>) {
    let event_loop = EventLoop::new().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("VulkanRender Test")
        .with_inner_size(winit::dpi::LogicalSize::new(800, 600))
        .with_visible(false);
    let window: Arc<dyn WindowBackend> = Arc::new(event_loop.create_window(window_attrs).unwrap());
    (window, event_loop)
}

/// Window whose reported size can drop to zero, as when minimized
struct MinimizableWindow {
    window: Window,
    minimized: AtomicBool,
}

impl WindowBackend for MinimizableWindow {
    fn window_size(&self) -> Extent2D {
        if self.minimized.load(Ordering::Acquire) {
            Extent2D::new(0, 0)
        } else {
            self.window.window_size()
        }
    }

    fn required_extensions(&self) -> ya_engine::ya::Result<Vec<String>> {
        self.window.required_extensions()
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> ya_engine::ya::Result<ash::vk::SurfaceKHR> {
        self.window.create_surface(entry, instance)
    }
}

fn create_render() -> (VulkanRender, EventLoop<()>) {
    let (window, event_loop) = create_test_window();
    let render = VulkanRender::new(window, RenderConfig::default()).unwrap();
    (render, event_loop)
}

// ============================================================================
// INITIALIZATION
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_init_builds_targets_for_every_image() {
    let (render, _event_loop) = create_render();

    let swapchain = render.swapchain();
    assert_eq!(swapchain.state(), SwapchainState::Created);
    assert!(swapchain.image_count() >= 2);
    assert_eq!(render.render_targets().framebuffers().len(), swapchain.image_count() as usize);
    assert!(render.framebuffer(swapchain.image_count()).is_err());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_init_rejects_zero_frames_in_flight() {
    let (window, _event_loop) = create_test_window();
    let config = RenderConfig { frames_in_flight: 0, ..RenderConfig::default() };
    assert!(VulkanRender::new(window, config).is_err());
}

// ============================================================================
// FRAME LOOP
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_clear_frames_round_trip() {
    let (mut render, _event_loop) = create_render();
    let mut command_buffers = render.allocate_command_buffers(1).unwrap();

    for _ in 0..(render.config().frames_in_flight * 3) {
        let token = match render.begin_frame().unwrap() {
            FrameStatus::Ready(token) => token,
            FrameStatus::Skip => continue,
        };

        let command_buffer = &mut command_buffers[0];
        command_buffer.reset().unwrap();
        command_buffer.begin().unwrap();
        let framebuffer = render.framebuffer(token.image_index).unwrap();
        command_buffer
            .begin_render_pass(render.render_pass(), framebuffer, &[ClearValue::Color([0.1, 0.2, 0.3, 1.0])])
            .unwrap();
        command_buffer.end_render_pass().unwrap();
        command_buffer.end().unwrap();

        render.end_frame(token, &mut command_buffers).unwrap();
    }

    render.wait_idle().unwrap();
    assert_eq!(command_buffers[0].state(), CommandBufferState::Executable);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_end_frame_rejects_unrecorded_buffer() {
    let (mut render, _event_loop) = create_render();
    let mut command_buffers = render.allocate_command_buffers(1).unwrap();

    if let FrameStatus::Ready(token) = render.begin_frame().unwrap() {
        let err = render.end_frame(token, &mut command_buffers).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(render.frame_sync().in_progress().is_some());
    }
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_begin_frame_twice_is_invalid() {
    let (mut render, _event_loop) = create_render();

    if let FrameStatus::Ready(_) = render.begin_frame().unwrap() {
        assert!(matches!(render.begin_frame(), Err(Error::InvalidState(_))));
    }
}

// ============================================================================
// SWAPCHAIN
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_recreate_with_same_parameters_is_idempotent() {
    let (mut render, _event_loop) = create_render();
    let image_count = render.swapchain().image_count();
    let surface_format = render.swapchain().surface_format();
    let generation = render.render_pass().generation();

    let create_info = render.swapchain().create_info().clone();
    render.recreate_swapchain(&create_info).unwrap();

    assert_eq!(render.swapchain().image_count(), image_count);
    assert_eq!(render.swapchain().surface_format(), surface_format);
    assert_eq!(render.render_pass().generation(), generation);
}

#[test]
#[ignore] // Requires GPU
#[serial]
#[allow(deprecated)]
fn test_minimized_window_skips_frames_until_restored() {
    let event_loop = EventLoop::new().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("VulkanRender Minimize Test")
        .with_inner_size(winit::dpi::LogicalSize::new(800, 600))
        .with_visible(false);
    let window = Arc::new(MinimizableWindow {
        window: event_loop.create_window(window_attrs).unwrap(),
        minimized: AtomicBool::new(false),
    });
    let mut render = VulkanRender::new(window.clone(), RenderConfig::default()).unwrap();
    let create_info = render.swapchain().create_info().clone();

    window.minimized.store(true, Ordering::Release);
    render.recreate_swapchain(&create_info).unwrap();
    assert_eq!(render.swapchain().image_count(), 0);
    assert!(render.render_targets().framebuffers().is_empty());
    assert!(matches!(render.begin_frame().unwrap(), FrameStatus::Skip));
    assert!(render.frame_sync().in_progress().is_none());

    window.minimized.store(false, Ordering::Release);
    render.recreate_swapchain(&create_info).unwrap();
    assert!(render.swapchain().image_count() >= 2);
    assert_eq!(render.render_targets().framebuffers().len(), render.swapchain().image_count() as usize);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_present_mode_change_rebuilds_targets() {
    let (mut render, _event_loop) = create_render();
    let version = render.swapchain().version();

    render.set_vsync(false).unwrap();
    render.set_present_mode(PresentMode::Mailbox).unwrap();

    assert!(render.swapchain().version() > version);
    assert_eq!(render.swapchain().state(), SwapchainState::Created);
    assert_eq!(render.render_targets().framebuffers().len(), render.swapchain().image_count() as usize);
}

// ============================================================================
// COMMAND BUFFERS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_state_machine() {
    let (mut render, _event_loop) = create_render();
    let mut command_buffers = render.allocate_command_buffers(2).unwrap();
    assert_eq!(command_buffers.len(), 2);

    let command_buffer = &mut command_buffers[0];
    assert_eq!(command_buffer.state(), CommandBufferState::Initial);
    assert!(command_buffer.end().is_err());
    assert!(command_buffer.draw(3, 0).is_err());

    command_buffer.begin().unwrap();
    assert_eq!(command_buffer.state(), CommandBufferState::Recording);
    assert!(command_buffer.begin().is_err());
    // Draws need a render pass
    assert!(command_buffer.draw(3, 0).is_err());

    command_buffer.end().unwrap();
    assert_eq!(command_buffer.state(), CommandBufferState::Executable);
    command_buffer.reset().unwrap();
    assert_eq!(command_buffer.state(), CommandBufferState::Initial);

    assert!(render.allocate_command_buffers(0).unwrap().is_empty());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_one_time_buffer_is_invalid_after_execution() {
    let (mut render, _event_loop) = create_render();
    let mut command_buffers = render.allocate_one_time_command_buffers(1).unwrap();
    assert!(command_buffers[0].is_one_time_submit());

    if let FrameStatus::Ready(token) = render.begin_frame().unwrap() {
        let framebuffer = render.framebuffer(token.image_index).unwrap();
        command_buffers[0].begin().unwrap();
        command_buffers[0]
            .begin_render_pass(render.render_pass(), framebuffer, &[ClearValue::Color([0.0, 0.0, 0.0, 1.0])])
            .unwrap();
        command_buffers[0].end_render_pass().unwrap();
        command_buffers[0].end().unwrap();
        render.end_frame(token, &mut command_buffers).unwrap();
        render.wait_idle().unwrap();
        assert_eq!(command_buffers[0].state(), CommandBufferState::Invalid);
    }
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_pool_reset_returns_buffers_to_initial() {
    let (mut render, _event_loop) = create_render();
    let mut command_buffers = render.allocate_command_buffers(1).unwrap();
    command_buffers[0].begin().unwrap();
    command_buffers[0].end().unwrap();
    assert_eq!(command_buffers[0].state(), CommandBufferState::Executable);

    render.command_pool().reset().unwrap();
    assert_eq!(command_buffers[0].state(), CommandBufferState::Initial);

    // Contents are gone, so the buffer can no longer be submitted
    if let FrameStatus::Ready(token) = render.begin_frame().unwrap() {
        let err = render.end_frame(token, &mut command_buffers).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    // Recording starts over from Initial
    command_buffers[0].begin().unwrap();
    assert_eq!(command_buffers[0].state(), CommandBufferState::Recording);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_pool_reset_refused_while_buffers_pending() {
    let (mut render, _event_loop) = create_render();
    let mut command_buffers = render.allocate_command_buffers(1).unwrap();

    let token = loop {
        if let FrameStatus::Ready(token) = render.begin_frame().unwrap() {
            break token;
        }
    };
    let framebuffer = render.framebuffer(token.image_index).unwrap();
    command_buffers[0].begin().unwrap();
    command_buffers[0]
        .begin_render_pass(render.render_pass(), framebuffer, &[ClearValue::Color([0.0, 0.0, 0.0, 1.0])])
        .unwrap();
    command_buffers[0].end_render_pass().unwrap();
    command_buffers[0].end().unwrap();
    render.end_frame(token, &mut command_buffers).unwrap();

    if render.command_pool().pending_submissions().unwrap() > 0 {
        assert!(matches!(render.command_pool().reset(), Err(Error::InvalidState(_))));
        assert_eq!(command_buffers[0].state(), CommandBufferState::Pending);
    }

    render.wait_idle().unwrap();
    assert_eq!(render.command_pool().pending_submissions().unwrap(), 0);
    render.command_pool().reset().unwrap();
    assert_eq!(command_buffers[0].state(), CommandBufferState::Initial);
}

// ============================================================================
// RESOURCES
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_buffer_uses_first_matching_memory_type() {
    let (render, _event_loop) = create_render();
    let ctx = render.context();

    for memory in [
        MemoryPropertyFlags::DEVICE_LOCAL,
        MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
    ] {
        let buffer = render
            .resources()
            .create_buffer(
                &BufferDesc {
                    name: "Pinned".to_string(),
                    size: 1024,
                    usage: BufferUsage::VERTEX,
                    memory,
                },
                None,
            )
            .unwrap();

        let requirements = unsafe { ctx.device().get_buffer_memory_requirements(buffer.handle()) };
        let expected = find_memory_type(ctx.memory_types(), requirements.memory_type_bits, memory).unwrap();
        assert_eq!(buffer.memory_type_index(), expected);
        assert!(ctx.memory_types()[expected as usize].property_flags.contains(memory));
    }
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_staged_buffer_readback() {
    let (render, _event_loop) = create_render();
    let resources = render.resources();
    let data: Vec<u8> = (0..=255).collect();

    let device_local = resources
        .create_buffer(
            &BufferDesc {
                name: "DeviceLocal".to_string(),
                size: 256,
                usage: BufferUsage::TRANSFER_SRC | BufferUsage::VERTEX,
                memory: MemoryPropertyFlags::DEVICE_LOCAL,
            },
            Some(&data),
        )
        .unwrap();
    let readback = resources
        .create_buffer(
            &BufferDesc {
                name: "Readback".to_string(),
                size: 256,
                usage: BufferUsage::TRANSFER_DST,
                memory: MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
            },
            None,
        )
        .unwrap();

    resources.copy_buffer(&device_local, 0, &readback, 0, 256).unwrap();
    assert_eq!(readback.read(0, 256).unwrap(), data);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_descriptor_sets_invalidated_by_pool_reset() {
    let (mut render, _event_loop) = create_render();
    let uniform = render
        .resources()
        .create_buffer(
            &BufferDesc {
                name: "Uniform".to_string(),
                size: 64,
                usage: BufferUsage::UNIFORM,
                memory: MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
            },
            None,
        )
        .unwrap();

    let descriptors = render.descriptor_helper_mut();
    let layout = descriptors
        .create_layout(&DescriptorSetLayoutDesc {
            bindings: vec![DescriptorBinding {
                binding: 0,
                descriptor_type: DescriptorType::UniformBuffer,
                count: 1,
                stages: ShaderStageFlags::VERTEX,
            }],
        })
        .unwrap();
    let sets = descriptors.allocate(&[&layout]).unwrap();
    descriptors.update_descriptor_sets(&[DescriptorWrite::uniform_buffer(&sets[0], 0, &uniform)]).unwrap();

    descriptors.reset().unwrap();
    let err = descriptors.update_descriptor_sets(&[DescriptorWrite::uniform_buffer(&sets[0], 0, &uniform)]);
    assert!(matches!(err, Err(Error::InvalidState(_))));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_pipeline_without_shader_files_fails() {
    let (render, _event_loop) = create_render();
    let shaders = SpirvShaderProcessor::new(std::env::temp_dir().join("ya_engine_missing_shaders"));
    let layout = render.create_pipeline_layout(&PipelineLayoutDesc::default()).unwrap();
    let desc = GraphicsPipelineDesc::new(
        "missing",
        "does_not_exist",
        render.render_pass().desc(),
        0,
        VertexInputMode::FromShader,
        FixedFunctionState::default(),
    );

    let err = render.create_pipeline(&shaders, layout, &desc).unwrap_err();
    assert!(matches!(err, Error::InvalidResource(_)));
}

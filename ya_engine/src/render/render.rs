/// Render trait - the frame-level API exposed to the engine and tools

use crate::error::Result;
use crate::render::{CommandList, FrameStatus, FrameToken, Swapchain};

/// Backend renderer
///
/// Construction is the backend's `init`. The frame loop is:
///
/// ```text
/// match render.begin_frame()? {
///     FrameStatus::Skip => continue,
///     FrameStatus::Ready(token) => {
///         // record into command buffers
///         render.end_frame(token, &mut command_buffers)?;
///     }
/// }
/// ```
pub trait Render {
    type CommandBuffer: CommandList;
    type Swapchain: Swapchain;

    /// Begin a new frame
    ///
    /// # Returns
    ///
    /// The acquired image, or `Skip` when nothing can be rendered (minimized window)
    fn begin_frame(&mut self) -> Result<FrameStatus>;

    /// Submit the recorded command buffers and present
    ///
    /// # Returns
    ///
    /// `true` when presented, `false` when the swapchain was recreated afterwards
    fn end_frame(&mut self, token: FrameToken, command_buffers: &mut [Self::CommandBuffer]) -> Result<bool>;

    /// Allocate `count` primary command buffers from the graphics pool, all or nothing
    fn allocate_command_buffers(&mut self, count: u32) -> Result<Vec<Self::CommandBuffer>>;

    fn swapchain(&self) -> &Self::Swapchain;

    /// Wait for all GPU operations to complete
    fn wait_idle(&self) -> Result<()>;
}

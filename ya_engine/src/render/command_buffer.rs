/// Command buffer lifecycle and the backend-agnostic recording interface
///
/// ```text
/// Initial --begin--> Recording --end--> Executable --submit--> Pending
///    ^                                      ^                     |
///    |                                      +---- completed ------+  (reusable)
///    +------------- begin / reset ---- Invalid <---- completed ----+  (one-time)
/// ```

use crate::error::{Error, Result};
use crate::render::Extent2D;

/// Command buffer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferState {
    /// Allocated or reset, nothing recorded
    Initial,
    /// Between `begin` and `end`
    Recording,
    /// Recorded and ready to submit
    Executable,
    /// Submitted, GPU not done yet
    Pending,
    /// One-time buffer already executed; must be re-recorded
    Invalid,
}

/// Lifecycle rules shared by every command buffer implementation
#[derive(Debug, Clone, Copy)]
pub struct CommandBufferLifecycle {
    state: CommandBufferState,
    one_time_submit: bool,
}

impl CommandBufferLifecycle {
    pub fn new(one_time_submit: bool) -> Self {
        Self { state: CommandBufferState::Initial, one_time_submit }
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    pub fn is_one_time_submit(&self) -> bool {
        self.one_time_submit
    }

    /// `Initial | Executable | Invalid -> Recording`; anything recorded before is discarded
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` while recording or pending.
    pub fn begin(&mut self) -> Result<()> {
        match self.state {
            CommandBufferState::Recording => {
                Err(Error::InvalidState("begin() called on a command buffer already recording".to_string()))
            }
            CommandBufferState::Pending => {
                Err(Error::InvalidState("begin() called on a command buffer still pending on the GPU".to_string()))
            }
            _ => {
                self.state = CommandBufferState::Recording;
                Ok(())
            }
        }
    }

    /// `Recording -> Executable`
    pub fn end(&mut self) -> Result<()> {
        if self.state != CommandBufferState::Recording {
            return Err(Error::InvalidState(format!(
                "end() called on a command buffer in state {:?}",
                self.state
            )));
        }
        self.state = CommandBufferState::Executable;
        Ok(())
    }

    /// `Executable -> Pending`
    pub fn submit(&mut self) -> Result<()> {
        if self.state != CommandBufferState::Executable {
            return Err(Error::InvalidState(format!(
                "Only executable command buffers can be submitted (state {:?})",
                self.state
            )));
        }
        self.state = CommandBufferState::Pending;
        Ok(())
    }

    /// GPU finished: `Pending -> Invalid` for one-time buffers, else `Pending -> Executable`
    pub fn complete(&mut self) {
        if self.state == CommandBufferState::Pending {
            self.state = if self.one_time_submit {
                CommandBufferState::Invalid
            } else {
                CommandBufferState::Executable
            };
        }
    }

    /// Back to `Initial`; not allowed while pending
    pub fn reset(&mut self) -> Result<()> {
        if self.state == CommandBufferState::Pending {
            return Err(Error::InvalidState("Cannot reset a pending command buffer".to_string()));
        }
        self.state = CommandBufferState::Initial;
        Ok(())
    }

    /// Recording commands is only valid between `begin` and `end`
    pub fn require_recording(&self, command: &str) -> Result<()> {
        if self.state != CommandBufferState::Recording {
            return Err(Error::InvalidState(format!(
                "{} recorded outside begin()/end() (state {:?})",
                command, self.state
            )));
        }
        Ok(())
    }
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Whole target, depth `[0, 1]`
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn from_extent(extent: Extent2D) -> Self {
        Self { x: 0, y: 0, width: extent.width, height: extent.height }
    }
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Color clear value (RGBA)
    Color([f32; 4]),
    /// Depth/stencil clear value
    DepthStencil { depth: f32, stencil: u32 },
}

/// Command list for recording rendering commands
///
/// Binding commands take backend objects and live on the backend type; this
/// trait carries the lifecycle and the commands every backend shares.
pub trait CommandList {
    /// Begin recording; fails while recording or pending
    fn begin(&mut self) -> Result<()>;

    /// End recording; fails unless recording
    fn end(&mut self) -> Result<()>;

    /// Discard recorded commands
    fn reset(&mut self) -> Result<()>;

    fn state(&self) -> CommandBufferState;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Draw vertices
    ///
    /// # Arguments
    ///
    /// * `vertex_count` - Number of vertices to draw
    /// * `first_vertex` - Index of first vertex
    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    /// Draw indexed vertices
    ///
    /// # Arguments
    ///
    /// * `index_count` - Number of indices to draw
    /// * `first_index` - Index of first index
    /// * `vertex_offset` - Value added to vertex index before indexing into the vertex buffer
    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()>;
}

#[cfg(test)]
#[path = "command_buffer_tests.rs"]
mod tests;

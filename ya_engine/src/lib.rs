/*!
# Ya Engine

Core types and policies of the Ya render device.

This crate holds everything about device bring-up and the frame loop that can
be decided without a GPU: feature negotiation, adapter scoring, queue
planning, swapchain negotiation, render pass and pipeline validation, the
command buffer lifecycle and the frame-in-flight protocol. Backends (see
`ya_engine_renderer_vulkan`) execute those decisions.

## Architecture

- **Render**: frame-level API implemented by a backend
- **FrameSync**: frame-in-flight state machine over a `FrameDevice`
- **Swapchain**: negotiated swapchain with an explicit lifecycle
- **CommandList**: command buffer lifecycle and shared recording commands
- **ShaderProcessor**: external shader binaries and reflection
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod render;

// Main ya namespace module
pub mod ya {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging hub
    pub use crate::engine::Engine;

    // Frame-level render API
    pub use crate::render::Render;

    // Logging sub-module (types only; the engine_* macros live at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Render sub-module with all device, swapchain and frame types
    pub mod render {
        pub use crate::render::*;
    }
}

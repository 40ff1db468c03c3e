/// Frame-in-flight synchronization protocol
///
/// `FrameSync` owns the ordering rules of a frame; a `FrameDevice` owns the
/// fences, semaphores, queues and swapchain that carry them out.
///
/// Fences and "image available" semaphores are indexed by frame-in-flight
/// slot. "Render finished" semaphores are indexed by swapchain image. The
/// slot advances modulo the frame-in-flight count, never modulo the image
/// count: the two are configured independently.
///
/// Per slot:
///
/// ```text
/// Idle --wait+reset--> Armed --submit--> Submitted --wait+reset--> Armed ...
/// ```
///
/// `Armed` means the fence is unsignaled with nothing submitted behind it. A
/// skipped frame leaves its slot armed so the next `begin_frame` does not
/// wait on a fence nobody will signal.

use crate::error::{Error, Result};
use crate::render::{CommandBufferState, CommandList, PipelineStageFlags};

/// Semaphore identified by the index space it lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemaphoreRef {
    /// Signaled by acquire, indexed by frame-in-flight slot
    ImageAvailable(u32),
    /// Signaled by submit, indexed by swapchain image
    RenderFinished(u32),
}

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { image_index: u32, suboptimal: bool },
    OutOfDate,
}

/// Result of presenting a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Everything one graphics-queue submission waits on and signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSubmission {
    pub frame_slot: u32,
    pub image_index: u32,
    pub wait_semaphore: SemaphoreRef,
    pub wait_stage: PipelineStageFlags,
    pub signal_semaphore: SemaphoreRef,
    /// Fence signaled when the GPU finishes this submission
    pub fence_slot: u32,
}

impl FrameSubmission {
    pub fn new(frame_slot: u32, image_index: u32) -> Self {
        Self {
            frame_slot,
            image_index,
            wait_semaphore: SemaphoreRef::ImageAvailable(frame_slot),
            wait_stage: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: SemaphoreRef::RenderFinished(image_index),
            fence_slot: frame_slot,
        }
    }
}

/// GPU-side operations the frame protocol drives
///
/// All waits are unbounded.
pub trait FrameDevice {
    type CommandBuffer: CommandList;

    /// Block until the slot's fence is signaled
    fn wait_for_fence(&mut self, slot: u32) -> Result<()>;

    fn reset_fence(&mut self, slot: u32) -> Result<()>;

    /// Acquire the next image, signaling `ImageAvailable(slot)`
    fn acquire_next_image(&mut self, slot: u32) -> Result<AcquireOutcome>;

    /// Submit to the graphics queue and move the buffers to `Pending`
    fn submit(&mut self, submission: &FrameSubmission, command_buffers: &mut [Self::CommandBuffer]) -> Result<()>;

    fn present(&mut self, image_index: u32, wait: SemaphoreRef) -> Result<PresentOutcome>;

    fn wait_idle(&mut self) -> Result<()>;

    /// Recreate the swapchain and its per-image objects; returns the new image count
    fn recreate_swapchain(&mut self) -> Result<u32>;

    fn swapchain_image_count(&self) -> u32;
}

/// Per-slot fence state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Fence signaled, nothing outstanding
    Idle,
    /// Fence reset, nothing submitted
    Armed,
    /// GPU work outstanding
    Submitted,
}

/// Handed out by `begin_frame`, consumed by `end_frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameToken {
    pub frame_slot: u32,
    pub image_index: u32,
    pub frame_number: u64,
    /// Acquire reported a suboptimal swapchain
    pub suboptimal: bool,
}

/// Outcome of `begin_frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Ready(FrameToken),
    /// Render nothing and submit nothing this frame
    Skip,
}

/// Frame protocol state machine
#[derive(Debug)]
pub struct FrameSync {
    slots: Vec<SlotState>,
    current_slot: u32,
    frame_number: u64,
    in_progress: Option<FrameToken>,
}

impl FrameSync {
    /// # Errors
    ///
    /// `Error::InvalidResource` when `flight_frame_count` is zero.
    pub fn new(flight_frame_count: u32) -> Result<Self> {
        if flight_frame_count == 0 {
            return Err(Error::InvalidResource("At least one frame in flight is required".to_string()));
        }
        Ok(Self {
            slots: vec![SlotState::Idle; flight_frame_count as usize],
            current_slot: 0,
            frame_number: 0,
            in_progress: None,
        })
    }

    pub fn flight_frame_count(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn current_slot(&self) -> u32 {
        self.current_slot
    }

    /// Frames presented or recreated so far
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn slot_state(&self, slot: u32) -> Option<SlotState> {
        self.slots.get(slot as usize).copied()
    }

    pub fn in_progress(&self) -> Option<FrameToken> {
        self.in_progress
    }

    /// Wait for the slot, reset its fence and acquire an image
    ///
    /// An out-of-date swapchain is recreated and the acquire retried once.
    /// A swapchain with no images (minimized window) yields `Skip`.
    pub fn begin_frame<D: FrameDevice>(&mut self, device: &mut D) -> Result<FrameStatus> {
        if let Some(token) = self.in_progress {
            return Err(Error::InvalidState(format!(
                "begin_frame() while frame {} is still in progress",
                token.frame_number
            )));
        }

        if device.swapchain_image_count() == 0 && Self::recreate(device)? == 0 {
            crate::engine_trace!("ya::FrameSync", "Swapchain has no images, skipping frame");
            return Ok(FrameStatus::Skip);
        }

        let slot = self.current_slot;
        if self.slots[slot as usize] != SlotState::Armed {
            device.wait_for_fence(slot)?;
            device.reset_fence(slot)?;
            self.slots[slot as usize] = SlotState::Armed;
        }

        let (image_index, suboptimal) = match device.acquire_next_image(slot)? {
            AcquireOutcome::Acquired { image_index, suboptimal } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                crate::engine_debug!("ya::FrameSync", "Swapchain out of date on acquire, recreating");
                if Self::recreate(device)? == 0 {
                    return Ok(FrameStatus::Skip);
                }
                match device.acquire_next_image(slot)? {
                    AcquireOutcome::Acquired { image_index, suboptimal } => (image_index, suboptimal),
                    AcquireOutcome::OutOfDate => {
                        crate::engine_warn!("ya::FrameSync", "Swapchain still out of date after recreate, skipping frame");
                        return Ok(FrameStatus::Skip);
                    }
                }
            }
        };

        let token = FrameToken {
            frame_slot: slot,
            image_index,
            frame_number: self.frame_number,
            suboptimal,
        };
        self.in_progress = Some(token);
        Ok(FrameStatus::Ready(token))
    }

    /// Submit, present and advance to the next slot
    ///
    /// Returns `true` when the image was presented to an up-to-date
    /// swapchain, `false` when the swapchain had to be recreated afterwards.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` when `token` is not the frame in progress or a
    /// command buffer is not executable. The frame stays in progress then.
    pub fn end_frame<D: FrameDevice>(
        &mut self,
        device: &mut D,
        token: FrameToken,
        command_buffers: &mut [D::CommandBuffer],
    ) -> Result<bool> {
        if self.in_progress != Some(token) {
            return Err(Error::InvalidState(format!(
                "end_frame() for frame {} which is not in progress",
                token.frame_number
            )));
        }
        if let Some(index) = command_buffers
            .iter()
            .position(|cb| cb.state() != CommandBufferState::Executable)
        {
            return Err(Error::InvalidState(format!(
                "Command buffer {} is {:?}, expected Executable",
                index,
                command_buffers[index].state()
            )));
        }

        let submission = FrameSubmission::new(token.frame_slot, token.image_index);
        device.submit(&submission, command_buffers)?;
        self.slots[token.frame_slot as usize] = SlotState::Submitted;
        self.in_progress = None;

        let outcome = device.present(token.image_index, submission.signal_semaphore)?;
        let presented = match outcome {
            PresentOutcome::Presented if !token.suboptimal => true,
            _ => {
                crate::engine_debug!(
                    "ya::FrameSync",
                    "Present reported {:?} (acquire suboptimal: {}), recreating swapchain",
                    outcome, token.suboptimal
                );
                Self::recreate(device)?;
                false
            }
        };

        self.current_slot = (self.current_slot + 1) % self.flight_frame_count();
        self.frame_number += 1;
        Ok(presented)
    }

    fn recreate<D: FrameDevice>(device: &mut D) -> Result<u32> {
        device.wait_idle()?;
        device.recreate_swapchain()
    }
}

#[cfg(test)]
#[path = "frame_sync_tests.rs"]
mod tests;

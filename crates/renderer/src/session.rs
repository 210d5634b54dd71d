//! Per-frame recording session.
//!
//! A [`FrameSession`] is bound to one acquired swapchain image and one frame
//! slot. It drives the frame through a strictly linear sequence:
//!
//! ```text
//! Acquired --begin--> Recording --end--> Rendering --submit_and_present--> Presented
//! ```
//!
//! `begin` opens the command buffer, transitions the image to
//! `COLOR_ATTACHMENT_OPTIMAL` and opens a dynamic rendering scope that clears
//! it. `end` closes the scope, transitions the image to `PRESENT_SRC_KHR` and
//! closes the command buffer. The barriers therefore bracket the rendering
//! scope and never overlap it.
//!
//! When nothing could be acquired the session is [`FrameState::Empty`] and
//! every operation is rejected. Calls made in the wrong state return
//! [`RenderError::InvalidFrameState`] and record nothing.
//!
//! A valid session dropped before `submit_and_present` is finished on drop
//! with whatever was recorded (a plain black clear if nothing was), so the
//! slot's fence is signaled again and its image is handed back.

use ash::vk;
use tracing::{debug, error, warn};

use vulkraft_rhi::RhiResult;
use vulkraft_rhi::rendering::ColorTarget;
use vulkraft_rhi::sync::{FrameSubmission, ImageTransition};

use crate::backend::GpuBackend;
use crate::error::{RenderError, RenderResult};
use crate::frame_slots::FrameSlot;
use crate::swapchain::AcquiredImage;

/// Clear color of a frame dropped before anything was recorded.
const ABANDONED_CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    /// An image was acquired; nothing recorded yet.
    Acquired,
    /// Inside the rendering scope; drawing is allowed.
    Recording,
    /// Recording closed, ready for submission.
    Rendering,
    /// Submitted, presentation not yet queued.
    Submitted,
    /// Consumed.
    Presented,
    /// Nothing to render this tick.
    Empty,
}

/// Result of presenting a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentStatus {
    /// Queued for display.
    Presented,
    /// The frame was submitted but the swapchain is out of date or
    /// suboptimal. The next acquisition rebuilds it.
    Stale,
}

/// What a live session borrows for one frame.
struct FrameTarget<'a, B> {
    backend: &'a B,
    slot: FrameSlot,
    swapchain: vk::SwapchainKHR,
    extent: vk::Extent2D,
    image: AcquiredImage,
}

impl<B> Clone for FrameTarget<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for FrameTarget<'_, B> {}

/// One frame's recording, submission and presentation.
pub struct FrameSession<'a, B: GpuBackend> {
    target: Option<FrameTarget<'a, B>>,
    state: FrameState,
    /// A device call failed. The frame is left as is on drop.
    failed: bool,
}

impl<'a, B: GpuBackend> FrameSession<'a, B> {
    pub(crate) fn new(
        backend: &'a B,
        slot: FrameSlot,
        swapchain: vk::SwapchainKHR,
        extent: vk::Extent2D,
        image: AcquiredImage,
    ) -> Self {
        Self {
            target: Some(FrameTarget {
                backend,
                slot,
                swapchain,
                extent,
                image,
            }),
            state: FrameState::Acquired,
            failed: false,
        }
    }

    /// A session with nothing to render.
    pub fn empty() -> Self {
        Self {
            target: None,
            state: FrameState::Empty,
            failed: false,
        }
    }

    /// Whether this session holds an acquired image. Check before drawing.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.target.is_some()
    }

    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Extent of the acquired image.
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.target.as_ref().map(|t| t.extent)
    }

    /// Swapchain index of the acquired image.
    pub fn image_index(&self) -> Option<u32> {
        self.target.as_ref().map(|t| t.image.index)
    }

    /// Index of the frame slot this session records into.
    pub fn slot_index(&self) -> Option<usize> {
        self.target.as_ref().map(|t| t.slot.index)
    }

    fn check<T>(&mut self, result: RhiResult<T>) -> RenderResult<T> {
        self.failed |= result.is_err();
        result.map_err(RenderError::from)
    }

    fn require(&self, expected: FrameState, op: &'static str) -> RenderResult<FrameTarget<'a, B>> {
        match self.target {
            Some(target) if self.state == expected => Ok(target),
            _ => Err(RenderError::InvalidFrameState {
                op,
                state: self.state,
            }),
        }
    }

    /// Starts recording and clears the image to `clear_color` (RGBA).
    ///
    /// Also sets a viewport and scissor covering the whole image.
    pub fn begin(&mut self, clear_color: [f32; 4]) -> RenderResult<()> {
        let t = self.require(FrameState::Acquired, "begin")?;
        let cmd = t.slot.command_buffer;

        // The slot's previous submission was waited on before acquisition.
        self.check(t.backend.reset_fence(t.slot.fence))?;
        self.check(t.backend.begin_command_buffer(cmd))?;
        t.backend
            .cmd_transition_image(cmd, t.image.image, &ImageTransition::to_color_attachment());
        t.backend
            .cmd_begin_rendering(cmd, &ColorTarget::new(t.image.view, t.extent, clear_color));
        t.backend.cmd_set_viewport_and_scissor(cmd, t.extent);

        self.state = FrameState::Recording;
        Ok(())
    }

    /// Binds a graphics pipeline. Only valid while recording.
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) -> RenderResult<()> {
        let t = self.require(FrameState::Recording, "bind a pipeline in")?;
        t.backend
            .cmd_bind_graphics_pipeline(t.slot.command_buffer, pipeline);
        Ok(())
    }

    /// Records a non-indexed draw. Only valid while recording.
    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> RenderResult<()> {
        let t = self.require(FrameState::Recording, "draw")?;
        t.backend.cmd_draw(
            t.slot.command_buffer,
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        );
        Ok(())
    }

    /// Closes the rendering scope and prepares the image for presentation.
    pub fn end(&mut self) -> RenderResult<()> {
        let t = self.require(FrameState::Recording, "end")?;
        let cmd = t.slot.command_buffer;

        t.backend.cmd_end_rendering(cmd);
        t.backend
            .cmd_transition_image(cmd, t.image.image, &ImageTransition::to_present());
        self.check(t.backend.end_command_buffer(cmd))?;

        self.state = FrameState::Rendering;
        Ok(())
    }

    /// Submits the recorded work and presents the image.
    ///
    /// The submission signals the slot's fence, which is what the next use of
    /// the slot waits on. A stale swapchain at present time is not an error.
    pub fn submit_and_present(&mut self) -> RenderResult<PresentStatus> {
        let t = self.require(FrameState::Rendering, "submit")?;

        self.check(t.backend.queue_submit(&FrameSubmission::new(
            t.slot.command_buffer,
            t.slot.image_acquired,
            t.slot.render_completed,
            t.slot.fence,
        )))?;
        self.state = FrameState::Submitted;

        let status =
            match t
                .backend
                .queue_present(t.swapchain, t.image.index, t.slot.render_completed)
            {
                Ok(false) => PresentStatus::Presented,
                Ok(true) => {
                    debug!("Swapchain suboptimal on present");
                    PresentStatus::Stale
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    debug!("Swapchain out of date on present");
                    PresentStatus::Stale
                }
                Err(e) => {
                    self.failed = true;
                    return Err(e.into());
                }
            };

        self.state = FrameState::Presented;
        Ok(status)
    }
}

impl<B: GpuBackend> FrameSession<'_, B> {
    /// Submits and presents an unfinished frame as it stands.
    fn finish_abandoned(&mut self) -> RenderResult<PresentStatus> {
        if self.state == FrameState::Acquired {
            self.begin(ABANDONED_CLEAR_COLOR)?;
        }
        if self.state == FrameState::Recording {
            self.end()?;
        }
        self.submit_and_present()
    }
}

impl<B: GpuBackend> Drop for FrameSession<'_, B> {
    fn drop(&mut self) {
        let unfinished = matches!(
            self.state,
            FrameState::Acquired | FrameState::Recording | FrameState::Rendering
        );
        if unfinished && self.failed {
            warn!(
                "Frame session dropped in state {:?} after a device error",
                self.state
            );
        } else if unfinished {
            warn!(
                "Frame session dropped in state {:?} without being submitted, presenting it as is",
                self.state
            );
            if let Err(e) = self.finish_abandoned() {
                error!("Failed to finish abandoned frame: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_slots::FrameSlotPool;
    use crate::mock::{Call, MockGpu};
    use crate::swapchain::{Acquire, SwapchainManager};
    use ash::vk::Handle;
    use vulkraft_rhi::RhiError;

    struct Fixture {
        gpu: MockGpu,
        slots: FrameSlotPool,
        swapchain: SwapchainManager,
    }

    impl Fixture {
        fn new() -> Self {
            let gpu = MockGpu::new(800, 600);
            let slots = FrameSlotPool::new(&gpu, 0, 2).unwrap();
            let swapchain = SwapchainManager::new(&gpu).unwrap();
            Self {
                gpu,
                slots,
                swapchain,
            }
        }

        fn session(&mut self) -> FrameSession<'_, MockGpu> {
            let slot = self.slots.next_slot();
            self.gpu.wait_for_fence(slot.fence, u64::MAX).unwrap();
            let Acquire::Image(image) = self
                .swapchain
                .acquire(&self.gpu, slot.image_acquired)
                .unwrap()
            else {
                panic!("acquire failed");
            };
            FrameSession::new(
                &self.gpu,
                slot,
                self.swapchain.handle(),
                self.swapchain.extent(),
                image,
            )
        }

        fn teardown(mut self) {
            self.gpu.wait_idle().unwrap();
            self.slots.destroy(&self.gpu);
            self.swapchain.destroy(&self.gpu);
        }
    }

    #[test]
    fn test_full_sequence_records_in_order() {
        let mut fx = Fixture::new();
        fx.gpu.clear_calls();
        let pipeline = vk::Pipeline::from_raw(0xABC);

        {
            let mut session = fx.session();
            assert_eq!(session.state(), FrameState::Acquired);
            session.begin([0.1, 0.2, 0.3, 1.0]).unwrap();
            assert_eq!(session.state(), FrameState::Recording);
            session.bind_pipeline(pipeline).unwrap();
            session.draw(3, 1, 0, 0).unwrap();
            session.end().unwrap();
            assert_eq!(session.state(), FrameState::Rendering);
            assert_eq!(
                session.submit_and_present().unwrap(),
                PresentStatus::Presented
            );
            assert_eq!(session.state(), FrameState::Presented);
        }

        let calls = fx.gpu.calls();
        let begin = calls
            .iter()
            .position(|c| matches!(c, Call::BeginCommandBuffer(_)))
            .unwrap();
        assert_eq!(
            calls[begin - 1],
            Call::ResetFence(fx.slots.slots()[0].fence.as_raw())
        );
        let recorded = calls[begin..].to_vec();
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        assert!(matches!(recorded[0], Call::BeginCommandBuffer(_)));
        assert_eq!(
            recorded[1..10],
            [
                Call::Transition {
                    old: vk::ImageLayout::UNDEFINED,
                    new: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                },
                Call::BeginRendering {
                    extent,
                    clear: [0.1, 0.2, 0.3, 1.0],
                },
                Call::SetViewportAndScissor(extent),
                Call::BindPipeline(pipeline.as_raw()),
                Call::Draw(3, 1, 0, 0),
                Call::EndRendering,
                Call::Transition {
                    old: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    new: vk::ImageLayout::PRESENT_SRC_KHR,
                },
                Call::EndCommandBuffer,
                Call::Submit(fx.slots.slots()[0].fence.as_raw()),
            ]
        );
        assert!(matches!(recorded[10], Call::Present(_)));

        fx.teardown();
    }

    #[test]
    fn test_empty_session_rejects_everything() {
        let gpu = MockGpu::new(800, 600);
        gpu.clear_calls();
        let mut session: FrameSession<'_, MockGpu> = FrameSession::empty();

        assert!(!session.is_valid());
        assert_eq!(session.extent(), None);
        assert!(matches!(
            session.draw(3, 1, 0, 0),
            Err(RenderError::InvalidFrameState {
                op: "draw",
                state: FrameState::Empty
            })
        ));
        assert!(session.begin([0.0; 4]).is_err());
        assert!(session.bind_pipeline(vk::Pipeline::null()).is_err());
        assert!(session.end().is_err());
        assert!(session.submit_and_present().is_err());
        assert_eq!(session.state(), FrameState::Empty);
        assert!(gpu.calls().is_empty());
    }

    #[test]
    fn test_out_of_order_calls_rejected() {
        let mut fx = Fixture::new();

        {
            let mut session = fx.session();
            // Drawing before begin.
            assert!(matches!(
                session.draw(3, 1, 0, 0),
                Err(RenderError::InvalidFrameState {
                    state: FrameState::Acquired,
                    ..
                })
            ));
            assert!(session.end().is_err());
            assert!(session.submit_and_present().is_err());

            session.begin([0.0, 0.0, 0.0, 1.0]).unwrap();
            assert!(session.begin([0.0; 4]).is_err());
            assert!(session.submit_and_present().is_err());

            session.end().unwrap();
            assert!(session.draw(3, 1, 0, 0).is_err());
            assert!(session.end().is_err());

            session.submit_and_present().unwrap();
            assert!(matches!(
                session.submit_and_present(),
                Err(RenderError::InvalidFrameState {
                    state: FrameState::Presented,
                    ..
                })
            ));
        }

        let calls = fx.gpu.calls();
        let begins = calls
            .iter()
            .filter(|c| matches!(c, Call::BeginCommandBuffer(_)))
            .count();
        let submits = calls
            .iter()
            .filter(|c| matches!(c, Call::Submit(_)))
            .count();
        assert_eq!((begins, submits), (1, 1));

        fx.teardown();
    }

    #[test]
    fn test_stale_present_completes_session() {
        let mut fx = Fixture::new();
        let gpu = fx.gpu.clone();

        {
            let mut session = fx.session();
            session.begin([1.0, 0.0, 0.0, 1.0]).unwrap();
            session.end().unwrap();
            gpu.resize(640, 480);
            assert_eq!(session.submit_and_present().unwrap(), PresentStatus::Stale);
            assert_eq!(session.state(), FrameState::Presented);
        }

        fx.teardown();
    }

    #[test]
    fn test_dropped_session_is_finished() {
        for steps in 0..3 {
            let mut fx = Fixture::new();
            let fence = fx.slots.slots()[0].fence;
            fx.gpu.clear_calls();

            {
                let mut session = fx.session();
                if steps >= 1 {
                    session.begin([0.3, 0.3, 0.3, 1.0]).unwrap();
                }
                if steps >= 2 {
                    session.end().unwrap();
                }
            }

            let calls = fx.gpu.calls();
            let submits = calls.iter().filter(|c| **c == Call::Submit(fence.as_raw())).count();
            let begins = calls
                .iter()
                .filter(|c| matches!(c, Call::BeginCommandBuffer(_)))
                .count();
            assert_eq!((begins, submits), (1, 1), "after {} steps", steps);
            assert!(matches!(calls.last(), Some(Call::Present(_))));
            assert!(fx.gpu.is_fence_signaled(fence));
            assert_eq!(fx.gpu.semaphore_misuse(), 0);

            fx.teardown();
        }
    }

    #[test]
    fn test_dropped_acquired_session_clears_to_black() {
        let mut fx = Fixture::new();
        fx.gpu.clear_calls();
        drop(fx.session());

        assert!(fx.gpu.calls().contains(&Call::BeginRendering {
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            clear: [0.0, 0.0, 0.0, 1.0],
        }));
        fx.teardown();
    }

    #[test]
    fn test_fatal_present_error_is_returned() {
        for error in [
            vk::Result::ERROR_SURFACE_LOST_KHR,
            vk::Result::ERROR_DEVICE_LOST,
        ] {
            let mut fx = Fixture::new();
            let gpu = fx.gpu.clone();

            {
                let mut session = fx.session();
                session.begin([0.0; 4]).unwrap();
                session.end().unwrap();
                gpu.fail_next_present(error);

                let result = session.submit_and_present();
                assert!(
                    matches!(result, Err(RenderError::Rhi(RhiError::VulkanError(e))) if e == error),
                    "{:?} was not surfaced",
                    error
                );
                // The work was submitted; only presentation failed.
                assert_eq!(session.state(), FrameState::Submitted);
            }

            let submits = gpu
                .calls()
                .iter()
                .filter(|c| matches!(c, Call::Submit(_)))
                .count();
            assert_eq!(submits, 1);
            fx.teardown();
        }
    }

    #[test]
    fn test_suboptimal_present_is_stale() {
        let mut fx = Fixture::new();
        let gpu = fx.gpu.clone();

        {
            let mut session = fx.session();
            session.begin([0.0; 4]).unwrap();
            session.end().unwrap();
            gpu.set_suboptimal_next_present();
            assert_eq!(session.submit_and_present().unwrap(), PresentStatus::Stale);
            assert_eq!(session.state(), FrameState::Presented);
        }

        fx.teardown();
    }

    #[test]
    fn test_fatal_submit_error_is_not_retried_on_drop() {
        let mut fx = Fixture::new();
        let gpu = fx.gpu.clone();

        {
            let mut session = fx.session();
            session.begin([0.0; 4]).unwrap();
            session.end().unwrap();
            gpu.fail_next_submit(vk::Result::ERROR_DEVICE_LOST);

            assert!(matches!(
                session.submit_and_present(),
                Err(RenderError::Rhi(RhiError::VulkanError(
                    vk::Result::ERROR_DEVICE_LOST
                )))
            ));
            assert_eq!(session.state(), FrameState::Rendering);
        }

        let calls = gpu.calls();
        let submits = calls.iter().filter(|c| matches!(c, Call::Submit(_))).count();
        assert_eq!(submits, 1);
        assert!(!calls.iter().any(|c| matches!(c, Call::Present(_))));
        fx.teardown();
    }
}

//! Synchronization descriptors for a frame.
//!
//! This module describes the two pieces of GPU synchronization every frame
//! needs, independent of who records them:
//!
//! - [`ImageTransition`] - a synchronization2 layout transition of a color image
//! - [`FrameSubmission`] - one `vkQueueSubmit2` of a frame's command buffer
//!
//! # Overview
//!
//! A frame brackets its rendering scope with two transitions. Before drawing,
//! the acquired swapchain image moves from `UNDEFINED` to
//! `COLOR_ATTACHMENT_OPTIMAL`; after drawing, it moves to `PRESENT_SRC_KHR`.
//! The submission waits on the acquire semaphore at the color attachment
//! output stage, so the first transition uses that same stage as its source
//! scope to chain with the semaphore wait.
//!
//! # Example
//!
//! ```no_run
//! use ash::vk;
//! use vulkraft_rhi::sync::ImageTransition;
//!
//! # fn example(image: vk::Image) {
//! let to_attachment = ImageTransition::to_color_attachment().image_barrier(image);
//! let to_present = ImageTransition::to_present().image_barrier(image);
//! # let _ = (to_attachment, to_present);
//! # }
//! ```

use ash::vk;

use crate::swapchain::COLOR_SUBRESOURCE_RANGE;

/// Layout transition of a whole single-mip color image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageTransition {
    /// Layout the image is in before the barrier.
    pub old_layout: vk::ImageLayout,
    /// Layout the image is in after the barrier.
    pub new_layout: vk::ImageLayout,
    /// Stages that must complete before the transition.
    pub src_stage: vk::PipelineStageFlags2,
    /// Writes made available by the transition.
    pub src_access: vk::AccessFlags2,
    /// Stages that wait for the transition.
    pub dst_stage: vk::PipelineStageFlags2,
    /// Accesses made visible by the transition.
    pub dst_access: vk::AccessFlags2,
}

impl ImageTransition {
    /// Prepares a freshly acquired image for color attachment writes.
    ///
    /// The previous contents are discarded (`UNDEFINED`), which is fine since
    /// the rendering scope clears the attachment.
    pub const fn to_color_attachment() -> Self {
        Self {
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            src_access: vk::AccessFlags2::NONE,
            dst_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            dst_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        }
    }

    /// Hands a rendered image over to the presentation engine.
    pub const fn to_present() -> Self {
        Self {
            old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            src_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            dst_stage: vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            dst_access: vk::AccessFlags2::NONE,
        }
    }

    /// Builds the `VkImageMemoryBarrier2` for `image`.
    ///
    /// No queue family ownership transfer takes place.
    pub fn image_barrier(&self, image: vk::Image) -> vk::ImageMemoryBarrier2<'static> {
        vk::ImageMemoryBarrier2::default()
            .src_stage_mask(self.src_stage)
            .src_access_mask(self.src_access)
            .dst_stage_mask(self.dst_stage)
            .dst_access_mask(self.dst_access)
            .old_layout(self.old_layout)
            .new_layout(self.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(COLOR_SUBRESOURCE_RANGE)
    }
}

/// A single frame's queue submission.
///
/// The fence is the one the frame slot waits on before it is reused, so it is
/// what bounds the number of frames in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSubmission {
    /// Recorded command buffer to execute.
    pub command_buffer: vk::CommandBuffer,
    /// Signaled by image acquisition.
    pub wait_semaphore: vk::Semaphore,
    /// Stage at which execution waits for `wait_semaphore`.
    pub wait_stage: vk::PipelineStageFlags2,
    /// Signaled when rendering completes; waited on by present.
    pub signal_semaphore: vk::Semaphore,
    /// Stage after which `signal_semaphore` is signaled.
    pub signal_stage: vk::PipelineStageFlags2,
    /// Signaled when the command buffer finishes executing.
    pub fence: vk::Fence,
}

impl FrameSubmission {
    /// Standard frame submission: wait at color attachment output, signal
    /// after all graphics work.
    pub const fn new(
        command_buffer: vk::CommandBuffer,
        wait_semaphore: vk::Semaphore,
        signal_semaphore: vk::Semaphore,
        fence: vk::Fence,
    ) -> Self {
        Self {
            command_buffer,
            wait_semaphore,
            wait_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore,
            signal_stage: vk::PipelineStageFlags2::ALL_GRAPHICS,
            fence,
        }
    }

    /// Wait semaphore info for `VkSubmitInfo2`.
    pub fn wait_info(&self) -> vk::SemaphoreSubmitInfo<'static> {
        vk::SemaphoreSubmitInfo::default()
            .semaphore(self.wait_semaphore)
            .stage_mask(self.wait_stage)
    }

    /// Signal semaphore info for `VkSubmitInfo2`.
    pub fn signal_info(&self) -> vk::SemaphoreSubmitInfo<'static> {
        vk::SemaphoreSubmitInfo::default()
            .semaphore(self.signal_semaphore)
            .stage_mask(self.signal_stage)
    }

    /// Command buffer info for `VkSubmitInfo2`.
    pub fn command_buffer_info(&self) -> vk::CommandBufferSubmitInfo<'static> {
        vk::CommandBufferSubmitInfo::default().command_buffer(self.command_buffer)
    }
}

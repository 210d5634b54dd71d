//! The GPU operations the frame loop is built on.
//!
//! [`GpuBackend`] is the seam between the frame lifecycle logic (slot pool,
//! swapchain manager, frame session) and the device. The Vulkan
//! implementation is [`VulkanContext`](crate::context::VulkanContext); tests
//! drive the same logic through an in-memory device.
//!
//! Handles are plain `ash::vk` handles. Ownership of every object created
//! through the backend stays with the component that created it, which must
//! also destroy it through the backend.

use ash::vk;

use vulkraft_rhi::RhiResult;
use vulkraft_rhi::rendering::ColorTarget;
use vulkraft_rhi::swapchain::SwapchainDesc;
use vulkraft_rhi::sync::{FrameSubmission, ImageTransition};

/// Device, queue, surface and presentation operations used by the renderer.
///
/// All calls are made from the single thread driving the frame loop.
pub trait GpuBackend {
    // Window and surface queries

    /// Current drawable size of the window, in pixels.
    fn drawable_size(&self) -> (u32, u32);

    /// Family index of the graphics + present queue.
    fn graphics_queue_family(&self) -> u32;

    fn surface_capabilities(&self) -> RhiResult<vk::SurfaceCapabilitiesKHR>;

    fn surface_formats(&self) -> RhiResult<Vec<vk::SurfaceFormatKHR>>;

    // Swapchain

    /// Creates a swapchain, retiring `old_swapchain` when it is not null.
    fn create_swapchain(
        &self,
        desc: &SwapchainDesc,
        old_swapchain: vk::SwapchainKHR,
    ) -> RhiResult<vk::SwapchainKHR>;

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RhiResult<Vec<vk::Image>>;

    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> RhiResult<vk::ImageView>;

    fn destroy_image_view(&self, view: vk::ImageView);

    /// Acquires the next presentable image, signaling `semaphore`.
    ///
    /// Returns the raw presentation result so the caller can tell the
    /// out-of-date case apart from fatal errors. The flag is `true` when the
    /// swapchain is suboptimal.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
        timeout: u64,
    ) -> Result<(u32, bool), vk::Result>;

    /// Queues `image_index` for presentation once `wait_semaphore` is signaled.
    /// `Ok(true)` means suboptimal.
    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result>;

    // Synchronization

    fn create_fence(&self, signaled: bool) -> RhiResult<vk::Fence>;

    fn destroy_fence(&self, fence: vk::Fence);

    /// Blocks until `fence` is signaled.
    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> RhiResult<()>;

    fn reset_fence(&self, fence: vk::Fence) -> RhiResult<()>;

    /// Creates an unsignaled binary semaphore.
    fn create_semaphore(&self) -> RhiResult<vk::Semaphore>;

    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    // Command recording

    /// Creates a pool whose buffers can be reset individually.
    fn create_command_pool(&self, queue_family: u32) -> RhiResult<vk::CommandPool>;

    /// Destroys the pool and frees every buffer allocated from it.
    fn destroy_command_pool(&self, pool: vk::CommandPool);

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> RhiResult<vk::CommandBuffer>;

    /// Begins one-time-submit recording, implicitly resetting the buffer.
    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()>;

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()>;

    fn cmd_transition_image(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        transition: &ImageTransition,
    );

    fn cmd_begin_rendering(&self, command_buffer: vk::CommandBuffer, target: &ColorTarget);

    fn cmd_end_rendering(&self, command_buffer: vk::CommandBuffer);

    /// Sets a viewport and scissor covering `extent`.
    fn cmd_set_viewport_and_scissor(&self, command_buffer: vk::CommandBuffer, extent: vk::Extent2D);

    fn cmd_bind_graphics_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline);

    fn cmd_draw(
        &self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );

    // Queue

    fn queue_submit(&self, submission: &FrameSubmission) -> RhiResult<()>;

    /// Blocks until the device has no outstanding work.
    fn wait_idle(&self) -> RhiResult<()>;
}

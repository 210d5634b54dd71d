//! Vulkan device context.
//!
//! [`VulkanContext`] bundles everything the frame loop needs from the
//! device bootstrap: instance and debug messenger, the presentation surface,
//! the selected physical device, the logical device with its single graphics
//! queue, and the swapchain loader. It implements [`GpuBackend`] over `ash`.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use vulkraft_platform::{Surface, Window, WinitWindow, drawable_size};
use vulkraft_rhi::RhiResult;
use vulkraft_rhi::device::Device;
use vulkraft_rhi::instance::Instance;
use vulkraft_rhi::physical_device::{PhysicalDeviceInfo, select_physical_device};
use vulkraft_rhi::rendering::{ColorTarget, full_rect, full_viewport};
use vulkraft_rhi::swapchain::{SwapchainDesc, color_view_create_info};
use vulkraft_rhi::sync::{FrameSubmission, ImageTransition};

use crate::backend::GpuBackend;
use crate::error::{RenderError, RenderResult};
use crate::renderer::RendererConfig;

/// Ready-to-use Vulkan device bound to one window.
///
/// Fields drop in declaration order: the device goes first, then the
/// surface, then the instance. Device clones handed out through
/// [`device`](Self::device) keep the instance alive on their own.
pub struct VulkanContext {
    swapchain_loader: ash::khr::swapchain::Device,
    device: Arc<Device>,
    physical_device: PhysicalDeviceInfo,
    surface: Surface,
    instance: Arc<Instance>,
    window: Arc<WinitWindow>,
}

impl VulkanContext {
    /// Boots Vulkan for `window`.
    ///
    /// # Errors
    ///
    /// Every failure is reported as [`RenderError::Init`].
    pub fn new(window: &Window, config: &RendererConfig) -> RenderResult<Self> {
        let extensions = window.required_extensions().map_err(RenderError::init)?;

        let instance = Instance::new(
            &config.application_name,
            config.enable_validation,
            &extensions,
        )
        .map(Arc::new)
        .map_err(RenderError::init)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(RenderError::init)?;

        let physical_device =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())
                .map_err(RenderError::init)?;

        let device = Device::new(&instance, &physical_device).map_err(RenderError::init)?;

        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        info!(
            "Vulkan context ready on '{}' (queue family {})",
            physical_device.device_name(),
            device.queue_family()
        );

        Ok(Self {
            swapchain_loader,
            device,
            physical_device,
            surface,
            instance,
            window: window.inner_arc(),
        })
    }

    /// Shared handle to the logical device, for pipeline and shader creation.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// The selected GPU.
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Whether the validation layer is active.
    pub fn has_validation(&self) -> bool {
        self.instance.has_validation()
    }

    #[inline]
    fn raw(&self) -> &ash::Device {
        self.device.handle()
    }
}

impl GpuBackend for VulkanContext {
    fn drawable_size(&self) -> (u32, u32) {
        drawable_size(&self.window)
    }

    fn graphics_queue_family(&self) -> u32 {
        self.device.queue_family()
    }

    fn surface_capabilities(&self) -> RhiResult<vk::SurfaceCapabilitiesKHR> {
        let caps = unsafe {
            self.surface
                .loader()
                .get_physical_device_surface_capabilities(
                    self.physical_device.device,
                    self.surface.handle(),
                )?
        };
        Ok(caps)
    }

    fn surface_formats(&self) -> RhiResult<Vec<vk::SurfaceFormatKHR>> {
        let formats = unsafe {
            self.surface
                .loader()
                .get_physical_device_surface_formats(
                    self.physical_device.device,
                    self.surface.handle(),
                )?
        };
        Ok(formats)
    }

    fn create_swapchain(
        &self,
        desc: &SwapchainDesc,
        old_swapchain: vk::SwapchainKHR,
    ) -> RhiResult<vk::SwapchainKHR> {
        let create_info = desc.create_info(self.surface.handle(), old_swapchain);
        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None)? };
        debug!(
            "Created swapchain {}x{} ({} images requested)",
            desc.extent.width, desc.extent.height, desc.min_image_count
        );
        Ok(swapchain)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
        debug!("Destroyed swapchain");
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RhiResult<Vec<vk::Image>> {
        let images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain)? };
        Ok(images)
    }

    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> RhiResult<vk::ImageView> {
        let create_info = color_view_create_info(image, format);
        let view = unsafe { self.raw().create_image_view(&create_info, None)? };
        Ok(view)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.raw().destroy_image_view(view, None) };
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
        timeout: u64,
    ) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, timeout, semaphore, vk::Fence::null())
        }
    }

    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe {
            self.swapchain_loader
                .queue_present(self.device.queue(), &present_info)
        }
    }

    fn create_fence(&self, signaled: bool) -> RhiResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { self.raw().create_fence(&create_info, None)? };
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.raw().destroy_fence(fence, None) };
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> RhiResult<()> {
        unsafe { self.raw().wait_for_fences(&[fence], true, timeout)? };
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> RhiResult<()> {
        unsafe { self.raw().reset_fences(&[fence])? };
        Ok(())
    }

    fn create_semaphore(&self) -> RhiResult<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { self.raw().create_semaphore(&create_info, None)? };
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.raw().destroy_semaphore(semaphore, None) };
    }

    fn create_command_pool(&self, queue_family: u32) -> RhiResult<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family);
        let pool = unsafe { self.raw().create_command_pool(&create_info, None)? };
        Ok(pool)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.raw().destroy_command_pool(pool, None) };
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> RhiResult<vk::CommandBuffer> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.raw().allocate_command_buffers(&allocate_info)? };
        buffers
            .into_iter()
            .next()
            .ok_or(vk::Result::ERROR_OUT_OF_HOST_MEMORY.into())
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.raw().begin_command_buffer(command_buffer, &begin_info)? };
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        unsafe { self.raw().end_command_buffer(command_buffer)? };
        Ok(())
    }

    fn cmd_transition_image(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        transition: &ImageTransition,
    ) {
        let barriers = [transition.image_barrier(image)];
        let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        unsafe {
            self.raw()
                .cmd_pipeline_barrier2(command_buffer, &dependency_info)
        };
    }

    fn cmd_begin_rendering(&self, command_buffer: vk::CommandBuffer, target: &ColorTarget) {
        let color_attachments = [target.attachment_info()];
        let rendering_info = vk::RenderingInfo::default()
            .render_area(target.render_area())
            .layer_count(1)
            .color_attachments(&color_attachments);
        unsafe {
            self.raw()
                .cmd_begin_rendering(command_buffer, &rendering_info)
        };
    }

    fn cmd_end_rendering(&self, command_buffer: vk::CommandBuffer) {
        unsafe { self.raw().cmd_end_rendering(command_buffer) };
    }

    fn cmd_set_viewport_and_scissor(&self, command_buffer: vk::CommandBuffer, extent: vk::Extent2D) {
        unsafe {
            self.raw()
                .cmd_set_viewport(command_buffer, 0, &[full_viewport(extent)]);
            self.raw()
                .cmd_set_scissor(command_buffer, 0, &[full_rect(extent)]);
        }
    }

    fn cmd_bind_graphics_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.raw()
                .cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline)
        };
    }

    fn cmd_draw(
        &self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.raw().cmd_draw(
                command_buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            )
        };
    }

    fn queue_submit(&self, submission: &FrameSubmission) -> RhiResult<()> {
        let wait_infos = [submission.wait_info()];
        let command_buffer_infos = [submission.command_buffer_info()];
        let signal_infos = [submission.signal_info()];
        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .command_buffer_infos(&command_buffer_infos)
            .signal_semaphore_infos(&signal_infos);

        unsafe {
            self.raw()
                .queue_submit2(self.device.queue(), &[submit_info], submission.fence)?
        };
        Ok(())
    }

    fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }
}

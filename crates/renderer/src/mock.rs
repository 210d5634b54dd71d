//! In-memory [`GpuBackend`] used by the unit tests.
//!
//! Hands out fake handles, records every call, and emulates the parts of the
//! device the frame loop depends on: fences that complete either on submit
//! or when a test says so, presentable images handed out round-robin, and a
//! swapchain that goes stale when the drawable size changes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ash::vk::{self, Handle};

use vulkraft_rhi::rendering::ColorTarget;
use vulkraft_rhi::swapchain::SwapchainDesc;
use vulkraft_rhi::sync::{FrameSubmission, ImageTransition};
use vulkraft_rhi::{RhiError, RhiResult};

use crate::backend::GpuBackend;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateSwapchain { extent: vk::Extent2D, chained: bool },
    DestroySwapchain(u64),
    DestroyImageView,
    DestroyFence,
    DestroySemaphore,
    DestroyCommandPool,
    Acquire,
    WaitFence(u64),
    ResetFence(u64),
    BeginCommandBuffer(u64),
    EndCommandBuffer,
    Transition {
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    },
    BeginRendering {
        extent: vk::Extent2D,
        clear: [f32; 4],
    },
    EndRendering,
    SetViewportAndScissor(vk::Extent2D),
    BindPipeline(u64),
    Draw(u32, u32, u32, u32),
    Submit(u64),
    Present(u32),
    WaitIdle,
}

impl Call {
    pub fn is_destroy(&self) -> bool {
        matches!(
            self,
            Call::DestroySwapchain(_)
                | Call::DestroyImageView
                | Call::DestroyFence
                | Call::DestroySemaphore
                | Call::DestroyCommandPool
        )
    }
}

struct MockSwapchain {
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    next_image: usize,
    retired: bool,
}

struct MockState {
    next_handle: u64,
    drawable: (u32, u32),
    min_image_count: u32,
    auto_complete: bool,
    suboptimal_next_acquire: bool,
    suboptimal_next_present: bool,
    acquire_failure: Option<vk::Result>,
    present_failure: Option<vk::Result>,
    submit_failure: Option<vk::Result>,
    fences_before_failure: Option<usize>,

    /// Fence handle to signaled state.
    fences: HashMap<u64, bool>,
    /// Fences submitted and not yet completed, oldest first.
    pending: VecDeque<u64>,
    semaphores: HashMap<u64, bool>,
    /// Command pool to its command buffers.
    pools: HashMap<u64, Vec<u64>>,
    /// Command buffer to the fence of its last submission.
    command_buffers: HashMap<u64, Option<u64>>,
    swapchains: HashMap<u64, MockSwapchain>,
    views: HashSet<u64>,

    calls: Vec<Call>,
    invalid_destroys: usize,
    reuse_violations: usize,
    semaphore_misuse: usize,
    max_in_flight: usize,
    wait_idle_calls: usize,
}

impl MockState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn is_pending(&self, fence: u64) -> bool {
        self.pending.contains(&fence)
    }

    fn complete(&mut self, fence: u64) {
        self.pending.retain(|&f| f != fence);
        if let Some(signaled) = self.fences.get_mut(&fence) {
            *signaled = true;
        }
    }

    fn is_stale(&self, swapchain: u64) -> bool {
        let (width, height) = self.drawable;
        match self.swapchains.get(&swapchain) {
            Some(sc) => sc.retired || sc.extent.width != width || sc.extent.height != height,
            None => true,
        }
    }

    /// Consumes a wait on `semaphore`; it must have been signaled.
    fn wait_semaphore(&mut self, semaphore: u64) {
        match self.semaphores.get_mut(&semaphore) {
            Some(signaled) if *signaled => *signaled = false,
            _ => self.semaphore_misuse += 1,
        }
    }

    /// Signals `semaphore`; it must have been unsignaled.
    fn signal_semaphore(&mut self, semaphore: u64) {
        match self.semaphores.get_mut(&semaphore) {
            Some(signaled) if !*signaled => *signaled = true,
            _ => self.semaphore_misuse += 1,
        }
    }
}

struct Shared {
    state: Mutex<MockState>,
    fence_signaled: Condvar,
}

/// Cloneable handle to one emulated device.
#[derive(Clone)]
pub struct MockGpu {
    shared: Arc<Shared>,
}

impl MockGpu {
    pub fn new(width: u32, height: u32) -> Self {
        let state = MockState {
            next_handle: 0,
            drawable: (width, height),
            min_image_count: 2,
            auto_complete: true,
            suboptimal_next_acquire: false,
            suboptimal_next_present: false,
            acquire_failure: None,
            present_failure: None,
            submit_failure: None,
            fences_before_failure: None,
            fences: HashMap::new(),
            pending: VecDeque::new(),
            semaphores: HashMap::new(),
            pools: HashMap::new(),
            command_buffers: HashMap::new(),
            swapchains: HashMap::new(),
            views: HashSet::new(),
            calls: Vec::new(),
            invalid_destroys: 0,
            reuse_violations: 0,
            semaphore_misuse: 0,
            max_in_flight: 0,
            wait_idle_calls: 0,
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                fence_signaled: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // Test controls

    pub fn set_min_image_count(&self, count: u32) {
        self.lock().min_image_count = count;
    }

    /// Changes the drawable size. Existing swapchains become stale.
    pub fn resize(&self, width: u32, height: u32) {
        self.lock().drawable = (width, height);
    }

    /// When enabled (the default) submissions complete immediately.
    /// Otherwise they stay pending until completed explicitly.
    pub fn set_auto_complete(&self, enabled: bool) {
        self.lock().auto_complete = enabled;
    }

    pub fn set_suboptimal_next_acquire(&self) {
        self.lock().suboptimal_next_acquire = true;
    }

    pub fn set_suboptimal_next_present(&self) {
        self.lock().suboptimal_next_present = true;
    }

    /// The next acquisition fails with `result` and signals nothing.
    pub fn fail_next_acquire(&self, result: vk::Result) {
        self.lock().acquire_failure = Some(result);
    }

    /// The next presentation fails with `result` after consuming its wait.
    pub fn fail_next_present(&self, result: vk::Result) {
        self.lock().present_failure = Some(result);
    }

    /// The next submission fails with `result` and changes nothing.
    pub fn fail_next_submit(&self, result: vk::Result) {
        self.lock().submit_failure = Some(result);
    }

    /// Lets `count` more fence creations succeed, then fails the rest.
    pub fn fail_fence_creation_after(&self, count: usize) {
        self.lock().fences_before_failure = Some(count);
    }

    /// Completes the oldest pending submission and returns its fence.
    pub fn complete_oldest(&self) -> Option<vk::Fence> {
        let fence = {
            let mut state = self.lock();
            let fence = state.pending.front().copied()?;
            state.complete(fence);
            fence
        };
        self.shared.fence_signaled.notify_all();
        Some(vk::Fence::from_raw(fence))
    }

    pub fn complete_all(&self) {
        {
            let mut state = self.lock();
            while let Some(fence) = state.pending.front().copied() {
                state.complete(fence);
            }
        }
        self.shared.fence_signaled.notify_all();
    }

    // Inspection

    pub fn oldest_pending(&self) -> Option<vk::Fence> {
        self.lock().pending.front().map(|&f| vk::Fence::from_raw(f))
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_fence_signaled(&self, fence: vk::Fence) -> bool {
        self.lock()
            .fences
            .get(&fence.as_raw())
            .copied()
            .unwrap_or(false)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Fences, semaphores, command pools, swapchains and image views alive.
    pub fn live_objects(&self) -> usize {
        let state = self.lock();
        state.fences.len()
            + state.semaphores.len()
            + state.pools.len()
            + state.swapchains.len()
            + state.views.len()
    }

    /// Destroys of null, unknown or already destroyed handles.
    pub fn invalid_destroys(&self) -> usize {
        self.lock().invalid_destroys
    }

    /// Largest number of submissions pending at once.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Fences or command buffers touched while their submission was pending.
    pub fn reuse_violations(&self) -> usize {
        self.lock().reuse_violations
    }

    /// Waits on unsignaled semaphores or signals of signaled ones.
    pub fn semaphore_misuse(&self) -> usize {
        self.lock().semaphore_misuse
    }

    pub fn wait_idle_calls(&self) -> usize {
        self.lock().wait_idle_calls
    }
}

impl GpuBackend for MockGpu {
    fn drawable_size(&self) -> (u32, u32) {
        self.lock().drawable
    }

    fn graphics_queue_family(&self) -> u32 {
        0
    }

    fn surface_capabilities(&self) -> RhiResult<vk::SurfaceCapabilitiesKHR> {
        let state = self.lock();
        let (width, height) = state.drawable;
        Ok(vk::SurfaceCapabilitiesKHR {
            min_image_count: state.min_image_count,
            max_image_count: 8,
            current_extent: vk::Extent2D { width, height },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 16384,
                height: 16384,
            },
            max_image_array_layers: 1,
            ..Default::default()
        })
    }

    fn surface_formats(&self) -> RhiResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ])
    }

    fn create_swapchain(
        &self,
        desc: &SwapchainDesc,
        old_swapchain: vk::SwapchainKHR,
    ) -> RhiResult<vk::SwapchainKHR> {
        let mut state = self.lock();
        let chained = old_swapchain != vk::SwapchainKHR::null();
        state.calls.push(Call::CreateSwapchain {
            extent: desc.extent,
            chained,
        });

        if chained {
            match state.swapchains.get_mut(&old_swapchain.as_raw()) {
                Some(old) => old.retired = true,
                None => {
                    return Err(RhiError::SwapchainError(
                        "old swapchain is not alive".to_string(),
                    ));
                }
            }
        }

        let images = (0..desc.min_image_count)
            .map(|_| vk::Image::from_raw(state.handle()))
            .collect();
        let handle = state.handle();
        state.swapchains.insert(
            handle,
            MockSwapchain {
                extent: desc.extent,
                images,
                next_image: 0,
                retired: false,
            },
        );
        Ok(vk::SwapchainKHR::from_raw(handle))
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.lock();
        state.calls.push(Call::DestroySwapchain(swapchain.as_raw()));
        if state.swapchains.remove(&swapchain.as_raw()).is_none() {
            state.invalid_destroys += 1;
        }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RhiResult<Vec<vk::Image>> {
        self.lock()
            .swapchains
            .get(&swapchain.as_raw())
            .map(|sc| sc.images.clone())
            .ok_or_else(|| RhiError::SwapchainError("unknown swapchain".to_string()))
    }

    fn create_image_view(&self, _image: vk::Image, _format: vk::Format) -> RhiResult<vk::ImageView> {
        let mut state = self.lock();
        let handle = state.handle();
        state.views.insert(handle);
        Ok(vk::ImageView::from_raw(handle))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        let mut state = self.lock();
        state.calls.push(Call::DestroyImageView);
        if !state.views.remove(&view.as_raw()) {
            state.invalid_destroys += 1;
        }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
        _timeout: u64,
    ) -> Result<(u32, bool), vk::Result> {
        let mut state = self.lock();
        state.calls.push(Call::Acquire);

        if let Some(result) = state.acquire_failure.take() {
            return Err(result);
        }
        if state.is_stale(swapchain.as_raw()) {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        }

        let suboptimal = std::mem::take(&mut state.suboptimal_next_acquire);
        let index = match state.swapchains.get_mut(&swapchain.as_raw()) {
            Some(sc) => {
                let index = sc.next_image;
                sc.next_image = (sc.next_image + 1) % sc.images.len();
                index as u32
            }
            None => return Err(vk::Result::ERROR_OUT_OF_DATE_KHR),
        };
        state.signal_semaphore(semaphore.as_raw());
        Ok((index, suboptimal))
    }

    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let mut state = self.lock();
        state.calls.push(Call::Present(image_index));
        // The wait executes even when presentation reports out of date.
        state.wait_semaphore(wait_semaphore.as_raw());

        if let Some(result) = state.present_failure.take() {
            return Err(result);
        }
        if state.is_stale(swapchain.as_raw()) {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        }
        Ok(std::mem::take(&mut state.suboptimal_next_present))
    }

    fn create_fence(&self, signaled: bool) -> RhiResult<vk::Fence> {
        let mut state = self.lock();
        match state.fences_before_failure {
            Some(0) => return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY.into()),
            Some(ref mut remaining) => *remaining -= 1,
            None => {}
        }
        let handle = state.handle();
        state.fences.insert(handle, signaled);
        Ok(vk::Fence::from_raw(handle))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.lock();
        state.calls.push(Call::DestroyFence);
        if state.is_pending(fence.as_raw()) {
            state.reuse_violations += 1;
        }
        if state.fences.remove(&fence.as_raw()).is_none() {
            state.invalid_destroys += 1;
        }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> RhiResult<()> {
        let raw = fence.as_raw();
        let mut state = self.lock();
        state.calls.push(Call::WaitFence(raw));

        loop {
            match state.fences.get(&raw) {
                Some(true) => return Ok(()),
                Some(false) if state.is_pending(raw) => {}
                // Nothing will ever signal it.
                _ => return Err(vk::Result::ERROR_DEVICE_LOST.into()),
            }

            state = if timeout == u64::MAX {
                self.shared
                    .fence_signaled
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner)
            } else {
                let (guard, result) = self
                    .shared
                    .fence_signaled
                    .wait_timeout(state, Duration::from_nanos(timeout))
                    .unwrap_or_else(PoisonError::into_inner);
                if result.timed_out() && guard.fences.get(&raw) != Some(&true) {
                    return Err(vk::Result::TIMEOUT.into());
                }
                guard
            };
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> RhiResult<()> {
        let raw = fence.as_raw();
        let mut state = self.lock();
        state.calls.push(Call::ResetFence(raw));
        if state.is_pending(raw) {
            state.reuse_violations += 1;
        }
        match state.fences.get_mut(&raw) {
            Some(signaled) => {
                *signaled = false;
                Ok(())
            }
            None => Err(vk::Result::ERROR_UNKNOWN.into()),
        }
    }

    fn create_semaphore(&self) -> RhiResult<vk::Semaphore> {
        let mut state = self.lock();
        let handle = state.handle();
        state.semaphores.insert(handle, false);
        Ok(vk::Semaphore::from_raw(handle))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut state = self.lock();
        state.calls.push(Call::DestroySemaphore);
        if state.semaphores.remove(&semaphore.as_raw()).is_none() {
            state.invalid_destroys += 1;
        }
    }

    fn create_command_pool(&self, _queue_family: u32) -> RhiResult<vk::CommandPool> {
        let mut state = self.lock();
        let handle = state.handle();
        state.pools.insert(handle, Vec::new());
        Ok(vk::CommandPool::from_raw(handle))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        let mut state = self.lock();
        state.calls.push(Call::DestroyCommandPool);
        match state.pools.remove(&pool.as_raw()) {
            Some(buffers) => {
                for buffer in buffers {
                    if let Some(Some(fence)) = state.command_buffers.remove(&buffer) {
                        if state.is_pending(fence) {
                            state.reuse_violations += 1;
                        }
                    }
                }
            }
            None => state.invalid_destroys += 1,
        }
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> RhiResult<vk::CommandBuffer> {
        let mut state = self.lock();
        if !state.pools.contains_key(&pool.as_raw()) {
            return Err(vk::Result::ERROR_UNKNOWN.into());
        }
        let handle = state.handle();
        state.command_buffers.insert(handle, None);
        if let Some(buffers) = state.pools.get_mut(&pool.as_raw()) {
            buffers.push(handle);
        }
        Ok(vk::CommandBuffer::from_raw(handle))
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        let raw = command_buffer.as_raw();
        let mut state = self.lock();
        state.calls.push(Call::BeginCommandBuffer(raw));
        match state.command_buffers.get(&raw).copied() {
            Some(Some(fence)) if state.is_pending(fence) => {
                state.reuse_violations += 1;
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(vk::Result::ERROR_UNKNOWN.into()),
        }
    }

    fn end_command_buffer(&self, _command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.lock().calls.push(Call::EndCommandBuffer);
        Ok(())
    }

    fn cmd_transition_image(
        &self,
        _command_buffer: vk::CommandBuffer,
        _image: vk::Image,
        transition: &ImageTransition,
    ) {
        self.lock().calls.push(Call::Transition {
            old: transition.old_layout,
            new: transition.new_layout,
        });
    }

    fn cmd_begin_rendering(&self, _command_buffer: vk::CommandBuffer, target: &ColorTarget) {
        let attachment = target.attachment_info();
        // SAFETY: color targets always carry a float clear value.
        let clear = unsafe { attachment.clear_value.color.float32 };
        self.lock().calls.push(Call::BeginRendering {
            extent: target.render_area().extent,
            clear,
        });
    }

    fn cmd_end_rendering(&self, _command_buffer: vk::CommandBuffer) {
        self.lock().calls.push(Call::EndRendering);
    }

    fn cmd_set_viewport_and_scissor(&self, _command_buffer: vk::CommandBuffer, extent: vk::Extent2D) {
        self.lock().calls.push(Call::SetViewportAndScissor(extent));
    }

    fn cmd_bind_graphics_pipeline(&self, _command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.lock().calls.push(Call::BindPipeline(pipeline.as_raw()));
    }

    fn cmd_draw(
        &self,
        _command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.lock().calls.push(Call::Draw(
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        ));
    }

    fn queue_submit(&self, submission: &FrameSubmission) -> RhiResult<()> {
        let fence = submission.fence.as_raw();
        let command_buffer = submission.command_buffer.as_raw();
        let completed = {
            let mut state = self.lock();
            state.calls.push(Call::Submit(fence));
            if let Some(result) = state.submit_failure.take() {
                return Err(result.into());
            }

            match state.fences.get(&fence) {
                Some(false) if !state.is_pending(fence) => {}
                Some(_) => state.reuse_violations += 1,
                None => return Err(vk::Result::ERROR_UNKNOWN.into()),
            }

            state.wait_semaphore(submission.wait_semaphore.as_raw());
            state.signal_semaphore(submission.signal_semaphore.as_raw());

            if let Some(last) = state.command_buffers.get_mut(&command_buffer) {
                *last = Some(fence);
            }

            state.pending.push_back(fence);
            state.max_in_flight = state.max_in_flight.max(state.pending.len());

            if state.auto_complete {
                state.complete(fence);
            }
            state.auto_complete
        };
        if completed {
            self.shared.fence_signaled.notify_all();
        }
        Ok(())
    }

    fn wait_idle(&self) -> RhiResult<()> {
        {
            let mut state = self.lock();
            state.calls.push(Call::WaitIdle);
            state.wait_idle_calls += 1;
        }
        self.complete_all();
        Ok(())
    }
}

//! Per-frame resource slots.
//!
//! A [`FrameSlotPool`] owns N reusable bundles of synchronization primitives
//! and command recording state, handed out in strict round-robin order so the
//! CPU can record frame N+1 while the GPU still executes frame N.
//!
//! # Synchronization Flow
//!
//! ```text
//! 1. Wait on fence        (CPU waits for the previous use of this slot)
//! 2. Acquire image        (signals image_acquired)
//! 3. Reset fence, record into command_buffer
//! 4. Submit               (waits image_acquired, signals render_completed + fence)
//! 5. Present              (waits render_completed)
//! ```
//!
//! The pool never waits itself; callers wait on a slot's fence before reusing
//! it.

use ash::vk;
use tracing::{debug, info};

use crate::backend::GpuBackend;
use crate::error::{RenderError, RenderResult};

/// One frame's worth of synchronization and recording resources.
///
/// Slots are plain handle bundles. The pool owns the underlying objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSlot {
    /// Position in the pool.
    pub index: usize,
    /// Signaled when the GPU finished the slot's last submission.
    pub fence: vk::Fence,
    /// Signaled when the acquired image may be rendered to.
    pub image_acquired: vk::Semaphore,
    /// Signaled when rendering finished; present waits on it.
    pub render_completed: vk::Semaphore,
    /// Pool dedicated to this slot.
    pub command_pool: vk::CommandPool,
    /// The slot's only command buffer.
    pub command_buffer: vk::CommandBuffer,
}

impl FrameSlot {
    fn empty(index: usize) -> Self {
        Self {
            index,
            fence: vk::Fence::null(),
            image_acquired: vk::Semaphore::null(),
            render_completed: vk::Semaphore::null(),
            command_pool: vk::CommandPool::null(),
            command_buffer: vk::CommandBuffer::null(),
        }
    }

    /// Creates the slot's objects. On failure the ones already created are
    /// released before returning.
    fn create<B: GpuBackend>(backend: &B, index: usize, queue_family: u32) -> RenderResult<Self> {
        let mut slot = Self::empty(index);
        if let Err(e) = slot.populate(backend, queue_family) {
            slot.destroy(backend);
            return Err(e);
        }
        debug!("Created frame slot {}", index);
        Ok(slot)
    }

    fn populate<B: GpuBackend>(&mut self, backend: &B, queue_family: u32) -> RenderResult<()> {
        // Signaled so the first wait on this slot returns immediately.
        self.fence = backend.create_fence(true)?;
        self.image_acquired = backend.create_semaphore()?;
        self.render_completed = backend.create_semaphore()?;
        self.command_pool = backend.create_command_pool(queue_family)?;
        self.command_buffer = backend.allocate_command_buffer(self.command_pool)?;
        Ok(())
    }

    /// Destroys every non-null object of the slot.
    fn destroy<B: GpuBackend>(&mut self, backend: &B) {
        // Frees the command buffer as well.
        if self.command_pool != vk::CommandPool::null() {
            backend.destroy_command_pool(self.command_pool);
        }
        if self.render_completed != vk::Semaphore::null() {
            backend.destroy_semaphore(self.render_completed);
        }
        if self.image_acquired != vk::Semaphore::null() {
            backend.destroy_semaphore(self.image_acquired);
        }
        if self.fence != vk::Fence::null() {
            backend.destroy_fence(self.fence);
        }
        *self = Self::empty(self.index);
    }
}

/// Fixed-size ring of [`FrameSlot`]s.
#[derive(Debug)]
pub struct FrameSlotPool {
    slots: Vec<FrameSlot>,
    counter: usize,
}

impl FrameSlotPool {
    /// Creates `slot_count` slots whose command pools target `queue_family`.
    ///
    /// # Errors
    ///
    /// Fails if `slot_count` is zero or any object cannot be created. Nothing
    /// is leaked on failure.
    pub fn new<B: GpuBackend>(
        backend: &B,
        queue_family: u32,
        slot_count: usize,
    ) -> RenderResult<Self> {
        if slot_count == 0 {
            return Err(RenderError::Init(
                "frame slot pool needs at least one slot".to_string(),
            ));
        }

        let mut pool = Self {
            slots: Vec::with_capacity(slot_count),
            counter: 0,
        };

        for index in 0..slot_count {
            match FrameSlot::create(backend, index, queue_family) {
                Ok(slot) => pool.slots.push(slot),
                Err(e) => {
                    pool.destroy(backend);
                    return Err(e);
                }
            }
        }

        info!("Frame slot pool created with {} slots", slot_count);
        Ok(pool)
    }

    /// Returns the next slot in round-robin order. Does not wait.
    ///
    /// Must not be called after [`destroy`](Self::destroy).
    pub fn next_slot(&mut self) -> FrameSlot {
        let slot = self.slots[self.counter % self.slots.len()];
        self.counter = self.counter.wrapping_add(1);
        slot
    }

    /// Number of slots, which bounds the frames in flight.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn slots(&self) -> &[FrameSlot] {
        &self.slots
    }

    /// Swaps slot `index`'s image-acquired semaphore for a fresh, unsignaled one.
    ///
    /// Needed when an acquisition signaled the semaphore but the frame was
    /// discarded. The caller must ensure the device is idle.
    pub fn replace_acquire_semaphore<B: GpuBackend>(
        &mut self,
        backend: &B,
        index: usize,
    ) -> RenderResult<()> {
        let fresh = backend.create_semaphore()?;
        let Some(slot) = self.slots.get_mut(index) else {
            backend.destroy_semaphore(fresh);
            return Err(RenderError::Init(format!("no frame slot {}", index)));
        };
        backend.destroy_semaphore(slot.image_acquired);
        slot.image_acquired = fresh;
        debug!("Replaced image-acquired semaphore of slot {}", index);
        Ok(())
    }

    /// Releases every slot. The GPU must no longer use any of them.
    pub fn destroy<B: GpuBackend>(&mut self, backend: &B) {
        if self.slots.is_empty() {
            return;
        }
        for slot in &mut self.slots {
            slot.destroy(backend);
        }
        self.slots.clear();
        debug!("Frame slot pool destroyed");
    }
}

//! Frame loop for Vulkraft.
//!
//! This crate drives presentation on top of `vulkraft_rhi`:
//! - Frame slots bounding the frames in flight
//! - Swapchain creation and rebuild on resize
//! - Per-frame recording sessions
//!
//! [`Renderer`] is the entry point. Everything GPU-facing goes through the
//! [`GpuBackend`] trait, implemented for Vulkan by [`VulkanContext`].

pub mod backend;
pub mod context;
mod error;
pub mod frame_slots;
pub mod renderer;
pub mod session;
pub mod swapchain;

#[cfg(test)]
pub(crate) mod mock;

pub use backend::GpuBackend;
pub use context::VulkanContext;
pub use error::{RenderError, RenderResult};
pub use frame_slots::{FrameSlot, FrameSlotPool};
pub use renderer::{Renderer, RendererConfig};
pub use session::{FrameSession, FrameState, PresentStatus};
pub use swapchain::{Acquire, AcquiredImage, SwapchainManager};

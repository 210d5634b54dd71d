//! Platform layer for Vulkraft.
//!
//! - Window creation and drawable size queries via winit
//! - Close-request tracking
//! - Vulkan surface creation via ash-window

mod window;

pub use window::{Surface, Window, drawable_size, get_required_extensions};

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
pub use winit::window::Window as WinitWindow;

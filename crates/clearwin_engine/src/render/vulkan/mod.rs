//! Vulkan rendering backend
//!
//! Low-level Vulkan wrappers with RAII ownership, and [`VulkanRenderer`]
//! which strings them together into a clear-and-present renderer.

pub mod commands;
pub mod context;
pub mod framebuffer;
pub mod render_pass;
pub mod renderer;
pub mod swapchain;
pub mod sync;

pub use context::{VulkanError, VulkanResult};
pub use renderer::VulkanRenderer;

use std::cell::Cell;
use std::rc::Rc;

use ash::vk;

/// Drawable size shared between a window and the renderer bound to it
///
/// The window updates it as it learns about resizes; the renderer reads it
/// whenever it rebuilds the swapchain.
#[derive(Debug, Clone, Default)]
pub struct SharedExtent(Rc<Cell<vk::Extent2D>>);

impl SharedExtent {
    /// Start tracking from `extent`
    pub fn new(extent: vk::Extent2D) -> Self {
        Self(Rc::new(Cell::new(extent)))
    }

    /// Latest known size
    pub fn get(&self) -> vk::Extent2D {
        self.0.get()
    }

    /// Record a new size
    pub fn set(&self, extent: vk::Extent2D) {
        self.0.set(extent);
    }
}

/// Extent for a window-system size, treating negative sizes as empty
pub fn extent_from_size(width: i32, height: i32) -> vk::Extent2D {
    vk::Extent2D {
        width: u32::try_from(width).unwrap_or(0),
        height: u32::try_from(height).unwrap_or(0),
    }
}

/// Window-system hooks the renderer needs
///
/// Implemented by platform windows so the Vulkan code never depends on a
/// particular windowing library.
pub trait SurfaceSource {
    /// Instance extensions the window system needs for presentation
    fn required_instance_extensions(&self) -> VulkanResult<Vec<String>>;

    /// Create a presentation surface for this window on `instance`
    fn create_surface(&self, instance: vk::Instance) -> VulkanResult<vk::SurfaceKHR>;

    /// Drawable size in pixels, kept current by the window
    fn framebuffer_extent(&self) -> SharedExtent;
}

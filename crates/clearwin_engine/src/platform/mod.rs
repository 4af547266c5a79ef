//! Platform abstraction
//!
//! The application never touches the windowing library directly. It walks a
//! chain of owned resources, each one produced by the previous:
//!
//! ```text
//! Platform ──init_video──▶ VideoSubsystem ──create_window──▶ PlatformWindow
//!                                                                │
//!                                              create_renderer ──▶ Renderer
//! ```
//!
//! Every resource releases itself on drop. Nothing here promises an ordering
//! between them; the application owns that (see `application::Session`).
//!
//! - **`glfw_backend`**: GLFW windows with a Vulkan renderer
//! - **`mock`** (tests only): scripted platform that journals every call

pub mod glfw_backend;

#[cfg(test)]
pub(crate) mod mock;

use crate::config::{RendererConfig, WindowConfig};
use crate::render::Renderer;
use thiserror::Error;

/// Failure reported by the underlying library
///
/// Wraps the library's own description of its last error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    /// Create an error from any displayable message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Window system event, as far as the application cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The user asked to close the window
    Quit,
    /// Anything else; ignored by the application
    Other,
}

impl Event {
    /// Whether this event asks the application to terminate
    pub const fn is_quit(self) -> bool {
        matches!(self, Self::Quit)
    }
}

/// Entry point of a windowing backend
pub trait Platform {
    /// Initialized video subsystem
    type Video: VideoSubsystem;

    /// Start the video subsystem
    ///
    /// Fails when no display is available or the library cannot start.
    fn init_video(&mut self) -> Result<Self::Video, BackendError>;
}

/// Started video subsystem; released when dropped
pub trait VideoSubsystem {
    /// Window type this subsystem creates
    type Window: PlatformWindow;

    /// Create a window described by `config`
    fn create_window(&mut self, config: &WindowConfig) -> Result<Self::Window, BackendError>;

    /// Fetch the next pending event without blocking
    ///
    /// Returns `None` once the queue is empty. Pumps the library's queue when
    /// nothing is buffered, like `SDL_PollEvent`.
    fn poll_event(&mut self, window: &Self::Window) -> Option<Event>;
}

/// Created window; destroyed when dropped
pub trait PlatformWindow {
    /// Renderer type bound to this window
    type Renderer: Renderer;

    /// Create a renderer that draws into this window
    ///
    /// The returned renderer must be dropped before the window.
    fn create_renderer(&mut self, config: &RendererConfig) -> Result<Self::Renderer, BackendError>;
}

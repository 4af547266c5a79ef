//! GLFW platform backend
//!
//! Window creation and event polling through GLFW, with the Vulkan renderer
//! bound to the window's surface.
//!
//! GLFW reports failures through a global error callback rather than through
//! return values. The callback installed here logs every error and keeps the
//! latest description, which is what [`BackendError`]s carry.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ash::vk;
use glfw::{ClientApiHint, WindowEvent, WindowHint, WindowMode};

use super::{BackendError, Event, Platform, PlatformWindow, VideoSubsystem};
use crate::config::{RendererConfig, WindowConfig};
use crate::render::vulkan::{
    extent_from_size, SharedExtent, SurfaceSource, VulkanError, VulkanRenderer, VulkanResult,
};

/// Most recent error description reported by GLFW
#[derive(Debug, Clone, Default)]
struct LastError(Arc<Mutex<Option<String>>>);

impl LastError {
    fn set(&self, description: String) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(description);
        }
    }

    /// Take the recorded error, or fall back to `context`
    fn take_or(&self, context: &str) -> BackendError {
        let recorded = self.0.lock().ok().and_then(|mut slot| slot.take());
        BackendError::new(recorded.unwrap_or_else(|| context.to_string()))
    }
}

/// GLFW entry point
#[derive(Debug, Default)]
pub struct GlfwPlatform {
    last_error: LastError,
}

impl GlfwPlatform {
    /// Create the platform; nothing is initialized until [`Platform::init_video`]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Platform for GlfwPlatform {
    type Video = GlfwVideo;

    fn init_video(&mut self) -> Result<GlfwVideo, BackendError> {
        let last_error = self.last_error.clone();
        let glfw = glfw::init(move |error, description: String| {
            log::error!("GLFW error {:?}: {}", error, description);
            last_error.set(description);
        })
        .map_err(|e| self.last_error.take_or(&format!("GLFW initialization failed: {e:?}")))?;

        if !glfw.vulkan_supported() {
            return Err(BackendError::new("Vulkan is not supported by the window system"));
        }

        log::info!("GLFW {} initialized", glfw::get_version_string());
        Ok(GlfwVideo {
            glfw,
            pending: VecDeque::new(),
            last_error: self.last_error.clone(),
        })
    }
}

/// Initialized GLFW library
///
/// The library terminates once this and every window holding a handle to it
/// have been dropped.
pub struct GlfwVideo {
    glfw: glfw::Glfw,
    pending: VecDeque<Event>,
    last_error: LastError,
}

impl GlfwVideo {
    fn primary_screen_size(&mut self) -> Option<(u32, u32)> {
        self.glfw.with_primary_monitor(|_, monitor| {
            monitor
                .and_then(|monitor| monitor.get_video_mode())
                .map(|mode| (mode.width, mode.height))
        })
    }
}

impl VideoSubsystem for GlfwVideo {
    type Window = GlfwWindow;

    fn create_window(&mut self, config: &WindowConfig) -> Result<GlfwWindow, BackendError> {
        // Configure for Vulkan (no OpenGL context)
        self.glfw.window_hint(WindowHint::ClientApi(ClientApiHint::NoApi));
        self.glfw.window_hint(WindowHint::Resizable(config.resizable));
        // Hidden until positioned, so it never flashes at the default spot
        self.glfw.window_hint(WindowHint::Visible(false));

        let (mut window, events) = self
            .glfw
            .create_window(config.width, config.height, &config.title, WindowMode::Windowed)
            .ok_or_else(|| self.last_error.take_or("GLFW returned no window"))?;

        let screen = self.primary_screen_size().unwrap_or_else(|| {
            log::warn!("No primary monitor video mode, placing window at the origin");
            (0, 0)
        });
        let (x, y) = config.position.resolve(screen, (config.width, config.height));
        window.set_pos(x, y);

        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);
        if config.visible {
            window.show();
        }

        log::info!("Window created at ({}, {})", x, y);
        let (width, height) = window.get_framebuffer_size();
        Ok(GlfwWindow {
            glfw: self.glfw.clone(),
            window,
            events,
            extent: SharedExtent::new(extent_from_size(width, height)),
            last_error: self.last_error.clone(),
        })
    }

    fn poll_event(&mut self, window: &GlfwWindow) -> Option<Event> {
        if self.pending.is_empty() {
            self.glfw.poll_events();
            for (_, event) in glfw::flush_messages(&window.events) {
                if let WindowEvent::FramebufferSize(width, height) = event {
                    window.extent.set(extent_from_size(width, height));
                }
                self.pending.push_back(translate(&event));
            }
        }
        self.pending.pop_front()
    }
}

impl Drop for GlfwVideo {
    fn drop(&mut self) {
        log::info!("Releasing video subsystem");
    }
}

fn translate(event: &WindowEvent) -> Event {
    match event {
        WindowEvent::Close => Event::Quit,
        _ => Event::Other,
    }
}

/// GLFW window prepared for Vulkan presentation
pub struct GlfwWindow {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, WindowEvent)>,
    extent: SharedExtent,
    last_error: LastError,
}

impl PlatformWindow for GlfwWindow {
    type Renderer = VulkanRenderer;

    fn create_renderer(&mut self, config: &RendererConfig) -> Result<VulkanRenderer, BackendError> {
        VulkanRenderer::new(&*self, config).map_err(|e| match e {
            VulkanError::InitializationFailed(message) => BackendError::new(message),
            other => BackendError::new(other.to_string()),
        })
    }
}

impl SurfaceSource for GlfwWindow {
    fn required_instance_extensions(&self) -> VulkanResult<Vec<String>> {
        self.glfw.get_required_instance_extensions().ok_or_else(|| {
            VulkanError::InitializationFailed(self.last_error.take_or("Failed to get required extensions").0)
        })
    }

    fn create_surface(&self, instance: vk::Instance) -> VulkanResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(VulkanError::InitializationFailed(format!(
                "Failed to create Vulkan surface: {result:?}"
            )))
        }
    }

    fn framebuffer_extent(&self) -> SharedExtent {
        self.extent.clone()
    }
}

impl Drop for GlfwWindow {
    fn drop(&mut self) {
        log::info!("Destroying window");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_maps_to_quit_and_everything_else_is_ignored() {
        assert_eq!(translate(&WindowEvent::Close), Event::Quit);
        assert_eq!(translate(&WindowEvent::Focus(true)), Event::Other);
        assert_eq!(translate(&WindowEvent::Pos(10, 10)), Event::Other);
        assert_eq!(translate(&WindowEvent::FramebufferSize(640, 480)), Event::Other);
    }

    #[test]
    fn recorded_error_wins_over_fallback() {
        let last_error = LastError::default();
        last_error.set("X11: The DISPLAY environment variable is missing".to_string());

        assert_eq!(
            last_error.take_or("fallback").0,
            "X11: The DISPLAY environment variable is missing"
        );
        assert_eq!(last_error.take_or("fallback").0, "fallback");
    }
}

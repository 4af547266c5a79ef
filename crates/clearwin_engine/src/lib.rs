//! # Clearwin Engine
//!
//! Opens a window, binds a hardware-accelerated Vulkan renderer to it and
//! clears it to a solid color every frame until the user closes the window.
//!
//! ## Layers
//!
//! - **`platform`**: backend seam (video subsystem, window, event polling)
//!   plus the GLFW implementation
//! - **`render`**: the `Renderer` contract and the Vulkan backend
//! - **`config`**: serde-backed window and renderer descriptors
//! - **`application`**: the init / loop / shutdown driver
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clearwin_engine::prelude::*;
//!
//! fn main() -> std::process::ExitCode {
//!     let mut platform = GlfwPlatform::new();
//!     match run(&mut platform, &AppConfig::default()) {
//!         Ok(_) => std::process::ExitCode::SUCCESS,
//!         Err(e) => {
//!             eprintln!("{e}");
//!             std::process::ExitCode::from(e.exit_code())
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names)]

pub mod config;
pub mod foundation;
pub mod platform;
pub mod render;

mod application;

pub use application::{run, AppError, LoopState, RunReport};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{AppConfig, Config, RendererConfig, WindowConfig, WindowPosition},
        platform::{glfw_backend::GlfwPlatform, BackendError, Event, Platform},
        render::{Color, Renderer},
        run, AppError, RunReport,
    };
}

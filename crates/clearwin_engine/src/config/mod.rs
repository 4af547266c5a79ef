//! Configuration system
//!
//! Typed descriptors for the window and the renderer. [`AppConfig::default`]
//! is the fixed setup the application runs with; the [`Config`] trait lets
//! embedders persist or load descriptors as TOML or RON.

pub use serde::{Deserialize, Serialize};

use crate::render::Color;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Window configuration
    pub window: WindowConfig,

    /// Renderer configuration
    pub renderer: RendererConfig,
}

impl Config for AppConfig {}

/// Where the window is placed on screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowPosition {
    /// Centered on the primary monitor
    #[default]
    Centered,

    /// Top-left corner at explicit screen coordinates
    At {
        /// Screen x coordinate
        x: i32,
        /// Screen y coordinate
        y: i32,
    },
}

impl WindowPosition {
    /// Resolve to the window's top-left corner for a screen of `screen` pixels
    ///
    /// A window larger than the screen is pinned to the origin instead of
    /// being pushed off the top-left edge.
    pub fn resolve(self, screen: (u32, u32), window: (u32, u32)) -> (i32, i32) {
        match self {
            Self::Centered => (centered_axis(screen.0, window.0), centered_axis(screen.1, window.1)),
            Self::At { x, y } => (x, y),
        }
    }
}

fn centered_axis(screen: u32, window: u32) -> i32 {
    i32::try_from(screen.saturating_sub(window) / 2).unwrap_or(0)
}

/// Window configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,

    /// Window width
    pub width: u32,

    /// Window height
    pub height: u32,

    /// Window placement
    pub position: WindowPosition,

    /// Whether the window is shown as soon as it is created
    pub visible: bool,

    /// Whether window is resizable
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Clearwin".to_string(),
            width: 800,
            height: 600,
            position: WindowPosition::Centered,
            visible: true,
            resizable: false,
        }
    }
}

/// Renderer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,

    /// Reject software (CPU) devices
    pub accelerated: bool,

    /// Substring of the GPU name to select; `None` lets the backend choose
    pub driver: Option<String>,

    /// Color the application clears every frame with
    pub clear_color: Color,

    /// Maximum number of frames in flight
    pub max_frames_in_flight: u32,

    /// Enable Vulkan validation layers (debug builds only)
    pub validation: bool,
}

impl RendererConfig {
    /// Select a GPU whose name contains `driver`
    #[must_use]
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Set the per-frame clear color
    #[must_use]
    pub const fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    /// Set maximum frames in flight
    #[must_use]
    pub fn with_max_frames_in_flight(mut self, max_frames: u32) -> Self {
        self.max_frames_in_flight = max_frames.clamp(1, 8);
        self
    }

    /// Enable or disable Vulkan validation layers
    #[must_use]
    pub const fn with_validation(mut self, enable: bool) -> Self {
        self.validation = enable;
        self
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Clearwin".to_string(),
            accelerated: true,
            driver: None,
            clear_color: Color::BLUE,
            max_frames_in_flight: 2,
            validation: cfg!(debug_assertions),
        }
    }
}

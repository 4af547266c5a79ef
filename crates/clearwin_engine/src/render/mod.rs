//! Rendering subsystem
//!
//! The application only ever talks to a [`Renderer`]: set a draw color, clear
//! the backbuffer with it, present. Backends live in submodules; the only one
//! today is [`vulkan`].

pub mod vulkan;

use serde::{Deserialize, Serialize};

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel (255 = opaque)
    pub a: u8,
}

impl Color {
    /// Opaque black
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    /// Opaque blue, the clear color used by the application
    pub const BLUE: Self = Self::rgb(0, 0, 255);

    /// Create an opaque color
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Create a color with explicit alpha
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Normalized `[R, G, B, A]` in the 0.0-1.0 range, as GPU clear values expect
    pub fn to_f32_array(self) -> [f32; 4] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            f32::from(self.a) / 255.0,
        ]
    }

    /// Like [`Color::to_f32_array`], with the color channels decoded from sRGB
    ///
    /// Use this when the render target is an sRGB format: the hardware
    /// re-encodes on write, so the displayed value matches the 8-bit input.
    /// Alpha is never encoded.
    pub fn to_linear_f32_array(self) -> [f32; 4] {
        let [r, g, b, a] = self.to_f32_array();
        [srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b), a]
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Minimal immediate-mode renderer contract
///
/// Calls are infallible from the caller's point of view. Backends log any
/// failure and carry on with the next frame.
pub trait Renderer {
    /// Set the color used by subsequent [`Renderer::clear`] calls
    fn set_draw_color(&mut self, color: Color);

    /// Fill the whole render target with the current draw color
    fn clear(&mut self);

    /// Make the backbuffer visible in the window
    fn present(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blue_is_opaque_pure_blue() {
        assert_eq!(Color::BLUE, Color::rgba(0, 0, 255, 255));
        assert_eq!(Color::BLUE.to_f32_array(), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn normalization_maps_midpoints() {
        let [r, g, b, a] = Color::rgba(51, 102, 204, 0).to_f32_array();
        assert!((r - 0.2).abs() < f32::EPSILON);
        assert!((g - 0.4).abs() < f32::EPSILON);
        assert!((b - 0.8).abs() < f32::EPSILON);
        assert_eq!(a, 0.0);
    }

    #[test]
    fn linear_conversion_keeps_endpoints() {
        assert_eq!(Color::BLUE.to_linear_f32_array(), [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(Color::rgb(255, 255, 255).to_linear_f32_array(), [1.0; 4]);
    }

    #[test]
    fn linear_conversion_decodes_midtones() {
        let [r, g, b, a] = Color::rgba(10, 128, 188, 128).to_linear_f32_array();
        // 10 sits on the linear toe of the curve
        assert!((r - 10.0 / 255.0 / 12.92).abs() < 1e-6);
        assert!((g - 0.215_861).abs() < 1e-4);
        assert!((b - 0.502_886).abs() < 1e-4);
        // Alpha passes through untouched
        assert!((a - 128.0 / 255.0).abs() < f32::EPSILON);
    }
}

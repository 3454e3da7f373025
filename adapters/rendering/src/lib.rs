#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for Crowd Pulse adapters.
//!
//! The density renderer and floor-plan painter live outside this workspace.
//! Adapters implement [`DensitySurface`] to receive heat frames and, when the
//! debug overlay is enabled, guest markers produced by [`overlay`].
//! Zone discs and connection lines are redrawn whenever the zones change.

pub mod overlay;

use anyhow::Result as AnyResult;
use crowd_pulse_core::HeatFrame;

use self::overlay::{DebugMarker, ZoneDisc, ZoneLink};

/// RGBA color used when presenting overlays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Creates an opaque, fully saturated color of the given hue in degrees.
    #[must_use]
    pub fn from_hue(degrees: f32) -> Self {
        let hue = if degrees.is_finite() {
            degrees.rem_euclid(360.0) / 60.0
        } else {
            0.0
        };
        let secondary = 1.0 - ((hue % 2.0) - 1.0).abs();

        let (red, green, blue) = match hue as u8 {
            0 => (1.0, secondary, 0.0),
            1 => (secondary, 1.0, 0.0),
            2 => (0.0, 1.0, secondary),
            3 => (0.0, secondary, 1.0),
            4 => (secondary, 0.0, 1.0),
            _ => (1.0, 0.0, secondary),
        };
        Self::new(red, green, blue, 1.0)
    }

    /// Interpolates every channel towards `other` by `t`.
    #[must_use]
    pub fn lerp(self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);

        Self {
            red: lerp_channel(self.red, other.red, t),
            green: lerp_channel(self.green, other.green, t),
            blue: lerp_channel(self.blue, other.blue, t),
            alpha: lerp_channel(self.alpha, other.alpha, t),
        }
    }
}

fn lerp_channel(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// Surface that paints the density field over the floor plan.
pub trait DensitySurface {
    /// Replaces the density field with the samples of `frame`.
    fn set_data(&mut self, frame: &HeatFrame) -> AnyResult<()>;

    /// Draws guest markers on top of the density field.
    ///
    /// Only called while the debug overlay is enabled. Surfaces without an
    /// overlay layer may ignore the request.
    fn draw_debug(&mut self, markers: &[DebugMarker]) -> AnyResult<()> {
        let _ = markers;
        Ok(())
    }

    /// Replaces the zone connection lines drawn under the density field.
    ///
    /// Called whenever the zone board changed since the previous push.
    fn draw_links(&mut self, links: &[ZoneLink]) -> AnyResult<()> {
        let _ = links;
        Ok(())
    }

    /// Replaces the discs marking each zone under the density field.
    ///
    /// Called alongside [`DensitySurface::draw_links`].
    fn draw_zones(&mut self, discs: &[ZoneDisc]) -> AnyResult<()> {
        let _ = discs;
        Ok(())
    }
}

use std::{collections::BTreeMap, time::Duration};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every adjustable constant of the heatmap engine.
///
/// Values are fixed for the lifetime of an engine. Fields omitted from a
/// configuration file fall back to [`Tuning::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Fixed zone-name to anchor table for the floor plan.
    pub anchors: BTreeMap<String, Vec2>,
    /// Floor-plan dimensions used by the grid fallback layout.
    pub canvas: Vec2,
    /// Base orbit radius before the random variation is applied.
    pub orbit_radius: f32,
    /// Lower bound of the random factor scaling the base orbit radius.
    pub radius_factor_min: f32,
    /// Upper bound (exclusive) of the random factor scaling the base orbit radius.
    pub radius_factor_max: f32,
    /// Orbital angular speed in radians per second.
    pub angular_speed: f32,
    /// Time a guest takes to fade fully in or out.
    pub fade_ms: u64,
    /// Time a guest takes to ease from one zone to another.
    pub transition_ms: u64,
    /// Largest delta time a single frame may integrate.
    pub max_frame_step_ms: u64,
    /// Maximum number of frames pushed to the density surface per second.
    pub max_pushes_per_second: f32,
    /// Target rate of the frame loop.
    pub frame_rate_hz: f32,
    /// Interval between snapshot polls.
    pub poll_interval_ms: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        let anchors = [
            ("Leaning Tower", Vec2::new(200.0, 700.0)),
            ("Teacups", Vec2::new(900.0, 800.0)),
            ("Food Court", Vec2::new(600.0, 600.0)),
            ("Thunder Coaster", Vec2::new(150.0, 150.0)),
            ("Splash Zone", Vec2::new(1200.0, 500.0)),
        ]
        .into_iter()
        .map(|(name, anchor)| (name.to_owned(), anchor))
        .collect();

        Self {
            anchors,
            canvas: Vec2::new(1500.0, 1000.0),
            orbit_radius: 35.0,
            radius_factor_min: 1.0,
            radius_factor_max: 55.0 / 35.0,
            angular_speed: 0.9,
            fade_ms: 1_000,
            transition_ms: 1_000,
            max_frame_step_ms: 50,
            max_pushes_per_second: 60.0,
            frame_rate_hz: 60.0,
            poll_interval_ms: 1_000,
        }
    }
}

impl Tuning {
    /// Duration of a complete fade.
    #[must_use]
    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }

    /// Duration of a complete zone transition.
    #[must_use]
    pub fn transition_duration(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    /// Largest delta time integrated by a single frame.
    #[must_use]
    pub fn max_frame_step(&self) -> Duration {
        Duration::from_millis(self.max_frame_step_ms)
    }

    /// Shortest interval between two pushes to the density surface.
    ///
    /// Zero for a rate [`Tuning::validate`] rejects.
    #[must_use]
    pub fn min_push_interval(&self) -> Duration {
        rate_interval(self.max_pushes_per_second).unwrap_or(Duration::ZERO)
    }

    /// Interval between two frames of the frame loop.
    ///
    /// Zero for a rate [`Tuning::validate`] rejects.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        rate_interval(self.frame_rate_hz).unwrap_or(Duration::ZERO)
    }

    /// Interval between two snapshot polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Checks that every value can drive the simulation without producing
    /// non-finite positions or zero-length timers.
    pub fn validate(&self) -> Result<(), TuningError> {
        for (name, anchor) in &self.anchors {
            if !anchor.is_finite() {
                return Err(TuningError::NonFiniteAnchor { zone: name.clone() });
            }
        }

        require_positive("canvas.x", self.canvas.x)?;
        require_positive("canvas.y", self.canvas.y)?;
        require_finite("orbit_radius", self.orbit_radius)?;
        if self.orbit_radius < 0.0 {
            return Err(TuningError::NonPositive {
                field: "orbit_radius",
            });
        }
        require_finite("angular_speed", self.angular_speed)?;
        require_rate("max_pushes_per_second", self.max_pushes_per_second)?;
        require_rate("frame_rate_hz", self.frame_rate_hz)?;

        if !self.radius_factor_min.is_finite()
            || !self.radius_factor_max.is_finite()
            || self.radius_factor_min <= 0.0
            || self.radius_factor_min > self.radius_factor_max
        {
            return Err(TuningError::InvalidRadiusFactors {
                min: self.radius_factor_min,
                max: self.radius_factor_max,
            });
        }

        if self.max_frame_step_ms == 0 {
            return Err(TuningError::NonPositive {
                field: "max_frame_step_ms",
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(TuningError::NonPositive {
                field: "poll_interval_ms",
            });
        }

        Ok(())
    }
}

fn require_finite(field: &'static str, value: f32) -> Result<(), TuningError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TuningError::NonFinite { field })
    }
}

fn require_positive(field: &'static str, value: f32) -> Result<(), TuningError> {
    require_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(TuningError::NonPositive { field })
    }
}

/// Period of a rate in hertz, if it is a representable non-zero duration.
fn rate_interval(rate: f32) -> Option<Duration> {
    Duration::try_from_secs_f32(rate.recip())
        .ok()
        .filter(|interval| !interval.is_zero())
}

fn require_rate(field: &'static str, rate: f32) -> Result<(), TuningError> {
    require_positive(field, rate)?;
    match rate_interval(rate) {
        Some(_) => Ok(()),
        None => Err(TuningError::RateOutOfRange { field, rate }),
    }
}

/// Reasons a [`Tuning`] cannot drive the engine.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TuningError {
    /// A numeric field is NaN or infinite.
    #[error("`{field}` must be finite")]
    NonFinite {
        /// Name of the offending field.
        field: &'static str,
    },
    /// A field that must be positive is zero or negative.
    #[error("`{field}` must be positive")]
    NonPositive {
        /// Name of the offending field.
        field: &'static str,
    },
    /// A rate whose period cannot be represented as a non-zero duration.
    #[error("`{field}` of {rate} Hz has no representable period")]
    RateOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Configured rate.
        rate: f32,
    },
    /// The orbit radius factors do not describe a usable range.
    #[error("orbit radius factors {min}..{max} do not form a positive range")]
    InvalidRadiusFactors {
        /// Configured lower factor.
        min: f32,
        /// Configured upper factor.
        max: f32,
    },
    /// An anchor in the zone table is not a finite point.
    #[error("anchor for zone `{zone}` must be finite")]
    NonFiniteAnchor {
        /// Zone name of the offending anchor.
        zone: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let tuning = Tuning::default();
        assert_eq!(tuning.validate(), Ok(()));
        assert_eq!(tuning.fade_duration(), Duration::from_secs(1));
        assert_eq!(tuning.max_frame_step(), Duration::from_millis(50));
        assert_eq!(tuning.anchors.len(), 5);
    }

    #[test]
    fn partial_toml_overrides_selected_values() {
        let source = r#"
            fade_ms = 400
            canvas = [800.0, 600.0]

            [anchors]
            "Gift Shop" = [10.0, 20.0]
        "#;

        let tuning: Tuning = toml::from_str(source).expect("parse tuning");
        assert_eq!(tuning.fade_duration(), Duration::from_millis(400));
        assert_eq!(tuning.canvas, Vec2::new(800.0, 600.0));
        assert_eq!(tuning.anchors.len(), 1);
        assert_eq!(tuning.transition_ms, Tuning::default().transition_ms);
    }

    #[test]
    fn validation_names_the_offending_field() {
        let tuning = Tuning {
            max_pushes_per_second: 0.0,
            ..Tuning::default()
        };
        assert_eq!(
            tuning.validate(),
            Err(TuningError::NonPositive {
                field: "max_pushes_per_second"
            })
        );

        let tuning = Tuning {
            radius_factor_min: 2.0,
            radius_factor_max: 1.0,
            ..Tuning::default()
        };
        assert!(matches!(
            tuning.validate(),
            Err(TuningError::InvalidRadiusFactors { .. })
        ));
    }

    #[test]
    fn rates_without_a_representable_period_are_rejected() {
        let tuning = Tuning {
            max_pushes_per_second: 1e-30,
            ..Tuning::default()
        };
        assert_eq!(
            tuning.validate(),
            Err(TuningError::RateOutOfRange {
                field: "max_pushes_per_second",
                rate: 1e-30
            })
        );
        assert_eq!(tuning.min_push_interval(), Duration::ZERO);

        let tuning = Tuning {
            frame_rate_hz: 1e30,
            ..Tuning::default()
        };
        assert!(matches!(
            tuning.validate(),
            Err(TuningError::RateOutOfRange {
                field: "frame_rate_hz",
                ..
            })
        ));
        assert_eq!(tuning.frame_interval(), Duration::ZERO);

        let tuning = Tuning {
            frame_rate_hz: 0.5,
            ..Tuning::default()
        };
        assert_eq!(tuning.validate(), Ok(()));
        assert_eq!(tuning.frame_interval(), Duration::from_secs(2));
    }
}

//! Per-guest motion: orbit rotation, opacity ramps and eased zone transitions.

use std::time::Duration;

use crowd_pulse_core::{
    GuestId, GuestState, LifecyclePhase, Orbit, Timestamp, Tuning, Vec2, ZoneBoard, ZoneId,
};

/// Constants that govern how guests move between ticks.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Motion {
    angular_speed: f32,
    fade: Duration,
    transition: Duration,
}

impl Motion {
    pub(crate) fn from_tuning(tuning: &Tuning) -> Self {
        Self {
            angular_speed: tuning.angular_speed,
            fade: tuning.fade_duration(),
            transition: tuning.transition_duration(),
        }
    }
}

/// Smoothstep easing `3p² − 2p³` over `[0, 1]`.
pub(crate) fn smoothstep(progress: f32) -> f32 {
    let p = progress.clamp(0.0, 1.0);
    p * p * (3.0 - 2.0 * p)
}

/// Ratio of `elapsed` to `total`, clamped to `[0, 1]`. A zero total is already complete.
fn ratio(elapsed: Duration, total: Duration) -> f32 {
    if total.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0) as f32
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FadeDirection {
    Rising,
    Holding,
    Falling,
}

/// Opacity tracked as the portion of the fade duration already covered.
#[derive(Clone, Copy, Debug)]
struct Fade {
    level: Duration,
    direction: FadeDirection,
}

#[derive(Clone, Copy, Debug)]
struct Transition {
    target_zone: ZoneId,
    target_orbit: Orbit,
    /// Anchor the guest eases away from; `None` snaps onto the target.
    from: Option<Vec2>,
    elapsed: Duration,
    progress: f32,
}

/// Outcome of advancing a single guest.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Step {
    Advanced {
        committed: Option<ZoneId>,
        faded_in: bool,
    },
    Stalled {
        zone: ZoneId,
    },
    NonFinite {
        committed: Option<ZoneId>,
        faded_in: bool,
    },
    Retired,
}

/// Animated simulation state of one guest.
#[derive(Clone, Debug)]
pub(crate) struct GuestSim {
    id: GuestId,
    zone: ZoneId,
    orbit: Orbit,
    position: Vec2,
    opacity: f32,
    fade: Fade,
    transition: Option<Transition>,
    added_at: Timestamp,
    removed_at: Option<Timestamp>,
}

impl GuestSim {
    pub(crate) fn spawn(
        id: GuestId,
        zone: ZoneId,
        anchor: Vec2,
        orbit: Orbit,
        at: Timestamp,
    ) -> Self {
        Self {
            id,
            zone,
            orbit,
            position: anchor + orbit.offset(),
            opacity: 0.0,
            fade: Fade {
                level: Duration::ZERO,
                direction: FadeDirection::Rising,
            },
            transition: None,
            added_at: at,
            removed_at: None,
        }
    }

    pub(crate) fn zone(&self) -> ZoneId {
        self.zone
    }

    pub(crate) fn position(&self) -> Vec2 {
        self.position
    }

    pub(crate) fn is_retiring(&self) -> bool {
        self.fade.direction == FadeDirection::Falling
    }

    pub(crate) fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub(crate) fn phase(&self) -> LifecyclePhase {
        if self.is_retiring() {
            LifecyclePhase::FadingOut
        } else if self.transition.is_some() {
            LifecyclePhase::Transitioning
        } else if self.fade.direction == FadeDirection::Rising {
            LifecyclePhase::FadingIn
        } else {
            LifecyclePhase::Steady
        }
    }

    /// Starts easing towards `target_zone`.
    ///
    /// `source` is the anchor of the current zone when it still resolves.
    /// Otherwise the guest eases away from the anchor it last rested on.
    pub(crate) fn begin_transition(
        &mut self,
        target_zone: ZoneId,
        target_orbit: Orbit,
        source: Option<Vec2>,
    ) {
        let from = source.unwrap_or(self.position - self.orbit.offset());
        self.transition = Some(Transition {
            target_zone,
            target_orbit,
            from: from.is_finite().then_some(from),
            elapsed: Duration::ZERO,
            progress: 0.0,
        });
    }

    /// Commits a transition that already reached full progress.
    pub(crate) fn commit_completed_transition(&mut self) -> Option<ZoneId> {
        let transition = self.transition.filter(|transition| transition.progress >= 1.0)?;
        self.zone = transition.target_zone;
        self.orbit = transition.target_orbit;
        self.transition = None;
        Some(self.zone)
    }

    pub(crate) fn begin_fade_out(&mut self, at: Timestamp) {
        self.fade.direction = FadeDirection::Falling;
        self.removed_at = Some(at);
    }

    pub(crate) fn snapshot(&self) -> GuestState {
        let (target_zone, transition_progress) = match self.transition {
            Some(transition) => (transition.target_zone, transition.progress),
            None => (self.zone, 1.0),
        };

        GuestState {
            id: self.id,
            current_zone: self.zone,
            target_zone,
            position: self.position,
            orbit: self.orbit,
            transition_progress,
            opacity: self.opacity,
            phase: self.phase(),
            added_at: self.added_at,
            removed_at: self.removed_at,
        }
    }

    /// Advances orbit, transition and fade by `dt`.
    ///
    /// A transitioning guest only needs its target zone on the board; the
    /// zone it leaves was captured when the transition began.
    pub(crate) fn advance(&mut self, dt: Duration, board: &ZoneBoard, motion: &Motion) -> Step {
        let resolved = match self.transition {
            Some(transition) => board
                .anchor(transition.target_zone)
                .map(|target| (transition.from.unwrap_or(target), Some(target)))
                .ok_or(transition.target_zone),
            None => board
                .anchor(self.zone)
                .map(|anchor| (anchor, None))
                .ok_or(self.zone),
        };

        let (source, target) = match resolved {
            Ok(anchors) => anchors,
            Err(zone) => {
                // Position stays frozen, but a departing guest keeps fading so it can leave.
                if self.is_retiring() && self.advance_fade(dt, motion) {
                    return Step::Retired;
                }
                return Step::Stalled { zone };
            }
        };

        self.orbit = self.orbit.advanced(motion.angular_speed, dt);

        let mut committed = None;
        let (anchor, display_orbit) = match (self.transition.as_mut(), target) {
            (Some(transition), Some(target_anchor)) => {
                let target_zone = transition.target_zone;
                transition.target_orbit = transition
                    .target_orbit
                    .advanced(motion.angular_speed, dt);
                transition.elapsed = transition.elapsed.saturating_add(dt);
                transition.progress = ratio(transition.elapsed, motion.transition);

                if transition.progress >= 1.0 {
                    self.orbit = transition.target_orbit;
                    self.zone = target_zone;
                    self.transition = None;
                    committed = Some(target_zone);
                    (target_anchor, self.orbit)
                } else {
                    let eased = smoothstep(transition.progress);
                    (
                        source.lerp(target_anchor, eased),
                        self.orbit.blend(transition.target_orbit, eased),
                    )
                }
            }
            _ => (source, self.orbit),
        };

        let faded_in = self.fade.direction == FadeDirection::Rising;
        let retired = self.advance_fade(dt, motion);
        let faded_in = faded_in && self.fade.direction == FadeDirection::Holding;

        let position = anchor + display_orbit.offset();
        let finite = position.is_finite();
        if finite {
            self.position = position;
        }

        if retired {
            Step::Retired
        } else if finite {
            Step::Advanced {
                committed,
                faded_in,
            }
        } else {
            Step::NonFinite {
                committed,
                faded_in,
            }
        }
    }

    /// Moves the fade level by `dt`. Returns `true` once a fade-out is complete.
    fn advance_fade(&mut self, dt: Duration, motion: &Motion) -> bool {
        match self.fade.direction {
            FadeDirection::Rising => {
                self.fade.level = self.fade.level.saturating_add(dt).min(motion.fade);
                if self.fade.level >= motion.fade {
                    self.fade.direction = FadeDirection::Holding;
                }
            }
            FadeDirection::Holding => {
                self.fade.level = motion.fade;
            }
            FadeDirection::Falling => {
                self.fade.level = self.fade.level.saturating_sub(dt);
            }
        }

        self.opacity = match self.fade.direction {
            FadeDirection::Holding => 1.0,
            FadeDirection::Rising | FadeDirection::Falling => ratio(self.fade.level, motion.fade),
        };

        if self.fade.direction == FadeDirection::Falling && self.fade.level.is_zero() {
            self.opacity = 0.0;
            return true;
        }
        false
    }
}

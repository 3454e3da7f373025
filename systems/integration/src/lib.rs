#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Frame integration system.
//!
//! Turns wall-clock frame timestamps into bounded simulation steps and
//! converts the registry into weighted density samples once the world has
//! applied the step. Guests the world could not advance, guests whose zones
//! are unresolvable, and non-finite positions produce no sample for the
//! frame; guests retired during the step contribute one final sample.

use std::{collections::HashSet, time::Duration};

use crowd_pulse_core::{
    Event, GuestView, HeatSample, Timestamp, Tuning, Zone, ZoneBoard, MIN_SAMPLE_VALUE,
};

const BASE_HEAT: f32 = 0.1;
const CALM_SPAN: f32 = 0.3;
const CROWDED_BASE: f32 = 0.4;
const CROWDED_SPAN: f32 = 0.6;

/// Heat a single guest contributes for its zone's occupancy.
///
/// Below the crowding threshold heat grows from 0.1 to 0.4; above it heat
/// grows from 0.4 to 1.0 as occupancy approaches capacity. Over-capacity
/// zones saturate at 1.0.
#[must_use]
pub fn heat_contribution(zone: &Zone) -> f32 {
    let ratio = zone.occupancy_ratio();
    let threshold = zone.threshold_ratio();

    if threshold <= 0.0 {
        return if ratio > 0.0 { 1.0 } else { BASE_HEAT };
    }

    let heat = if ratio <= threshold {
        BASE_HEAT + CALM_SPAN * (ratio / threshold)
    } else if threshold >= 1.0 {
        1.0
    } else {
        CROWDED_BASE + CROWDED_SPAN * ((ratio - threshold) / (1.0 - threshold))
    };
    heat.clamp(0.0, 1.0)
}

/// Sample weight of a guest with the given opacity and heat.
#[must_use]
pub fn sample_value(opacity: f32, heat: f32) -> f32 {
    (opacity * heat).clamp(MIN_SAMPLE_VALUE, 1.0)
}

/// Pure system that clamps frame steps and collects density samples.
#[derive(Debug)]
pub struct Integration {
    max_step: Duration,
    last_tick: Option<Timestamp>,
}

impl Integration {
    /// Creates an integrator that never integrates more than `max_step` per frame.
    #[must_use]
    pub fn new(max_step: Duration) -> Self {
        Self {
            max_step,
            last_tick: None,
        }
    }

    /// Creates an integrator using the frame step cap of the tuning.
    #[must_use]
    pub fn from_tuning(tuning: &Tuning) -> Self {
        Self::new(tuning.max_frame_step())
    }

    /// Records a frame at `now` and returns the delta time to integrate.
    ///
    /// The first frame and frames whose clock went backwards integrate zero.
    pub fn advance_clock(&mut self, now: Timestamp) -> Duration {
        let dt = match self.last_tick {
            Some(last) => now.saturating_duration_since(last).min(self.max_step),
            None => Duration::ZERO,
        };
        if self.last_tick.map_or(true, |last| now > last) {
            self.last_tick = Some(now);
        }
        dt
    }

    /// Collects one density sample per renderable guest into `out`.
    ///
    /// `events` must be the events produced by the tick that preceded the
    /// capture of `guest_view`.
    pub fn collect_samples(
        &self,
        events: &[Event],
        guest_view: &GuestView,
        board: &ZoneBoard,
        out: &mut Vec<HeatSample>,
    ) {
        let mut skipped = HashSet::new();
        for event in events {
            match event {
                Event::GuestStalled { guest, .. } | Event::NonFinitePosition { guest } => {
                    let _ = skipped.insert(*guest);
                }
                _ => {}
            }
        }

        for guest in guest_view.iter() {
            if skipped.contains(&guest.id) || !guest.position.is_finite() {
                continue;
            }
            if guest.is_transitioning() && !board.contains(guest.target_zone) {
                continue;
            }
            // A guest easing out of a vanished zone is weighted by its destination.
            let Some(entry) = board
                .get(guest.current_zone)
                .or_else(|| board.get(guest.target_zone))
            else {
                continue;
            };

            let value = sample_value(guest.opacity, heat_contribution(&entry.zone));
            out.push(HeatSample::new(guest.position.x, guest.position.y, value));
        }

        for event in events {
            let Event::GuestRetired { zone, position, .. } = event else {
                continue;
            };
            if !position.is_finite() {
                continue;
            }
            let Some(entry) = board.get(*zone) else {
                continue;
            };

            let value = sample_value(0.0, heat_contribution(&entry.zone));
            out.push(HeatSample::new(position.x, position.y, value));
        }
    }
}

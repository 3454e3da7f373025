#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Snapshot reconciliation system.
//!
//! Compares a full replacement snapshot from the poller with the current
//! registry view and emits the commands that bring the registry in line:
//! spawning newly sighted guests, starting zone transitions, committing
//! completed transitions and fading out guests that left. Reconciling the
//! same snapshot twice emits no additional guest commands.

use std::{collections::HashSet, f32::consts::TAU};

use crowd_pulse_core::{
    Command, GuestSnapshot, GuestView, LifecyclePhase, Orbit, Timestamp, Tuning, ZoneBoard,
    ZoneSnapshot,
};
use crowd_pulse_system_zone_layout::ZoneLayout;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

/// Pure system that turns authoritative snapshots into registry commands.
#[derive(Debug)]
pub struct Reconciliation<R = ChaCha8Rng> {
    layout: ZoneLayout,
    rng: R,
    orbit_radius: f32,
    radius_factor_min: f32,
    radius_factor_max: f32,
}

impl Reconciliation<ChaCha8Rng> {
    /// Creates a reconciler whose orbit jitter is drawn from a seeded ChaCha stream.
    #[must_use]
    pub fn seeded(tuning: &Tuning, seed: u64) -> Self {
        Self::new(tuning, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> Reconciliation<R> {
    /// Creates a reconciler drawing orbit angles and radii from `rng`.
    #[must_use]
    pub fn new(tuning: &Tuning, rng: R) -> Self {
        Self {
            layout: ZoneLayout::from_tuning(tuning),
            rng,
            orbit_radius: tuning.orbit_radius,
            radius_factor_min: tuning.radius_factor_min,
            radius_factor_max: tuning.radius_factor_max,
        }
    }

    /// Resolver used to place zones on the floor plan.
    #[must_use]
    pub fn layout(&self) -> &ZoneLayout {
        &self.layout
    }

    /// Consumes one snapshot pair and the current registry view to emit commands.
    ///
    /// The first command always replaces the zone board so that later
    /// commands in the batch resolve against the new anchors.
    pub fn handle(
        &mut self,
        zones: &ZoneSnapshot,
        guests: &GuestSnapshot,
        now: Timestamp,
        guest_view: &GuestView,
        out: &mut Vec<Command>,
    ) {
        let board = self.build_board(zones);
        out.push(Command::ReplaceZoneBoard {
            board: board.clone(),
        });

        let mut seen = HashSet::with_capacity(guests.guests().len());
        let mut spawned = 0usize;
        let mut moved = 0usize;
        let mut departed = 0usize;

        for location in guests.guests() {
            let guest = location.guest_id;
            let zone = location.current_zone_id;
            if !seen.insert(guest) {
                warn!(%guest, "ignoring duplicate guest in snapshot");
                continue;
            }

            let Some(state) = guest_view.get(guest) else {
                if !board.contains(zone) {
                    debug!(%guest, %zone, "deferring guest in unresolvable zone");
                    continue;
                }
                out.push(Command::SpawnGuest {
                    guest,
                    zone,
                    orbit: self.random_orbit(),
                    at: now,
                });
                spawned += 1;
                continue;
            };

            if state.phase == LifecyclePhase::FadingOut {
                continue;
            }

            if state.is_transitioning() {
                if state.transition_progress >= 1.0 {
                    out.push(Command::CommitTransition { guest });
                }
                continue;
            }

            if state.current_zone != zone {
                if !board.contains(zone) {
                    debug!(%guest, %zone, "deferring move into unresolvable zone");
                    continue;
                }
                out.push(Command::BeginTransition {
                    guest,
                    target_zone: zone,
                    target_orbit: self.random_orbit(),
                });
                moved += 1;
            }
        }

        for state in guest_view.iter() {
            if state.phase != LifecyclePhase::FadingOut && !seen.contains(&state.id) {
                out.push(Command::BeginFadeOut {
                    guest: state.id,
                    at: now,
                });
                departed += 1;
            }
        }

        debug!(
            zones = board.len(),
            spawned, moved, departed, "reconciled snapshot"
        );
    }

    fn build_board(&mut self, zones: &ZoneSnapshot) -> ZoneBoard {
        let anchors = self.layout.resolve(zones.zones());
        let mut board = ZoneBoard::new();

        for zone in zones.zones() {
            if let Err(error) = zone.validate() {
                warn!(%error, "dropping zone from board");
                continue;
            }
            if let Some(anchor) = anchors.get(zone.zone_id) {
                board.place(zone.clone(), anchor);
            }
        }

        board
    }

    fn random_orbit(&mut self) -> Orbit {
        let angle = self.rng.gen_range(0.0..TAU);
        let factor = if self.radius_factor_min < self.radius_factor_max {
            self.rng
                .gen_range(self.radius_factor_min..self.radius_factor_max)
        } else {
            self.radius_factor_min
        };
        Orbit::new(angle, self.orbit_radius * factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_orbit_respects_configured_range() {
        let tuning = Tuning::default();
        let mut reconciliation = Reconciliation::seeded(&tuning, 7);

        for _ in 0..256 {
            let orbit = reconciliation.random_orbit();
            assert!((0.0..TAU).contains(&orbit.angle));
            assert!(orbit.radius >= tuning.orbit_radius * tuning.radius_factor_min);
            assert!(orbit.radius < tuning.orbit_radius * tuning.radius_factor_max + 1e-3);
        }
    }

    #[test]
    fn collapsed_factor_range_yields_fixed_radius() {
        let tuning = Tuning {
            radius_factor_min: 1.5,
            radius_factor_max: 1.5,
            ..Tuning::default()
        };
        let mut reconciliation = Reconciliation::seeded(&tuning, 1);
        assert_eq!(reconciliation.random_orbit().radius, tuning.orbit_radius * 1.5);
    }
}

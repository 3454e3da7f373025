#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Guest simulation registry for Crowd Pulse.
//!
//! The [`World`] is the sole owner of every guest's animated state. It is
//! mutated exclusively through [`apply`], which executes one [`Command`] and
//! reports what happened as [`Event`] values. Read access goes through the
//! [`query`] module.

mod kinematics;

use std::collections::HashMap;

use crowd_pulse_core::{Command, Event, GuestCommandError, GuestId, Tuning, ZoneBoard, ZoneId};

use self::kinematics::{GuestSim, Motion, Step};

/// Represents the authoritative guest simulation state.
#[derive(Debug)]
pub struct World {
    board: ZoneBoard,
    guests: HashMap<GuestId, GuestSim>,
    motion: Motion,
    tick_index: u64,
}

impl World {
    /// Creates an empty registry animated with the provided tuning.
    #[must_use]
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            board: ZoneBoard::new(),
            guests: HashMap::new(),
            motion: Motion::from_tuning(tuning),
            tick_index: 0,
        }
    }

    fn sorted_guest_ids(&self) -> Vec<GuestId> {
        let mut ids: Vec<GuestId> = self.guests.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(&Tuning::default())
    }
}

fn reject(out_events: &mut Vec<Event>, guest: GuestId, reason: GuestCommandError) {
    out_events.push(Event::GuestCommandRejected { guest, reason });
}

fn report_progress(
    out_events: &mut Vec<Event>,
    guest: GuestId,
    committed: Option<ZoneId>,
    faded_in: bool,
) {
    if let Some(zone) = committed {
        out_events.push(Event::TransitionCommitted { guest, zone });
    }
    if faded_in {
        out_events.push(Event::FadeInCompleted { guest });
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ReplaceZoneBoard { board } => {
            let zones = board.len();
            world.board = board;
            out_events.push(Event::ZoneBoardReplaced { zones });
        }
        Command::SpawnGuest {
            guest,
            zone,
            orbit,
            at,
        } => {
            if world.guests.contains_key(&guest) {
                reject(out_events, guest, GuestCommandError::AlreadyTracked);
                return;
            }
            let Some(anchor) = world.board.anchor(zone) else {
                reject(
                    out_events,
                    guest,
                    GuestCommandError::UnresolvableZone { zone },
                );
                return;
            };

            let sim = GuestSim::spawn(guest, zone, anchor, orbit, at);
            let _ = world.guests.insert(guest, sim);
            out_events.push(Event::GuestSpawned { guest, zone });
        }
        Command::BeginTransition {
            guest,
            target_zone,
            target_orbit,
        } => {
            let Some(sim) = world.guests.get_mut(&guest) else {
                reject(out_events, guest, GuestCommandError::UnknownGuest);
                return;
            };

            let error = if sim.is_retiring() {
                Some(GuestCommandError::Retiring)
            } else if sim.is_transitioning() {
                Some(GuestCommandError::AlreadyTransitioning)
            } else if sim.zone() == target_zone {
                Some(GuestCommandError::SameZone)
            } else if !world.board.contains(target_zone) {
                Some(GuestCommandError::UnresolvableZone { zone: target_zone })
            } else {
                None
            };
            if let Some(reason) = error {
                reject(out_events, guest, reason);
                return;
            }

            let from = sim.zone();
            sim.begin_transition(target_zone, target_orbit, world.board.anchor(from));
            out_events.push(Event::TransitionStarted {
                guest,
                from,
                to: target_zone,
            });
        }
        Command::CommitTransition { guest } => {
            let Some(sim) = world.guests.get_mut(&guest) else {
                reject(out_events, guest, GuestCommandError::UnknownGuest);
                return;
            };

            match sim.commit_completed_transition() {
                Some(zone) => out_events.push(Event::TransitionCommitted { guest, zone }),
                None => reject(out_events, guest, GuestCommandError::NoCompletedTransition),
            }
        }
        Command::BeginFadeOut { guest, at } => {
            let Some(sim) = world.guests.get_mut(&guest) else {
                reject(out_events, guest, GuestCommandError::UnknownGuest);
                return;
            };
            if sim.is_retiring() {
                reject(out_events, guest, GuestCommandError::Retiring);
                return;
            }

            sim.begin_fade_out(at);
            out_events.push(Event::FadeOutStarted { guest });
        }
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced { dt });

            let mut retired = Vec::new();
            for guest in world.sorted_guest_ids() {
                let Some(sim) = world.guests.get_mut(&guest) else {
                    continue;
                };

                match sim.advance(dt, &world.board, &world.motion) {
                    Step::Advanced {
                        committed,
                        faded_in,
                    } => {
                        report_progress(out_events, guest, committed, faded_in);
                    }
                    Step::Stalled { zone } => {
                        out_events.push(Event::GuestStalled { guest, zone });
                    }
                    Step::NonFinite {
                        committed,
                        faded_in,
                    } => {
                        report_progress(out_events, guest, committed, faded_in);
                        out_events.push(Event::NonFinitePosition { guest });
                    }
                    Step::Retired => {
                        out_events.push(Event::GuestRetired {
                            guest,
                            zone: sim.zone(),
                            position: sim.position(),
                        });
                        retired.push(guest);
                    }
                }
            }

            for guest in retired {
                let _ = world.guests.remove(&guest);
            }
        }
    }
}

/// Query functions that provide read-only access to the registry.
pub mod query {
    use crowd_pulse_core::{GuestId, GuestState, GuestView, ZoneBoard};

    use super::World;

    /// Captures a read-only view of every simulated guest.
    #[must_use]
    pub fn guest_view(world: &World) -> GuestView {
        GuestView::from_snapshots(world.guests.values().map(|sim| sim.snapshot()).collect())
    }

    /// Captures the state of a single guest, if it is simulated.
    #[must_use]
    pub fn guest(world: &World, guest: GuestId) -> Option<GuestState> {
        world.guests.get(&guest).map(|sim| sim.snapshot())
    }

    /// Number of guests currently held by the registry.
    #[must_use]
    pub fn guest_count(world: &World) -> usize {
        world.guests.len()
    }

    /// Zones resolvable during the current cycle.
    #[must_use]
    pub fn zone_board(world: &World) -> &ZoneBoard {
        &world.board
    }

    /// Number of ticks applied since the world was created.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Controller that wires the Crowd Pulse systems around a single registry.
//!
//! [`HeatmapEngine`] owns the [`World`] and every system instance. Snapshot
//! arrival goes through [`HeatmapEngine::reconcile`], animation frames go
//! through [`HeatmapEngine::tick`] and [`HeatmapEngine::publish`]. Each call
//! runs to completion before returning, so a reconcile never observes a
//! half-applied tick and vice versa. The [`scheduler`] module drives both
//! from an injectable [`clock::Clock`].

pub mod clock;
pub mod scheduler;

use anyhow::{Context, Result as AnyResult};
use crowd_pulse_core::{
    Command, Event, GuestId, GuestSnapshot, GuestState, GuestView, HeatSample, Timestamp, Tuning,
    TuningError, ZoneBoard, ZoneSnapshot,
};
use crowd_pulse_rendering::{
    overlay::{debug_markers, zone_discs, zone_links, ZoneDisc, ZoneLink},
    DensitySurface,
};
use crowd_pulse_system_aggregation::Aggregation;
use crowd_pulse_system_integration::Integration;
use crowd_pulse_system_reconciliation::Reconciliation;
use crowd_pulse_world::{self as world, query, World};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace, warn};

/// Registry plus the systems that reconcile, animate and publish it.
#[derive(Debug)]
pub struct HeatmapEngine<R = ChaCha8Rng> {
    tuning: Tuning,
    world: World,
    reconciliation: Reconciliation<R>,
    integration: Integration,
    aggregation: Aggregation,
    commands: Vec<Command>,
    events: Vec<Event>,
    samples: Vec<HeatSample>,
    debug_overlay: bool,
    zones_dirty: bool,
}

impl HeatmapEngine<ChaCha8Rng> {
    /// Creates an engine whose orbit jitter comes from a seeded ChaCha stream.
    pub fn seeded(tuning: Tuning, seed: u64) -> Result<Self, TuningError> {
        let reconciliation = Reconciliation::seeded(&tuning, seed);
        Self::assemble(tuning, reconciliation)
    }
}

impl<R: Rng> HeatmapEngine<R> {
    /// Creates an engine drawing orbit jitter from `rng`.
    pub fn new(tuning: Tuning, rng: R) -> Result<Self, TuningError> {
        let reconciliation = Reconciliation::new(&tuning, rng);
        Self::assemble(tuning, reconciliation)
    }

    fn assemble(tuning: Tuning, reconciliation: Reconciliation<R>) -> Result<Self, TuningError> {
        tuning.validate()?;

        Ok(Self {
            world: World::new(&tuning),
            integration: Integration::from_tuning(&tuning),
            aggregation: Aggregation::from_tuning(&tuning),
            reconciliation,
            tuning,
            commands: Vec::new(),
            events: Vec::new(),
            samples: Vec::new(),
            debug_overlay: false,
            zones_dirty: false,
        })
    }

    /// Tuning the engine was built with.
    #[must_use]
    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// Brings the registry in line with a freshly polled snapshot pair.
    ///
    /// Returns the events produced while applying the reconciliation commands.
    pub fn reconcile(
        &mut self,
        zones: &ZoneSnapshot,
        guests: &GuestSnapshot,
        now: Timestamp,
    ) -> &[Event] {
        let view = query::guest_view(&self.world);
        self.commands.clear();
        self.reconciliation
            .handle(zones, guests, now, &view, &mut self.commands);

        self.events.clear();
        for command in self.commands.drain(..) {
            world::apply(&mut self.world, command, &mut self.events);
        }

        for event in &self.events {
            if let Event::GuestCommandRejected { guest, reason } = event {
                warn!(%guest, %reason, "registry rejected reconciliation command");
            }
        }
        self.zones_dirty = true;

        debug!(
            guests = query::guest_count(&self.world),
            events = self.events.len(),
            "snapshot applied"
        );
        &self.events
    }

    /// Advances every guest to `now` and returns the density samples of the frame.
    pub fn tick(&mut self, now: Timestamp) -> &[HeatSample] {
        let dt = self.integration.advance_clock(now);

        self.events.clear();
        world::apply(&mut self.world, Command::Tick { dt }, &mut self.events);

        for event in &self.events {
            match event {
                Event::GuestRetired { guest, zone, .. } => {
                    debug!(%guest, %zone, "guest faded out");
                }
                Event::GuestStalled { guest, zone } => {
                    trace!(%guest, %zone, "guest stalled on unresolvable zone");
                }
                Event::NonFinitePosition { guest } => {
                    debug!(%guest, "dropped non-finite guest position");
                }
                _ => {}
            }
        }

        let view = query::guest_view(&self.world);
        self.samples.clear();
        self.integration.collect_samples(
            &self.events,
            &view,
            query::zone_board(&self.world),
            &mut self.samples,
        );
        &self.samples
    }

    /// Offers the latest frame samples to the surface, honouring the push-rate cap.
    ///
    /// Returns `true` when a frame was pushed.
    pub fn publish<S>(&mut self, now: Timestamp, surface: &mut S) -> AnyResult<bool>
    where
        S: DensitySurface + ?Sized,
    {
        let Some(frame) = self.aggregation.offer(&self.samples, now) else {
            return Ok(false);
        };

        if self.zones_dirty {
            surface
                .draw_zones(&self.zone_discs())
                .context("failed to draw zone discs")?;
            surface
                .draw_links(&self.zone_links())
                .context("failed to draw zone links")?;
            self.zones_dirty = false;
        }
        surface
            .set_data(&frame)
            .context("failed to push heat frame")?;
        if self.debug_overlay {
            let markers = debug_markers(&query::guest_view(&self.world));
            surface
                .draw_debug(&markers)
                .context("failed to draw debug overlay")?;
        }

        trace!(samples = frame.samples.len(), "heat frame pushed");
        Ok(true)
    }

    /// Ticks to `now` and publishes the resulting samples.
    pub fn frame<S>(&mut self, now: Timestamp, surface: &mut S) -> AnyResult<bool>
    where
        S: DensitySurface + ?Sized,
    {
        let _ = self.tick(now);
        self.publish(now, surface)
    }

    /// Enables or disables debug markers on pushed frames.
    pub fn set_debug_overlay(&mut self, enabled: bool) {
        self.debug_overlay = enabled;
    }

    /// Reports whether debug markers are drawn.
    #[must_use]
    pub fn debug_overlay(&self) -> bool {
        self.debug_overlay
    }

    /// State of a single guest, if it is simulated.
    #[must_use]
    pub fn guest(&self, guest: GuestId) -> Option<GuestState> {
        query::guest(&self.world, guest)
    }

    /// Read-only view of every simulated guest.
    #[must_use]
    pub fn guests(&self) -> GuestView {
        query::guest_view(&self.world)
    }

    /// Number of simulated guests.
    #[must_use]
    pub fn guest_count(&self) -> usize {
        query::guest_count(&self.world)
    }

    /// Zones that resolved during the latest reconcile.
    #[must_use]
    pub fn zone_board(&self) -> &ZoneBoard {
        query::zone_board(&self.world)
    }

    /// Discs marking every currently resolvable zone.
    #[must_use]
    pub fn zone_discs(&self) -> Vec<ZoneDisc> {
        zone_discs(query::zone_board(&self.world))
    }

    /// Connection lines between the currently resolvable zones.
    #[must_use]
    pub fn zone_links(&self) -> Vec<ZoneLink> {
        zone_links(query::zone_board(&self.world))
    }

    /// Samples produced by the latest tick.
    #[must_use]
    pub fn samples(&self) -> &[HeatSample] {
        &self.samples
    }

    /// Number of frames pushed so far.
    #[must_use]
    pub fn pushes(&self) -> u64 {
        self.aggregation.pushes()
    }
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Crowd Pulse heatmap engine.
//!
//! This crate defines the message surface that connects the snapshot poller,
//! the guest simulation registry, and the pure systems that animate it.
//! Systems read immutable [`GuestView`] values, respond with [`Command`]
//! batches, and the world executes those commands through its `apply` entry
//! point before broadcasting [`Event`] values describing what changed.

mod tuning;

use std::{collections::BTreeMap, f32::consts::TAU, fmt, ops::Add, time::Duration};

pub use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use tuning::{Tuning, TuningError};

/// Normalisation maximum supplied with every heat frame.
pub const HEAT_NORMALIZATION_MAX: f32 = 1.0;

/// Smallest value a density sample may carry so that fading guests remain visible.
pub const MIN_SAMPLE_VALUE: f32 = 0.01;

/// Unique identifier assigned to a zone by the polling service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(u64);

impl ZoneId {
    /// Creates a new zone identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier assigned to a guest by the polling service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestId(u64);

impl GuestId {
    /// Creates a new guest identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authoritative description of a single zone as reported by the poller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    /// Identifier of the zone.
    pub zone_id: ZoneId,
    /// Human readable name, used to look up the anchor table.
    pub zone_name: String,
    /// Maximum number of guests the zone is designed to hold.
    pub capacity: u32,
    /// Number of guests the poller counted inside the zone.
    pub current_guest_count: u32,
    /// Guest count at which the zone is considered crowded.
    pub threshold: u32,
    /// Weighted connections to neighbouring zones.
    #[serde(default)]
    pub connected_zones: BTreeMap<ZoneId, f32>,
}

impl Zone {
    /// Creates a zone without any connections.
    #[must_use]
    pub fn new(
        zone_id: ZoneId,
        zone_name: impl Into<String>,
        capacity: u32,
        current_guest_count: u32,
        threshold: u32,
    ) -> Self {
        Self {
            zone_id,
            zone_name: zone_name.into(),
            capacity,
            current_guest_count,
            threshold,
            connected_zones: BTreeMap::new(),
        }
    }

    /// Adds a weighted connection towards another zone.
    #[must_use]
    pub fn with_connection(mut self, to: ZoneId, weight: f32) -> Self {
        let _ = self.connected_zones.insert(to, weight);
        self
    }

    /// Checks that capacity and threshold describe a usable zone.
    pub fn validate(&self) -> Result<(), ZoneError> {
        if self.capacity == 0 {
            return Err(ZoneError::ZeroCapacity { zone: self.zone_id });
        }

        if self.threshold == 0 || self.threshold > self.capacity {
            return Err(ZoneError::ThresholdOutOfRange {
                zone: self.zone_id,
                threshold: self.threshold,
                capacity: self.capacity,
            });
        }

        Ok(())
    }

    /// Ratio between the counted guests and the zone capacity.
    ///
    /// Returns zero for a zone without capacity.
    #[must_use]
    pub fn occupancy_ratio(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.current_guest_count as f32 / self.capacity as f32
    }

    /// Ratio between the crowding threshold and the zone capacity.
    #[must_use]
    pub fn threshold_ratio(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.threshold as f32 / self.capacity as f32
    }

    /// Classifies the zone occupancy against its threshold and capacity.
    #[must_use]
    pub fn status(&self) -> ZoneStatus {
        if self.current_guest_count >= self.capacity {
            ZoneStatus::Full
        } else if self.current_guest_count >= self.threshold {
            ZoneStatus::Crowded
        } else {
            ZoneStatus::Open
        }
    }
}

/// Crowding classification of a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneStatus {
    /// Occupancy sits below the crowding threshold.
    Open,
    /// Occupancy reached the threshold but not the capacity.
    Crowded,
    /// Occupancy reached or exceeded the capacity.
    Full,
}

/// Reasons a zone reported by the poller cannot be placed on the board.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ZoneError {
    /// The zone declares no capacity.
    #[error("zone {zone} has zero capacity")]
    ZeroCapacity {
        /// Zone that failed validation.
        zone: ZoneId,
    },
    /// The threshold is zero or larger than the capacity.
    #[error("zone {zone} threshold {threshold} is outside 1..={capacity}")]
    ThresholdOutOfRange {
        /// Zone that failed validation.
        zone: ZoneId,
        /// Threshold reported for the zone.
        threshold: u32,
        /// Capacity reported for the zone.
        capacity: u32,
    },
}

/// Latest zone assignment of a single guest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestLocation {
    /// Identifier of the guest.
    pub guest_id: GuestId,
    /// Zone the poller last saw the guest in.
    pub current_zone_id: ZoneId,
}

impl GuestLocation {
    /// Creates a new guest location record.
    #[must_use]
    pub const fn new(guest_id: GuestId, current_zone_id: ZoneId) -> Self {
        Self {
            guest_id,
            current_zone_id,
        }
    }
}

/// Full replacement list of zones delivered by one poll.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneSnapshot {
    zones: Vec<Zone>,
}

impl ZoneSnapshot {
    /// Wraps the zones delivered by a poll.
    #[must_use]
    pub fn new(zones: Vec<Zone>) -> Self {
        Self { zones }
    }

    /// Zones in the order the poller reported them.
    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }
}

/// Full replacement list of guests delivered by one poll.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestSnapshot {
    guests: Vec<GuestLocation>,
}

impl GuestSnapshot {
    /// Wraps the guest locations delivered by a poll.
    #[must_use]
    pub fn new(guests: Vec<GuestLocation>) -> Self {
        Self { guests }
    }

    /// Guest locations in the order the poller reported them.
    #[must_use]
    pub fn guests(&self) -> &[GuestLocation] {
        &self.guests
    }
}

/// Point on the monotonic clock driving the simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(Duration);

impl Timestamp {
    /// Origin of the simulation clock.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Creates a timestamp located `elapsed` after the clock origin.
    #[must_use]
    pub const fn from_duration(elapsed: Duration) -> Self {
        Self(elapsed)
    }

    /// Creates a timestamp located the provided number of milliseconds after the origin.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// Time elapsed since the clock origin.
    #[must_use]
    pub const fn since_origin(&self) -> Duration {
        self.0
    }

    /// Time elapsed since `earlier`, or zero when `earlier` lies in the future.
    #[must_use]
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Timestamp(self.0.saturating_add(rhs))
    }
}

/// Wraps an angle into `[0, 2π)`.
#[must_use]
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid may round up to exactly TAU for tiny negative inputs.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Polar offset a guest holds around its zone anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orbit {
    /// Angle in radians, kept within `[0, 2π)`.
    pub angle: f32,
    /// Distance from the anchor in floor-plan units.
    pub radius: f32,
}

impl Orbit {
    /// Creates an orbit, wrapping the angle into `[0, 2π)`.
    #[must_use]
    pub fn new(angle: f32, radius: f32) -> Self {
        Self {
            angle: wrap_angle(angle),
            radius,
        }
    }

    /// Cartesian offset from the anchor described by the orbit.
    #[must_use]
    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.angle.cos(), self.angle.sin()) * self.radius
    }

    /// Returns the orbit rotated by `angular_speed` radians per second for `dt`.
    #[must_use]
    pub fn advanced(self, angular_speed: f32, dt: Duration) -> Self {
        Self::new(self.angle + angular_speed * dt.as_secs_f32(), self.radius)
    }

    /// Blends towards `target` by `t`, turning along the shorter arc.
    #[must_use]
    pub fn blend(self, target: Orbit, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mut delta = target.angle - self.angle;
        if delta > TAU / 2.0 {
            delta -= TAU;
        } else if delta < -TAU / 2.0 {
            delta += TAU;
        }

        Self::new(
            self.angle + delta * t,
            self.radius + (target.radius - self.radius) * t,
        )
    }
}

/// Lifecycle phase of record for a simulated guest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// The guest was just sighted and its opacity is ramping up.
    FadingIn,
    /// The guest orbits its current zone at full opacity.
    Steady,
    /// The guest is easing from its current zone towards a new one.
    Transitioning,
    /// The guest left the population and is fading away.
    FadingOut,
}

/// Immutable representation of a single simulated guest used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GuestState {
    /// Identifier of the guest.
    pub id: GuestId,
    /// Zone whose anchor the guest currently orbits.
    pub current_zone: ZoneId,
    /// Zone the guest is heading to; equals `current_zone` when not transitioning.
    pub target_zone: ZoneId,
    /// Position the renderer reads.
    pub position: Vec2,
    /// Orbit around the effective anchor.
    pub orbit: Orbit,
    /// Progress of the zone transition in `[0, 1]`; `1` when not transitioning.
    pub transition_progress: f32,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Phase of record.
    pub phase: LifecyclePhase,
    /// Moment the guest was first sighted.
    pub added_at: Timestamp,
    /// Moment the guest was found missing from a snapshot, if it was.
    pub removed_at: Option<Timestamp>,
}

impl GuestState {
    /// Reports whether a zone transition is in flight.
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        self.current_zone != self.target_zone
    }
}

/// Read-only snapshot describing every simulated guest.
#[derive(Clone, Debug, Default)]
pub struct GuestView {
    snapshots: Vec<GuestState>,
}

impl GuestView {
    /// Creates a new guest view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<GuestState>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured guest snapshots ordered by identifier.
    pub fn iter(&self) -> impl Iterator<Item = &GuestState> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of a single guest.
    #[must_use]
    pub fn get(&self, guest: GuestId) -> Option<&GuestState> {
        self.snapshots
            .binary_search_by_key(&guest, |snapshot| snapshot.id)
            .ok()
            .and_then(|index| self.snapshots.get(index))
    }

    /// Number of guests captured by the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view holds no guests.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<GuestState> {
        self.snapshots
    }
}

/// Zone placed on the floor plan together with its anchor.
#[derive(Clone, Debug, PartialEq)]
pub struct BoardZone {
    /// Authoritative zone description.
    pub zone: Zone,
    /// Anchor point on the floor plan.
    pub anchor: Vec2,
}

/// Zones that are resolvable this cycle, keyed by identifier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZoneBoard {
    zones: BTreeMap<ZoneId, BoardZone>,
}

impl ZoneBoard {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a zone at the provided anchor, replacing any previous entry.
    pub fn place(&mut self, zone: Zone, anchor: Vec2) {
        let _ = self.zones.insert(zone.zone_id, BoardZone { zone, anchor });
    }

    /// Returns the board entry for a zone.
    #[must_use]
    pub fn get(&self, zone: ZoneId) -> Option<&BoardZone> {
        self.zones.get(&zone)
    }

    /// Anchor of a zone, if the zone is resolvable.
    #[must_use]
    pub fn anchor(&self, zone: ZoneId) -> Option<Vec2> {
        self.zones.get(&zone).map(|entry| entry.anchor)
    }

    /// Reports whether the zone is resolvable.
    #[must_use]
    pub fn contains(&self, zone: ZoneId) -> bool {
        self.zones.contains_key(&zone)
    }

    /// Iterator over the placed zones ordered by identifier.
    pub fn iter(&self) -> impl Iterator<Item = &BoardZone> {
        self.zones.values()
    }

    /// Number of placed zones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Reports whether no zone is placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// Weighted point consumed by the density renderer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeatSample {
    /// Horizontal floor-plan coordinate.
    pub x: f32,
    /// Vertical floor-plan coordinate.
    pub y: f32,
    /// Weight in `(0, 1]`.
    pub value: f32,
}

impl HeatSample {
    /// Creates a new heat sample.
    #[must_use]
    pub const fn new(x: f32, y: f32, value: f32) -> Self {
        Self { x, y, value }
    }
}

/// Sample batch handed to the density renderer in one push.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatFrame {
    /// Samples making up the density field.
    pub samples: Vec<HeatSample>,
    /// Normalisation maximum; always [`HEAT_NORMALIZATION_MAX`].
    pub max: f32,
}

impl HeatFrame {
    /// Creates a frame normalised against [`HEAT_NORMALIZATION_MAX`].
    #[must_use]
    pub fn new(samples: Vec<HeatSample>) -> Self {
        Self {
            samples,
            max: HEAT_NORMALIZATION_MAX,
        }
    }
}

/// Commands that express all permissible registry mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the set of resolvable zones and their anchors.
    ReplaceZoneBoard {
        /// Zones resolvable from now on.
        board: ZoneBoard,
    },
    /// Starts simulating a newly sighted guest.
    SpawnGuest {
        /// Identifier of the new guest.
        guest: GuestId,
        /// Zone the guest was sighted in.
        zone: ZoneId,
        /// Initial orbit around the zone anchor.
        orbit: Orbit,
        /// Moment of the sighting.
        at: Timestamp,
    },
    /// Starts easing a guest towards a new zone.
    BeginTransition {
        /// Identifier of the moving guest.
        guest: GuestId,
        /// Zone the guest is moving to.
        target_zone: ZoneId,
        /// Orbit the guest settles into around the target anchor.
        target_orbit: Orbit,
    },
    /// Commits a transition whose progress already reached one.
    CommitTransition {
        /// Identifier of the guest.
        guest: GuestId,
    },
    /// Starts fading out a guest that left the population.
    BeginFadeOut {
        /// Identifier of the departing guest.
        guest: GuestId,
        /// Moment the guest was found missing.
        at: Timestamp,
    },
    /// Advances every simulated guest by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that the zone board was replaced.
    ZoneBoardReplaced {
        /// Number of resolvable zones on the new board.
        zones: usize,
    },
    /// Confirms that a guest entered the simulation.
    GuestSpawned {
        /// Identifier of the guest.
        guest: GuestId,
        /// Zone the guest orbits.
        zone: ZoneId,
    },
    /// Confirms that a guest began easing towards another zone.
    TransitionStarted {
        /// Identifier of the guest.
        guest: GuestId,
        /// Zone the guest is leaving.
        from: ZoneId,
        /// Zone the guest is heading to.
        to: ZoneId,
    },
    /// Reports that a guest now orbits its target zone.
    TransitionCommitted {
        /// Identifier of the guest.
        guest: GuestId,
        /// Zone the guest now orbits.
        zone: ZoneId,
    },
    /// Reports that a guest reached full opacity.
    FadeInCompleted {
        /// Identifier of the guest.
        guest: GuestId,
    },
    /// Confirms that a guest began fading out.
    FadeOutStarted {
        /// Identifier of the guest.
        guest: GuestId,
    },
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Reports that a guest could not be advanced because a zone is unresolvable.
    GuestStalled {
        /// Identifier of the guest.
        guest: GuestId,
        /// Zone that could not be resolved.
        zone: ZoneId,
    },
    /// Reports that a guest's computed position was not finite and was discarded.
    NonFinitePosition {
        /// Identifier of the guest.
        guest: GuestId,
    },
    /// Reports that a guest finished fading out and left the registry.
    GuestRetired {
        /// Identifier of the guest.
        guest: GuestId,
        /// Zone the guest last orbited.
        zone: ZoneId,
        /// Final position of the guest.
        position: Vec2,
    },
    /// Reports that a guest command could not be executed.
    GuestCommandRejected {
        /// Identifier of the guest named by the command.
        guest: GuestId,
        /// Specific reason the command failed.
        reason: GuestCommandError,
    },
}

/// Reasons a guest command may be rejected by the world.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum GuestCommandError {
    /// A simulation entry already exists for the guest.
    #[error("guest is already simulated")]
    AlreadyTracked,
    /// No simulation entry exists for the guest.
    #[error("guest is not simulated")]
    UnknownGuest,
    /// The guest is fading out and accepts no further changes.
    #[error("guest is fading out")]
    Retiring,
    /// The guest is already easing towards another zone.
    #[error("guest is already transitioning")]
    AlreadyTransitioning,
    /// The guest already orbits the requested zone.
    #[error("guest already orbits the requested zone")]
    SameZone,
    /// The guest has no transition that could be committed.
    #[error("guest has no completed transition")]
    NoCompletedTransition,
    /// The named zone has no anchor on the board.
    #[error("zone {zone} is unresolvable")]
    UnresolvableZone {
        /// Zone that could not be resolved.
        zone: ZoneId,
    },
}

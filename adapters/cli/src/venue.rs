//! Seeded stand-in for the venue polling service.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use crowd_pulse_core::{GuestId, GuestLocation, GuestSnapshot, Tuning, Zone, ZoneId, ZoneSnapshot};
use crowd_pulse_engine::scheduler::SnapshotSource;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

/// Population dynamics of the synthetic venue.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct VenueConfig {
    /// Number of guests the venue tries to hold.
    pub(crate) guests: u32,
    /// Zones added on top of the anchor table, placed by the grid fallback.
    pub(crate) extra_zones: u32,
    /// Chance per poll that a guest leaves the venue.
    pub(crate) departure_chance: f64,
    /// Chance per poll that a guest walks to another zone.
    pub(crate) move_chance: f64,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            guests: 40,
            extra_zones: 2,
            departure_chance: 0.05,
            move_chance: 0.15,
        }
    }
}

impl VenueConfig {
    /// Rejects chances outside `[0, 1]`.
    pub(crate) fn validate(&self) -> Result<()> {
        for (field, chance) in [
            ("departure_chance", self.departure_chance),
            ("move_chance", self.move_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                bail!("venue `{field}` must lie within 0..=1, got {chance}");
            }
        }
        Ok(())
    }
}

/// Venue that answers every poll with a freshly evolved population.
#[derive(Debug)]
pub(crate) struct SyntheticVenue {
    config: VenueConfig,
    zones: Vec<Zone>,
    guests: BTreeMap<GuestId, ZoneId>,
    next_guest: u64,
    rng: ChaCha8Rng,
}

impl SyntheticVenue {
    pub(crate) fn new(tuning: &Tuning, config: VenueConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let names = tuning
            .anchors
            .keys()
            .cloned()
            .chain((1..=config.extra_zones).map(|index| format!("Annex {index}")));

        let mut zones: Vec<Zone> = names
            .enumerate()
            .map(|(index, name)| {
                let capacity = rng.gen_range(8..=30);
                let threshold = (capacity * 3 / 4).max(1);
                Zone::new(ZoneId::new(index as u64 + 1), name, capacity, 0, threshold)
            })
            .collect();

        // Chain every zone to the next so the overlay has links to draw.
        let count = zones.len();
        if count > 1 {
            for (index, zone) in zones.iter_mut().enumerate() {
                let next = ZoneId::new(((index + 1) % count) as u64 + 1);
                let _ = zone
                    .connected_zones
                    .insert(next, rng.gen_range(0.2..2.0));
            }
        }

        Self {
            config,
            zones,
            guests: BTreeMap::new(),
            next_guest: 1,
            rng,
        }
    }

    pub(crate) fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Evolves the population by one poll and returns the resulting snapshots.
    pub(crate) fn step(&mut self) -> (ZoneSnapshot, GuestSnapshot) {
        let zone_ids: Vec<ZoneId> = self.zones.iter().map(|zone| zone.zone_id).collect();
        let Self {
            config,
            guests,
            rng,
            ..
        } = self;

        guests.retain(|_, _| !rng.gen_bool(config.departure_chance));
        for zone in guests.values_mut() {
            if rng.gen_bool(config.move_chance) {
                if let Some(&next) = zone_ids.choose(&mut *rng) {
                    *zone = next;
                }
            }
        }

        let target = self.config.guests as usize;
        let arrivals = target
            .saturating_sub(self.guests.len())
            .min(self.rng.gen_range(1..=4));
        for _ in 0..arrivals {
            let Some(&zone) = zone_ids.choose(&mut self.rng) else {
                break;
            };
            let _ = self.guests.insert(GuestId::new(self.next_guest), zone);
            self.next_guest += 1;
        }

        for zone in &mut self.zones {
            let count = self
                .guests
                .values()
                .filter(|&&guest_zone| guest_zone == zone.zone_id)
                .count();
            zone.current_guest_count = count as u32;
        }

        let locations = self
            .guests
            .iter()
            .map(|(&guest, &zone)| GuestLocation::new(guest, zone))
            .collect();
        (
            ZoneSnapshot::new(self.zones.clone()),
            GuestSnapshot::new(locations),
        )
    }
}

impl SnapshotSource for SyntheticVenue {
    fn poll(&mut self) -> Result<Option<(ZoneSnapshot, GuestSnapshot)>> {
        Ok(Some(self.step()))
    }
}

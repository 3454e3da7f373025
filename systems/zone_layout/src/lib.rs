#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Resolves zone identifiers to stable anchor points on the floor plan.
//!
//! Known zone names use the fixed anchor table. Unknown names fall back to a
//! square grid laid over the canvas, indexed by the zone's position in the
//! input list. Results are memoised on the layout-relevant content of the zone
//! list so occupancy updates never perturb anchors.

use std::collections::BTreeMap;

use crowd_pulse_core::{Tuning, Vec2, Zone, ZoneId};

/// Anchor points resolved for one zone list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZoneAnchors {
    anchors: BTreeMap<ZoneId, Vec2>,
}

impl ZoneAnchors {
    /// Anchor assigned to a zone.
    #[must_use]
    pub fn get(&self, zone: ZoneId) -> Option<Vec2> {
        self.anchors.get(&zone).copied()
    }

    /// Iterator over every resolved anchor ordered by zone identifier.
    pub fn iter(&self) -> impl Iterator<Item = (ZoneId, Vec2)> + '_ {
        self.anchors.iter().map(|(zone, anchor)| (*zone, *anchor))
    }

    /// Number of resolved anchors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Reports whether no anchor was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

#[derive(Debug)]
struct Memo {
    key: Vec<(ZoneId, String)>,
    anchors: ZoneAnchors,
}

/// Memoising zone anchor resolver.
#[derive(Debug)]
pub struct ZoneLayout {
    table: BTreeMap<String, Vec2>,
    canvas: Vec2,
    memo: Option<Memo>,
    recomputations: u64,
}

impl ZoneLayout {
    /// Creates a resolver from an explicit anchor table and canvas size.
    #[must_use]
    pub fn new(table: BTreeMap<String, Vec2>, canvas: Vec2) -> Self {
        Self {
            table,
            canvas,
            memo: None,
            recomputations: 0,
        }
    }

    /// Creates a resolver using the anchor table and canvas of the tuning.
    #[must_use]
    pub fn from_tuning(tuning: &Tuning) -> Self {
        Self::new(tuning.anchors.clone(), tuning.canvas)
    }

    /// Resolves anchors for the zone list, reusing the previous result when
    /// identifiers, names and order are unchanged.
    pub fn resolve(&mut self, zones: &[Zone]) -> &ZoneAnchors {
        let stale = self
            .memo
            .as_ref()
            .map_or(true, |memo| !same_layout(&memo.key, zones));

        if stale {
            let key = zones
                .iter()
                .map(|zone| (zone.zone_id, zone.zone_name.clone()))
                .collect();
            let anchors = self.compute(zones);
            self.recomputations += 1;
            self.memo = Some(Memo { key, anchors });
        }

        let memo = self.memo.get_or_insert_with(|| Memo {
            key: Vec::new(),
            anchors: ZoneAnchors::default(),
        });
        &memo.anchors
    }

    /// Number of times anchors were recomputed rather than served from the memo.
    #[must_use]
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    fn compute(&self, zones: &[Zone]) -> ZoneAnchors {
        let count = zones.len();
        let anchors = zones
            .iter()
            .enumerate()
            .map(|(index, zone)| {
                let anchor = self
                    .table
                    .get(&zone.zone_name)
                    .copied()
                    .unwrap_or_else(|| grid_anchor(index, count, self.canvas));
                (zone.zone_id, anchor)
            })
            .collect();
        ZoneAnchors { anchors }
    }
}

fn same_layout(key: &[(ZoneId, String)], zones: &[Zone]) -> bool {
    key.len() == zones.len()
        && key
            .iter()
            .zip(zones)
            .all(|((id, name), zone)| *id == zone.zone_id && *name == zone.zone_name)
}

/// Centre of grid cell `index` when `count` zones share a square grid over `canvas`.
///
/// The grid has `ceil(sqrt(count))` columns and rows; each cell spans the
/// canvas dimensions divided by the column count.
#[must_use]
pub fn grid_anchor(index: usize, count: usize, canvas: Vec2) -> Vec2 {
    let columns = (count.max(1) as f64).sqrt().ceil().max(1.0) as usize;
    let cell = canvas / columns as f32;
    let column = index % columns;
    let row = index / columns;
    Vec2::new(
        (column as f32 + 0.5) * cell.x,
        (row as f32 + 0.5) * cell.y,
    )
}

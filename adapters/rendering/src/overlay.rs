//! Overlay draw requests: debug guest markers, zone discs and zone connection lines.

use crowd_pulse_core::{GuestId, GuestState, GuestView, LifecyclePhase, ZoneBoard, ZoneId};
use glam::Vec2;

use crate::Color;

/// Fill used for steady guests.
pub const STEADY_FILL: Color = Color::from_rgb_u8(0x99, 0x00, 0xcc);
/// Fill a newly sighted guest starts from.
pub const ARRIVAL_FILL: Color = Color::from_rgb_u8(0x00, 0xff, 0x00);
/// Fill a guest switching zones starts from.
pub const SWITCH_FILL: Color = Color::from_rgb_u8(0xff, 0xcc, 0x00);
/// Fill a departing guest fades towards.
pub const DEPARTURE_FILL: Color = Color::from_rgb_u8(0x00, 0x00, 0x00);

/// Radius of the disc drawn at every zone anchor.
pub const ZONE_DISC_RADIUS: f32 = 70.0;
/// Opacity of the disc drawn at every zone anchor.
pub const ZONE_DISC_OPACITY: f32 = 0.7;

const MIN_LINK_WIDTH: f32 = 1.0;
const MAX_LINK_WIDTH: f32 = 12.0;

/// Marker drawn at a guest's position while the debug overlay is enabled.
#[derive(Clone, Debug, PartialEq)]
pub struct DebugMarker {
    /// Guest represented by the marker.
    pub guest: GuestId,
    /// Floor-plan position of the marker.
    pub position: Vec2,
    /// Text label drawn next to the marker.
    pub label: String,
    /// Fill color reflecting the guest's lifecycle.
    pub fill: Color,
    /// Opacity of the marker.
    pub opacity: f32,
}

impl DebugMarker {
    /// Builds the marker for a single guest.
    #[must_use]
    pub fn from_state(state: &GuestState) -> Self {
        Self {
            guest: state.id,
            position: state.position,
            label: state.id.to_string(),
            fill: marker_fill(state),
            opacity: state.opacity,
        }
    }
}

/// Fill color of a guest marker for its lifecycle phase.
#[must_use]
pub fn marker_fill(state: &GuestState) -> Color {
    match state.phase {
        LifecyclePhase::FadingIn => ARRIVAL_FILL.lerp(STEADY_FILL, state.opacity),
        LifecyclePhase::Transitioning => SWITCH_FILL.lerp(STEADY_FILL, state.transition_progress),
        LifecyclePhase::FadingOut => STEADY_FILL.lerp(DEPARTURE_FILL, 1.0 - state.opacity),
        LifecyclePhase::Steady => STEADY_FILL,
    }
}

/// Markers for every guest with a finite position, ordered by guest identifier.
#[must_use]
pub fn debug_markers(guest_view: &GuestView) -> Vec<DebugMarker> {
    guest_view
        .iter()
        .filter(|state| state.position.is_finite())
        .map(DebugMarker::from_state)
        .collect()
}

/// Disc drawn at a zone anchor, tinted from blue towards red as the zone's
/// crowding threshold approaches its capacity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoneDisc {
    /// Zone the disc marks.
    pub zone: ZoneId,
    /// Anchor the disc is centred on.
    pub center: Vec2,
    /// Disc radius in floor-plan units.
    pub radius: f32,
    /// Heat tint of the zone.
    pub fill: Color,
    /// Disc opacity.
    pub opacity: f32,
}

/// Heat tint for a ratio in `[0, 1]`: blue when cold, red when hot.
#[must_use]
pub fn heat_color(ratio: f32) -> Color {
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    Color::from_hue((1.0 - ratio) * 240.0)
}

/// Discs for every zone on the board, ordered by zone identifier.
#[must_use]
pub fn zone_discs(board: &ZoneBoard) -> Vec<ZoneDisc> {
    board
        .iter()
        .map(|entry| ZoneDisc {
            zone: entry.zone.zone_id,
            center: entry.anchor,
            radius: ZONE_DISC_RADIUS,
            fill: heat_color(entry.zone.threshold_ratio()),
            opacity: ZONE_DISC_OPACITY,
        })
        .collect()
}

/// Line drawn between two connected zones.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoneLink {
    /// Zone the connection starts from.
    pub from: ZoneId,
    /// Zone the connection leads to.
    pub to: ZoneId,
    /// Anchor of the starting zone.
    pub start: Vec2,
    /// Anchor of the destination zone.
    pub end: Vec2,
    /// Stroke width scaled by the connection weight.
    pub stroke_width: f32,
    /// Line opacity scaled by the connection weight.
    pub opacity: f32,
}

impl ZoneLink {
    /// Creates a link whose stroke and opacity follow the connection weight.
    #[must_use]
    pub fn weighted(from: ZoneId, to: ZoneId, start: Vec2, end: Vec2, weight: f32) -> Self {
        let weight = if weight.is_finite() {
            weight.max(0.0)
        } else {
            0.0
        };

        Self {
            from,
            to,
            start,
            end,
            stroke_width: (weight * 3.0).clamp(MIN_LINK_WIDTH, MAX_LINK_WIDTH),
            opacity: 0.2 + 0.5 * weight.min(1.0),
        }
    }
}

/// Links for every connection whose endpoints are both on the board.
#[must_use]
pub fn zone_links(board: &ZoneBoard) -> Vec<ZoneLink> {
    let mut links = Vec::new();
    for entry in board.iter() {
        for (&to, &weight) in &entry.zone.connected_zones {
            let Some(end) = board.anchor(to) else {
                continue;
            };
            links.push(ZoneLink::weighted(
                entry.zone.zone_id,
                to,
                entry.anchor,
                end,
                weight,
            ));
        }
    }
    links
}

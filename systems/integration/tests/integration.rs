use std::time::Duration;

use crowd_pulse_core::{
    Command, Event, GuestId, HeatSample, Orbit, Timestamp, Tuning, Vec2, Zone, ZoneBoard, ZoneId,
    MIN_SAMPLE_VALUE,
};
use crowd_pulse_system_integration::{heat_contribution, sample_value, Integration};
use crowd_pulse_world::{self as world, query, World};

const CALM: ZoneId = ZoneId::new(1);
const PACKED: ZoneId = ZoneId::new(2);

fn board() -> ZoneBoard {
    let mut board = ZoneBoard::new();
    board.place(Zone::new(CALM, "Calm", 20, 2, 10), Vec2::new(100.0, 100.0));
    board.place(Zone::new(PACKED, "Packed", 20, 19, 10), Vec2::new(400.0, 100.0));
    board
}

fn populated_world() -> World {
    let mut world = World::new(&Tuning::default());
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::ReplaceZoneBoard { board: board() },
        &mut events,
    );
    for (guest, zone) in [(1, CALM), (2, PACKED)] {
        world::apply(
            &mut world,
            Command::SpawnGuest {
                guest: GuestId::new(guest),
                zone,
                orbit: Orbit::new(0.0, 30.0),
                at: Timestamp::ZERO,
            },
            &mut events,
        );
    }
    world
}

fn step(world: &mut World, integration: &mut Integration, now: Timestamp) -> Vec<HeatSample> {
    let dt = integration.advance_clock(now);
    let mut events = Vec::new();
    world::apply(world, Command::Tick { dt }, &mut events);

    let mut samples = Vec::new();
    integration.collect_samples(
        &events,
        &query::guest_view(world),
        query::zone_board(world),
        &mut samples,
    );
    samples
}

#[test]
fn samples_weight_opacity_by_zone_heat() {
    let mut world = populated_world();
    let mut integration = Integration::from_tuning(&Tuning::default());

    let first = step(&mut world, &mut integration, Timestamp::ZERO);
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|sample| sample.value == MIN_SAMPLE_VALUE));

    for frame in 1..20 {
        let _ = step(
            &mut world,
            &mut integration,
            Timestamp::from_millis(frame * 50),
        );
    }
    let samples = step(&mut world, &mut integration, Timestamp::from_millis(1_000));

    let calm = heat_contribution(&Zone::new(CALM, "Calm", 20, 2, 10));
    let packed = heat_contribution(&Zone::new(PACKED, "Packed", 20, 19, 10));
    assert!((samples[0].value - calm).abs() < 1e-6);
    assert!((samples[1].value - packed).abs() < 1e-6);
    assert!(samples[1].value > samples[0].value);
}

#[test]
fn stalled_guests_emit_no_sample_while_others_continue() {
    let mut world = populated_world();
    let mut integration = Integration::from_tuning(&Tuning::default());
    let _ = step(&mut world, &mut integration, Timestamp::ZERO);

    let mut calm_only = ZoneBoard::new();
    calm_only.place(Zone::new(CALM, "Calm", 20, 2, 10), Vec2::new(100.0, 100.0));
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::ReplaceZoneBoard { board: calm_only },
        &mut events,
    );

    let samples = step(&mut world, &mut integration, Timestamp::from_millis(16));
    assert_eq!(samples.len(), 1);
    let calm = query::guest(&world, GuestId::new(1)).expect("calm guest");
    assert_eq!(Vec2::new(samples[0].x, samples[0].y), calm.position);
}

#[test]
fn retired_guest_contributes_one_last_faint_sample() {
    let mut world = populated_world();
    let mut integration = Integration::new(Duration::from_secs(2));
    let _ = step(&mut world, &mut integration, Timestamp::ZERO);
    let _ = step(&mut world, &mut integration, Timestamp::from_millis(1_000));

    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::BeginFadeOut {
            guest: GuestId::new(2),
            at: Timestamp::from_millis(1_000),
        },
        &mut events,
    );

    let last = step(&mut world, &mut integration, Timestamp::from_millis(2_000));
    assert!(query::guest(&world, GuestId::new(2)).is_none());
    assert_eq!(last.len(), 2);
    assert_eq!(last[1].value, MIN_SAMPLE_VALUE);

    let after = step(&mut world, &mut integration, Timestamp::from_millis(2_016));
    assert_eq!(after.len(), 1);
}

#[test]
fn heat_never_decreases_as_occupancy_grows() {
    for (capacity, threshold) in [(10, 8), (40, 30), (7, 7), (100, 1), (3, 2)] {
        let mut previous = 0.0;
        for count in 0..=capacity * 2 {
            let heat = heat_contribution(&Zone::new(CALM, "Calm", capacity, count, threshold));
            assert!(
                heat >= previous,
                "capacity {capacity} threshold {threshold} count {count}: {heat} < {previous}"
            );
            assert!((0.0..=1.0).contains(&heat));
            previous = heat;
        }
    }

    for opacity in [0.0, 0.3, 1.0] {
        assert!(sample_value(opacity, 0.2) <= sample_value(opacity, 0.8));
    }
}

#[test]
fn non_finite_events_suppress_the_sample() {
    let world = populated_world();
    let integration = Integration::from_tuning(&Tuning::default());
    let events = vec![Event::NonFinitePosition {
        guest: GuestId::new(1),
    }];

    let mut samples = Vec::new();
    integration.collect_samples(
        &events,
        &query::guest_view(&world),
        query::zone_board(&world),
        &mut samples,
    );
    assert_eq!(samples.len(), 1);
}

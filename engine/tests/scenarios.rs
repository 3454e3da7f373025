use std::time::Duration;

use crowd_pulse_core::{
    Event, GuestId, GuestLocation, GuestSnapshot, LifecyclePhase, Timestamp, Tuning, Vec2, Zone,
    ZoneId, ZoneSnapshot,
};
use crowd_pulse_engine::HeatmapEngine;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const STEP: Duration = Duration::from_millis(50);
const G1: GuestId = GuestId::new(1);
const Z1: ZoneId = ZoneId::new(1);
const Z2: ZoneId = ZoneId::new(2);

fn tuning() -> Tuning {
    let mut tuning = Tuning::default();
    tuning.anchors = [
        ("Z1".to_owned(), Vec2::new(100.0, 100.0)),
        ("Z2".to_owned(), Vec2::new(500.0, 500.0)),
    ]
    .into_iter()
    .collect();
    tuning
}

fn zones() -> ZoneSnapshot {
    ZoneSnapshot::new(vec![
        Zone::new(Z1, "Z1", 10, 9, 8),
        Zone::new(Z2, "Z2", 10, 2, 8),
    ])
}

fn guests(pairs: &[(GuestId, ZoneId)]) -> GuestSnapshot {
    GuestSnapshot::new(
        pairs
            .iter()
            .map(|&(guest, zone)| GuestLocation::new(guest, zone))
            .collect(),
    )
}

fn engine(seed: u64) -> HeatmapEngine {
    HeatmapEngine::seeded(tuning(), seed).expect("valid tuning")
}

/// Ticks at `start` and then every 50 ms until `start + total`.
fn tick_for(engine: &mut HeatmapEngine, start: Timestamp, total: Duration) -> Timestamp {
    let _ = engine.tick(start);
    let mut now = start;
    let mut elapsed = Duration::ZERO;
    while elapsed < total {
        elapsed += STEP;
        now = start + elapsed;
        let _ = engine.tick(now);
    }
    now
}

fn assert_on_orbit(engine: &HeatmapEngine, anchor: Vec2) {
    let state = engine.guest(G1).expect("guest simulated");
    let distance = (state.position - anchor).length();
    assert!(
        (distance - state.orbit.radius).abs() < 1e-2,
        "distance {distance} radius {}",
        state.orbit.radius
    );
    assert!(state.orbit.radius >= 35.0 && state.orbit.radius < 55.01);
}

#[test]
fn scenario_a_new_guest_fades_in_around_its_zone() {
    let mut engine = engine(1);
    let start = Timestamp::from_millis(0);

    let _ = engine.reconcile(&zones(), &guests(&[(G1, Z1)]), start);
    let state = engine.guest(G1).expect("guest created");
    assert_eq!(state.phase, LifecyclePhase::FadingIn);
    assert_eq!(state.opacity, 0.0);
    assert_eq!(state.current_zone, Z1);

    let _ = tick_for(&mut engine, start, Duration::from_secs(1));

    let state = engine.guest(G1).expect("guest still simulated");
    assert_eq!(state.opacity, 1.0);
    assert_eq!(state.phase, LifecyclePhase::Steady);
    assert_on_orbit(&engine, Vec2::new(100.0, 100.0));
}

#[test]
fn scenario_b_zone_change_eases_onto_new_anchor() {
    let mut engine = engine(2);
    let _ = engine.reconcile(&zones(), &guests(&[(G1, Z1)]), Timestamp::ZERO);
    let settled = tick_for(&mut engine, Timestamp::ZERO, Duration::from_secs(1));

    let events = engine.reconcile(&zones(), &guests(&[(G1, Z2)]), settled);
    assert!(events.contains(&Event::TransitionStarted {
        guest: G1,
        from: Z1,
        to: Z2,
    }));
    let state = engine.guest(G1).expect("guest");
    assert_eq!(state.phase, LifecyclePhase::Transitioning);
    assert_eq!(state.transition_progress, 0.0);

    let halfway = tick_for(&mut engine, settled, Duration::from_millis(500));
    let state = engine.guest(G1).expect("guest");
    assert_eq!(state.phase, LifecyclePhase::Transitioning);
    assert!((state.transition_progress - 0.5).abs() < 1e-6);
    assert_eq!(state.current_zone, Z1);

    let _ = tick_for(&mut engine, halfway, Duration::from_millis(500));
    let state = engine.guest(G1).expect("guest");
    assert_eq!(state.transition_progress, 1.0);
    assert_eq!(state.current_zone, Z2);
    assert_eq!(state.target_zone, Z2);
    assert_eq!(state.phase, LifecyclePhase::Steady);
    assert_on_orbit(&engine, Vec2::new(500.0, 500.0));
}

#[test]
fn scenario_c_departed_guest_fades_out_then_disappears() {
    let mut engine = engine(3);
    let _ = engine.reconcile(&zones(), &guests(&[(G1, Z1)]), Timestamp::ZERO);
    let settled = tick_for(&mut engine, Timestamp::ZERO, Duration::from_secs(1));

    let _ = engine.reconcile(&zones(), &guests(&[]), settled);
    let state = engine.guest(G1).expect("guest fading");
    assert_eq!(state.phase, LifecyclePhase::FadingOut);
    assert_eq!(state.removed_at, Some(settled));

    let almost = tick_for(&mut engine, settled, Duration::from_millis(950));
    let state = engine.guest(G1).expect("deleted only after a full fade");
    assert!(state.opacity > 0.0 && state.opacity < 0.1);
    assert_eq!(engine.samples().len(), 1);

    let done = almost + STEP;
    let _ = engine.tick(done);
    assert!(engine.guest(G1).is_none());
    assert_eq!(engine.guest_count(), 0);

    let _ = engine.tick(done + STEP);
    assert!(engine.samples().is_empty());
}

#[test]
fn repeated_snapshot_keeps_every_phase() {
    let mut engine = engine(4);
    let snapshot = guests(&[(G1, Z1), (GuestId::new(2), Z2)]);
    let _ = engine.reconcile(&zones(), &snapshot, Timestamp::ZERO);
    let now = tick_for(&mut engine, Timestamp::ZERO, Duration::from_millis(400));

    let moved = guests(&[(G1, Z2), (GuestId::new(2), Z2)]);
    let _ = engine.reconcile(&zones(), &moved, now);
    let before = engine.guests().into_vec();

    let events = engine.reconcile(&zones(), &moved, now).to_vec();
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::TransitionStarted { .. })));
    let after = engine.guests().into_vec();
    assert_eq!(
        before.iter().map(|state| state.phase).collect::<Vec<_>>(),
        after.iter().map(|state| state.phase).collect::<Vec<_>>()
    );
}

#[test]
fn zero_length_fades_complete_on_next_tick() {
    let tuning = Tuning {
        fade_ms: 0,
        transition_ms: 0,
        ..tuning()
    };
    let mut engine = HeatmapEngine::seeded(tuning, 5).expect("valid tuning");

    let _ = engine.reconcile(&zones(), &guests(&[(G1, Z1)]), Timestamp::ZERO);
    let _ = engine.tick(Timestamp::ZERO);
    assert_eq!(engine.guest(G1).map(|state| state.opacity), Some(1.0));

    let _ = engine.reconcile(&zones(), &guests(&[(G1, Z2)]), Timestamp::ZERO);
    let _ = engine.tick(Timestamp::ZERO);
    assert_eq!(engine.guest(G1).map(|state| state.current_zone), Some(Z2));

    let _ = engine.reconcile(&zones(), &guests(&[]), Timestamp::ZERO);
    let _ = engine.tick(Timestamp::ZERO);
    assert!(engine.guest(G1).is_none());
}

#[test]
fn unresolvable_zone_stalls_guest_until_it_returns() {
    let mut engine = engine(6);
    let _ = engine.reconcile(&zones(), &guests(&[(G1, Z1)]), Timestamp::ZERO);
    let now = tick_for(&mut engine, Timestamp::ZERO, Duration::from_millis(200));
    let frozen = engine.guest(G1).expect("guest");

    let only_z2 = ZoneSnapshot::new(vec![Zone::new(Z2, "Z2", 10, 2, 8)]);
    let _ = engine.reconcile(&only_z2, &guests(&[(G1, Z1)]), now);
    let later = tick_for(&mut engine, now, Duration::from_millis(200));
    let stalled = engine.guest(G1).expect("guest kept");
    assert_eq!(stalled.position, frozen.position);
    assert_eq!(stalled.opacity, frozen.opacity);
    assert!(engine.samples().is_empty());

    let _ = engine.reconcile(&zones(), &guests(&[(G1, Z1)]), later);
    let _ = tick_for(&mut engine, later, Duration::from_millis(100));
    assert!(engine.guest(G1).expect("guest").opacity > frozen.opacity);
    assert_eq!(engine.samples().len(), 1);
}

#[test]
fn opacity_and_progress_stay_bounded_for_any_step_sequence() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    let mut engine = engine(7);
    let mut now = Timestamp::ZERO;
    let zone_ids = [Z1, Z2, ZoneId::new(3)];

    for round in 0..400 {
        if round % 7 == 0 {
            let mut pairs = Vec::new();
            for guest in 0..6u64 {
                if rng.gen_bool(0.7) {
                    let zone = zone_ids[rng.gen_range(0..zone_ids.len())];
                    pairs.push((GuestId::new(guest), zone));
                }
            }
            let _ = engine.reconcile(&zones(), &guests(&pairs), now);
        }

        let step = match rng.gen_range(0..4) {
            0 => Duration::ZERO,
            1 => Duration::from_millis(rng.gen_range(1..20)),
            2 => Duration::from_millis(rng.gen_range(20..400)),
            _ => Duration::from_micros(rng.gen_range(1..900)),
        };
        now = now + step;
        let _ = engine.tick(now);

        for state in engine.guests().iter() {
            assert!((0.0..=1.0).contains(&state.opacity), "{state:?}");
            assert!((0.0..=1.0).contains(&state.transition_progress), "{state:?}");
            assert!(state.position.is_finite());
        }
        for sample in engine.samples() {
            assert!(sample.value > 0.0 && sample.value <= 1.0);
        }
    }
}

#[test]
fn seeded_engines_replay_identically() {
    let run = |seed| {
        let mut engine = engine(seed);
        let _ = engine.reconcile(
            &zones(),
            &guests(&[(G1, Z1), (GuestId::new(2), Z2)]),
            Timestamp::ZERO,
        );
        let _ = tick_for(&mut engine, Timestamp::ZERO, Duration::from_millis(300));
        engine.samples().to_vec()
    };

    assert_eq!(run(11), run(11));
    assert_ne!(run(11), run(12));
}

#[test]
fn guest_leaving_a_vanished_zone_still_reaches_its_new_one() {
    let mut engine = engine(8);
    let _ = engine.reconcile(&zones(), &guests(&[(G1, Z1)]), Timestamp::ZERO);
    let settled = tick_for(&mut engine, Timestamp::ZERO, Duration::from_secs(1));

    let only_z2 = ZoneSnapshot::new(vec![Zone::new(Z2, "Z2", 10, 2, 8)]);
    let events = engine.reconcile(&only_z2, &guests(&[(G1, Z2)]), settled);
    assert!(events.contains(&Event::TransitionStarted {
        guest: G1,
        from: Z1,
        to: Z2,
    }));

    let halfway = tick_for(&mut engine, settled, Duration::from_millis(500));
    let state = engine.guest(G1).expect("guest");
    assert_eq!(state.phase, LifecyclePhase::Transitioning);
    assert!((state.transition_progress - 0.5).abs() < 1e-6);
    assert_eq!(engine.samples().len(), 1);

    let mut now = halfway;
    for _ in 0..4 {
        let _ = engine.reconcile(&only_z2, &guests(&[(G1, Z2)]), now);
        now = tick_for(&mut engine, now, Duration::from_millis(500));
    }

    let state = engine.guest(G1).expect("guest");
    assert_eq!(state.phase, LifecyclePhase::Steady);
    assert_eq!(state.current_zone, Z2);
    assert_eq!(state.transition_progress, 1.0);
    assert_on_orbit(&engine, Vec2::new(500.0, 500.0));
    assert_eq!(engine.samples().len(), 1);
}

#[test]
fn rates_without_a_period_are_refused_at_construction() {
    let tuning = Tuning {
        max_pushes_per_second: 1e-30,
        ..tuning()
    };
    assert!(HeatmapEngine::seeded(tuning, 1).is_err());
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Rate-limited hand-off of density samples to the rendering surface.

use std::time::Duration;

use crowd_pulse_core::{HeatFrame, HeatSample, Timestamp, Tuning};

/// Buffers the most recent sample list and releases it at a capped rate.
#[derive(Debug)]
pub struct Aggregation {
    min_interval: Duration,
    last_push: Option<Timestamp>,
    pending: Option<Vec<HeatSample>>,
    pushes: u64,
}

impl Aggregation {
    /// Creates an aggregator that releases at most one frame per `min_interval`.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_push: None,
            pending: None,
            pushes: 0,
        }
    }

    /// Creates an aggregator honouring the push-rate cap of the tuning.
    #[must_use]
    pub fn from_tuning(tuning: &Tuning) -> Self {
        Self::new(tuning.min_push_interval())
    }

    /// Replaces the buffered samples and releases a frame if one is due.
    pub fn offer(&mut self, samples: &[HeatSample], now: Timestamp) -> Option<HeatFrame> {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.clear();
                pending.extend_from_slice(samples);
            }
            None => self.pending = Some(samples.to_vec()),
        }
        self.poll(now)
    }

    /// Releases the buffered samples if the rate cap allows a push at `now`.
    pub fn poll(&mut self, now: Timestamp) -> Option<HeatFrame> {
        if !self.is_due(now) {
            return None;
        }

        let samples = self.pending.take()?;
        self.last_push = Some(now);
        self.pushes += 1;
        Some(HeatFrame::new(samples))
    }

    /// Reports whether samples are waiting for the next push.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of frames released so far.
    #[must_use]
    pub fn pushes(&self) -> u64 {
        self.pushes
    }

    fn is_due(&self, now: Timestamp) -> bool {
        self.last_push.map_or(true, |last| {
            now.saturating_duration_since(last) >= self.min_interval
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowd_pulse_core::HEAT_NORMALIZATION_MAX;

    fn sample(value: f32) -> HeatSample {
        HeatSample::new(1.0, 2.0, value)
    }

    #[test]
    fn first_offer_is_released_immediately() {
        let mut aggregation = Aggregation::new(Duration::from_millis(100));
        let frame = aggregation
            .offer(&[sample(0.5)], Timestamp::from_millis(3))
            .expect("first frame is due");

        assert_eq!(frame.samples, vec![sample(0.5)]);
        assert_eq!(frame.max, HEAT_NORMALIZATION_MAX);
        assert!(!aggregation.has_pending());
    }

    #[test]
    fn offers_within_interval_keep_only_latest_samples() {
        let mut aggregation = Aggregation::new(Duration::from_millis(100));
        let _ = aggregation.offer(&[sample(0.1)], Timestamp::ZERO);

        assert!(aggregation
            .offer(&[sample(0.2)], Timestamp::from_millis(30))
            .is_none());
        assert!(aggregation
            .offer(&[sample(0.3), sample(0.4)], Timestamp::from_millis(60))
            .is_none());
        assert!(aggregation.has_pending());

        let frame = aggregation
            .poll(Timestamp::from_millis(100))
            .expect("interval elapsed");
        assert_eq!(frame.samples, vec![sample(0.3), sample(0.4)]);
        assert_eq!(aggregation.pushes(), 2);
    }

    #[test]
    fn push_rate_never_exceeds_cap() {
        let mut aggregation = Aggregation::from_tuning(&Tuning::default());
        let mut released = 0;
        for frame in 0..1_000u64 {
            // 240 offers per second for a little over four seconds.
            let now = Timestamp::from_duration(Duration::from_micros(frame * 4_167));
            if aggregation.offer(&[sample(0.5)], now).is_some() {
                released += 1;
            }
        }

        let elapsed_secs = 999.0 * 4_167.0 / 1_000_000.0;
        assert!(released as f64 <= elapsed_secs * 60.0 + 1.0, "{released}");
        assert!(released > 200, "{released}");
    }

    #[test]
    fn poll_without_samples_releases_nothing() {
        let mut aggregation = Aggregation::new(Duration::from_millis(10));
        assert!(aggregation.poll(Timestamp::ZERO).is_none());
        assert_eq!(aggregation.pushes(), 0);
    }
}

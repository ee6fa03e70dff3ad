//! Clock-offset correction for the reveal countdown.
//!
//! Every observer reads the same shared deadline but ticks against its own
//! clock. Each observer therefore keeps an estimate of `server - local` and
//! evaluates the countdown at `local + offset`; without it, devices with
//! drifting clocks reveal at visibly different moments.

use clipvote_types::{Timestamp, VotingParams};
use tracing::{debug, warn};

/// Running estimate of the skew between the coordinating server's clock and
/// the local clock.
#[derive(Clone, Debug)]
pub struct ClockOffset {
    /// Current estimate of `server - local` in milliseconds.
    offset_ms: i64,
    /// Number of samples folded into the estimate.
    sample_count: u32,
    /// EMA weight of the old estimate: `offset = (offset * num + sample * (den - num)) / den`.
    smoothing_numerator: i64,
    smoothing_denominator: i64,
    unavailable_reported: bool,
}

impl ClockOffset {
    pub fn new(params: &VotingParams) -> Self {
        Self {
            offset_ms: 0,
            sample_count: 0,
            smoothing_numerator: params.clock_smoothing_numerator,
            smoothing_denominator: params.clock_smoothing_denominator.max(1),
            unavailable_reported: false,
        }
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Whether at least one skew sample has been received.
    pub fn is_synced(&self) -> bool {
        self.sample_count > 0
    }

    /// Fold a `server - local` sample into the estimate.
    ///
    /// The first sample is adopted as-is; later ones are smoothed with an
    /// exponential moving average so a single slow round trip does not jerk
    /// the countdown.
    pub fn record_sample(&mut self, sample_ms: i64) -> i64 {
        if self.sample_count == 0 {
            self.offset_ms = sample_ms;
        } else {
            let old_weight = self.smoothing_numerator as i128;
            let new_weight = (self.smoothing_denominator - self.smoothing_numerator) as i128;
            let blended = (self.offset_ms as i128 * old_weight + sample_ms as i128 * new_weight)
                / self.smoothing_denominator as i128;
            self.offset_ms = blended.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        }
        self.sample_count = self.sample_count.saturating_add(1);
        debug!(sample_ms, offset_ms = self.offset_ms, "clock offset updated");
        self.offset_ms
    }

    /// Fold in a time-sync round trip: the request left at `local_send`, the
    /// server stamped `server`, the reply arrived at `local_recv`.
    ///
    /// The server time is compared with the midpoint of the two local
    /// readings, assuming symmetric latency.
    pub fn record_round_trip(
        &mut self,
        local_send: Timestamp,
        server: Timestamp,
        local_recv: Timestamp,
    ) -> i64 {
        let send = local_send.as_millis() as i128;
        let recv = local_recv.as_millis() as i128;
        let midpoint = (send + recv) / 2;
        let sample = (server.as_millis() as i128 - midpoint)
            .clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        self.record_sample(sample)
    }

    /// Note that no skew feed exists. The offset stays at zero.
    pub fn mark_unavailable(&mut self) {
        if !self.unavailable_reported {
            warn!("clock offset feed unavailable, counting down on the local clock");
            self.unavailable_reported = true;
        }
    }

    /// Convert a local reading into estimated server time.
    pub fn adjust(&self, local: Timestamp) -> Timestamp {
        local.offset_by(self.offset_ms)
    }
}

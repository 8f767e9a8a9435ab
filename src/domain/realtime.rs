//! Realtime Differencing Engine
//!
//! Turns the device's noisy cumulative counters into monotone-safe per-tick
//! deltas so a live UI can show "activity since last tick". Each metric keeps
//! its own `current`/`last` pair; `current == None` is the NOT_MEASURED
//! sentinel, distinct from a legitimate zero delta.

use crate::domain::models::ActivityCounters;

/// Per-metric differencing state.
///
/// The engine withholds output until it has two readings to difference:
/// while `last == 0` there is no finalized baseline yet and `delta()`
/// reports NOT_MEASURED.
#[derive(Debug, Clone, Copy, Default)]
struct MetricState {
    current: Option<u32>,
    last: u32,
}

impl MetricState {
    /// Store a reading. The device briefly emits invalid negative values on
    /// some firmwares; those are coerced to NOT_MEASURED.
    fn set(&mut self, value: i64) {
        self.current = if value >= 0 {
            Some(value as u32)
        } else {
            None
        };
    }

    fn clear(&mut self) {
        self.current = None;
    }

    /// Delta since the last finalized baseline, clamped at zero on a counter
    /// reset or device rollback. NOT_MEASURED until warm-up completes.
    fn delta(&self) -> Option<u32> {
        let current = self.current?;
        if self.last == 0 {
            return None; // wait until we have a delta between two readings
        }
        Some(current.saturating_sub(self.last))
    }

    /// Tick boundary: ratchet the baseline (a transient dip must not lower
    /// it) and reset `current` to await the next reading.
    fn finalize(&mut self) {
        if let Some(current) = self.current {
            if current >= self.last {
                self.last = current;
            }
        }
        self.current = None;
    }
}

/// Latched heart-rate reading. Heart rate is not a cumulative counter, so it
/// is not differenced: the latest reading wins, falling back to the last
/// finalized one within a session.
#[derive(Debug, Clone, Copy, Default)]
struct HeartRateLatch {
    current: Option<u16>,
    last: Option<u16>,
}

impl HeartRateLatch {
    fn set(&mut self, bpm: i64) {
        self.current = if (1..=255).contains(&bpm) {
            Some(bpm as u16)
        } else {
            None
        };
    }

    fn reading(&self) -> Option<u16> {
        self.current.or(self.last)
    }

    fn finalize(&mut self) {
        if self.current.is_some() {
            self.last = self.current;
        }
        self.current = None;
    }
}

/// Deltas produced by one tick flush. Activity fields are `None` when the
/// metric was NOT_MEASURED this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickDeltas {
    pub steps: Option<u32>,
    pub meters: Option<u32>,
    pub calories: Option<u32>,
    pub heart_rate: Option<u16>,
}

impl TickDeltas {
    pub fn is_empty(&self) -> bool {
        self.steps.is_none()
            && self.meters.is_none()
            && self.calories.is_none()
            && self.heart_rate.is_none()
    }
}

/// Session-owned realtime state. Created when realtime mode starts and
/// discarded when it is disabled or the session ends; there is no
/// cross-session sharing.
#[derive(Debug, Default)]
pub struct RealtimeSamples {
    steps: MetricState,
    meters: MetricState,
    calories: MetricState,
    heart_rate: HeartRateLatch,
    running: bool,
}

impl RealtimeSamples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the periodic tick task is active.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Feed a freshly decoded cumulative snapshot.
    pub fn set_counters(&mut self, counters: &ActivityCounters) {
        self.set_steps(counters.steps as i64);
        self.set_meters(counters.meters as i64);
        self.set_calories(counters.calories as i64);
    }

    pub fn set_steps(&mut self, steps: i64) {
        self.steps.set(steps);
    }

    pub fn set_meters(&mut self, meters: i64) {
        self.meters.set(meters);
    }

    pub fn set_calories(&mut self, calories: i64) {
        self.calories.set(calories);
    }

    pub fn set_heart_rate(&mut self, bpm: i64) {
        self.heart_rate.set(bpm);
    }

    /// Drop any reading observed since the last tick boundary without
    /// touching the baselines.
    pub fn clear_current(&mut self) {
        self.steps.clear();
        self.meters.clear();
        self.calories.clear();
    }

    pub fn steps_delta(&self) -> Option<u32> {
        self.steps.delta()
    }

    pub fn meters_delta(&self) -> Option<u32> {
        self.meters.delta()
    }

    pub fn calories_delta(&self) -> Option<u32> {
        self.calories.delta()
    }

    pub fn heart_rate_reading(&self) -> Option<u16> {
        self.heart_rate.reading()
    }

    /// Take the current per-tick deltas and advance all baselines. Returns
    /// `None` when every metric was NOT_MEASURED, i.e. nothing arrived since
    /// the previous tick.
    pub fn flush_tick(&mut self) -> Option<TickDeltas> {
        let deltas = TickDeltas {
            steps: self.steps.delta(),
            meters: self.meters.delta(),
            calories: self.calories.delta(),
            heart_rate: self.heart_rate.reading(),
        };

        self.steps.finalize();
        self.meters.finalize();
        self.calories.finalize();
        self.heart_rate.finalize();

        if deltas.is_empty() {
            None
        } else {
            Some(deltas)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_withholds_first_delta() {
        let mut rt = RealtimeSamples::new();
        rt.set_steps(100);
        assert_eq!(rt.steps_delta(), None);

        // First finalize establishes the baseline.
        rt.flush_tick();
        rt.set_steps(130);
        assert_eq!(rt.steps_delta(), Some(30));
    }

    #[test]
    fn counter_rollback_clamps_to_zero() {
        let mut rt = RealtimeSamples::new();
        rt.set_steps(100);
        rt.flush_tick();
        rt.set_steps(90);
        assert_eq!(rt.steps_delta(), Some(0));
    }

    #[test]
    fn not_measured_propagates_regardless_of_baseline() {
        let mut rt = RealtimeSamples::new();
        rt.set_steps(100);
        rt.flush_tick();
        rt.set_steps(-1);
        assert_eq!(rt.steps_delta(), None);
    }

    #[test]
    fn transient_dip_does_not_lower_baseline() {
        let mut rt = RealtimeSamples::new();
        rt.set_steps(100);
        rt.flush_tick();
        rt.set_steps(90);
        rt.flush_tick(); // baseline stays at 100
        rt.set_steps(110);
        assert_eq!(rt.steps_delta(), Some(10));
    }

    #[test]
    fn flush_resets_current_to_not_measured() {
        let mut rt = RealtimeSamples::new();
        rt.set_steps(100);
        rt.flush_tick();
        // No new reading this tick: delta must be NOT_MEASURED, not 0.
        assert_eq!(rt.steps_delta(), None);
    }

    #[test]
    fn empty_tick_produces_no_deltas() {
        let mut rt = RealtimeSamples::new();
        assert_eq!(rt.flush_tick(), None);
    }

    #[test]
    fn heart_rate_latches_last_reading() {
        let mut rt = RealtimeSamples::new();
        rt.set_heart_rate(72);
        assert_eq!(rt.heart_rate_reading(), Some(72));

        let deltas = rt.flush_tick().unwrap();
        assert_eq!(deltas.heart_rate, Some(72));
        // Reading survives the tick boundary via the latch.
        assert_eq!(rt.heart_rate_reading(), Some(72));
    }

    #[test]
    fn counters_feed_all_three_metrics() {
        let mut rt = RealtimeSamples::new();
        rt.set_counters(&ActivityCounters::new(100, 80, 5));
        rt.flush_tick();
        rt.set_counters(&ActivityCounters::new(130, 95, 6));

        let deltas = rt.flush_tick().unwrap();
        assert_eq!(deltas.steps, Some(30));
        assert_eq!(deltas.meters, Some(15));
        assert_eq!(deltas.calories, Some(1));
    }
}

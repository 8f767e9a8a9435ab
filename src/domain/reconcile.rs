//! Reconciliation Engine
//!
//! Converts a freshly read cumulative counter snapshot into at most one new
//! incremental sample, guaranteeing no double counting across repeated polls
//! within the same day window. The day-window sum of persisted samples acts
//! as the durable "last known counted total", so no separate cursor state is
//! needed.

use crate::domain::models::{ActivityCounters, ActivitySample, SampleKind};
use crate::infrastructure::store::{SampleStore, StoreError};
use chrono::{Local, TimeZone};
use tracing::{debug, warn};

pub struct Reconciler {
    device_id: String,
    user_id: String,
}

impl Reconciler {
    pub fn new(device_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            user_id: user_id.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Reconcile a cumulative snapshot against the samples already persisted
    /// for the local day containing `now_ts`.
    ///
    /// Emits (and appends) a sample holding only the uncounted remainder when
    /// the device counters exceed the stored day total. Counters at or below
    /// the stored total mean either "no new data" or a mid-day device reset;
    /// the two are indistinguishable in this protocol, and both are treated
    /// as a no-op rather than risking a spurious negative sample.
    pub fn reconcile(
        &self,
        store: &dyn SampleStore,
        now: &ActivityCounters,
        now_ts: i64,
    ) -> Result<Option<ActivitySample>, StoreError> {
        let from_ts = start_of_local_day(now_ts);
        let day_samples = store.query_samples(&self.device_id, from_ts, now_ts)?;
        let stored = day_totals(&day_samples);
        debug!(
            stored_steps = stored.steps,
            device_steps = now.steps,
            "reconciling day window [{from_ts}, {now_ts}]"
        );

        if now.steps <= stored.steps {
            return Ok(None);
        }

        let remainder = now.saturating_sub(&stored);
        let sample = ActivitySample {
            device_id: self.device_id.clone(),
            user_id: self.user_id.clone(),
            timestamp: now_ts,
            steps: remainder.steps,
            distance_meters: remainder.meters,
            calories_burnt: remainder.calories,
            heart_rate: None,
            kind: SampleKind::Activity,
        };

        store.append(sample.clone())?;
        Ok(Some(sample))
    }
}

/// Element-wise sum of a day window's samples. Fields are unsigned, so no
/// stored value can pull the total down.
fn day_totals(samples: &[ActivitySample]) -> ActivityCounters {
    let mut totals = ActivityCounters::default();
    for sample in samples {
        totals.steps += sample.steps;
        totals.meters += sample.distance_meters;
        totals.calories += sample.calories_burnt;
    }
    totals
}

/// Unix timestamp of local midnight for the day containing `ts`. Falls back
/// to `ts` itself if the timestamp cannot be represented (pre-epoch or a DST
/// gap), which degrades to an empty window rather than failing the poll.
pub fn start_of_local_day(ts: i64) -> i64 {
    let Some(now) = Local.timestamp_opt(ts, 0).earliest() else {
        warn!(ts, "timestamp not representable in local time");
        return ts;
    };
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .map(|midnight| midnight.timestamp())
        .unwrap_or(ts)
}

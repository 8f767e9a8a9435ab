//! Sample Store collaborator
//!
//! Abstract append-only persistence for activity samples, keyed by device and
//! timestamp. Store operations are short-lived and transactional: acquire, do
//! the bounded query/insert, release.

use crate::domain::models::ActivitySample;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sample store unavailable: {0}")]
    Unavailable(String),
}

pub trait SampleStore: Send + Sync {
    /// Samples for `device_id` with timestamps in `[from_ts, to_ts]`,
    /// ordered by timestamp ascending.
    fn query_samples(
        &self,
        device_id: &str,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Vec<ActivitySample>, StoreError>;

    /// Append one sample. Expected to be durable before returning.
    fn append(&self, sample: ActivitySample) -> Result<(), StoreError>;
}

/// In-memory store, mainly for tests and headless runs without a database.
#[derive(Default)]
pub struct MemorySampleStore {
    samples: Mutex<Vec<ActivitySample>>,
}

impl MemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<ActivitySample> {
        self.samples.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl SampleStore for MemorySampleStore {
    fn query_samples(
        &self,
        device_id: &str,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Vec<ActivitySample>, StoreError> {
        let samples = self
            .samples
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))?;

        let mut hits: Vec<ActivitySample> = samples
            .iter()
            .filter(|s| {
                s.device_id == device_id && s.timestamp >= from_ts && s.timestamp <= to_ts
            })
            .cloned()
            .collect();
        hits.sort_by_key(|s| s.timestamp);
        Ok(hits)
    }

    fn append(&self, sample: ActivitySample) -> Result<(), StoreError> {
        let mut samples = self
            .samples
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))?;
        samples.push(sample);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SampleKind;

    fn sample(ts: i64, steps: u32) -> ActivitySample {
        ActivitySample {
            device_id: "aa:bb".into(),
            user_id: "user".into(),
            timestamp: ts,
            steps,
            distance_meters: 0,
            calories_burnt: 0,
            heart_rate: None,
            kind: SampleKind::Activity,
        }
    }

    #[test]
    fn query_is_bounded_and_ordered() {
        let store = MemorySampleStore::new();
        store.append(sample(300, 3)).unwrap();
        store.append(sample(100, 1)).unwrap();
        store.append(sample(200, 2)).unwrap();

        let hits = store.query_samples("aa:bb", 100, 250).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].steps, 1);
        assert_eq!(hits[1].steps, 2);
    }

    #[test]
    fn query_filters_by_device() {
        let store = MemorySampleStore::new();
        store.append(sample(100, 1)).unwrap();
        let hits = store.query_samples("other", 0, 1000).unwrap();
        assert!(hits.is_empty());
    }
}

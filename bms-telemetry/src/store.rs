//! Bounded per-signal time-series store
//!
//! Holds one capacity-bounded series per signal key, appended by the
//! receiver worker and snapshotted by consumers. A single mutex funnels all
//! access; it is held only across an append or a copy, never across decode
//! work, so consumers block the worker for a short window at most.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use crate::types::{Sample, SignalKey};

/// Point-in-time copy of every series, keys in first-seen order
pub type SeriesSnapshot = Vec<(SignalKey, Vec<Sample>)>;

/// Concurrent, append-only, capacity-bounded series map
///
/// Keys appear in first-seen order and are never removed for the lifetime
/// of a receiving session. Once a series reaches `max_points`, appending
/// evicts the oldest sample (FIFO).
pub struct SeriesStore {
    max_points: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Keys in first-seen order
    order: Vec<SignalKey>,
    series: HashMap<SignalKey, VecDeque<Sample>>,
}

impl SeriesStore {
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points: max_points.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Append a sample to the named series, creating it if absent
    pub fn append(&self, key: SignalKey, sample: Sample) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if !inner.series.contains_key(&key) {
            inner.order.push(key);
        }

        let series = inner.series.entry(key).or_default();
        series.push_back(sample);
        while series.len() > self.max_points {
            series.pop_front();
        }
    }

    /// Take an independent copy of every series
    ///
    /// Safe to call while appends continue; no series is ever observed
    /// mid-mutation.
    pub fn snapshot(&self) -> SeriesSnapshot {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .order
            .iter()
            .map(|key| {
                let samples = inner
                    .series
                    .get(key)
                    .map(|series| series.iter().copied().collect())
                    .unwrap_or_default();
                (*key, samples)
            })
            .collect()
    }

    /// Number of distinct signal series seen so far
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalValue;
    use std::sync::Arc;
    use std::thread;

    fn sample(ts: f64, value: i64) -> Sample {
        Sample::new(ts, SignalValue::Integer(value))
    }

    #[test]
    fn test_append_and_snapshot() {
        let store = SeriesStore::new(10);
        store.append(SignalKey::Soc, sample(1.0, 50));
        store.append(SignalKey::Soc, sample(2.0, 51));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        let (key, samples) = &snapshot[0];
        assert_eq!(*key, SignalKey::Soc);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].timestamp, 1.0);
        assert_eq!(samples[1].timestamp, 2.0);
    }

    #[test]
    fn test_fifo_bound() {
        let max = 50;
        let total = 120;
        let store = SeriesStore::new(max);
        for i in 0..total {
            store.append(SignalKey::Duty, sample(i as f64, i as i64));
        }

        let snapshot = store.snapshot();
        let samples = &snapshot[0].1;
        assert_eq!(samples.len(), max);
        // The survivors are the most recent `max`, in original order
        for (offset, s) in samples.iter().enumerate() {
            assert_eq!(s.value, SignalValue::Integer((total - max + offset) as i64));
        }
    }

    #[test]
    fn test_fewer_than_bound() {
        let store = SeriesStore::new(50);
        for i in 0..7 {
            store.append(SignalKey::Remain, sample(i as f64, i));
        }
        assert_eq!(store.snapshot()[0].1.len(), 7);
    }

    #[test]
    fn test_first_seen_key_order() {
        let store = SeriesStore::new(10);
        store.append(SignalKey::Cell(7), sample(1.0, 1));
        store.append(SignalKey::BatteryVoltage, sample(1.0, 2));
        store.append(SignalKey::Cell(2), sample(1.0, 3));
        store.append(SignalKey::BatteryVoltage, sample(2.0, 4));

        let keys: Vec<SignalKey> = store.snapshot().iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                SignalKey::Cell(7),
                SignalKey::BatteryVoltage,
                SignalKey::Cell(2)
            ]
        );
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let store = SeriesStore::new(10);
        store.append(SignalKey::Soc, sample(1.0, 50));

        let mut snapshot = store.snapshot();
        snapshot[0].1.clear();

        assert_eq!(store.snapshot()[0].1.len(), 1);
    }

    #[test]
    fn test_concurrent_append_and_snapshot() {
        let max = 100;
        let store = Arc::new(SeriesStore::new(max));

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..10_000 {
                    store.append(SignalKey::BatteryVoltage, sample(i as f64, i));
                }
            })
        };

        for _ in 0..500 {
            for (_, samples) in store.snapshot() {
                assert!(samples.len() <= max);
                // Timestamps are non-decreasing within one series
                for pair in samples.windows(2) {
                    assert!(pair[0].timestamp <= pair[1].timestamp);
                }
            }
        }

        writer.join().unwrap();
        assert_eq!(store.snapshot()[0].1.len(), max);
    }

    #[test]
    fn test_empty_store() {
        let store = SeriesStore::new(10);
        assert!(store.is_empty());
        assert!(store.snapshot().is_empty());
    }
}

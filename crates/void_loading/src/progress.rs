//! Batch progress aggregation
//!
//! Turns the raw progress of every unit in a batch into the single value the
//! loading service publishes.
//!
//! Sequential batches weight unit `i` of `N` as `p * (i+1)/N`, so nothing unit
//! `i` reports can push the stream past `(i+1)/N`. That weighting alone is not
//! monotonic (unit `i+1` starts again from zero), so the aggregator keeps a
//! high-water mark for the batch and only publishes values strictly above it.
//! Values are never clamped; out-of-range raw progress is the unit's problem.

use parking_lot::Mutex;

use crate::cell::Subject;

/// Weighted contribution of unit `index` of `total` reporting `raw`
pub fn weighted(raw: f32, index: usize, total: usize) -> f32 {
    raw * ((index + 1) as f32 / total as f32)
}

/// Highest value unit `index` of `total` may contribute
pub fn ceiling(index: usize, total: usize) -> f32 {
    weighted(1.0, index, total)
}

struct AggregatorState {
    high_water: f32,
    per_unit: Vec<f32>,
}

/// Progress aggregation for one batch
pub struct ProgressAggregator {
    sink: Subject<f32>,
    total: usize,
    state: Mutex<AggregatorState>,
}

impl ProgressAggregator {
    /// Aggregate `total` units into `sink`
    pub fn new(sink: Subject<f32>, total: usize) -> Self {
        Self {
            sink,
            total,
            state: Mutex::new(AggregatorState {
                high_water: 0.0,
                per_unit: vec![0.0; total],
            }),
        }
    }

    /// Number of units in the batch
    pub fn total(&self) -> usize {
        self.total
    }

    /// Highest value published so far
    pub fn high_water(&self) -> f32 {
        self.state.lock().high_water
    }

    /// Start of batch: publish 0.0 and reset the high-water mark
    pub fn begin(&self) {
        let mut state = self.state.lock();
        state.high_water = 0.0;
        state.per_unit.iter_mut().for_each(|value| *value = 0.0);
        self.sink.publish(0.0);
    }

    /// Raw progress from unit `index` of a sequential batch
    pub fn report_sequential(&self, index: usize, raw: f32) -> bool {
        let mut state = self.state.lock();
        self.advance(&mut state, weighted(raw, index, self.total))
    }

    /// Unit `index` of a sequential batch finished; publish its ceiling
    pub fn complete_unit(&self, index: usize) -> bool {
        let mut state = self.state.lock();
        self.advance(&mut state, ceiling(index, self.total))
    }

    /// Raw progress from unit `index` of a parallel batch
    ///
    /// Parallel units carry equal weight; the published value is the mean of
    /// the latest raw progress of every unit.
    pub fn report_parallel(&self, index: usize, raw: f32) -> bool {
        let mut state = self.state.lock();
        match state.per_unit.get_mut(index) {
            Some(slot) => *slot = raw,
            None => return false,
        }
        let mean = state.per_unit.iter().sum::<f32>() / self.total as f32;
        self.advance(&mut state, mean)
    }

    /// End of a successful batch: make sure the stream ends on 1.0
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if !(state.high_water >= 1.0) {
            state.high_water = 1.0;
            self.sink.publish(1.0);
        }
    }

    // Publishing under the lock keeps concurrent reporters (parallel batches)
    // from interleaving out of order.
    fn advance(&self, state: &mut AggregatorState, value: f32) -> bool {
        if value > state.high_water {
            state.high_water = value;
            self.sink.publish(value);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator(total: usize) -> (ProgressAggregator, crate::cell::Receiver<f32>) {
        let sink = Subject::new();
        let rx = sink.subscribe();
        (ProgressAggregator::new(sink, total), rx)
    }

    #[test]
    fn test_weighting() {
        assert_eq!(weighted(0.5, 0, 2), 0.25);
        assert_eq!(weighted(1.0, 1, 2), 1.0);
        assert_eq!(ceiling(0, 4), 0.25);
        assert_eq!(ceiling(3, 4), 1.0);
    }

    #[test]
    fn test_two_unit_batch() {
        let (progress, mut rx) = aggregator(2);
        assert_eq!(progress.total(), 2);

        progress.begin();
        progress.report_sequential(0, 0.5);
        progress.report_sequential(0, 1.0);
        progress.complete_unit(0);
        progress.report_sequential(1, 0.5);
        progress.report_sequential(1, 1.0);
        progress.complete_unit(1);
        progress.finish();

        assert_eq!(rx.drain(), vec![0.0, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_published_stream_never_decreases() {
        let (progress, mut rx) = aggregator(3);

        progress.begin();
        for index in 0..3 {
            for raw in [0.9, 0.2, 0.6, 1.0, 0.4] {
                progress.report_sequential(index, raw);
            }
            progress.complete_unit(index);
        }
        progress.finish();

        let values = rx.drain();
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", values);
        assert_eq!(values.last(), Some(&1.0));
    }

    #[test]
    fn test_unit_never_exceeds_its_ceiling() {
        let (progress, _rx) = aggregator(4);

        progress.begin();
        for raw in [0.1, 0.5, 0.99, 1.0] {
            progress.report_sequential(1, raw);
            assert!(progress.high_water() <= ceiling(1, 4));
        }
    }

    #[test]
    fn test_out_of_range_values_are_not_clamped() {
        let (progress, mut rx) = aggregator(2);

        progress.begin();
        progress.report_sequential(0, 1.5);
        progress.report_sequential(0, -3.0);

        assert_eq!(rx.drain(), vec![0.0, 0.75]);
    }

    #[test]
    fn test_nan_is_ignored() {
        let (progress, mut rx) = aggregator(1);

        progress.begin();
        assert!(!progress.report_sequential(0, f32::NAN));
        assert_eq!(rx.drain(), vec![0.0]);
    }

    #[test]
    fn test_empty_batch() {
        let (progress, mut rx) = aggregator(0);
        assert_eq!(progress.total(), 0);

        progress.begin();
        progress.finish();

        assert_eq!(rx.drain(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_parallel_mean() {
        let (progress, mut rx) = aggregator(2);

        progress.begin();
        progress.report_parallel(0, 0.5);
        progress.report_parallel(1, 0.5);
        progress.report_parallel(0, 0.25);
        progress.report_parallel(0, 1.0);
        progress.report_parallel(1, 1.0);
        assert!(!progress.report_parallel(7, 1.0));
        progress.finish();

        assert_eq!(rx.drain(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }
}

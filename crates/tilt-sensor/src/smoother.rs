use crate::pipeline::PipelineError;

/// Fixed-window moving average over integer samples.
///
/// The ring is allocated once at construction and pre-filled with zeros.
/// `submit` is O(1): the running sum is adjusted by the evicted and the new
/// value instead of being recomputed. Until the window has seen `capacity`
/// samples the average divides by the number of samples seen so far, so early
/// output is not pulled toward zero.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    ring: Box<[i32]>,
    /// Slot holding the most recently written value.
    cursor: usize,
    running_sum: i64,
    sample_count: u64,
}

impl MovingAverage {
    pub fn new(capacity: usize) -> Result<Self, PipelineError> {
        if capacity == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "smoother capacity must be at least 1".into(),
            ));
        }
        Ok(Self {
            ring: vec![0; capacity].into_boxed_slice(),
            cursor: 0,
            running_sum: 0,
            sample_count: 0,
        })
    }

    /// Total number of samples submitted since construction or the last reset.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Push a sample and return the average of the current window.
    pub fn submit(&mut self, value: i32) -> f64 {
        self.sample_count = self.sample_count.saturating_add(1);
        self.cursor = (self.cursor + 1) % self.ring.len();

        let evicted = self.ring[self.cursor];
        self.running_sum += i64::from(value) - i64::from(evicted);
        self.ring[self.cursor] = value;

        self.average()
    }

    /// Average of the current window, or 0 before any sample has arrived.
    pub fn average(&self) -> f64 {
        let divisor = (self.ring.len() as u64).min(self.sample_count);
        if divisor == 0 {
            return 0.0;
        }
        self.running_sum as f64 / divisor as f64
    }

    /// Forget all samples, returning to the freshly constructed state.
    pub fn reset(&mut self) {
        self.ring.iter_mut().for_each(|slot| *slot = 0);
        self.cursor = 0;
        self.running_sum = 0;
        self.sample_count = 0;
    }
}

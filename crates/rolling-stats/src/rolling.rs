use crate::buffer::CircularBuffer;

/// Windowed arithmetic mean over the most recent `capacity` samples.
///
/// The average is exact while fewer samples than the capacity were recorded
/// and then tracks the trailing window.
#[derive(Clone, Debug)]
pub struct RollingAverage {
    samples: CircularBuffer<f64>,
}

impl RollingAverage {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: CircularBuffer::new(capacity),
        }
    }

    pub fn update(&mut self, sample: f64) {
        self.samples.push(sample);
    }

    /// The mean of the stored samples, 0.0 while no sample was recorded.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

/// Success rate over the trailing `capacity` request outcomes.
#[derive(Clone, Debug)]
pub struct SuccessRateWindow {
    outcomes: CircularBuffer<bool>,
}

impl SuccessRateWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            outcomes: CircularBuffer::new(capacity),
        }
    }

    pub fn record(&mut self, success: bool) {
        self.outcomes.push(success);
    }

    /// Fraction of successful outcomes in the window, 0.0 while empty. An
    /// empty window means "unknown" and callers must not treat it as healthy.
    pub fn rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.outcomes.count_where(|success| *success) as f64 / self.outcomes.len() as f64
    }

    pub fn reset(&mut self) {
        self.outcomes.clear();
    }
}

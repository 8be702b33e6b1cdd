//! Sample-based instants shared by the render clock and the player timeline.

/// A point in time expressed as a sample position at a given sample rate.
///
/// The same type describes render-clock instants ("node time", frames rendered by the
/// output stream) and player-relative offsets ("player time", frames since the source
/// started playing). Which one a value means is decided by the API it flows through.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioTime {
    pub sample_time: i64,
    pub sample_rate: f64,
}

impl AudioTime {
    pub fn new(sample_time: i64, sample_rate: f64) -> Self {
        Self {
            sample_time,
            sample_rate,
        }
    }

    /// Instant `seconds` into a timeline running at `sample_rate`, rounded to a sample.
    pub fn from_seconds(seconds: f64, sample_rate: f64) -> Self {
        Self::new((seconds * sample_rate).round() as i64, sample_rate)
    }

    /// Position in seconds, or `0.0` for a non-positive rate.
    pub fn seconds(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.sample_time as f64 / self.sample_rate
        } else {
            0.0
        }
    }

    /// Re-express this instant at another sample rate.
    pub fn at_rate(self, sample_rate: f64) -> Self {
        if self.sample_rate == sample_rate || self.sample_rate <= 0.0 {
            return Self::new(self.sample_time, sample_rate);
        }
        let scaled = self.sample_time as f64 * sample_rate / self.sample_rate;
        Self::new(scaled.round() as i64, sample_rate)
    }
}

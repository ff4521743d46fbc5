/// A sample averager for noisy raw ADC readings is represented here
///
/// Samples are pushed one at a time, once the configured number of samples has been collected the rounded mean is
/// available, rounded to nearest.
#[derive(Debug, Clone, Copy)]
pub struct SampleAverager {
    target_count: u8,
    count: u8,
    total: u32,
}

impl SampleAverager {
    /// `SampleAverager::new(n)` is a new averager which averages `n` samples, a count of zero is treated as one
    pub fn new(sample_count: u8) -> Self {
        Self {
            target_count: sample_count.max(1),
            count: 0,
            total: 0,
        }
    }

    /// `a.reset()` discards any samples collected so far
    pub fn reset(&mut self) {
        self.count = 0;
        self.total = 0;
    }

    /// `a.push(s)` adds raw sample `s` and is the average once enough samples have been collected
    ///
    /// Samples pushed after the average is complete are ignored until the averager is reset.
    pub fn push(&mut self, raw_sample: u16) -> Option<u16> {
        if self.count < self.target_count {
            self.total += raw_sample as u32;
            self.count += 1;
        }
        self.average()
    }

    /// `a.average()` is the rounded mean of the collected samples, or `None` if collection is not finished
    pub fn average(&self) -> Option<u16> {
        if self.count < self.target_count {
            return None;
        }
        let n = self.count as u32;
        Some(((self.total + n / 2) / n) as u16)
    }

}

/// Per-channel history of the most recent input samples
///
/// Stored as a ring buffer; logically index 0 is the newest sample and
/// index `len - 1` the oldest, so `Σ taps[k] * line[k]` is the FIR sum.
/// Storage is reserved up front so that `reset` to any length within the
/// reserved capacity never reallocates.
pub struct DelayLine {
    samples: Vec<f64>,
    head: usize,
}

impl DelayLine {
    /// Zeroed delay line of `len` samples
    pub fn new(len: usize) -> Self {
        Self::with_capacity(len, len)
    }

    /// Zeroed delay line of `len` samples with room to grow to `capacity`
    pub fn with_capacity(len: usize, capacity: usize) -> Self {
        let len = len.max(1);
        let mut samples = Vec::with_capacity(capacity.max(len));
        samples.resize(len, 0.0);
        Self { samples, head: 0 }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest length reachable through `reset` without reallocating
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Zero the history and change its length
    ///
    /// `len` must not exceed [`capacity`](Self::capacity); growing past it
    /// reallocates, which the audio thread must never do.
    pub fn reset(&mut self, len: usize) {
        debug_assert!(
            len <= self.capacity(),
            "delay line reset to {} exceeds reserved capacity {}",
            len,
            self.capacity()
        );
        self.samples.clear();
        self.samples.resize(len.max(1), 0.0);
        self.head = 0;
    }

    /// Zero the history, keeping the length
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
        self.head = 0;
    }

    /// Insert a new sample at the front, discarding the oldest
    pub fn push(&mut self, sample: f32) {
        self.head += 1;
        if self.head == self.samples.len() {
            self.head = 0;
        }
        self.samples[self.head] = sample as f64;
    }

    /// Sample `k` positions back in time (0 = newest)
    pub fn get(&self, k: usize) -> f64 {
        let n = self.samples.len();
        self.samples[(self.head + n - (k % n)) % n]
    }

    /// Dot product of the taps with the history, newest sample first
    pub fn convolve(&self, taps: &[f64]) -> f64 {
        debug_assert_eq!(taps.len(), self.samples.len());

        let mut output = 0.0f64;
        let mut tap_i = 0usize;

        // Two contiguous reverse ranges avoid modulo arithmetic in the
        // inner loop.
        for delay_idx in (0..=self.head).rev() {
            output += taps[tap_i] * self.samples[delay_idx];
            tap_i += 1;
        }
        for delay_idx in ((self.head + 1)..self.samples.len()).rev() {
            output += taps[tap_i] * self.samples[delay_idx];
            tap_i += 1;
        }

        output
    }

    /// Push one sample and return the filtered output
    pub fn process(&mut self, sample: f32, taps: &[f64]) -> f32 {
        self.push(sample);
        self.convolve(taps) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_sample_first() {
        let mut line = DelayLine::new(4);
        for x in [1.0, 2.0, 3.0] {
            line.push(x);
        }
        assert_eq!(line.get(0), 3.0);
        assert_eq!(line.get(1), 2.0);
        assert_eq!(line.get(2), 1.0);
        assert_eq!(line.get(3), 0.0);

        line.push(4.0);
        line.push(5.0);
        assert_eq!(line.get(0), 5.0);
        assert_eq!(line.get(3), 2.0);
    }

    #[test]
    fn test_convolve_matches_shift_register() {
        let taps = [0.5, -0.25, 0.125, 2.0, 1.0];
        let input = [1.0f32, -2.0, 0.5, 3.0, 0.0, 4.0, -1.0, 0.25, 2.0];

        let mut line = DelayLine::new(taps.len());
        let mut shift = vec![0.0f64; taps.len()];

        for &x in &input {
            shift.rotate_right(1);
            shift[0] = x as f64;
            let expected: f64 = taps.iter().zip(&shift).map(|(t, s)| t * s).sum();
            assert_eq!(line.process(x, &taps) as f64, expected as f32 as f64);
        }
    }

    #[test]
    fn test_reset_within_capacity_does_not_reallocate() {
        let mut line = DelayLine::with_capacity(3, 129);
        line.push(1.0);
        let capacity = line.capacity();

        line.reset(129);
        assert_eq!(line.len(), 129);
        assert_eq!(line.capacity(), capacity);
        assert!((0..129).all(|k| line.get(k) == 0.0));

        line.reset(5);
        assert_eq!(line.len(), 5);
        assert_eq!(line.capacity(), capacity);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "exceeds reserved capacity")]
    fn test_reset_beyond_capacity_is_caught() {
        let mut line = DelayLine::with_capacity(3, 5);
        line.reset(7);
    }

    #[test]
    fn test_clear_keeps_length() {
        let mut line = DelayLine::new(3);
        line.push(1.0);
        line.push(2.0);
        line.clear();
        assert_eq!(line.len(), 3);
        assert_eq!(line.convolve(&[1.0, 1.0, 1.0]), 0.0);
    }
}

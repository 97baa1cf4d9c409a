use crate::error::ChainError;

/// Circular sample store addressed by a wrapping write cursor.
///
/// The cursor always lies in `[0, len)`.  Buffers are zero-filled on creation,
/// on `clear` and in any region added by a resize, so every read returns
/// either written audio or silence.
pub struct DelayLine {
    buffer: Vec<f32>,
    cursor: usize,
}

impl DelayLine {
    pub fn new(len: usize) -> Self {
        Self { buffer: vec![0.0; len.max(1)], cursor: 0 }
    }

    /// A line of `len` samples with room to grow to `capacity` without
    /// reallocating.
    pub fn with_capacity(len: usize, capacity: usize) -> Self {
        let len = len.max(1);
        let mut buffer = Vec::with_capacity(capacity.max(len));
        buffer.resize(len, 0.0);
        Self { buffer, cursor: 0 }
    }

    pub fn with_duration(seconds: f32, sample_rate: f32) -> Self {
        Self::new((seconds * sample_rate) as usize)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.buffer[self.cursor]
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.cursor] = sample;
    }

    /// Sample at `(cursor - offset) mod len`.
    #[inline]
    pub fn read_back(&self, offset: usize) -> f32 {
        let len = self.buffer.len();
        self.buffer[(self.cursor + len - offset % len) % len]
    }

    /// Swap the sample `offset` positions ahead of the cursor (wrapping) for
    /// `sample`, returning what was stored there.
    #[inline]
    pub fn exchange(&mut self, offset: usize, sample: f32) -> f32 {
        let idx = (self.cursor + offset) % self.buffer.len();
        std::mem::replace(&mut self.buffer[idx], sample)
    }

    #[inline]
    pub fn advance(&mut self) {
        self.cursor += 1;
        if self.cursor >= self.buffer.len() {
            self.cursor = 0;
        }
    }

    pub fn advance_by(&mut self, n: usize) {
        self.cursor = (self.cursor + n) % self.buffer.len();
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.cursor = 0;
    }

    /// Resize to `new_len`, keeping the overlapping prefix of the old content
    /// and clamping the cursor into the new bound.  On allocation failure the
    /// line is left exactly as it was.  Within the current capacity the
    /// buffer is resized in place.
    pub fn resize(&mut self, new_len: usize) -> Result<(), ChainError> {
        let new_len = new_len.max(1);
        if new_len == self.buffer.len() {
            return Ok(());
        }
        if new_len <= self.buffer.capacity() {
            self.buffer.resize(new_len, 0.0);
            self.cursor = self.cursor.min(new_len - 1);
            return Ok(());
        }
        let mut next: Vec<f32> = Vec::new();
        next.try_reserve_exact(new_len)
            .map_err(|_| ChainError::Allocation { requested: new_len })?;
        let keep = self.buffer.len().min(new_len);
        next.extend_from_slice(&self.buffer[..keep]);
        next.resize(new_len, 0.0);

        self.buffer = next;
        self.cursor = self.cursor.min(new_len - 1);
        Ok(())
    }

    /// Zero-extend so the line holds at least `min_len` samples.
    pub fn grow_to(&mut self, min_len: usize) -> Result<(), ChainError> {
        if min_len <= self.buffer.len() {
            return Ok(());
        }
        self.resize(min_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_back_wraps() {
        let mut line = DelayLine::new(4);
        for i in 0..6 {
            line.write(i as f32);
            line.advance();
        }
        // cursor is at 2; last write (5.0) sits at index 1
        assert_eq!(line.cursor(), 2);
        assert_eq!(line.read_back(1), 5.0);
        assert_eq!(line.read_back(4), 2.0);
        assert_eq!(line.read_back(5), 5.0);
    }

    #[test]
    fn resize_keeps_prefix_and_clamps_cursor() {
        let mut line = DelayLine::new(8);
        for i in 0..7 {
            line.write(i as f32 + 1.0);
            line.advance();
        }
        line.resize(4).unwrap();
        assert_eq!(line.len(), 4);
        assert_eq!(line.cursor(), 3);
        assert_eq!(line.current(), 4.0);

        line.resize(6).unwrap();
        assert_eq!(line.len(), 6);
        assert_eq!(line.read_back(3), 1.0);
        line.advance_by(2);
        assert_eq!(line.current(), 0.0);
    }

    #[test]
    fn failed_resize_keeps_buffer() {
        let mut line = DelayLine::new(8);
        for i in 0..5 {
            line.write(i as f32);
            line.advance();
        }
        assert!(matches!(line.resize(usize::MAX), Err(ChainError::Allocation { .. })));
        assert_eq!(line.len(), 8);
        assert_eq!(line.cursor(), 5);
        assert_eq!(line.read_back(1), 4.0);
    }

    #[test]
    fn resize_within_capacity_zeroes_regrown_tail() {
        let mut line = DelayLine::with_capacity(4, 16);
        let reserved = line.capacity();
        for i in 1..=4 {
            line.write(i as f32);
            line.advance();
        }
        line.resize(2).unwrap();
        line.resize(6).unwrap();
        assert_eq!(line.capacity(), reserved);
        assert_eq!(line.buffer, vec![1.0, 2.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(line.cursor(), 0);
    }

    #[test]
    fn grow_never_shrinks() {
        let mut line = DelayLine::new(10);
        line.grow_to(4).unwrap();
        assert_eq!(line.len(), 10);
        line.grow_to(16).unwrap();
        assert_eq!(line.len(), 16);
    }

    #[test]
    fn exchange_returns_previous() {
        let mut line = DelayLine::new(3);
        assert_eq!(line.exchange(4, 1.5), 0.0);
        assert_eq!(line.exchange(1, 2.0), 1.5);
    }
}

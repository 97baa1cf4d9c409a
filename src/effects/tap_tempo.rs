use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of most recent taps kept for averaging.
pub const MAX_TAPS: usize = 4;
/// A gap longer than this starts a fresh tap sequence.
pub const TAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Derives an interval from the spacing of user taps.
#[derive(Debug, Default)]
pub struct TapTempo {
    taps:     VecDeque<Instant>,
    last_tap: Option<Instant>,
}

impl TapTempo {
    pub fn new() -> Self {
        Self { taps: VecDeque::with_capacity(MAX_TAPS + 1), last_tap: None }
    }

    /// Record a tap at `now`.  Returns the mean inter-tap interval in seconds
    /// once at least two taps belong to the current sequence.
    pub fn tap(&mut self, now: Instant) -> Option<f32> {
        let stale = self.last_tap
            .map(|last| now.saturating_duration_since(last) > TAP_TIMEOUT)
            .unwrap_or(false);
        if stale {
            self.taps.clear();
        }

        self.taps.push_back(now);
        self.last_tap = Some(now);
        while self.taps.len() > MAX_TAPS {
            self.taps.pop_front();
        }

        self.interval()
    }

    pub fn interval(&self) -> Option<f32> {
        if self.taps.len() < 2 {
            return None;
        }
        let (first, last) = (self.taps.front()?, self.taps.back()?);
        let span = last.saturating_duration_since(*first).as_secs_f32();
        Some(span / (self.taps.len() - 1) as f32)
    }

    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    pub fn clear(&mut self) {
        self.taps.clear();
        self.last_tap = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    #[test]
    fn single_tap_gives_nothing() {
        let mut tt = TapTempo::new();
        assert_eq!(tt.tap(Instant::now()), None);
    }

    #[test]
    fn averages_intervals() {
        let t0 = Instant::now();
        let mut tt = TapTempo::new();
        tt.tap(t0);
        let a = tt.tap(t0 + ms(400)).unwrap();
        assert!((a - 0.4).abs() < 1e-4);
        let b = tt.tap(t0 + ms(1000)).unwrap();
        assert!((b - 0.5).abs() < 1e-4);
    }

    #[test]
    fn keeps_only_last_four() {
        let t0 = Instant::now();
        let mut tt = TapTempo::new();
        // first interval 1.5s, then three 0.3s intervals
        for t in [0, 1500, 1800, 2100, 2400] {
            tt.tap(t0 + ms(t));
        }
        assert_eq!(tt.tap_count(), MAX_TAPS);
        assert!((tt.interval().unwrap() - 0.3).abs() < 1e-4);
    }

    #[test]
    fn timeout_clears_history() {
        let t0 = Instant::now();
        let mut tt = TapTempo::new();
        tt.tap(t0);
        tt.tap(t0 + ms(500));
        assert_eq!(tt.tap(t0 + ms(3000)), None);
        assert_eq!(tt.tap_count(), 1);
    }
}

//! Tap-tempo estimation.

use arrayvec::ArrayVec;

/// Taps further apart than this start a new measurement.
const TAP_TIMEOUT_US: u64 = 3_000_000;

const MAX_INTERVALS: usize = 8;

/// Averages recent tap intervals into a BPM estimate.
#[derive(Debug)]
pub struct TapTempo {
    bpm: f32,
    last_tap_us: Option<u64>,
    intervals: ArrayVec<u64, MAX_INTERVALS>,
}

impl TapTempo {
    pub fn new() -> Self {
        Self {
            bpm: 120.0,
            last_tap_us: None,
            intervals: ArrayVec::new(),
        }
    }

    /// Seed the estimate and discard any measurement in progress.
    pub fn reset(&mut self, bpm: f32) {
        self.bpm = bpm;
        self.last_tap_us = None;
        self.intervals.clear();
    }

    /// Register a tap at the given monotonic time.
    pub fn tap(&mut self, now_us: u64) {
        if let Some(last) = self.last_tap_us {
            let interval = now_us.saturating_sub(last);
            if interval == 0 || interval > TAP_TIMEOUT_US {
                self.intervals.clear();
            } else {
                if self.intervals.is_full() {
                    self.intervals.remove(0);
                }
                self.intervals.push(interval);
                let sum: u64 = self.intervals.iter().sum();
                let average = sum as f32 / self.intervals.len() as f32;
                self.bpm = 60_000_000.0 / average;
            }
        }
        self.last_tap_us = Some(now_us);
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }
}

impl Default for TapTempo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_taps_give_their_tempo() {
        let mut tap = TapTempo::new();
        // 500 ms apart = 120 BPM
        for i in 0..5 {
            tap.tap(i * 500_000);
        }
        assert!((tap.bpm() - 120.0).abs() < 0.01);
    }

    #[test]
    fn first_tap_keeps_seed() {
        let mut tap = TapTempo::new();
        tap.reset(97.0);
        tap.tap(1_000_000);
        assert_eq!(tap.bpm(), 97.0);
    }

    #[test]
    fn long_gap_restarts_measurement() {
        let mut tap = TapTempo::new();
        tap.tap(0);
        tap.tap(500_000);
        assert!((tap.bpm() - 120.0).abs() < 0.01);
        // 10 s later: gap discarded, next pair measures fresh
        tap.tap(10_500_000);
        tap.tap(10_750_000); // 250 ms = 240 BPM
        assert!((tap.bpm() - 240.0).abs() < 0.01);
    }

    #[test]
    fn window_is_bounded() {
        let mut tap = TapTempo::new();
        // 16 slow taps, then 8 fast ones: only the fast window remains
        for i in 0..16 {
            tap.tap(i * 1_000_000);
        }
        let base = 16_000_000;
        for i in 0..=MAX_INTERVALS as u64 {
            tap.tap(base + i * 250_000);
        }
        assert!((tap.bpm() - 240.0).abs() < 1.0);
    }
}

//! Per-channel state: identity plus smoothing history.
//!
//! Channels are created once at startup and live for the process
//! lifetime - there is no dynamic add/remove.

use crate::sampler::Sample;
use crate::smoothing::SmoothingBuffer;

/// One analog channel and its smoothing history.
///
/// `smoothed` always reflects the truncating mean of the last
/// min(pushes, K) valid raw samples for this channel.
#[derive(Clone, Debug)]
pub struct Channel<const K: usize> {
    /// Logical channel index, 0-based.
    pub index: u8,
    /// Pin label (AIN number), carried for diagnostics only.
    pub pin: u8,
    /// Most recent valid raw reading.
    pub last_raw: u16,
    /// Current moving average.
    pub smoothed: u16,
    history: SmoothingBuffer<K>,
}

impl<const K: usize> Channel<K> {
    pub const fn new(index: u8, pin: u8) -> Self {
        Self {
            index,
            pin,
            last_raw: 0,
            smoothed: 0,
            history: SmoothingBuffer::new(),
        }
    }

    /// Feed one cycle's sample into the channel.
    ///
    /// `Valid` and `Clamped` readings update the history and the average.
    /// `Invalid` leaves both untouched so a single glitch cannot corrupt
    /// the average - the stale `smoothed` value is reused for this tick.
    ///
    /// Returns `true` when the smoothed value is fresh this cycle.
    pub fn apply(&mut self, sample: Sample) -> bool {
        match sample.value() {
            Some(raw) => {
                self.last_raw = raw;
                self.smoothed = self.history.push(raw);
                true
            }
            None => false,
        }
    }

    /// Drop the accumulated history (reconfiguration path).
    pub fn reset(&mut self) {
        self.history.reset();
        self.last_raw = 0;
        self.smoothed = 0;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_samples_update_average() {
        let mut ch = Channel::<4>::new(0, 2);
        assert!(ch.apply(Sample::Valid(100)));
        assert!(ch.apply(Sample::Valid(200)));
        assert_eq!(ch.last_raw, 200);
        assert_eq!(ch.smoothed, 150);
    }

    #[test]
    fn clamped_samples_still_count() {
        let mut ch = Channel::<4>::new(1, 3);
        assert!(ch.apply(Sample::Clamped(4095)));
        assert_eq!(ch.last_raw, 4095);
        assert_eq!(ch.smoothed, 4095);
    }

    #[test]
    fn invalid_sample_keeps_stale_value() {
        let mut ch = Channel::<4>::new(2, 4);
        ch.apply(Sample::Valid(1000));
        ch.apply(Sample::Valid(2000));
        let smoothed_before = ch.smoothed;

        assert!(!ch.apply(Sample::Invalid));
        assert_eq!(ch.smoothed, smoothed_before);
        assert_eq!(ch.last_raw, 2000);

        // The glitch is excluded from the window entirely: the next valid
        // sample averages against [1000, 2000] only.
        ch.apply(Sample::Valid(3000));
        assert_eq!(ch.smoothed, 2000);
    }

    #[test]
    fn reset_clears_state() {
        let mut ch = Channel::<4>::new(0, 2);
        ch.apply(Sample::Valid(1234));
        ch.reset();
        assert_eq!(ch.last_raw, 0);
        assert_eq!(ch.smoothed, 0);
        ch.apply(Sample::Valid(10));
        assert_eq!(ch.smoothed, 10);
    }
}

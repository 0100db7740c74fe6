//! Telemetry record assembly and wire encoding.
//!
//! One record is built per cycle, encoded, handed to the link session,
//! and discarded - records are never retained or queued across cycles.
//!
//! Wire format (one ASCII line per record, stable within a session):
//!
//! ```text
//! ADC:S=<seq>;C1=<mv>;C2=<mv>;C3=<mv>;U=<uptime_s>;M=<free_bytes>
//! ```
//!
//! Channel values are smoothed readings converted to integer millivolts.
//! A receiver can parse each line independently, without cross-record
//! state. Lines longer than [`BLE_MSG_MAX`] are truncated.

use core::fmt::Write;

use heapless::String;

use crate::config::BLE_MSG_MAX;
use crate::sampler::raw_to_millivolts;

/// Encoded wire message, capped at the notify characteristic size.
pub type WireMessage = String<BLE_MSG_MAX>;

/// Immutable snapshot of one cycle's telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<const N: usize> {
    /// Monotonic cycle counter; wraps to 0 after `u32::MAX`.
    pub seq: u32,
    /// Smoothed value per channel, in raw ADC counts.
    pub values: [u16; N],
    /// Seconds since boot.
    pub uptime_s: u32,
    /// Free-memory estimate in bytes (0 when the runtime has none).
    pub free_mem: u32,
}

impl<const N: usize> TelemetryRecord<N> {
    /// Render the record as a wire line. Writing past the capacity
    /// truncates the tail rather than failing the cycle.
    pub fn encode(&self) -> WireMessage {
        let mut msg = WireMessage::new();
        let _ = write!(&mut msg, "ADC:S={}", self.seq);
        for (i, &value) in self.values.iter().enumerate() {
            let _ = write!(&mut msg, ";C{}={}", i + 1, raw_to_millivolts(value));
        }
        let _ = write!(&mut msg, ";U={};M={}", self.uptime_s, self.free_mem);
        msg
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

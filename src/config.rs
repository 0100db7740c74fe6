//! Application-wide constants and compile-time configuration.
//!
//! All channel assignments, timing parameters, and protocol
//! constants live here so they can be tuned in one place.

// ADC channels

/// Number of analog channels sampled each cycle.
pub const ADC_CHANNEL_COUNT: usize = 3;

/// Logical pin labels for the sampled channels, in channel order.
///
/// On the nRF52840 these map to AIN0/AIN1/AIN2 (P0.02, P0.03, P0.04);
/// the actual `embassy_nrf` pin types are selected in `main.rs`.
pub const ADC_PINS: [u8; ADC_CHANNEL_COUNT] = [2, 3, 4];

/// Moving-average depth per channel (number of raw samples kept).
pub const ADC_SAMPLES: usize = 5;

/// Full-scale ADC reading (12-bit resolution).
pub const ADC_MAX_VALUE: u16 = 4095;

/// ADC reference voltage in millivolts, used for the wire-format conversion.
pub const ADC_VREF_MV: u32 = 3300;

// Timing

/// Interval between telemetry cycles (ms).
pub const READ_INTERVAL_MS: u64 = 100;

/// Housekeeping period, in cycles. Every this many cycles the coordinator
/// runs the memory-reclamation hook and emits a status summary.
/// 50 cycles at the default interval = every 5 s.
pub const HOUSEKEEPING_PERIOD_CYCLES: u32 = 50;

// Link policy

/// Consecutive Connected-send failures tolerated before the link is
/// declared dead and advertising restarts. 1 = a single failed
/// notification drops the link.
pub const SEND_FAILURE_LIMIT: u8 = 1;

/// Cycles to wait after a drop before advertising again.
/// Fixed (not exponential) - 10 cycles = 1 s at the default interval,
/// slow enough to avoid advertising storms.
pub const RECONNECT_BACKOFF_CYCLES: u32 = 10;

// BLE

/// GAP device name advertised to centrals.
pub const BLE_DEVICE_NAME: &str = "ADC-Server";

/// Maximum encoded telemetry message length (bytes). Longer messages are
/// truncated, matching the notify characteristic's value size.
pub const BLE_MSG_MAX: usize = 100;

//! Unified error type for adc2ble.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // BLE
    /// The transport returned a link-level error.
    Transport(TransportError),

    /// No BLE stack / SoftDevice could be initialised (fatal at boot).
    TransportNotAvailable,

    // ADC
    /// The ADC peripheral could not be acquired (fatal at boot).
    AdcNotAvailable,

    // Generic
    /// Buffer too small for the requested operation.
    BufferOverflow,
}

/// Subset of transport errors the link session reacts to
/// (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Advertising could not be started.
    AdvertiseFailed,
    /// A GATT notification could not be queued or delivered.
    NotifyFailed,
    /// The outbound queue is full - the link has stalled.
    Busy,
    /// Raw error code from the SoftDevice.
    Raw(u32),
}

// Convenience conversions

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

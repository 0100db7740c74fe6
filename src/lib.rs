//! Test-only library interface for adc2ble.
//!
//! This crate keeps all pipeline logic - smoothing, channel state, the
//! link state machine, record encoding, and the telemetry coordinator -
//! free of hardware dependencies so it can be tested on the host:
//!
//! Usage: `cargo test --lib`
//!
//! The embedded binary uses main.rs with #![no_std] and #![no_main] and
//! pulls in the feature-gated `adc` / `ble` modules, which adapt the
//! SAADC and the SoftDevice to the traits defined here.

#![cfg_attr(not(test), no_std)]

pub mod channel;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod link;
pub mod record;
pub mod sampler;
pub mod smoothing;

// Hardware adapters, only meaningful on the nRF52840 target.
#[cfg(feature = "embedded")]
pub mod adc;
#[cfg(feature = "embedded")]
pub mod ble;

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests - cross-module behavior (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

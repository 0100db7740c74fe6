//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **Advertiser** - makes the device connectable under its GAP name
//!    when the link session asks for it.
//! 2. **Telemetry service** - a single GATT characteristic the connected
//!    central subscribes to; each cycle's record goes out as one
//!    notification.
//!
//! The SoftDevice is owned by the BLE task; the telemetry task talks to
//! it exclusively through Embassy channels. [`BleTransport`] adapts
//! those channels to the synchronous [`Transport`] trait the link
//! session drives, so the state machine itself stays hardware-free.

pub mod peripheral;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use heapless::Vec;

use crate::config::BLE_MSG_MAX;
use crate::error::TransportError;
use crate::link::{LinkEvent, Transport};

/// Commands the link session sends to the BLE task.
#[derive(Clone, Copy, defmt::Format)]
pub enum BleCommand {
    /// Begin connectable advertising.
    StartAdvertising,
    /// Stop advertising and drop any live connection (shutdown path).
    StopAdvertising,
}

/// One encoded record on its way to the notify characteristic.
pub type NotifyPayload = Vec<u8, BLE_MSG_MAX>;

/// Queue depths for the inter-task channels.
pub const CMD_QUEUE_LEN: usize = 4;
pub const EVENT_QUEUE_LEN: usize = 8;
pub const PAYLOAD_QUEUE_LEN: usize = 4;

/// Channel-backed [`Transport`] handed to the link session.
///
/// All operations are `try_`-variants: the cycle never blocks on the
/// BLE task. A full payload queue means the radio side has stalled and
/// is reported as `Busy`, which the session treats as a send failure.
pub struct BleTransport {
    cmd_tx: Sender<'static, CriticalSectionRawMutex, BleCommand, CMD_QUEUE_LEN>,
    event_rx: Receiver<'static, CriticalSectionRawMutex, LinkEvent, EVENT_QUEUE_LEN>,
    payload_tx: Sender<'static, CriticalSectionRawMutex, NotifyPayload, PAYLOAD_QUEUE_LEN>,
}

impl BleTransport {
    pub fn new(
        cmd_tx: Sender<'static, CriticalSectionRawMutex, BleCommand, CMD_QUEUE_LEN>,
        event_rx: Receiver<'static, CriticalSectionRawMutex, LinkEvent, EVENT_QUEUE_LEN>,
        payload_tx: Sender<'static, CriticalSectionRawMutex, NotifyPayload, PAYLOAD_QUEUE_LEN>,
    ) -> Self {
        Self {
            cmd_tx,
            event_rx,
            payload_tx,
        }
    }
}

impl Transport for BleTransport {
    fn start_advertising(&mut self) -> Result<(), TransportError> {
        self.cmd_tx
            .try_send(BleCommand::StartAdvertising)
            .map_err(|_| TransportError::Busy)
    }

    fn stop_advertising(&mut self) {
        let _ = self.cmd_tx.try_send(BleCommand::StopAdvertising);
    }

    fn send_bytes(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let payload =
            NotifyPayload::from_slice(payload).map_err(|_| TransportError::NotifyFailed)?;
        self.payload_tx
            .try_send(payload)
            .map_err(|_| TransportError::Busy)
    }

    fn poll_event(&mut self) -> Option<LinkEvent> {
        self.event_rx.try_receive().ok()
    }
}

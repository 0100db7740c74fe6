//! Link session - the connection state machine over a wireless transport.
//!
//! States: `Disconnected -> Advertising -> Connected`, with every failure
//! path leading back to `Disconnected`. There is no terminal state; the
//! session retries indefinitely with a fixed, bounded backoff.
//!
//! Telemetry is lossy by design: a record offered while no peer is
//! attached is counted as dropped, never buffered or retried, so memory
//! stays bounded and a central never receives stale data after a gap.
//!
//! Separating `ensure_link` (retry policy) from `send` keeps transmission
//! best-effort: a stalled reconnection never blocks the sampling cycle.

use crate::error::TransportError;

/// Connection state of the wireless link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// No peer, not advertising. Initial and recovery state.
    Disconnected,
    /// Advertising, waiting for a central to connect.
    Advertising,
    /// A peer is attached; sends go out.
    Connected,
}

/// Transport-level events, drained once per cycle in [`LinkSession::poll`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// A central connected and subscribed.
    PeerConnected,
    /// The peer dropped the connection (or the stack lost it).
    PeerDisconnected,
}

/// Result of offering one record to the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendOutcome {
    /// Delivered to the transport while Connected.
    Sent,
    /// No peer attached; the record was discarded and counted.
    Dropped,
    /// A Connected send errored.
    Failed,
}

/// Wireless transport primitives the session drives.
///
/// All methods are synchronous and must return within the cycle budget;
/// the embedded implementation is a thin adapter over channels to the
/// BLE task, mocks implement it directly.
pub trait Transport {
    fn start_advertising(&mut self) -> Result<(), TransportError>;
    fn stop_advertising(&mut self);
    fn send_bytes(&mut self, payload: &[u8]) -> Result<(), TransportError>;
    /// Pop the next pending connect/disconnect event, if any.
    fn poll_event(&mut self) -> Option<LinkEvent>;
}

/// Reconnection and failure policy. Defaults come from [`crate::config`].
#[derive(Clone, Copy, Debug)]
pub struct LinkPolicy {
    /// Consecutive Connected-send failures before the link is dropped.
    pub send_failure_limit: u8,
    /// Cycles to wait after a drop before advertising again.
    pub reconnect_backoff_cycles: u32,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            send_failure_limit: crate::config::SEND_FAILURE_LIMIT,
            reconnect_backoff_cycles: crate::config::RECONNECT_BACKOFF_CYCLES,
        }
    }
}

/// Owns the transport and the connection state machine.
pub struct LinkSession<T: Transport> {
    transport: T,
    state: LinkState,
    policy: LinkPolicy,
    /// Cycles left before the next advertising attempt.
    backoff_remaining: u32,
    consecutive_send_failures: u8,
    dropped_records: u32,
    sent_records: u32,
}

impl<T: Transport> LinkSession<T> {
    pub fn new(transport: T, policy: LinkPolicy) -> Self {
        Self {
            transport,
            state: LinkState::Disconnected,
            policy,
            backoff_remaining: 0,
            consecutive_send_failures: 0,
            dropped_records: 0,
            sent_records: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Records discarded because no peer was attached. Never decremented.
    pub fn dropped_records(&self) -> u32 {
        self.dropped_records
    }

    pub fn sent_records(&self) -> u32 {
        self.sent_records
    }

    /// Advance transport callbacks and the backoff timer.
    ///
    /// Must be invoked every cycle; together with [`Self::ensure_link`]
    /// and the send-failure limit this is the only place the state
    /// machine changes.
    pub fn poll(&mut self) {
        while let Some(event) = self.transport.poll_event() {
            match event {
                LinkEvent::PeerConnected => {
                    self.state = LinkState::Connected;
                    self.consecutive_send_failures = 0;
                }
                LinkEvent::PeerDisconnected => self.drop_link(),
            }
        }

        if self.state == LinkState::Disconnected && self.backoff_remaining > 0 {
            self.backoff_remaining -= 1;
        }
    }

    /// Start advertising when disconnected and the backoff has elapsed.
    pub fn ensure_link(&mut self) {
        if self.state != LinkState::Disconnected || self.backoff_remaining > 0 {
            return;
        }
        match self.transport.start_advertising() {
            Ok(()) => self.state = LinkState::Advertising,
            // Re-arm the backoff so a broken stack cannot spin us.
            Err(_) => self.backoff_remaining = self.policy.reconnect_backoff_cycles,
        }
    }

    /// Offer one encoded record to the link.
    ///
    /// The transport is only ever touched while Connected. A failed send
    /// counts toward the failure limit; reaching it drops the link and
    /// arms the reconnect backoff.
    pub fn send(&mut self, payload: &[u8]) -> SendOutcome {
        match self.state {
            LinkState::Connected => match self.transport.send_bytes(payload) {
                Ok(()) => {
                    self.consecutive_send_failures = 0;
                    self.sent_records = self.sent_records.wrapping_add(1);
                    SendOutcome::Sent
                }
                Err(_) => {
                    self.consecutive_send_failures += 1;
                    if self.consecutive_send_failures >= self.policy.send_failure_limit {
                        self.drop_link();
                    }
                    SendOutcome::Failed
                }
            },
            _ => {
                self.dropped_records += 1;
                SendOutcome::Dropped
            }
        }
    }

    /// Release the link cleanly: stop advertising, forget the peer.
    /// Used on the shutdown path; safe in any state.
    pub fn shutdown(&mut self) {
        self.transport.stop_advertising();
        self.state = LinkState::Disconnected;
        self.backoff_remaining = 0;
        self.consecutive_send_failures = 0;
    }

    fn drop_link(&mut self) {
        self.state = LinkState::Disconnected;
        self.backoff_remaining = self.policy.reconnect_backoff_cycles;
        self.consecutive_send_failures = 0;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

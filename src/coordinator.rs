//! Telemetry coordinator - drives the periodic sample/smooth/send cycle.
//!
//! The coordinator is the top-level supervisor of the pipeline: it never
//! stops on recoverable trouble. Sample faults are isolated per channel,
//! link trouble is absorbed by the session's state machine, and each tick
//! returns a [`CycleSummary`] so the caller can log status without the
//! core doing any I/O of its own.
//!
//! `N` is the channel count, `K` the smoothing depth; both are fixed at
//! construction. All collaborators are owned values passed in, never
//! process-wide singletons, so tests substitute mocks freely.

use crate::channel::Channel;
use crate::link::{LinkSession, SendOutcome, Transport};
use crate::record::TelemetryRecord;
use crate::sampler::Sampler;

/// Runtime memory-reclamation hook, invoked every housekeeping period.
///
/// On runtimes with implicit reclamation this maps to a collector hint;
/// with static allocation it is a no-op that only reports headroom.
pub trait Housekeeping {
    /// Hint the runtime to reclaim memory; returns bytes freed (0 if no-op).
    fn reclaim(&mut self) -> u32;
    /// Current free-memory estimate in bytes.
    fn free_memory(&self) -> u32;
}

/// Housekeeping for fully statically allocated targets.
pub struct NoopHousekeeping;

impl Housekeeping for NoopHousekeeping {
    fn reclaim(&mut self) -> u32 {
        0
    }

    fn free_memory(&self) -> u32 {
        0
    }
}

/// What one cycle did, for status logging by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleSummary {
    /// Sequence number of the record this cycle produced.
    pub seq: u32,
    pub outcome: SendOutcome,
    /// Channels that produced a fresh smoothed value this cycle.
    pub fresh_channels: u8,
    /// Channels whose read failed; their stale smoothed value was reused.
    pub stale_channels: u8,
    /// Channels whose reading had to be clamped into range.
    pub clamped_channels: u8,
    /// Bytes reclaimed, when the housekeeping hook ran this cycle.
    pub reclaimed: Option<u32>,
}

/// Owns the whole pipeline and its failure policy.
pub struct TelemetryCoordinator<S, T, H, const N: usize, const K: usize>
where
    S: Sampler<N>,
    T: Transport,
    H: Housekeeping,
{
    sampler: S,
    link: LinkSession<T>,
    housekeeping: H,
    channels: [Channel<K>; N],
    /// Next record's sequence number; wraps to 0 after `u32::MAX`.
    seq: u32,
    cycles: u32,
    housekeeping_period: u32,
}

impl<S, T, H, const N: usize, const K: usize> TelemetryCoordinator<S, T, H, N, K>
where
    S: Sampler<N>,
    T: Transport,
    H: Housekeeping,
{
    /// `housekeeping_period` is in cycles and must be at least 2 - the
    /// reclamation hint is deliberately decoupled from the tick rate.
    pub fn new(
        sampler: S,
        link: LinkSession<T>,
        housekeeping: H,
        pins: [u8; N],
        housekeeping_period: u32,
    ) -> Self {
        debug_assert!(housekeeping_period > 1);
        Self {
            sampler,
            link,
            housekeeping,
            channels: core::array::from_fn(|i| Channel::new(i as u8, pins[i])),
            seq: 0,
            cycles: 0,
            housekeeping_period,
        }
    }

    /// Run one full cycle: sample -> smooth -> assemble -> poll -> send,
    /// plus periodic housekeeping. Never blocks, never fails; trouble is
    /// reported through the summary.
    pub fn run_cycle(&mut self, uptime_s: u32) -> CycleSummary {
        let samples = self.sampler.read_all();

        let mut fresh = 0u8;
        let mut stale = 0u8;
        let mut clamped = 0u8;
        for (channel, sample) in self.channels.iter_mut().zip(samples.iter()) {
            if sample.is_clamped() {
                clamped += 1;
            }
            if channel.apply(*sample) {
                fresh += 1;
            } else {
                stale += 1;
            }
        }

        let record = TelemetryRecord::<N> {
            seq: self.seq,
            values: core::array::from_fn(|i| self.channels[i].smoothed),
            uptime_s,
            free_mem: self.housekeeping.free_memory(),
        };

        self.link.poll();
        self.link.ensure_link();
        let outcome = self.link.send(record.encode().as_bytes());

        self.seq = self.seq.wrapping_add(1);
        self.cycles = self.cycles.wrapping_add(1);

        let reclaimed = if self.cycles % self.housekeeping_period == 0 {
            Some(self.housekeeping.reclaim())
        } else {
            None
        };

        CycleSummary {
            seq: record.seq,
            outcome,
            fresh_channels: fresh,
            stale_channels: stale,
            clamped_channels: clamped,
            reclaimed,
        }
    }

    /// Link status, for the periodic status line.
    pub fn link(&self) -> &LinkSession<T> {
        &self.link
    }

    /// Per-channel state, newest smoothed values included.
    pub fn channels(&self) -> &[Channel<K>; N] {
        &self.channels
    }

    /// Release link resources cleanly and run a final reclamation pass.
    /// Called on every exit path before the process stops.
    pub fn shutdown(&mut self) {
        self.link.shutdown();
        let _ = self.housekeeping.reclaim();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::link::{LinkEvent, LinkPolicy, LinkState};
    use crate::sampler::Sample;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    struct ScriptedSampler {
        /// One entry per cycle; the last entry repeats.
        script: Vec<[Sample; 3]>,
        cycle: usize,
    }

    impl Sampler<3> for ScriptedSampler {
        fn read_all(&mut self) -> [Sample; 3] {
            let idx = self.cycle.min(self.script.len() - 1);
            self.cycle += 1;
            self.script[idx]
        }
    }

    /// State shared between the transport double and the test body,
    /// since the coordinator owns the transport itself.
    #[derive(Default)]
    struct TransportState {
        events: VecDeque<LinkEvent>,
        sent: Vec<String>,
    }

    #[derive(Clone)]
    struct MockTransport(Rc<RefCell<TransportState>>);

    impl MockTransport {
        fn new() -> Self {
            Self(Rc::new(RefCell::new(TransportState::default())))
        }

        fn push_event(&self, event: LinkEvent) {
            self.0.borrow_mut().events.push_back(event);
        }

        fn sent(&self) -> Vec<String> {
            self.0.borrow().sent.clone()
        }
    }

    impl Transport for MockTransport {
        fn start_advertising(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        fn stop_advertising(&mut self) {}

        fn send_bytes(&mut self, payload: &[u8]) -> Result<(), TransportError> {
            self.0
                .borrow_mut()
                .sent
                .push(String::from_utf8(payload.to_vec()).unwrap());
            Ok(())
        }

        fn poll_event(&mut self) -> Option<LinkEvent> {
            self.0.borrow_mut().events.pop_front()
        }
    }

    struct CountingHousekeeping {
        reclaims: Rc<RefCell<u32>>,
        free: u32,
    }

    impl Housekeeping for CountingHousekeeping {
        fn reclaim(&mut self) -> u32 {
            *self.reclaims.borrow_mut() += 1;
            128
        }

        fn free_memory(&self) -> u32 {
            self.free
        }
    }

    struct Fixture {
        coord:
            TelemetryCoordinator<ScriptedSampler, MockTransport, CountingHousekeeping, 3, 4>,
        transport: MockTransport,
        reclaims: Rc<RefCell<u32>>,
    }

    fn fixture_with_free(script: Vec<[Sample; 3]>, free: u32) -> Fixture {
        let sampler = ScriptedSampler { script, cycle: 0 };
        let transport = MockTransport::new();
        let link = LinkSession::new(
            transport.clone(),
            LinkPolicy {
                send_failure_limit: 1,
                reconnect_backoff_cycles: 2,
            },
        );
        let reclaims = Rc::new(RefCell::new(0));
        let housekeeping = CountingHousekeeping {
            reclaims: reclaims.clone(),
            free,
        };
        Fixture {
            coord: TelemetryCoordinator::new(sampler, link, housekeeping, [2, 3, 4], 5),
            transport,
            reclaims,
        }
    }

    fn fixture(script: Vec<[Sample; 3]>) -> Fixture {
        fixture_with_free(script, 4096)
    }

    fn all_valid(v: u16) -> [Sample; 3] {
        [Sample::Valid(v), Sample::Valid(v), Sample::Valid(v)]
    }

    #[test]
    fn first_cycle_drops_while_nobody_listens() {
        let mut f = fixture(vec![all_valid(1000)]);
        let summary = f.coord.run_cycle(0);

        assert_eq!(summary.seq, 0);
        assert_eq!(summary.outcome, SendOutcome::Dropped);
        assert_eq!(summary.fresh_channels, 3);
        assert_eq!(f.coord.link().dropped_records(), 1);
        // The ensure-link pass started advertising for the next cycle.
        assert_eq!(f.coord.link().state(), LinkState::Advertising);
    }

    #[test]
    fn invalid_channel_reuses_stale_value_without_aborting() {
        let mut f = fixture(vec![
            [
                Sample::Valid(1000),
                Sample::Valid(2000),
                Sample::Valid(3000),
            ],
            [Sample::Valid(1000), Sample::Invalid, Sample::Valid(3000)],
        ]);

        f.coord.run_cycle(0);
        let summary = f.coord.run_cycle(1);

        assert_eq!(summary.fresh_channels, 2);
        assert_eq!(summary.stale_channels, 1);
        // Channel 1 kept its previous smoothed value.
        assert_eq!(f.coord.channels()[1].smoothed, 2000);
        // And the record still went through the full path (dropped, counted).
        assert_eq!(f.coord.link().dropped_records(), 2);
    }

    #[test]
    fn connected_cycles_deliver_wire_lines() {
        let mut f = fixture(vec![all_valid(2048)]);
        f.coord.run_cycle(0);
        f.transport.push_event(LinkEvent::PeerConnected);

        let summary = f.coord.run_cycle(1);
        assert_eq!(summary.outcome, SendOutcome::Sent);
        assert_eq!(
            f.transport.sent(),
            vec!["ADC:S=1;C1=1650;C2=1650;C3=1650;U=1;M=4096".to_string()]
        );
    }

    #[test]
    fn clamped_channels_are_counted_but_used() {
        let mut f = fixture(vec![[
            Sample::Clamped(0),
            Sample::Valid(500),
            Sample::Clamped(4095),
        ]]);
        let summary = f.coord.run_cycle(0);

        assert_eq!(summary.clamped_channels, 2);
        assert_eq!(summary.fresh_channels, 3);
        assert_eq!(f.coord.channels()[2].smoothed, 4095);
    }

    #[test]
    fn housekeeping_runs_every_period() {
        let mut f = fixture(vec![all_valid(100)]);
        let mut reclaim_cycles = Vec::new();
        for cycle in 0..12 {
            if f.coord.run_cycle(cycle).reclaimed.is_some() {
                reclaim_cycles.push(cycle);
            }
        }
        // Period 5: cycles 4 and 9 (0-based) complete the 5th and 10th tick.
        assert_eq!(reclaim_cycles, vec![4, 9]);
        assert_eq!(*f.reclaims.borrow(), 2);
    }

    #[test]
    fn sequence_numbers_increase_and_wrap() {
        let mut f = fixture(vec![all_valid(100)]);
        assert_eq!(f.coord.run_cycle(0).seq, 0);
        assert_eq!(f.coord.run_cycle(1).seq, 1);

        f.coord.seq = u32::MAX;
        assert_eq!(f.coord.run_cycle(2).seq, u32::MAX);
        // Wraps to zero instead of overflowing.
        assert_eq!(f.coord.run_cycle(3).seq, 0);
    }

    #[test]
    fn free_memory_estimate_lands_in_record() {
        let mut f = fixture_with_free(vec![all_valid(0)], 777);
        f.coord.run_cycle(0);
        f.transport.push_event(LinkEvent::PeerConnected);
        f.coord.run_cycle(1);
        assert!(f.transport.sent()[0].ends_with(";M=777"));
    }

    #[test]
    fn shutdown_releases_link_and_reclaims() {
        let mut f = fixture(vec![all_valid(100)]);
        f.coord.run_cycle(0);
        f.coord.shutdown();
        assert_eq!(f.coord.link().state(), LinkState::Disconnected);
        assert_eq!(*f.reclaims.borrow(), 1);
    }
}

//! adc2ble firmware entry point (nRF52840 + SoftDevice S140).
//!
//! Wires the hardware-free pipeline from the library crate to the real
//! collaborators: the SAADC sampler, the SoftDevice BLE peripheral task,
//! and the embassy tick driving the telemetry cycle.
//!
//! A failure to bring up the SoftDevice or the SAADC here is the one
//! fatal condition in the system; `unwrap!` halts with a diagnostic via
//! panic-probe. Everything after boot recovers on its own.

#![no_std]
#![no_main]

use adc2ble::adc::SaadcSampler;
use adc2ble::ble::peripheral::{ble_task, Server};
use adc2ble::ble::{
    BleCommand, BleTransport, NotifyPayload, CMD_QUEUE_LEN, EVENT_QUEUE_LEN, PAYLOAD_QUEUE_LEN,
};
use adc2ble::config;
use adc2ble::coordinator::{Housekeeping, TelemetryCoordinator};
use adc2ble::link::{LinkEvent, LinkPolicy, LinkSession, LinkState};
use defmt::{info, unwrap, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::saadc::{self, ChannelConfig, Saadc};
use embassy_nrf::bind_interrupts;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Ticker};
use nrf_softdevice::{raw, Softdevice};
use panic_probe as _;
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    SAADC => saadc::InterruptHandler;
});

// Inter-task plumbing: commands in, link events and payloads out.
static BLE_CMD: Channel<CriticalSectionRawMutex, BleCommand, CMD_QUEUE_LEN> = Channel::new();
static LINK_EVENTS: Channel<CriticalSectionRawMutex, LinkEvent, EVENT_QUEUE_LEN> = Channel::new();
static PAYLOADS: Channel<CriticalSectionRawMutex, NotifyPayload, PAYLOAD_QUEUE_LEN> =
    Channel::new();

const N: usize = config::ADC_CHANNEL_COUNT;
const K: usize = config::ADC_SAMPLES;

type Coordinator =
    TelemetryCoordinator<SaadcSampler<'static, N>, BleTransport, StackHeadroom, N, K>;

/// Housekeeping for a statically allocated firmware: nothing to reclaim,
/// and the free-memory estimate is the gap between the current main
/// stack pointer and the end of the static data (the classic headroom
/// measure on cortex-m).
struct StackHeadroom;

impl Housekeeping for StackHeadroom {
    fn reclaim(&mut self) -> u32 {
        0
    }

    fn free_memory(&self) -> u32 {
        extern "C" {
            static mut __sheap: u8;
        }
        let data_end = unsafe { core::ptr::addr_of!(__sheap) as u32 };
        cortex_m::register::msp::read().saturating_sub(data_end)
    }
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn ble_runner(sd: &'static Softdevice, server: &'static Server) -> ! {
    ble_task(
        sd,
        server,
        &BLE_CMD.receiver(),
        &LINK_EVENTS.sender(),
        &PAYLOADS.receiver(),
    )
    .await
}

#[embassy_executor::task]
async fn telemetry_task(mut coordinator: Coordinator) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(config::READ_INTERVAL_MS));

    loop {
        ticker.next().await;
        let uptime_s = Instant::now().as_secs() as u32;
        let summary = coordinator.run_cycle(uptime_s);

        if summary.stale_channels > 0 || summary.clamped_channels > 0 {
            warn!(
                "cycle {}: {} stale, {} clamped channels",
                summary.seq, summary.stale_channels, summary.clamped_channels
            );
        }

        // Status line rides on the housekeeping cadence.
        if summary.reclaimed.is_some() {
            let link = coordinator.link();
            info!(
                "status: {:?} | uptime {}s | sent {} dropped {}",
                link.state(),
                uptime_s,
                link.sent_records(),
                link.dropped_records()
            );
            if link.state() != LinkState::Connected {
                info!("waiting for a central...");
            }
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("=== {} starting ===", config::BLE_DEVICE_NAME);

    let mut nrf_config = embassy_nrf::config::Config::default();
    // The SoftDevice owns the highest interrupt priorities.
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);

    // SAADC below the radio so conversions never delay BLE events.
    interrupt::SAADC.set_priority(Priority::P3);
    let channels = [
        ChannelConfig::single_ended(p.P0_02), // AIN0
        ChannelConfig::single_ended(p.P0_03), // AIN1
        ChannelConfig::single_ended(p.P0_04), // AIN2
    ];
    let saadc = Saadc::new(p.SAADC, Irqs, saadc::Config::default(), channels);
    let mut sampler = SaadcSampler::new(saadc);
    sampler.calibrate().await;

    let sd = Softdevice::enable(&softdevice_config());
    static SERVER: StaticCell<Server> = StaticCell::new();
    let server = SERVER.init(unwrap!(Server::new(sd)));
    let sd: &'static Softdevice = sd;

    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(ble_runner(sd, server)));

    let transport = BleTransport::new(
        BLE_CMD.sender(),
        LINK_EVENTS.receiver(),
        PAYLOADS.sender(),
    );
    let link = LinkSession::new(transport, LinkPolicy::default());
    let coordinator = TelemetryCoordinator::new(
        sampler,
        link,
        StackHeadroom,
        config::ADC_PINS,
        config::HOUSEKEEPING_PERIOD_CYCLES,
    );

    info!(
        "pipeline up: {} channels, depth {}, {} ms cycle",
        N, K, config::READ_INTERVAL_MS
    );
    unwrap!(spawner.spawn(telemetry_task(coordinator)));
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 128 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: config::BLE_DEVICE_NAME.as_ptr() as _,
            current_len: config::BLE_DEVICE_NAME.len() as u16,
            max_len: config::BLE_DEVICE_NAME.len() as u16,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

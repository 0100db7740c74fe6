//! SoftDevice peripheral task: advertising, connection, notifications.
//!
//! One connectable peer at a time. The task idles until the link session
//! commands advertising, then advertises until a central connects,
//! serves telemetry notifications for the life of the connection, and
//! reports the connect/disconnect transitions back over the event
//! channel. It never terminates; recovery policy lives in the session.

use defmt::{info, warn};
use embassy_futures::select::{select, select3, Either, Either3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use heapless::Vec;
use nrf_softdevice::ble::{gatt_server, peripheral, Connection};
use nrf_softdevice::Softdevice;

use crate::ble::{BleCommand, NotifyPayload, CMD_QUEUE_LEN, EVENT_QUEUE_LEN, PAYLOAD_QUEUE_LEN};
use crate::config;
use crate::link::LinkEvent;

/// Telemetry-over-GATT service: one read/notify characteristic carrying
/// the encoded record line.
#[nrf_softdevice::gatt_service(uuid = "59462f12-9543-9999-12c8-58b459a2712d")]
pub struct TelemetryService {
    #[characteristic(uuid = "5c3a659e-897e-45e1-b016-007107c96df6", read, notify)]
    record: NotifyPayload,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub telemetry: TelemetryService,
}

/// Advertising payload: flags + complete local name.
fn adv_data() -> Vec<u8, 31> {
    let mut adv = Vec::new();
    // LE General Discoverable, BR/EDR not supported.
    let _ = adv.extend_from_slice(&[0x02, 0x01, 0x06]);
    let name = config::BLE_DEVICE_NAME.as_bytes();
    let _ = adv.push(name.len() as u8 + 1);
    let _ = adv.push(0x09); // Complete Local Name
    let _ = adv.extend_from_slice(name);
    adv
}

/// Scan-response payload: the 128-bit telemetry service UUID, so
/// scanners can filter on it before connecting.
#[rustfmt::skip]
static SCAN_DATA: [u8; 18] = [
    0x11, 0x07, // len=17, Complete List of 128-bit Service UUIDs
    0x2d, 0x71, 0xa2, 0x59, 0xb4, 0x58, 0xc8, 0x12,
    0x99, 0x99, 0x43, 0x95, 0x12, 0x2f, 0x46, 0x59,
];

pub async fn ble_task(
    sd: &'static Softdevice,
    server: &'static Server,
    cmd_rx: &Receiver<'static, CriticalSectionRawMutex, BleCommand, CMD_QUEUE_LEN>,
    event_tx: &Sender<'static, CriticalSectionRawMutex, LinkEvent, EVENT_QUEUE_LEN>,
    payload_rx: &Receiver<'static, CriticalSectionRawMutex, NotifyPayload, PAYLOAD_QUEUE_LEN>,
) -> ! {
    let mut pending_cmd: Option<BleCommand> = None;

    loop {
        let cmd = match pending_cmd.take() {
            Some(cmd) => cmd,
            None => cmd_rx.receive().await,
        };

        match cmd {
            // Nothing to stop while idle.
            BleCommand::StopAdvertising => {}
            BleCommand::StartAdvertising => {
                let adv = adv_data();
                let advertisement = peripheral::ConnectableAdvertisement::ScannableUndirected {
                    adv_data: &adv,
                    scan_data: &SCAN_DATA,
                };
                let adv_config = peripheral::Config::default();

                info!("advertising as {}", config::BLE_DEVICE_NAME);
                let advertise = peripheral::advertise_connectable(sd, advertisement, &adv_config);

                let conn = match select(cmd_rx.receive(), advertise).await {
                    Either::First(next_cmd) => {
                        // A newer command cancels the advertising window.
                        pending_cmd = Some(next_cmd);
                        continue;
                    }
                    Either::Second(Ok(conn)) => conn,
                    Either::Second(Err(e)) => {
                        warn!("advertising failed: {:?}", e);
                        // Report a drop so the session re-arms its backoff
                        // instead of waiting for a peer that cannot come.
                        event_tx.send(LinkEvent::PeerDisconnected).await;
                        continue;
                    }
                };

                info!("central connected");
                event_tx.send(LinkEvent::PeerConnected).await;

                serve_connection(server, &conn, cmd_rx, payload_rx).await;

                info!("central disconnected");
                drain_stale_payloads(payload_rx);
                event_tx.send(LinkEvent::PeerDisconnected).await;
            }
        }
    }
}

/// Serve one connection until the peer leaves or shutdown is commanded.
async fn serve_connection(
    server: &'static Server,
    conn: &Connection,
    cmd_rx: &Receiver<'static, CriticalSectionRawMutex, BleCommand, CMD_QUEUE_LEN>,
    payload_rx: &Receiver<'static, CriticalSectionRawMutex, NotifyPayload, PAYLOAD_QUEUE_LEN>,
) {
    let gatt = gatt_server::run(conn, server, |e| match e {
        ServerEvent::Telemetry(TelemetryServiceEvent::RecordCccdWrite { notifications }) => {
            info!("notifications {}", if notifications { "on" } else { "off" });
        }
    });

    let stream = async {
        loop {
            let payload = payload_rx.receive().await;
            // Best-effort: a notify refused here (CCCD off, stack queue
            // full) is not a link failure; delivery resumes with the
            // next record.
            if let Err(e) = server.telemetry.record_notify(conn, &payload) {
                warn!("notify failed: {:?}", e);
            }
        }
    };

    let commands = async {
        loop {
            if let BleCommand::StopAdvertising = cmd_rx.receive().await {
                break;
            }
        }
    };

    match select3(gatt, stream, commands).await {
        Either3::First(e) => {
            info!("gatt server exited: {:?}", e);
        }
        Either3::Second(_) => unreachable!(),
        Either3::Third(()) => {
            // Shutdown: release the peer cleanly.
            let _ = conn.disconnect();
        }
    }
}

/// Discard records queued while nobody was listening - telemetry is
/// never delivered late.
fn drain_stale_payloads(
    payload_rx: &Receiver<'static, CriticalSectionRawMutex, NotifyPayload, PAYLOAD_QUEUE_LEN>,
) {
    while payload_rx.try_receive().is_ok() {}
}

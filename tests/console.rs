//! Exchanges with a fake console listening on loopback.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use airtouch_tools::connection::{self, Connection};
use airtouch_tools::protocol::control::encode_record;
use airtouch_tools::protocol::fields::{AC_CONTROL, AC_STATUS, GROUP_CONTROL, GROUP_STATUS};
use airtouch_tools::protocol::message::{AirTouchCodec, HEADER_LEN};
use airtouch_tools::protocol::status::ReportedMode;
use airtouch_tools::protocol::{self, AcMode, PowerState, bitfield};
use futures::StreamExt as _;
use futures_util::SinkExt as _;
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

type Requests = Arc<Mutex<Vec<Vec<u8>>>>;

fn ac_status_reply(mode: u64) -> Vec<u8> {
    let record = encode_record(
        &AC_STATUS,
        &[
            ("PowerState", 1),
            ("AcMode", mode),
            ("AcFanSpeed", 2),
            ("AcTargetSetpoint", 22),
            ("Temperature", 745),
        ],
    )
    .unwrap();
    protocol::frame(0x2d, &record).unwrap()
}

fn group_status_reply(setpoint: u64) -> Vec<u8> {
    let mut payload = encode_record(
        &GROUP_STATUS,
        &[
            ("PowerState", 1),
            ("GroupNumber", 0),
            ("OpenPercentage", 100),
            ("TargetSetpoint", setpoint),
            ("Temperature", 735),
        ],
    )
    .unwrap();
    payload.extend(
        encode_record(
            &GROUP_STATUS,
            &[("GroupNumber", 1), ("OpenPercentage", 40), ("TargetSetpoint", 20), ("Temperature", 700)],
        )
        .unwrap(),
    );
    protocol::frame(0x2b, &payload).unwrap()
}

fn group_name_reply() -> Vec<u8> {
    let mut payload = vec![0xff, 0x13];
    payload.extend(b"\x00Living\x00\x00");
    payload.extend(b"\x01Bedroom\x00");
    protocol::frame(0x1f, &payload).unwrap()
}

fn reply_to(request: &[u8]) -> Vec<u8> {
    let payload = &request[HEADER_LEN..];
    match request[5] {
        0x2d => ac_status_reply(4),
        0x2b => group_status_reply(23),
        0x1f => group_name_reply(),
        0x2c => {
            let mode = bitfield::decode(payload, AC_CONTROL.get("AcMode").unwrap()).unwrap();
            ac_status_reply(mode)
        }
        0x2a => {
            let setpoint =
                bitfield::decode(payload, GROUP_CONTROL.get("TargetSetting").unwrap()).unwrap();
            group_status_reply(setpoint)
        }
        other => panic!("unexpected message type {other:#x}"),
    }
}

/// Serve every connection with `respond` until the test ends.
async fn fake_console(respond: fn(&[u8]) -> Vec<u8>) -> (String, Requests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let requests = Requests::default();
    let seen = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            let mut io = Framed::new(socket, AirTouchCodec::default());
            let Some(Ok(request)) = io.next().await else { continue };
            seen.lock().unwrap().push(request.clone());
            io.send(&respond(&request)[..]).await.unwrap();
        }
    });
    (address, requests)
}

fn connect(address: String, verify_checksum: bool) -> Connection {
    Connection::new(connection::Args {
        address,
        timeout: Duration::from_secs(5).into(),
        verify_checksum,
    })
}

#[tokio::test]
async fn ac_status() {
    let (address, requests) = fake_console(reply_to).await;
    let status = connect(address, true).ac_status().await.unwrap();
    assert_eq!(status.power_state, 1);
    assert_eq!(status.mode, ReportedMode::Known(AcMode::Cool));
    assert_eq!(status.fan_speed, 2);
    assert_eq!(status.target_setpoint, 22);
    assert_eq!(status.temperature, 24.5);
    assert_eq!(requests.lock().unwrap()[0], protocol::message::AC_STATUS_QUERY[..10]);
}

#[tokio::test]
async fn groups_are_named() {
    let (address, requests) = fake_console(reply_to).await;
    let groups = connect(address, true).groups(4).await.unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].name, "Living");
    assert_eq!(groups[0].power_state, PowerState::On);
    assert_eq!(groups[0].temperature, 23.5);
    assert_eq!(groups[1].name, "Bedroom");
    assert_eq!(groups[1].power_state, PowerState::Off);
    assert_eq!(groups[1].open_percentage, 40);
    assert_eq!(requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn group_limit() {
    let (address, _) = fake_console(reply_to).await;
    let groups = connect(address, true).groups(1).await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].name, "Living");
}

#[tokio::test]
async fn set_mode() {
    let (address, requests) = fake_console(reply_to).await;
    let status = connect(address, true).set_mode(AcMode::Fan).await.unwrap();
    assert_eq!(status.mode, ReportedMode::Known(AcMode::Fan));
    let sent = requests.lock().unwrap()[0].clone();
    assert_eq!(sent, protocol::encode_ac_control(AcMode::Fan).unwrap());
    assert_eq!(&sent[HEADER_LEN..HEADER_LEN + 4], [0x00, 0x3f, 0x3f, 0x00]);
}

#[tokio::test]
async fn set_group_temperature() {
    let (address, _) = fake_console(reply_to).await;
    let groups = connect(address, true).set_group_temperature(0, 21, 4).await.unwrap();
    assert_eq!(groups[0].target_setpoint, 21);
}

#[tokio::test]
async fn garbage_before_reply_is_skipped() {
    let (address, _) = fake_console(|request| {
        let mut reply = vec![0x00, 0x55, 0x13];
        reply.extend(reply_to(request));
        reply
    })
    .await;
    let status = connect(address, true).ac_status().await.unwrap();
    assert_eq!(status.mode, ReportedMode::Known(AcMode::Cool));
}

fn corrupted(request: &[u8]) -> Vec<u8> {
    let mut reply = reply_to(request);
    if let Some(last) = reply.last_mut() {
        *last ^= 0xff;
    }
    reply
}

#[tokio::test]
async fn checksum_mismatch() {
    let (address, _) = fake_console(corrupted).await;
    let error = connect(address.clone(), true).ac_status().await.unwrap_err();
    assert!(matches!(
        error,
        connection::Error::Protocol(protocol::Error::ChecksumMismatch { .. })
    ));
    let status = connect(address, false).ac_status().await.unwrap();
    assert_eq!(status.mode, ReportedMode::Known(AcMode::Cool));
}

#[tokio::test]
async fn silent_console_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });
    let console = Connection::new(connection::Args {
        address,
        timeout: Duration::from_millis(100).into(),
        verify_checksum: false,
    });
    assert!(matches!(console.ac_status().await, Err(connection::Error::Timeout(_))));
}

#[tokio::test]
async fn closed_without_reply() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);
    });
    let result = connect(address, false).ac_status().await;
    assert!(matches!(result, Err(
        connection::Error::Closed | connection::Error::Receive(_) | connection::Error::Send(_)
    )));
}

//! Error propagation through the session layer.

use boardlink::{ConnectOptions, DeviceSession, ErrorKind, SerialOptions, UsbOptions};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_actions_require_a_connection() {
    let session = DeviceSession::new();

    assert_err!(session.send_command("print(1)").await);
    assert_err!(session.send_raw(b"\x03").await);
    assert_err!(session.trigger_fs_mode().await);
    assert_err!(session.trigger_repl_mode().await);
    assert_err!(session.reboot().await);

    let err = session.send_command("print(1)").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotConnected);
}

#[tokio::test]
async fn test_not_connected_failures_are_recorded() {
    let session = DeviceSession::new();

    let _ = session.send_command("print(1)").await;

    let snapshot = session.snapshot().await;
    assert!(!snapshot.is_connected);
    assert_eq!(snapshot.last_error.unwrap().kind, ErrorKind::NotConnected);
}

#[tokio::test]
async fn test_disconnect_without_connection_is_ok() {
    let session = DeviceSession::new();
    assert_ok!(session.disconnect().await);
}

#[tokio::test]
async fn test_serial_connect_failure_names_the_port() {
    let session = DeviceSession::new();
    let options = ConnectOptions::Serial(SerialOptions::new("/dev/boardlink-no-such-port"));

    let err = session.connect(&options).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connect);
    assert!(err.to_string().contains("/dev/boardlink-no-such-port"));
    assert!(!session.is_connected().await);
}

#[tokio::test]
async fn test_usb_connect_failure_with_no_matching_device() {
    let session = DeviceSession::new();
    let options = ConnectOptions::Usb(UsbOptions {
        vendor_id: Some(0xdead),
        product_id: Some(0xbeef),
        ..UsbOptions::default()
    });

    assert_err!(session.connect(&options).await);
    assert!(!session.is_connected().await);
}

#[tokio::test]
async fn test_connect_failure_leaves_a_last_error() {
    let session = DeviceSession::new();
    let options = ConnectOptions::Serial(SerialOptions::new("/dev/boardlink-no-such-port"));

    let _ = session.connect(&options).await;

    let snapshot = session.snapshot().await;
    assert!(!snapshot.is_connected);
    assert!(!snapshot.is_connecting);
    assert!(snapshot.transport.is_none());
    assert_eq!(snapshot.last_error.unwrap().kind, ErrorKind::Connect);
}

#[tokio::test]
async fn test_empty_command_sets_no_error() {
    let session = DeviceSession::new();

    // An empty command is a no-op even while disconnected and must not
    // record a failure.
    assert_ok!(session.send_command("").await);
    assert!(session.snapshot().await.last_error.is_none());
}

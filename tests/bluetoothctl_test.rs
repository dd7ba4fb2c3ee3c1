//! Runs the bluetoothctl backend against a shell script standing in for the tool.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bt_keeper::bluetooth::{Address, Bluetoothctl, DeviceControl, DeviceState, Timeouts};

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// Single test so no other test forks while the scripts are being written.
#[tokio::test]
async fn test_bluetoothctl_backend() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("calls.log");
    let addr: Address = "aa:bb:cc:dd:ee:ff".parse().unwrap();

    let body = format!(
        r#"echo "$*" >> "{log}"
case "$1" in
  info) printf 'Device %s (public)\n\tPaired: yes\n\tTrusted: no\n\tConnected: no\n' "$2" ;;
  power|discoverable) echo "Changing $1 $2 succeeded" ;;
  pair) echo "Pairing successful" ;;
  trust) echo "Changing $2 trust succeeded" ;;
  connect) echo "Attempting to connect to $2"; echo "Failed to connect: org.bluez.Error.Failed" ;;
  *) exit 1 ;;
esac
"#,
        log = log.display()
    );
    let fake = write_script(dir.path(), "fake-bluetoothctl", &body);
    let ctl = Bluetoothctl::new(fake.to_string_lossy(), Timeouts::default());

    let state = ctl.query_state(&addr).await;
    assert_eq!(
        state,
        DeviceState {
            paired: true,
            trusted: false,
            connected: false
        }
    );

    let pair = ctl.pair(&addr).await;
    assert!(pair.success, "{:?}", pair);
    assert_eq!(pair.describe(), "Pairing successful");

    assert!(ctl.trust(&addr).await.success);

    // exit 0 but the output reports a failure
    let connect = ctl.connect(&addr).await;
    assert!(!connect.success);
    assert!(connect.describe().contains("Failed to connect"));

    let calls = std::fs::read_to_string(&log).unwrap();
    let calls: Vec<&str> = calls.lines().collect();
    assert_eq!(
        calls,
        vec![
            "info AA:BB:CC:DD:EE:FF",
            "power on",
            "discoverable on",
            "pair AA:BB:CC:DD:EE:FF",
            "discoverable off",
            "trust AA:BB:CC:DD:EE:FF",
            "connect AA:BB:CC:DD:EE:FF",
        ]
    );

    // a hung tool is cut off at the timeout
    let slow = write_script(dir.path(), "slow-bluetoothctl", "sleep 10\n");
    let timeouts = Timeouts {
        connect: Duration::from_millis(200),
        ..Timeouts::default()
    };
    let ctl = Bluetoothctl::new(slow.to_string_lossy(), timeouts);
    let start = Instant::now();
    let outcome = ctl.connect(&addr).await;
    assert!(!outcome.success);
    assert!(outcome.describe().contains("timed out"));
    assert!(start.elapsed() < Duration::from_secs(5));
}

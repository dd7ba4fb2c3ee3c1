// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Device control through the `bluetoothctl` command-line tool.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::address::Address;
use super::control::{CommandOutcome, DeviceControl, DeviceState, Timeouts};

/// bluetoothctl exits 0 on many failures, so the output is checked too.
const FAILURE_MARKERS: &[&str] = &["Failed to", "not available", "org.bluez.Error"];

/// Captured output of one finished invocation.
struct Invocation {
    exit_ok: bool,
    stdout: String,
    stderr: String,
}

/// `bluetoothctl` backend.
pub struct Bluetoothctl {
    program: String,
    timeouts: Timeouts,
}

impl Bluetoothctl {
    pub fn new(program: impl Into<String>, timeouts: Timeouts) -> Self {
        Self {
            program: program.into(),
            timeouts,
        }
    }

    /// Run the tool once, killing it if it outlives `limit`.
    async fn invoke(&self, args: &[&str], limit: Duration) -> Result<Invocation, String> {
        debug!("Running: {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match timeout(limit, output).await {
            Ok(Ok(o)) => Ok(Invocation {
                exit_ok: o.status.success(),
                stdout: String::from_utf8_lossy(&o.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&o.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(format!("failed to run {}: {}", self.program, e)),
            Err(_) => Err(format!(
                "'{}' timed out after {}s",
                args.join(" "),
                limit.as_secs()
            )),
        }
    }

    async fn run(&self, args: &[&str], limit: Duration) -> CommandOutcome {
        match self.invoke(args, limit).await {
            Ok(invocation) => judge(&invocation),
            Err(detail) => CommandOutcome::failed(detail),
        }
    }
}

impl DeviceControl for Bluetoothctl {
    fn backend_name(&self) -> &'static str {
        "bluetoothctl"
    }

    async fn query_state(&self, address: &Address) -> DeviceState {
        let mac = address.to_string();
        match self.invoke(&["info", mac.as_str()], self.timeouts.query).await {
            Ok(invocation) => parse_info(&invocation.stdout),
            Err(detail) => {
                warn!("State query for {} failed: {}", mac, detail);
                DeviceState::default()
            }
        }
    }

    async fn pair(&self, address: &Address) -> CommandOutcome {
        let mac = address.to_string();

        let power = self.run(&["power", "on"], self.timeouts.power).await;
        if !power.success {
            return CommandOutcome::failed(format!(
                "could not power on adapter: {}",
                power.describe()
            ));
        }

        let discoverable = self.run(&["discoverable", "on"], self.timeouts.power).await;
        if !discoverable.success {
            warn!(
                "Could not make adapter discoverable: {}",
                discoverable.describe()
            );
        }

        let outcome = self.run(&["pair", mac.as_str()], self.timeouts.pair).await;

        let hidden = self.run(&["discoverable", "off"], self.timeouts.power).await;
        if !hidden.success {
            debug!("Could not clear discoverable: {}", hidden.describe());
        }

        outcome
    }

    async fn trust(&self, address: &Address) -> CommandOutcome {
        let mac = address.to_string();
        self.run(&["trust", mac.as_str()], self.timeouts.trust).await
    }

    async fn connect(&self, address: &Address) -> CommandOutcome {
        let mac = address.to_string();
        self.run(&["connect", mac.as_str()], self.timeouts.connect).await
    }
}

/// Parse the output of `bluetoothctl info <addr>`.
pub fn parse_info(text: &str) -> DeviceState {
    let mut state = DeviceState::default();

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("Paired: yes") {
            state.paired = true;
        } else if line.starts_with("Trusted: yes") {
            state.trusted = true;
        } else if line.starts_with("Connected: yes") {
            state.connected = true;
        }
    }

    state
}

fn judge(invocation: &Invocation) -> CommandOutcome {
    let lines = || invocation.stdout.lines().chain(invocation.stderr.lines());

    if let Some(line) = lines().find(|l| FAILURE_MARKERS.iter().any(|m| l.contains(m))) {
        return CommandOutcome::failed(line.trim());
    }

    let last = lines().map(str::trim).filter(|l| !l.is_empty()).last();

    if invocation.exit_ok {
        CommandOutcome::succeeded(last.unwrap_or("ok"))
    } else {
        CommandOutcome::failed(last.unwrap_or("exited with failure status"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO_CONNECTED: &str = "\
Device AA:BB:CC:DD:EE:FF (public)
\tName: Living Room Speaker
\tAlias: Living Room Speaker
\tClass: 0x00240414
\tPaired: yes
\tBonded: yes
\tTrusted: yes
\tBlocked: no
\tConnected: yes
\tUUID: Audio Sink                (0000110b-0000-1000-8000-00805f9b34fb)
";

    fn invocation(exit_ok: bool, stdout: &str, stderr: &str) -> Invocation {
        Invocation {
            exit_ok,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_parse_info_all_flags() {
        let state = parse_info(INFO_CONNECTED);
        assert_eq!(
            state,
            DeviceState {
                paired: true,
                trusted: true,
                connected: true
            }
        );
    }

    #[test]
    fn test_parse_info_mixed_flags() {
        let text = INFO_CONNECTED
            .replace("Trusted: yes", "Trusted: no")
            .replace("Connected: yes", "Connected: no");
        let state = parse_info(&text);
        assert!(state.paired);
        assert!(!state.trusted);
        assert!(!state.connected);
    }

    #[test]
    fn test_parse_info_unknown_device() {
        let state = parse_info("Device AA:BB:CC:DD:EE:FF not available\n");
        assert_eq!(state, DeviceState::default());
        assert_eq!(parse_info(""), DeviceState::default());
    }

    #[test]
    fn test_judge_success() {
        let outcome = judge(&invocation(
            true,
            "Attempting to connect to AA:BB:CC:DD:EE:FF\nConnection successful\n",
            "",
        ));
        assert!(outcome.success);
        assert_eq!(outcome.describe(), "Connection successful");
    }

    #[test]
    fn test_judge_failure_marker_with_zero_exit() {
        let outcome = judge(&invocation(
            true,
            "Attempting to connect to AA:BB:CC:DD:EE:FF\nFailed to connect: org.bluez.Error.Failed br-connection-page-timeout\n",
            "",
        ));
        assert!(!outcome.success);
        assert!(outcome.describe().starts_with("Failed to connect"));
    }

    #[test]
    fn test_judge_nonzero_exit() {
        let outcome = judge(&invocation(false, "", "some error\n"));
        assert!(!outcome.success);
        assert_eq!(outcome.describe(), "some error");

        let silent = judge(&invocation(false, "", ""));
        assert!(!silent.success);
        assert_eq!(silent.describe(), "exited with failure status");
    }

    #[test]
    fn test_judge_unknown_device() {
        let outcome = judge(&invocation(
            false,
            "Device AA:BB:CC:DD:EE:FF not available\n",
            "",
        ));
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_missing_program_is_a_failed_outcome() {
        let ctl = Bluetoothctl::new("/nonexistent/bluetoothctl", Timeouts::default());
        let addr: Address = "AA:BB:CC:DD:EE:FF".parse().unwrap();

        assert_eq!(ctl.query_state(&addr).await, DeviceState::default());

        let outcome = ctl.connect(&addr).await;
        assert!(!outcome.success);
        assert!(outcome.describe().contains("failed to run"));

        let outcome = ctl.pair(&addr).await;
        assert!(!outcome.success);
        assert!(outcome.describe().contains("could not power on adapter"));
    }
}

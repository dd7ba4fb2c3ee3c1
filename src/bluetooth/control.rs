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

//! Device control abstraction.
//!
//! The connection state machine only talks to [`DeviceControl`]. Whether the
//! calls end up in a `bluetoothctl` child process or in BlueZ over D-Bus is
//! decided by the backend handed to it at startup.

use std::future::Future;
use std::time::Duration;

use super::address::Address;
use crate::config::ControlConfig;

/// Device flags as reported by the Bluetooth subsystem for one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub paired: bool,
    pub trusted: bool,
    pub connected: bool,
}

/// Result of a single control call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub detail: Option<String>,
}

impl CommandOutcome {
    pub fn succeeded(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: Some(detail.into()),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: Some(detail.into()),
        }
    }

    /// Detail text for log lines.
    pub fn describe(&self) -> &str {
        self.detail.as_deref().unwrap_or("no detail")
    }
}

/// Per-call time limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub query: Duration,
    pub power: Duration,
    pub pair: Duration,
    pub trust: Duration,
    pub connect: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            query: Duration::from_secs(10),
            power: Duration::from_secs(5),
            pair: Duration::from_secs(30),
            trust: Duration::from_secs(5),
            connect: Duration::from_secs(15),
        }
    }
}

impl From<&ControlConfig> for Timeouts {
    fn from(config: &ControlConfig) -> Self {
        Self {
            query: Duration::from_secs(config.query_timeout_secs),
            power: Duration::from_secs(config.power_timeout_secs),
            pair: Duration::from_secs(config.pair_timeout_secs),
            trust: Duration::from_secs(config.trust_timeout_secs),
            connect: Duration::from_secs(config.connect_timeout_secs),
        }
    }
}

/// Control operations against the Bluetooth subsystem.
///
/// Implementations never retry and never return errors: every failure,
/// including a timeout, is reported as a negative outcome.
pub trait DeviceControl {
    /// Backend name for log lines.
    fn backend_name(&self) -> &'static str;

    /// Read paired/trusted/connected. Anything unreadable is `false`.
    fn query_state(&self, address: &Address) -> impl Future<Output = DeviceState>;

    /// Power the radio, make it discoverable, and pair.
    fn pair(&self, address: &Address) -> impl Future<Output = CommandOutcome>;

    /// Mark the device trusted.
    fn trust(&self, address: &Address) -> impl Future<Output = CommandOutcome>;

    /// Open a connection to the device.
    fn connect(&self, address: &Address) -> impl Future<Output = CommandOutcome>;
}

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

//! Device control through BlueZ over D-Bus.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use bluer::{Adapter, Device, Session};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::address::Address;
use super::control::{CommandOutcome, DeviceControl, DeviceState, Timeouts};

/// Native BlueZ backend.
pub struct BluezControl {
    // Keeps the D-Bus connection alive for the adapter handle.
    _session: Session,
    adapter: Adapter,
    timeouts: Timeouts,
}

impl BluezControl {
    /// Open a BlueZ session on the default adapter.
    pub async fn new(timeouts: Timeouts) -> Result<Self> {
        let session = Session::new().await?;
        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        Ok(Self {
            _session: session,
            adapter,
            timeouts,
        })
    }

    fn device(&self, address: &Address) -> bluer::Result<Device> {
        self.adapter.device((*address).into())
    }

    async fn bounded<F>(&self, what: &str, limit: Duration, call: F) -> CommandOutcome
    where
        F: Future<Output = bluer::Result<()>>,
    {
        match timeout(limit, call).await {
            Ok(Ok(())) => CommandOutcome::succeeded(format!("{} succeeded", what)),
            Ok(Err(e)) => CommandOutcome::failed(format!("{} failed: {}", what, e)),
            Err(_) => CommandOutcome::failed(format!(
                "{} timed out after {}s",
                what,
                limit.as_secs()
            )),
        }
    }
}

impl DeviceControl for BluezControl {
    fn backend_name(&self) -> &'static str {
        "bluez"
    }

    async fn query_state(&self, address: &Address) -> DeviceState {
        let device = match self.device(address) {
            Ok(device) => device,
            Err(e) => {
                warn!("State query for {} failed: {}", address, e);
                return DeviceState::default();
            }
        };

        let read = |flag: &'static str, value: bluer::Result<bool>| {
            value.unwrap_or_else(|e| {
                debug!("Could not read {} for {}: {}", flag, address, e);
                false
            })
        };

        let limit = self.timeouts.query;
        let paired = timeout(limit, device.is_paired()).await;
        let trusted = timeout(limit, device.is_trusted()).await;
        let connected = timeout(limit, device.is_connected()).await;

        match (paired, trusted, connected) {
            (Ok(p), Ok(t), Ok(c)) => DeviceState {
                paired: read("Paired", p),
                trusted: read("Trusted", t),
                connected: read("Connected", c),
            },
            _ => {
                warn!("State query for {} timed out", address);
                DeviceState::default()
            }
        }
    }

    async fn pair(&self, address: &Address) -> CommandOutcome {
        let power = self
            .bounded("power on", self.timeouts.power, self.adapter.set_powered(true))
            .await;
        if !power.success {
            return CommandOutcome::failed(format!(
                "could not power on adapter: {}",
                power.describe()
            ));
        }

        let discoverable = self
            .bounded(
                "discoverable on",
                self.timeouts.power,
                self.adapter.set_discoverable(true),
            )
            .await;
        if !discoverable.success {
            warn!(
                "Could not make adapter discoverable: {}",
                discoverable.describe()
            );
        }

        let outcome = match self.device(address) {
            Ok(device) => self.bounded("pair", self.timeouts.pair, device.pair()).await,
            Err(e) => CommandOutcome::failed(format!("device {} unavailable: {}", address, e)),
        };

        let hidden = self
            .bounded(
                "discoverable off",
                self.timeouts.power,
                self.adapter.set_discoverable(false),
            )
            .await;
        if !hidden.success {
            debug!("Could not clear discoverable: {}", hidden.describe());
        }

        outcome
    }

    async fn trust(&self, address: &Address) -> CommandOutcome {
        match self.device(address) {
            Ok(device) => {
                self.bounded("trust", self.timeouts.trust, device.set_trusted(true))
                    .await
            }
            Err(e) => CommandOutcome::failed(format!("device {} unavailable: {}", address, e)),
        }
    }

    async fn connect(&self, address: &Address) -> CommandOutcome {
        match self.device(address) {
            Ok(device) => {
                self.bounded("connect", self.timeouts.connect, device.connect())
                    .await
            }
            Err(e) => CommandOutcome::failed(format!("device {} unavailable: {}", address, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    // These tests need a running bluetoothd and an adapter.

    use super::*;

    #[tokio::test]
    #[ignore = "requires real Bluetooth hardware"]
    async fn test_session_creation() {
        let control = BluezControl::new(Timeouts::default()).await;
        assert!(control.is_ok());
    }

    #[tokio::test]
    #[ignore = "requires real Bluetooth hardware"]
    async fn test_query_unknown_device() {
        if let Ok(control) = BluezControl::new(Timeouts::default()).await {
            let addr: Address = "00:00:00:00:00:01".parse().unwrap();
            let state = control.query_state(&addr).await;
            assert!(!state.connected);
        }
    }
}

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

//! Connection state machine.
//!
//! Nothing about the device is remembered between cycles: each cycle queries
//! the subsystem, classifies the result, and takes at most one corrective
//! path (pair/trust, then connect). The only state carried across cycles is
//! the consecutive connect failure count, which picks the pause length.

use std::time::Duration;
use tracing::{error, info, warn};

use crate::bluetooth::{Address, DeviceControl, DeviceState};
use crate::config::MonitorConfig;

/// Link state derived from a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    /// Not paired or not trusted.
    NeedsSetup,
    /// Paired and trusted but not connected.
    NeedsConnect,
}

impl LinkState {
    pub fn classify(state: &DeviceState) -> Self {
        if state.connected {
            LinkState::Connected
        } else if !state.paired || !state.trusted {
            LinkState::NeedsSetup
        } else {
            LinkState::NeedsConnect
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Connected => "Connected",
            LinkState::NeedsSetup => "Needs setup",
            LinkState::NeedsConnect => "Needs connect",
        }
    }
}

/// Setup step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Pair,
    Trust,
}

/// What a cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Device was already connected; nothing issued.
    AlreadyConnected,
    /// Pairing or trust failed; connect was not attempted.
    SetupFailed(SetupStep),
    /// Connect succeeded.
    Reconnected,
    /// Connect failed; `failures` is the count after this attempt.
    ConnectFailed { failures: u32 },
}

/// Wait before the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    Regular(Duration),
    /// Long cooldown after hitting the failure ceiling.
    Escalated(Duration),
}

impl Pause {
    pub fn duration(&self) -> Duration {
        match self {
            Pause::Regular(d) | Pause::Escalated(d) => *d,
        }
    }
}

/// Result of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub state: LinkState,
    pub outcome: CycleOutcome,
    pub pause: Pause,
}

/// Two-tier reconnect timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub poll_interval: Duration,
    pub max_failures: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for RetryPolicy {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_failures: config.max_failures.max(1),
            backoff: config.backoff(),
        }
    }
}

/// Keeps one device paired, trusted and connected.
pub struct ConnectionKeeper<C> {
    control: C,
    target: Address,
    policy: RetryPolicy,
    consecutive_failures: u32,
}

impl<C: DeviceControl> ConnectionKeeper<C> {
    pub fn new(control: C, target: Address, policy: RetryPolicy) -> Self {
        Self {
            control,
            target,
            policy,
            consecutive_failures: 0,
        }
    }

    pub fn target(&self) -> &Address {
        &self.target
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Pair and trust as needed for an already queried state.
    ///
    /// Stops at the first failing step.
    pub async fn ensure_setup(&mut self, state: &DeviceState) -> Result<(), SetupStep> {
        if !state.paired {
            info!("Device {} is not paired. Pairing...", self.target);
            let outcome = self.control.pair(&self.target).await;
            if !outcome.success {
                error!("Pairing with {} failed: {}", self.target, outcome.describe());
                return Err(SetupStep::Pair);
            }
            info!("Paired with {}", self.target);
        }

        if !state.trusted {
            info!("Device {} is not trusted. Trusting...", self.target);
            let outcome = self.control.trust(&self.target).await;
            if !outcome.success {
                error!("Trusting {} failed: {}", self.target, outcome.describe());
                return Err(SetupStep::Trust);
            }
            info!("Trusted {}", self.target);
        }

        Ok(())
    }

    /// Startup pass: query once and pair/trust if needed, without connecting.
    pub async fn prime(&mut self) -> Result<(), SetupStep> {
        let state = self.control.query_state(&self.target).await;
        info!(
            "Initial state of {}: paired={} trusted={} connected={}",
            self.target, state.paired, state.trusted, state.connected
        );
        if state.connected {
            return Ok(());
        }
        self.ensure_setup(&state).await
    }

    /// Run one query/decide/act cycle and choose the following pause.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let state = self.control.query_state(&self.target).await;
        let link = LinkState::classify(&state);

        if link == LinkState::Connected {
            info!("Device {} is connected", self.target);
            self.consecutive_failures = 0;
            return self.report(link, CycleOutcome::AlreadyConnected);
        }

        info!("Device {} state: {}", self.target, link.as_str());

        if let Err(step) = self.ensure_setup(&state).await {
            warn!("Setup incomplete ({:?}), will retry next cycle", step);
            return self.report(link, CycleOutcome::SetupFailed(step));
        }

        info!("Connecting to {}...", self.target);
        let outcome = self.control.connect(&self.target).await;

        if outcome.success {
            info!("Connected to {}", self.target);
            self.consecutive_failures = 0;
            return self.report(link, CycleOutcome::Reconnected);
        }

        self.consecutive_failures += 1;
        warn!(
            "Connecting to {} failed ({}/{}): {}",
            self.target,
            self.consecutive_failures,
            self.policy.max_failures,
            outcome.describe()
        );

        self.report(
            link,
            CycleOutcome::ConnectFailed {
                failures: self.consecutive_failures,
            },
        )
    }

    /// Called after a pause has fully elapsed.
    pub fn pause_elapsed(&mut self, pause: Pause) {
        if let Pause::Escalated(_) = pause {
            self.consecutive_failures = 0;
        }
    }

    fn report(&self, state: LinkState, outcome: CycleOutcome) -> CycleReport {
        let pause = if self.consecutive_failures >= self.policy.max_failures {
            warn!(
                "{} consecutive failures, backing off for {}s",
                self.consecutive_failures,
                self.policy.backoff.as_secs()
            );
            Pause::Escalated(self.policy.backoff)
        } else {
            Pause::Regular(self.policy.poll_interval)
        };

        CycleReport {
            state,
            outcome,
            pause,
        }
    }
}

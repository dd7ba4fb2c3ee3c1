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

//! Monitoring loop.

use tracing::{debug, info, warn};

use crate::bluetooth::DeviceControl;
use crate::shutdown::Shutdown;
use crate::state::ConnectionKeeper;

/// Run cycles until shutdown is requested.
///
/// Shutdown is checked between adapter calls and interrupts any pause. An
/// adapter call already in flight is allowed to finish (each is bounded by
/// its own timeout).
pub async fn run<C: DeviceControl>(keeper: &mut ConnectionKeeper<C>, shutdown: &mut Shutdown) {
    info!(
        "Monitoring {} via {} (poll {}s, backoff {}s after {} failures)",
        keeper.target(),
        keeper.control().backend_name(),
        keeper.policy().poll_interval.as_secs(),
        keeper.policy().backoff.as_secs(),
        keeper.policy().max_failures
    );

    if shutdown.is_requested() {
        return;
    }

    if let Err(step) = keeper.prime().await {
        warn!("Initial setup failed at {:?}, continuing with monitor loop", step);
    }

    loop {
        if shutdown.is_requested() {
            break;
        }

        let report = keeper.run_cycle().await;
        debug!("Cycle finished: {:?}", report);

        if shutdown.is_requested() {
            break;
        }

        if !shutdown.sleep(report.pause.duration()).await {
            break;
        }
        keeper.pause_elapsed(report.pause);
    }

    info!("Monitor loop stopped");
}

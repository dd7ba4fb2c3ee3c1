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

//! bt-keeper daemon

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use tracing::{error, info};

use bt_keeper::bluetooth::{Address, Bluetoothctl, BluezControl, DeviceControl, Timeouts};
use bt_keeper::config::{Backend, Config, LogConfig};
use bt_keeper::shutdown::{self, Shutdown};
use bt_keeper::singleton::SingletonGuard;
use bt_keeper::state::{ConnectionKeeper, RetryPolicy};
use bt_keeper::{logging, monitor, preflight};

const EXIT_FATAL: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);

    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let console = LogConfig {
                file: false,
                ..LogConfig::default()
            };
            match logging::init(&console) {
                Ok(_log) => error!("Configuration error: {}", e),
                Err(_) => eprintln!("Configuration error: {}", e),
            }
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let log = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    info!("bt-keeper v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(path) = log.log_file() {
        info!("Appending to {}", path.display());
    }

    let code = match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    };

    info!("bt-keeper stopped");
    drop(log);
    code
}

async fn run(config: &Config) -> Result<()> {
    let target = config.target()?;

    preflight::check(&config.control)?;

    let mut guard = SingletonGuard::new(&config.lock_file);
    if !guard.acquire()? {
        info!("Another instance is already running. Exiting.");
        return Ok(());
    }
    info!("Holding lock {}", guard.path().display());

    let (trigger, mut shutdown) = shutdown::channel();
    shutdown::listen_for_signals(trigger)?;

    let timeouts = Timeouts::from(&config.control);
    let policy = RetryPolicy::from(&config.monitor);

    let result = match config.control.backend {
        Backend::Bluetoothctl => {
            let control = Bluetoothctl::new(config.control.program.clone(), timeouts);
            supervise(control, target, policy, &mut shutdown).await;
            Ok(())
        }
        Backend::Bluez => match BluezControl::new(timeouts).await {
            Ok(control) => {
                supervise(control, target, policy, &mut shutdown).await;
                Ok(())
            }
            Err(e) => Err(e.context("failed to open BlueZ session")),
        },
    };

    guard.release();
    result
}

async fn supervise<C: DeviceControl>(
    control: C,
    target: Address,
    policy: RetryPolicy,
    shutdown: &mut Shutdown,
) {
    let mut keeper = ConnectionKeeper::new(control, target, policy);
    monitor::run(&mut keeper, shutdown).await;
}

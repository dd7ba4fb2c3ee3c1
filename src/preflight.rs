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

//! Startup checks for the Bluetooth environment.

use std::process::Command;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Backend, ControlConfig};

/// Missing prerequisites. These need an operator, so they are fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreflightError {
    #[error("'{0}' not found in PATH (install bluez: sudo apt install bluez)")]
    MissingProgram(String),

    #[error("bluetooth service is not active (start it: sudo systemctl start bluetooth)")]
    ServiceInactive,
}

/// State of the bluetooth system service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Active,
    Inactive,
    /// systemctl could not be run.
    Unknown,
}

/// Verify everything the selected backend needs.
pub fn check(config: &ControlConfig) -> Result<(), PreflightError> {
    if config.backend == Backend::Bluetoothctl && !program_available(&config.program) {
        return Err(PreflightError::MissingProgram(config.program.clone()));
    }

    if config.require_service {
        match bluetooth_service_status() {
            ServiceStatus::Active => info!("Bluetooth service is active"),
            ServiceStatus::Inactive => return Err(PreflightError::ServiceInactive),
            ServiceStatus::Unknown => {
                warn!("Could not query systemctl, skipping bluetooth service check")
            }
        }
    }

    Ok(())
}

/// Whether `program` resolves to an executable.
pub fn program_available(program: &str) -> bool {
    if program.contains('/') {
        return std::path::Path::new(program).is_file();
    }

    // same lookup as `which`, without depending on it being installed
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

/// Ask systemd whether bluetooth.service is running.
pub fn bluetooth_service_status() -> ServiceStatus {
    match Command::new("systemctl")
        .args(["is-active", "--quiet", "bluetooth"])
        .status()
    {
        Ok(status) if status.success() => ServiceStatus::Active,
        Ok(_) => ServiceStatus::Inactive,
        Err(_) => ServiceStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_available() {
        assert!(program_available("sh"));
        assert!(program_available("/bin/sh"));
        assert!(!program_available("definitely-not-a-real-program-1234"));
        assert!(!program_available("/nonexistent/bluetoothctl"));
    }

    #[test]
    fn test_missing_program_is_fatal() {
        let config = ControlConfig {
            program: "/nonexistent/bluetoothctl".to_string(),
            require_service: false,
            ..ControlConfig::default()
        };
        assert_eq!(
            check(&config),
            Err(PreflightError::MissingProgram(
                "/nonexistent/bluetoothctl".to_string()
            ))
        );
    }

    #[test]
    fn test_bluez_backend_skips_program_check() {
        let config = ControlConfig {
            backend: Backend::Bluez,
            program: "/nonexistent/bluetoothctl".to_string(),
            require_service: false,
            ..ControlConfig::default()
        };
        assert_eq!(check(&config), Ok(()));
    }

    #[test]
    fn test_error_messages_name_the_fix() {
        assert!(PreflightError::ServiceInactive
            .to_string()
            .contains("systemctl start bluetooth"));
        assert!(PreflightError::MissingProgram("bluetoothctl".into())
            .to_string()
            .contains("bluetoothctl"));
    }
}

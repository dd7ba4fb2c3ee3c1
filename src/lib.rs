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

//! Keeps a single Bluetooth audio sink paired, trusted and connected.
//!
//! The monitor polls the device at a fixed cadence, repairs pairing and
//! trust when they are missing, reconnects when the link drops, and backs
//! off for a longer cooldown after repeated connect failures.

pub mod bluetooth;
pub mod config;
pub mod logging;
pub mod monitor;
pub mod preflight;
pub mod shutdown;
pub mod singleton;
pub mod state;

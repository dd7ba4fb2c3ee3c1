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

//! Logging setup.
//!
//! Every line is `<timestamp> - [<LEVEL>] - <message>`, written to stdout and
//! appended to a log file. The file goes to the configured directory when it
//! is writable, otherwise to `~/logs`, otherwise to the working directory.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// Formats events as `<timestamp> - [<LEVEL>] - <message>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - [{}] - ",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            event.metadata().level().as_str()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Keeps the file writer alive; dropping it flushes pending lines.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
    log_file: Option<PathBuf>,
}

impl LoggingGuard {
    /// Log file in use, if file logging is active.
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

/// Install the global subscriber.
pub fn init(config: &LogConfig) -> Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = config.console.then(|| {
        tracing_subscriber::fmt::layer()
            .event_format(LineFormat)
            .with_writer(std::io::stdout)
    });

    let log_file = if config.file {
        resolve_log_file(&config.directory, &config.file_name)
    } else {
        None
    };

    let mut file_guard = None;
    let file_layer = match &log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let appender = tracing_appender::rolling::never(dir, &config.file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .event_format(LineFormat)
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    match &log_file {
        Some(path) => tracing::info!("Logging initialized. Log file: {}", path.display()),
        None if config.file => {
            tracing::warn!("No writable log directory found, logging to console only")
        }
        None => tracing::info!("Logging initialized (console only)"),
    }

    Ok(LoggingGuard {
        _file_guard: file_guard,
        log_file,
    })
}

/// Pick the first writable location for the log file.
pub fn resolve_log_file(preferred: &Path, file_name: &str) -> Option<PathBuf> {
    let mut candidates = vec![preferred.to_path_buf()];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join("logs"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd);
    }

    candidates
        .into_iter()
        .find(|dir| is_writable_dir(dir, file_name))
        .map(|dir| dir.join(file_name))
}

fn is_writable_dir(dir: &Path, file_name: &str) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(format!(".{}_write_test", file_name));
    match std::fs::File::create(&probe) {
        Ok(_) => std::fs::remove_file(&probe).is_ok(),
        Err(_) => false,
    }
}

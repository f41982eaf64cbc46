//! File logger behind the `log` facade. The terminal belongs to the TUI, so records go to
//! `--log-file` or nowhere.

use anyhow::{Context, Result};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

struct FileLogger {
    file: Mutex<File>,
    level: LevelFilter,
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with(env!("CARGO_CRATE_NAME"))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), record.target(), &record.args().to_string());
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

fn format_line(level: log::Level, target: &str, message: &str) -> String {
    let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    format!(
        "{}.{:03} {:<5} {}: {}\n",
        since_epoch.as_secs(),
        since_epoch.subsec_millis(),
        level,
        target,
        message
    )
}

/// Install the logger. With no path, logging stays off.
/// `verbose` lowers the threshold from debug to trace.
pub fn init(path: Option<&Path>, verbose: bool) -> Result<()> {
    let Some(path) = path else {
        log::set_max_level(LevelFilter::Off);
        return Ok(());
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    let level = if verbose { LevelFilter::Trace } else { LevelFilter::Debug };
    log::set_boxed_logger(Box::new(FileLogger {
        file: Mutex::new(file),
        level,
    }))
    .context("installing logger")?;
    log::set_max_level(level);
    log::info!("logging to {} at {}", path.display(), level);
    Ok(())
}

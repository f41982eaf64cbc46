//! Persist the high score to disk (XDG config or ~/.config/poptiles).

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

/// Storage key; also the file name under the config directory.
pub const HIGH_SCORE_KEY: &str = "rising-match3-high-score";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a session reads its starting high score and writes new records.
pub trait HighScoreStore {
    /// Stored value; 0 when missing or unreadable.
    fn load(&mut self) -> u32;
    fn save(&mut self, score: u32) -> Result<(), StoreError>;
}

/// Returns the path to the high score file (config dir / poptiles / key).
fn config_path() -> PathBuf {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join("poptiles").join(HIGH_SCORE_KEY)
}

/// One scalar in a plain text file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store at the default config location.
    pub fn open() -> Self {
        Self::at(config_path())
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }
}

impl HighScoreStore for FileStore {
    fn load(&mut self) -> u32 {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.lines().next().and_then(|l| l.trim().parse::<u32>().ok()))
            .unwrap_or(0)
    }

    /// Save the high score. Creates the config directory if needed.
    fn save(&mut self, score: u32) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = fs::File::create(&self.path)?;
        writeln!(f, "{}", score)?;
        Ok(())
    }
}

/// In-memory store; records every write.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub value: u32,
    pub writes: Vec<u32>,
}

impl MemoryStore {
    pub fn with_value(value: u32) -> Self {
        Self { value, writes: Vec::new() }
    }
}

impl HighScoreStore for MemoryStore {
    fn load(&mut self) -> u32 {
        self.value
    }

    fn save(&mut self, score: u32) -> Result<(), StoreError> {
        self.value = score;
        self.writes.push(score);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("poptiles-test-{}-{}", std::process::id(), name))
            .join(HIGH_SCORE_KEY)
    }

    #[test]
    fn test_file_store_round_trip() {
        let path = temp_path("roundtrip");
        let mut store = FileStore::at(path.clone());
        assert_eq!(store.load(), 0, "missing file reads as zero");
        store.save(420).unwrap();
        assert_eq!(FileStore::at(path.clone()).load(), 420);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_garbage_reads_as_zero() {
        let path = temp_path("garbage");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not a number\n").unwrap();
        assert_eq!(FileStore::at(path.clone()).load(), 0);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_config_path_ends_with_key() {
        assert!(config_path().ends_with(format!("poptiles/{HIGH_SCORE_KEY}")));
    }
}

//! State recorder — the single owner of all mutable run state.
//!
//! Everything the original ad hoc scripts kept as loose files in the state
//! directory goes through this component: the append-only ledger of
//! processed files, the per-run counter, and the start timestamp. The
//! status API reads back through it as well.

use crate::utils::errors::{RelayError, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

const LEDGER_FILE: &str = "processed_files.log";
const START_TIME_FILE: &str = "start_time";
const COUNT_FILE: &str = "processed_count";
const LOG_FILE: &str = "watcher.log";
const TRASH_DIR: &str = "trash";

pub struct StateRecorder {
    state_dir: PathBuf,
    started_at: u64,
    count: AtomicU64,
    // Serializes ledger appends and counter persists
    write_lock: Mutex<()>,
}

impl StateRecorder {
    /// Initialize the state directory and reset the per-run counter.
    ///
    /// The counter is per watcher run; the ledger survives restarts.
    pub fn start(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir)?;
        std::fs::create_dir_all(state_dir.join(TRASH_DIR))?;

        let started_at = unix_now();
        write_atomic(&state_dir.join(START_TIME_FILE), &started_at.to_string())?;
        write_atomic(&state_dir.join(COUNT_FILE), "0")?;

        Ok(Self {
            state_dir: state_dir.to_path_buf(),
            started_at,
            count: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        })
    }

    /// Append a ledger entry for a fully-relayed file and bump the counter.
    ///
    /// No deduplication: the same filename relayed twice gets two entries
    /// and two increments. Returns the new count.
    pub async fn record(&self, filename: &str) -> Result<u64> {
        let _guard = self.write_lock.lock().await;

        let line = format!(
            "{} {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            filename
        );
        let mut ledger = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.state_dir.join(LEDGER_FILE))?;
        ledger.write_all(line.as_bytes())?;
        ledger.sync_all()?;

        let new_count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        write_atomic(&self.state_dir.join(COUNT_FILE), &new_count.to_string())?;
        Ok(new_count)
    }

    pub fn processed_count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        Duration::from_secs(unix_now().saturating_sub(self.started_at))
    }

    /// Last `n` ledger entries, oldest first
    pub fn recent_processed(&self, n: usize) -> Result<Vec<String>> {
        tail_lines(&self.state_dir.join(LEDGER_FILE), n)
    }

    /// Last `n` log lines, oldest first
    pub fn recent_log(&self, n: usize) -> Result<Vec<String>> {
        tail_lines(&self.state_dir.join(LOG_FILE), n)
    }

    pub fn log_file(&self) -> PathBuf {
        self.state_dir.join(LOG_FILE)
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.state_dir.join(TRASH_DIR)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Write a small value via temp file + rename so readers never see a
/// partial write
fn write_atomic(path: &Path, value: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| RelayError::State(format!("no parent for {}", path.display())))?;
    let tmp = parent.join(format!(
        ".{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".into())
    ));
    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn tail_lines(path: &Path, n: usize) -> Result<Vec<String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].iter().map(|l| l.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn count_matches_number_of_records() {
        let dir = TempDir::new().unwrap();
        let recorder = StateRecorder::start(dir.path()).unwrap();

        for i in 0..5 {
            let count = recorder.record(&format!("file{i}.torrent")).await.unwrap();
            assert_eq!(count, i + 1);
        }

        assert_eq!(recorder.processed_count(), 5);
        let persisted = std::fs::read_to_string(dir.path().join(COUNT_FILE)).unwrap();
        assert_eq!(persisted, "5");
    }

    #[tokio::test]
    async fn ledger_appends_and_keeps_duplicates() {
        let dir = TempDir::new().unwrap();
        let recorder = StateRecorder::start(dir.path()).unwrap();

        recorder.record("same.torrent").await.unwrap();
        recorder.record("same.torrent").await.unwrap();

        let entries = recorder.recent_processed(50).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|l| l.ends_with("same.torrent")));
    }

    #[tokio::test]
    async fn restart_resets_counter_but_not_ledger() {
        let dir = TempDir::new().unwrap();

        let recorder = StateRecorder::start(dir.path()).unwrap();
        recorder.record("a.torrent").await.unwrap();
        drop(recorder);

        let recorder = StateRecorder::start(dir.path()).unwrap();
        assert_eq!(recorder.processed_count(), 0);
        assert_eq!(recorder.recent_processed(50).unwrap().len(), 1);
    }

    #[test]
    fn tail_of_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let recorder = StateRecorder::start(dir.path()).unwrap();
        assert!(recorder.recent_log(500).unwrap().is_empty());
    }

    #[test]
    fn tail_returns_last_lines_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, "1\n2\n3\n4\n").unwrap();
        let lines = tail_lines(&path, 2).unwrap();
        assert_eq!(lines, vec!["3", "4"]);
    }
}

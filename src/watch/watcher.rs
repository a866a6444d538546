//! Directory watcher: startup scan plus filesystem notifications.
//!
//! Each qualifying file gets exactly one relay task per detected
//! appearance; an in-flight set suppresses the duplicate events notify
//! produces while a file is being processed. A wake signal tears down the
//! subscription and re-scans, since events may have been missed during
//! sleep.

use crate::config::WatchConfig;
use crate::relay::Relay;
use crate::state::StateRecorder;
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

pub struct Watcher {
    directory: PathBuf,
    suffix: String,
    settle_poll: Duration,
    relay: Arc<Relay>,
    recorder: Arc<StateRecorder>,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
    wake_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
}

impl Watcher {
    pub fn new(
        config: &WatchConfig,
        relay: Arc<Relay>,
        recorder: Arc<StateRecorder>,
        wake_rx: mpsc::Receiver<()>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            directory: config.directory.clone(),
            suffix: config.suffix.clone(),
            settle_poll: Duration::from_millis(config.settle_poll_ms),
            relay,
            recorder,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            wake_rx,
            cancel,
        }
    }

    /// Main loop: subscribe, scan existing files, then dispatch filesystem
    /// events until a wake (resubscribe) or cancellation (drain and return).
    pub async fn run(mut self) {
        let mut tasks = JoinSet::new();

        'subscribe: loop {
            let (fs_tx, mut fs_rx) = mpsc::channel::<notify::Result<notify::Event>>(64);
            let _fs_watcher = match subscribe(&self.directory, fs_tx) {
                Ok(w) => w,
                Err(e) => {
                    error!(dir = %self.directory.display(), "Failed to watch directory: {}", e);
                    tokio::select! {
                        _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => continue 'subscribe,
                        _ = self.cancel.cancelled() => break 'subscribe,
                    }
                }
            };

            info!(dir = %self.directory.display(), suffix = %self.suffix, "Watching directory");
            self.scan_existing(&mut tasks).await;

            loop {
                tokio::select! {
                    event = fs_rx.recv() => {
                        match event {
                            Some(Ok(event)) => self.handle_event(event, &mut tasks).await,
                            Some(Err(e)) => warn!("Watch error: {}", e),
                            None => {
                                warn!("Filesystem event channel closed, resubscribing");
                                continue 'subscribe;
                            }
                        }
                    }
                    Some(_) = self.wake_rx.recv() => {
                        info!("Wake signal received, restarting subscription and re-scanning");
                        continue 'subscribe;
                    }
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        if let Err(e) = joined {
                            error!("Relay task panicked: {}", e);
                        }
                    }
                    _ = self.cancel.cancelled() => break 'subscribe,
                }
            }
        }

        info!("Watcher stopping, waiting for in-flight relays");
        while tasks.join_next().await.is_some() {}
    }

    /// Enumerate qualifying files already present and dispatch each
    async fn scan_existing(&self, tasks: &mut JoinSet<()>) {
        let mut found = 0usize;
        for entry in walkdir::WalkDir::new(&self.directory)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() && self.qualifies(entry.path()) {
                found += 1;
                self.dispatch(entry.path().to_path_buf(), tasks).await;
            }
        }
        debug!(found, "Directory scan complete");
    }

    async fn handle_event(&self, event: notify::Event, tasks: &mut JoinSet<()>) {
        use notify::EventKind;
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }
        for path in event.paths {
            if path.is_file() && self.qualifies(&path) {
                self.dispatch(path, tasks).await;
            }
        }
    }

    fn qualifies(&self, path: &Path) -> bool {
        path.file_name()
            .map(|n| n.to_string_lossy().ends_with(&self.suffix))
            .unwrap_or(false)
    }

    /// Spawn one relay task for this appearance of `path`, unless it is
    /// already in flight
    async fn dispatch(&self, path: PathBuf, tasks: &mut JoinSet<()>) {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(path.clone()) {
                debug!(file = %path.display(), "Already in flight, skipping");
                return;
            }
        }

        info!(file = %path.display(), "Qualifying file detected");
        let relay = self.relay.clone();
        let recorder = self.recorder.clone();
        let in_flight = self.in_flight.clone();
        let cancel = self.cancel.child_token();
        let settle_poll = self.settle_poll;

        tasks.spawn(async move {
            if wait_for_settle(&path, settle_poll, &cancel).await {
                // Errors are logged inside; a failed relay leaves the file
                // on disk and releases the in-flight entry below
                let _ = relay.process_file(&path, &recorder, cancel).await;
            }
            in_flight.lock().await.remove(&path);
        });
    }
}

fn subscribe(
    dir: &Path,
    tx: mpsc::Sender<notify::Result<notify::Event>>,
) -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res| {
        // The notify callback runs on its own thread
        let _ = tx.blocking_send(res);
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Wait until the file's size is stable across one poll interval — the
/// download is still writing it otherwise. Returns false when the file
/// disappears or the task is cancelled first.
async fn wait_for_settle(path: &Path, poll: Duration, cancel: &CancellationToken) -> bool {
    let mut last_len: Option<u64> = None;
    loop {
        let len = match std::fs::metadata(path) {
            Ok(m) => m.len(),
            Err(_) => {
                debug!(file = %path.display(), "File disappeared before settling");
                return false;
            }
        };
        if last_len == Some(len) {
            return true;
        }
        last_len = Some(len);

        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = cancel.cancelled() => return false,
        }
    }
}

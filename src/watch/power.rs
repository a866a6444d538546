//! Sleep/wake detection via clock-gap probing.
//!
//! A periodic tick compares how much wall-clock time actually passed against
//! the tick interval. A machine that slept stops ticking but its wall clock
//! keeps running, so a large gap on the next tick means we just woke up.
//! Sleep itself needs no handling beyond the log line; the watcher only
//! cares about waking, when filesystem notifications may have been missed.

use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_TICK: Duration = Duration::from_secs(30);
const DEFAULT_GAP_THRESHOLD: Duration = Duration::from_secs(90);

pub struct PowerMonitor {
    tick: Duration,
    gap_threshold: Duration,
}

impl PowerMonitor {
    pub fn new() -> Self {
        Self {
            tick: DEFAULT_TICK,
            gap_threshold: DEFAULT_GAP_THRESHOLD,
        }
    }

    /// Run until cancelled, sending one message per detected wake
    pub async fn run(self, wake_tx: mpsc::Sender<()>, cancel: CancellationToken) {
        let mut last_tick = SystemTime::now();
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.tick) => {}
                _ = cancel.cancelled() => {
                    info!("Power monitor stopping");
                    return;
                }
            }

            let now = SystemTime::now();
            let elapsed = now.duration_since(last_tick).unwrap_or(Duration::ZERO);
            last_tick = now;

            if gap_indicates_wake(elapsed, self.tick, self.gap_threshold) {
                info!(gap_secs = elapsed.as_secs(), "Wake from sleep detected");
                if wake_tx.send(()).await.is_err() {
                    warn!("Watcher is gone, power monitor stopping");
                    return;
                }
            }
        }
    }
}

impl Default for PowerMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn gap_indicates_wake(elapsed: Duration, tick: Duration, threshold: Duration) -> bool {
    elapsed > tick + threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_tick_is_not_a_wake() {
        let tick = Duration::from_secs(30);
        let threshold = Duration::from_secs(90);
        assert!(!gap_indicates_wake(Duration::from_secs(31), tick, threshold));
        assert!(!gap_indicates_wake(Duration::from_secs(119), tick, threshold));
    }

    #[test]
    fn long_gap_is_a_wake() {
        let tick = Duration::from_secs(30);
        let threshold = Duration::from_secs(90);
        assert!(gap_indicates_wake(Duration::from_secs(121), tick, threshold));
        assert!(gap_indicates_wake(Duration::from_secs(3600), tick, threshold));
    }

    #[tokio::test]
    async fn monitor_stops_on_cancel() {
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let monitor = PowerMonitor::new();

        let handle = tokio::spawn(monitor.run(tx, cancel.clone()));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

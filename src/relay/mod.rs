//! Relay pipeline: deliver one file to every configured target, then
//! grace-delay, record and trash the source.
//!
//! One task per target; all targets must confirm receipt before any
//! post-processing happens. A failed target keeps the source file on disk.

pub mod inhibit;
pub mod policy;
pub mod transfer;

pub use policy::RetryPolicy;
pub use transfer::{SshTransport, Transport};

use crate::config::{RelayConfig, TargetConfig};
use crate::relay::inhibit::SleepInhibitor;
use crate::state::{trash, StateRecorder};
use crate::utils::errors::{RelayError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Relay {
    targets: Vec<TargetConfig>,
    policy: RetryPolicy,
    grace_delay: Duration,
    inhibit_command: Option<String>,
    transport: Arc<dyn Transport>,
}

impl Relay {
    pub fn new(config: &RelayConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            targets: config.targets.clone(),
            policy: RetryPolicy::from_config(&config.retry),
            grace_delay: Duration::from_secs(config.grace_delay_secs),
            inhibit_command: config.inhibit_command.clone(),
            transport,
        }
    }

    /// Relay `file` to all targets. Only once every target has confirmed
    /// receipt: wait the grace delay, append to the ledger, move the source
    /// to trash. Any target failure surfaces here and the source stays.
    pub async fn process_file(
        &self,
        file: &Path,
        recorder: &StateRecorder,
        cancel: CancellationToken,
    ) -> Result<()> {
        let filename = file
            .file_name()
            .ok_or_else(|| RelayError::State(format!("no filename in {}", file.display())))?
            .to_string_lossy()
            .into_owned();

        info!(file = %file.display(), targets = self.targets.len(), "Relaying file");
        let _inhibit = self
            .inhibit_command
            .as_deref()
            .and_then(SleepInhibitor::spawn);

        let mut deliveries = JoinSet::new();
        for target in &self.targets {
            let transport = self.transport.clone();
            let policy = self.policy.clone();
            let file = file.to_path_buf();
            let target = target.clone();
            let cancel = cancel.child_token();
            deliveries.spawn(async move {
                deliver_to_target(transport, &file, &target, &policy, cancel).await
            });
        }

        let mut first_err: Option<RelayError> = None;
        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(file = %filename, "Target delivery failed: {}", e);
                    first_err.get_or_insert(e);
                }
                Err(e) => {
                    first_err.get_or_insert(RelayError::TransferFailed {
                        target: "unknown".into(),
                        reason: format!("delivery task panicked: {e}"),
                    });
                }
            }
        }

        if let Some(e) = first_err {
            warn!(file = %filename, "Relay incomplete, source file retained");
            return Err(e);
        }

        tokio::select! {
            _ = tokio::time::sleep(self.grace_delay) => {}
            _ = cancel.cancelled() => {
                info!(file = %filename, "Cancelled during grace delay, source retained");
                return Ok(());
            }
        }

        let count = recorder.record(&filename).await?;
        info!(file = %filename, count, "File fully relayed");

        if let Err(e) = trash::move_to_trash(file, &recorder.trash_dir()) {
            // Already relayed everywhere; leaving it risks a duplicate relay
            // on re-detection, which the ledger tolerates
            warn!(file = %filename, "Could not move relayed file to trash: {}", e);
        }
        Ok(())
    }
}

/// Per-target retry loop: attempt while the source file still exists, sleep
/// the policy backoff between failures. A vanished source aborts this
/// target; an attempt limit surfaces `RetryExhausted`.
async fn deliver_to_target(
    transport: Arc<dyn Transport>,
    file: &Path,
    target: &TargetConfig,
    policy: &RetryPolicy,
    cancel: CancellationToken,
) -> Result<()> {
    let mut attempts = 0u32;
    loop {
        if !file.exists() {
            warn!(host = %target.host, file = %file.display(), "Source file vanished, aborting target");
            return Err(RelayError::SourceVanished(file.to_path_buf()));
        }

        attempts += 1;
        match transport.send(file, target).await {
            Ok(()) => {
                info!(host = %target.host, file = %file.display(), attempts, "Transfer succeeded");
                return Ok(());
            }
            Err(e @ RelayError::SourceVanished(_)) => return Err(e),
            Err(e) => {
                warn!(host = %target.host, attempts, "Transfer failed: {}", e);
            }
        }

        if !policy.allows_another(attempts) {
            return Err(RelayError::RetryExhausted {
                target: target.host.clone(),
                attempts,
            });
        }

        tokio::select! {
            _ = tokio::time::sleep(policy.backoff_for(attempts)) => {}
            _ = cancel.cancelled() => {
                return Err(RelayError::TransferFailed {
                    target: target.host.clone(),
                    reason: "cancelled during backoff".into(),
                });
            }
        }
    }
}

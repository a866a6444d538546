//! No-sleep assertion scoped to one file's relay.
//!
//! Holds a child process (e.g. `caffeinate`) alive while a relay is in
//! flight; the child is killed when the guard drops, including on abnormal
//! task exit.

use tokio::process::{Child, Command};
use tracing::{debug, warn};

pub struct SleepInhibitor {
    child: Child,
}

impl SleepInhibitor {
    /// Spawn the configured inhibit command. A spawn failure is logged and
    /// the relay proceeds without the assertion.
    pub fn spawn(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;

        match Command::new(program)
            .args(parts)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => {
                debug!(command, "Sleep inhibitor started");
                Some(Self { child })
            }
            Err(e) => {
                warn!(command, "Failed to start sleep inhibitor: {}", e);
                None
            }
        }
    }
}

impl Drop for SleepInhibitor {
    fn drop(&mut self) {
        // kill_on_drop also covers this; start_kill makes release prompt
        let _ = self.child.start_kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_command_yields_none() {
        assert!(SleepInhibitor::spawn("/nonexistent/inhibit-cmd").is_none());
    }

    #[tokio::test]
    async fn child_is_killed_on_drop() {
        let inhibitor = SleepInhibitor::spawn("sleep 300").unwrap();
        let pid = inhibitor.child.id().unwrap();
        drop(inhibitor);

        // Give the kill a moment, then confirm the process is gone
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let alive = std::path::Path::new(&format!("/proc/{pid}")).exists()
            && std::fs::read_to_string(format!("/proc/{pid}/stat"))
                .map(|s| !s.contains(") Z "))
                .unwrap_or(false);
        assert!(!alive);
    }
}

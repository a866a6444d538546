//! Remote transfer over SSH/SFTP.
//!
//! The upload writes to a temporary remote name and renames into place, so
//! the remote watch directory never observes a partial file. All ssh2 work
//! runs on the blocking pool.

use crate::config::TargetConfig;
use crate::utils::errors::{RelayError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Seam between the retry loop and the wire; tests substitute a fake.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `source` to `target`, preserving the filename
    async fn send(&self, source: &Path, target: &TargetConfig) -> Result<()>;
}

pub struct SshTransport;

#[async_trait]
impl Transport for SshTransport {
    async fn send(&self, source: &Path, target: &TargetConfig) -> Result<()> {
        let source = source.to_path_buf();
        let target = target.clone();
        let host = target.host.clone();

        tokio::task::spawn_blocking(move || upload_via_sftp(&source, &target))
            .await
            .map_err(|e| RelayError::TransferFailed {
                target: host,
                reason: format!("upload task failed: {e}"),
            })?
    }
}

fn upload_via_sftp(source: &Path, target: &TargetConfig) -> Result<()> {
    // Read before connecting; a vanished source must not count as a
    // transfer failure
    let data = match std::fs::read(source) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RelayError::SourceVanished(source.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let filename = source
        .file_name()
        .ok_or_else(|| RelayError::State(format!("no filename in {}", source.display())))?;

    let tcp = std::net::TcpStream::connect((target.host.as_str(), target.port))?;
    let mut sess = ssh2::Session::new()?;
    sess.set_tcp_stream(tcp);
    sess.handshake()?;

    authenticate(&mut sess, target)?;
    if !sess.authenticated() {
        return Err(RelayError::TransferFailed {
            target: target.host.clone(),
            reason: "SSH authentication failed".into(),
        });
    }

    let final_path = target.remote_dir.join(filename);
    let tmp_path = tmp_upload_path(&target.remote_dir, filename);

    let sftp = sess.sftp()?;
    let mut remote_file = sftp.create(&tmp_path)?;
    remote_file.write_all(&data)?;
    drop(remote_file);

    sftp.rename(&tmp_path, &final_path, Some(ssh2::RenameFlags::OVERWRITE))?;
    Ok(())
}

fn authenticate(sess: &mut ssh2::Session, target: &TargetConfig) -> Result<()> {
    if let Some(key_file) = &target.key_file {
        sess.userauth_pubkey_file(&target.username, None, key_file, None)?;
    } else if let Some(password) = &target.password {
        sess.userauth_password(&target.username, password)?;
    } else {
        sess.userauth_agent(&target.username)?;
    }
    Ok(())
}

fn tmp_upload_path(remote_dir: &Path, filename: &std::ffi::OsStr) -> PathBuf {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    remote_dir.join(format!(".{}.part-{}", filename.to_string_lossy(), millis))
}

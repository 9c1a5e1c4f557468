// src/transfer/agent.rs

//! Pluggable copy backends.
//!
//! The pipeline talks to a `TransferAgent` instead of spawning `rsync`
//! itself, so tests can swap in a fake that records what was copied.
//!
//! - [`RsyncAgent`] is the production implementation. It runs `rsync`
//!   (optionally behind a single-instance guard such as `run-one`) and waits
//!   for it to exit.
//! - [`LocalCopyAgent`] copies through a [`FileSystem`] and verifies each file
//!   with blake3; used when the destination is a locally mounted path.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use blake3::Hasher;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::TransferSection;
use crate::errors::{Result, RunsyncError};
use crate::fs::FileSystem;
use crate::types::BoxFuture;

/// Trait abstracting how runs and reports are copied.
pub trait TransferAgent: Send + Sync {
    /// Copy the directory `source` into `destination`, so that it ends up
    /// as `<destination>/<source name>`.
    fn transfer_dir<'a>(&'a self, source: &'a Path, destination: &'a str)
    -> BoxFuture<'a, Result<()>>;

    /// Copy a single file to exactly `destination`.
    fn copy_file<'a>(&'a self, source: &'a Path, destination: &'a str)
    -> BoxFuture<'a, Result<()>>;
}

/// Real transfer agent used in production.
#[derive(Debug, Clone)]
pub struct RsyncAgent {
    command: String,
    options: Vec<String>,
    guard: Vec<String>,
}

impl RsyncAgent {
    pub fn new(section: &TransferSection) -> Self {
        Self {
            command: section.rsync_command.clone(),
            options: section.rsync_options.clone(),
            guard: section.guard_command.clone(),
        }
    }

    /// Full argv for one copy, guard first.
    pub fn argv(&self, source: &Path, destination: &str) -> Vec<String> {
        let mut argv: Vec<String> = self.guard.clone();
        argv.push(self.command.clone());
        argv.extend(self.options.iter().cloned());
        argv.push(source.to_string_lossy().into_owned());
        argv.push(destination.to_string());
        argv
    }

    async fn run(&self, source: &Path, destination: &str) -> Result<()> {
        let argv = self.argv(source, destination);
        info!(?argv, "starting rsync");

        let (program, args) = argv
            .split_first()
            .ok_or_else(|| RunsyncError::TransferFailure("empty rsync command".to_string()))?;

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RunsyncError::TransferFailure(format!("spawning {program}: {e}")))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(source = %source.display(), "rsync: {}", line);
        }

        if output.status.success() {
            info!(source = %source.display(), destination, "rsync finished");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            Err(RunsyncError::TransferFailure(format!(
                "{program} exited with {} copying {} to {destination}: {}",
                output.status.code().map_or("a signal".to_string(), |c| format!("code {c}")),
                source.display(),
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            )))
        }
    }
}

impl TransferAgent for RsyncAgent {
    fn transfer_dir<'a>(
        &'a self,
        source: &'a Path,
        destination: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        // No trailing slash on the source: rsync creates <destination>/<name>.
        Box::pin(self.run(source, destination))
    }

    fn copy_file<'a>(&'a self, source: &'a Path, destination: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.run(source, destination))
    }
}

/// Recursive copy with per-file blake3 verification.
#[derive(Debug, Clone)]
pub struct LocalCopyAgent {
    fs: Arc<dyn FileSystem>,
}

impl LocalCopyAgent {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    fn copy_tree(&self, source: &Path, target: &Path) -> anyhow::Result<usize> {
        self.fs.create_dir_all(target)?;
        let mut copied = 0;
        for entry in self.fs.read_dir(source)? {
            let Some(name) = entry.file_name() else {
                continue;
            };
            let dest = target.join(name);
            if self.fs.is_dir(&entry) {
                copied += self.copy_tree(&entry, &dest)?;
            } else {
                self.copy_verified(&entry, &dest)?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    fn copy_verified(&self, source: &Path, dest: &Path) -> anyhow::Result<()> {
        self.fs.copy_file(source, dest)?;
        let expected = hash_file(self.fs.as_ref(), source)?;
        let actual = hash_file(self.fs.as_ref(), dest)?;
        if expected != actual {
            anyhow::bail!(
                "checksum mismatch copying {:?} to {:?} ({expected} != {actual})",
                source,
                dest
            );
        }
        Ok(())
    }
}

impl TransferAgent for LocalCopyAgent {
    fn transfer_dir<'a>(
        &'a self,
        source: &'a Path,
        destination: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let name = source.file_name().ok_or_else(|| {
                RunsyncError::TransferFailure(format!("{:?} has no directory name", source))
            })?;
            let target = PathBuf::from(destination).join(name);
            let copied = self
                .copy_tree(source, &target)
                .with_context(|| format!("copying {:?} to {:?}", source, target))
                .map_err(|e| RunsyncError::TransferFailure(format!("{e:#}")))?;
            info!(source = %source.display(), target = %target.display(), files = copied, "local copy verified");
            Ok(())
        })
    }

    fn copy_file<'a>(&'a self, source: &'a Path, destination: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.copy_verified(source, Path::new(destination))
                .map_err(|e| RunsyncError::TransferFailure(format!("{e:#}")))
        })
    }
}

/// blake3 of a file's contents, hex encoded.
pub fn hash_file(fs: &dyn FileSystem, path: &Path) -> anyhow::Result<String> {
    let mut hasher = Hasher::new();
    let mut reader = fs.open_read(path)?;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("reading {:?} for hashing", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use runsync::errors::{Result, RunsyncError};
use runsync::fs::RealFileSystem;
use runsync::notify::{Notification, Notifier};
use runsync::qc::{Demultiplexer, QcJob};
use runsync::transfer::agent::{LocalCopyAgent, TransferAgent};
use runsync::types::BoxFuture;

/// Notifier that keeps every notification in memory.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<Notification> {
        self.sent().into_iter().filter(|n| n.is_error()).collect()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent().into_iter().map(|n| n.subject).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(notification.clone());
        })
    }
}

/// One call made to a [`FakeTransferAgent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCall {
    Dir { source: PathBuf, destination: String },
    File { source: PathBuf, destination: String },
}

/// Transfer agent that records what it was asked to copy.
///
/// By default nothing is copied. [`FakeTransferAgent::copying`] forwards to
/// a real [`LocalCopyAgent`] after recording.
#[derive(Clone, Default)]
pub struct FakeTransferAgent {
    calls: Arc<Mutex<Vec<AgentCall>>>,
    fail_dirs: Arc<Mutex<bool>>,
    fail_files: Arc<Mutex<bool>>,
    inner: Option<LocalCopyAgent>,
}

impl FakeTransferAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copying() -> Self {
        Self {
            inner: Some(LocalCopyAgent::new(Arc::new(RealFileSystem))),
            ..Self::default()
        }
    }

    pub fn fail_dir_transfers(&self, fail: bool) {
        *self.fail_dirs.lock().unwrap() = fail;
    }

    pub fn fail_file_copies(&self, fail: bool) {
        *self.fail_files.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn dir_transfers(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, AgentCall::Dir { .. }))
            .count()
    }

    pub fn file_copies(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, AgentCall::File { .. }))
            .count()
    }
}

impl TransferAgent for FakeTransferAgent {
    fn transfer_dir<'a>(&'a self, source: &'a Path, destination: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(AgentCall::Dir {
                source: source.to_path_buf(),
                destination: destination.to_string(),
            });
            if *self.fail_dirs.lock().unwrap() {
                return Err(RunsyncError::TransferFailure(
                    "rsync exited with code 12: connection unexpectedly closed".to_string(),
                ));
            }
            match &self.inner {
                Some(agent) => agent.transfer_dir(source, destination).await,
                None => Ok(()),
            }
        })
    }

    fn copy_file<'a>(&'a self, source: &'a Path, destination: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(AgentCall::File {
                source: source.to_path_buf(),
                destination: destination.to_string(),
            });
            if *self.fail_files.lock().unwrap() {
                return Err(RunsyncError::TransferFailure(
                    "rsync exited with code 23: permission denied".to_string(),
                ));
            }
            match &self.inner {
                Some(agent) => agent.copy_file(source, destination).await,
                None => Ok(()),
            }
        })
    }
}

/// Demultiplexer that records launched jobs and optionally "finishes" them
/// on the spot by writing the exit-status marker.
#[derive(Clone, Default)]
pub struct FakeDemultiplexer {
    jobs: Arc<Mutex<Vec<QcJob>>>,
    finish_with: Option<i32>,
    fail_launch: bool,
}

impl FakeDemultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every launched job exits immediately with `code`.
    pub fn finishing_with(code: i32) -> Self {
        Self {
            finish_with: Some(code),
            ..Self::default()
        }
    }

    pub fn failing_to_launch() -> Self {
        Self {
            fail_launch: true,
            ..Self::default()
        }
    }

    pub fn jobs(&self) -> Vec<QcJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl Demultiplexer for FakeDemultiplexer {
    fn launch<'a>(&'a self, job: &'a QcJob) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.fail_launch {
                return Err(RunsyncError::Other(anyhow::anyhow!("sh: anglerfish: not found")));
            }
            self.jobs.lock().unwrap().push(job.clone());
            if let Some(code) = self.finish_with {
                std::fs::write(&job.exit_status_path, format!("{code}\n"))?;
            }
            Ok(())
        })
    }
}

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use runsync::cli::CategoryArg;
use runsync::config::ConfigFile;
use runsync::engine::{Collaborators, Invocation, Mode, RunOutcome, StatusLine};
use runsync::errors::Result;
use runsync::fs::{FileSystem, RealFileSystem};
use runsync::qc::DirSampleSheetLookup;
use runsync::run::RunId;
use runsync::status::{JsonDirStore, StatusDocument, StatusStore};
use runsync_test_utils::builders::{ConfigBuilder, Facility};
use runsync_test_utils::fakes::{FakeDemultiplexer, FakeTransferAgent, RecordingNotifier};

pub use runsync_test_utils::{init_tracing, with_timeout};

/// A facility on disk plus the collaborators one invocation needs.
///
/// The filesystem, store and sample sheet lookup are the real ones; the
/// agent copies locally while recording, notifications are kept in memory.
pub struct Harness {
    pub facility: Facility,
    pub cfg: ConfigFile,
    pub fs: Arc<dyn FileSystem>,
    pub agent: FakeTransferAgent,
    pub notifier: RecordingNotifier,
    pub store: JsonDirStore,
    pub demux: FakeDemultiplexer,
    pub samplesheets: DirSampleSheetLookup,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|c| c)
    }

    pub fn with_config(customize: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        init_tracing();
        let facility = Facility::new();
        let cfg = customize(facility.config()).build();
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let store = JsonDirStore::new(fs.clone(), facility.store_dir());
        let samplesheets = DirSampleSheetLookup::new(fs.clone(), facility.samplesheets_dir());
        Self {
            facility,
            cfg,
            fs,
            agent: FakeTransferAgent::copying(),
            notifier: RecordingNotifier::new(),
            store,
            demux: FakeDemultiplexer::new(),
            samplesheets,
        }
    }

    pub fn with_demux(mut self, demux: FakeDemultiplexer) -> Self {
        self.demux = demux;
        self
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            fs: self.fs.as_ref(),
            agent: &self.agent,
            notifier: &self.notifier,
            store: Some(&self.store),
            demux: Some(&self.demux),
            samplesheets: Some(&self.samplesheets),
        }
    }

    pub async fn process_all(&self) -> Vec<RunOutcome> {
        with_timeout(Invocation::new(&self.cfg, self.collaborators()).process_all(CategoryArg::All))
            .await
    }

    pub async fn process_path(&self, path: &Path, mode: Mode) -> Result<RunOutcome> {
        with_timeout(Invocation::new(&self.cfg, self.collaborators()).process_path(path, mode))
            .await
    }

    pub fn status(&self) -> Vec<StatusLine> {
        Invocation::new(&self.cfg, self.collaborators()).status(CategoryArg::All)
    }

    pub fn document(&self, id: &RunId) -> Option<StatusDocument> {
        self.store.get(id).expect("status store readable")
    }
}

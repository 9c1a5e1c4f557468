// src/qc/samplesheet.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use globset::{Glob, GlobMatcher};
use tracing::{debug, info};

use crate::errors::{Result, RunsyncError};
use crate::fs::FileSystem;
use crate::run::Run;

/// Resolves the sample sheet a QC run should be demultiplexed with.
pub trait SampleSheetLookup: Send + Sync {
    /// `Ok(None)` when no sheet is available yet.
    fn find(&self, run: &Run) -> Result<Option<PathBuf>>;
}

/// Looks for `*<flowcell id>*.csv` anywhere below a directory and picks the
/// last one by file name (sheets are named with a timestamp).
#[derive(Debug, Clone)]
pub struct DirSampleSheetLookup {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl DirSampleSheetLookup {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        Self { fs, dir: dir.into() }
    }

    fn collect(&self, dir: &Path, matcher: &GlobMatcher, found: &mut Vec<PathBuf>) -> Result<()> {
        for entry in self.fs.read_dir(dir)? {
            if self.fs.is_dir(&entry) {
                self.collect(&entry, matcher, found)?;
            } else if entry
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| matcher.is_match(n))
            {
                found.push(entry);
            }
        }
        Ok(())
    }
}

impl SampleSheetLookup for DirSampleSheetLookup {
    fn find(&self, run: &Run) -> Result<Option<PathBuf>> {
        if !self.fs.is_dir(&self.dir) {
            debug!(dir = %self.dir.display(), "sample sheet directory does not exist");
            return Ok(None);
        }
        let pattern = format!("*{}*.csv", run.id.flowcell_id());
        let matcher = Glob::new(&pattern)
            .map_err(|e| RunsyncError::Other(anyhow!("invalid glob {pattern:?}: {e}")))?
            .compile_matcher();

        let mut found = Vec::new();
        self.collect(&self.dir, &matcher, &mut found)?;
        let newest = found.into_iter().max_by(|a, b| a.file_name().cmp(&b.file_name()));
        if let Some(sheet) = &newest {
            info!(run_id = %run.id, samplesheet = %sheet.display(), "found sample sheet");
        }
        Ok(newest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::types::{InstrumentKind, RunCategory};

    fn run() -> Run {
        Run::new(
            PathBuf::from("/seq/qc/QC_1/s1/20240131_1702_MN19414_FAX12345_abc"),
            PathBuf::from("/seq/qc"),
            InstrumentKind::Minion,
            RunCategory::Qc,
        )
        .unwrap()
    }

    #[test]
    fn picks_latest_sheet_for_flowcell() {
        let fs = MockFileSystem::new();
        fs.add_file("/sheets/2024/FAX12345_20240201T0900.csv", "a");
        fs.add_file("/sheets/2024/FAX12345_20240203T0900.csv", "b");
        fs.add_file("/sheets/2024/FAX99999_20240209T0900.csv", "c");
        fs.add_file("/sheets/2024/FAX12345_notes.txt", "d");

        let lookup = DirSampleSheetLookup::new(Arc::new(fs), "/sheets");
        assert_eq!(
            lookup.find(&run()).unwrap(),
            Some(PathBuf::from("/sheets/2024/FAX12345_20240203T0900.csv"))
        );
    }

    #[test]
    fn nothing_found_is_none() {
        let fs = MockFileSystem::new();
        fs.add_dir("/sheets");
        let lookup = DirSampleSheetLookup::new(Arc::new(fs), "/sheets");
        assert_eq!(lookup.find(&run()).unwrap(), None);
    }
}

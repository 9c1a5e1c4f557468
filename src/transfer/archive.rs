// src/transfer/archive.rs

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::{Result, RunsyncError};
use crate::fs::FileSystem;
use crate::run::Run;

/// Move a transferred run into `<archive_dir>/<project>/...`, then remove any
/// enclosing directories below the data dir that are left empty.
///
/// The archive must be on the same filesystem as the run.
pub fn archive_run(fs: &dyn FileSystem, run: &Run, archive_dir: &Path) -> Result<PathBuf> {
    let project = run.project_id(fs);
    let target = archive_dir.join(&project).join(run.path_within_project());

    if fs.exists(&target) {
        return Err(RunsyncError::Other(anyhow::anyhow!(
            "archive target {} already exists",
            target.display()
        )));
    }

    if let Some(parent) = target.parent() {
        fs.create_dir_all(parent)?;
    }

    info!(run_id = %run.id, from = %run.dir.display(), to = %target.display(), "archiving run");
    fs.rename(&run.dir, &target)?;

    prune_empty_parents(fs, &run.dir, &run.data_dir)?;
    Ok(target)
}

/// Remove now-empty ancestors of `removed`, stopping at (and keeping)
/// `stop_at`.
fn prune_empty_parents(fs: &dyn FileSystem, removed: &Path, stop_at: &Path) -> Result<()> {
    let mut current = removed.parent();
    while let Some(dir) = current {
        if dir == stop_at || !dir.starts_with(stop_at) {
            break;
        }
        if !fs.read_dir(dir)?.is_empty() {
            debug!(dir = %dir.display(), "directory still has data; keeping it");
            break;
        }
        info!(dir = %dir.display(), "project folder is empty; removing it");
        fs.remove_dir(dir)?;
        current = dir.parent();
    }
    Ok(())
}

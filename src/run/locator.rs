// src/run/locator.rs

//! Finding candidate run directories under the configured data dirs.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::cli::CategoryArg;
use crate::config::ConfigFile;
use crate::errors::{Result, RunsyncError};
use crate::fs::FileSystem;
use crate::run::id::looks_like_run_dir;
use crate::types::{InstrumentKind, RunCategory};

/// A directory that looks like a run, together with where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub path: PathBuf,
    pub data_dir: PathBuf,
    pub category: RunCategory,
    pub instrument: InstrumentKind,
}

/// Scan one data dir for run directories exactly `depth` levels below it.
///
/// An unreadable or missing root is logged and yields nothing so that other
/// roots are still processed.
pub fn locate_runs(
    fs: &dyn FileSystem,
    data_dir: &Path,
    ignore_dirs: &[String],
    depth: usize,
) -> Vec<PathBuf> {
    if !fs.is_dir(data_dir) {
        warn!(
            data_dir = %data_dir.display(),
            "there was an issue locating this directory; check that it exists"
        );
        return Vec::new();
    }

    let mut found = Vec::new();
    scan_level(fs, data_dir, ignore_dirs, depth.max(1), &mut found);

    if found.is_empty() {
        debug!(data_dir = %data_dir.display(), "no run directories found");
    }
    found
}

fn scan_level(
    fs: &dyn FileSystem,
    dir: &Path,
    ignore_dirs: &[String],
    remaining: usize,
    found: &mut Vec<PathBuf>,
) {
    let entries = match fs.read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list directory; skipping");
            return;
        }
    };

    for entry in entries {
        if !fs.is_dir(&entry) {
            continue;
        }
        let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if ignore_dirs.iter().any(|i| i == name) {
            debug!(dir = %entry.display(), "ignored directory");
            continue;
        }

        if remaining == 1 {
            if looks_like_run_dir(name) {
                found.push(entry.clone());
            } else {
                debug!(dir = %entry.display(), "not a run directory name; skipping");
            }
        } else {
            scan_level(fs, &entry, ignore_dirs, remaining - 1, found);
        }
    }
}

/// Every run directory of the selected categories, in configuration order.
pub fn locate_all(fs: &dyn FileSystem, cfg: &ConfigFile, filter: CategoryArg) -> Vec<Located> {
    let mut all = Vec::new();

    for (category, cat_cfg) in cfg.categories() {
        if !filter.includes(category) {
            continue;
        }
        for (instrument, inst) in cat_cfg.instruments.iter() {
            for data_dir in inst.data_dirs.iter() {
                for path in locate_runs(fs, data_dir, &cat_cfg.ignore_dirs, cat_cfg.run_depth) {
                    all.push(Located {
                        path,
                        data_dir: data_dir.clone(),
                        category,
                        instrument: *instrument,
                    });
                }
            }
        }
    }

    all
}

/// Work out category and instrument for an explicitly named run directory
/// from the configured data dir it lives under.
pub fn resolve_explicit(fs: &dyn FileSystem, cfg: &ConfigFile, path: &Path) -> Result<Located> {
    let path = fs.canonicalize(path).map_err(|e| {
        RunsyncError::ValidationFailure(format!("cannot resolve run path {:?}: {e}", path))
    })?;

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if !looks_like_run_dir(name) {
        return Err(RunsyncError::ValidationFailure(format!(
            "{:?} is not a flow cell directory; provide the full path to the run",
            path
        )));
    }

    for (category, cat_cfg) in cfg.categories() {
        for (instrument, inst) in cat_cfg.instruments.iter() {
            for data_dir in inst.data_dirs.iter() {
                let root = fs.canonicalize(data_dir).unwrap_or_else(|_| data_dir.clone());
                let Ok(rel) = path.strip_prefix(&root) else {
                    continue;
                };
                if rel.components().count() == cat_cfg.run_depth {
                    return Ok(Located {
                        path: path.clone(),
                        data_dir: root,
                        category,
                        instrument: *instrument,
                    });
                }
            }
        }
    }

    Err(RunsyncError::ValidationFailure(format!(
        "{:?} is not inside any configured data dir",
        path
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn flat_layout() {
        let fs = MockFileSystem::new();
        fs.add_dir("/seq/promethion/20240131_1702_1A_PAM12345_abc");
        fs.add_dir("/seq/promethion/nosync/20230101_1000_1A_PAM00001_abc");
        fs.add_dir("/seq/promethion/scratch");
        fs.add_file("/seq/promethion/20240101_file.txt", "");

        let found = locate_runs(&fs, Path::new("/seq/promethion"), &["nosync".to_string()], 1);
        assert_eq!(
            found,
            vec![PathBuf::from("/seq/promethion/20240131_1702_1A_PAM12345_abc")]
        );
    }

    #[test]
    fn nested_layout() {
        let fs = MockFileSystem::new();
        fs.add_dir("/seq/minion/qc/exp1/sampleA/20240131_1702_MN1_FAX1_abc");
        fs.add_dir("/seq/minion/qc/exp1/sampleB/20240201_0900_MN1_FAX2_def");
        fs.add_dir("/seq/minion/qc/nosync/exp0/s/20230101_0900_MN1_FAX0_aaa");

        let found = locate_runs(&fs, Path::new("/seq/minion/qc"), &["nosync".to_string()], 3);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.starts_with("/seq/minion/qc/exp1")));
    }

    #[test]
    fn missing_root_yields_nothing() {
        let fs = MockFileSystem::new();
        assert!(locate_runs(&fs, Path::new("/does/not/exist"), &[], 1).is_empty());
    }
}

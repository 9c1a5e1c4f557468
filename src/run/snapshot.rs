// src/run/snapshot.rs

//! Point-in-time view of a run directory.
//!
//! A [`RunSnapshot`] is captured once per run per invocation and is the only
//! input (together with the transfer log) the state evaluator looks at.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use globset::Glob;

use crate::config::QcSection;
use crate::errors::{Result, RunsyncError};
use crate::fs::FileSystem;

/// Substring of the file MinKNOW writes when sequencing has ended.
pub const SUMMARY_MARKER: &str = "final_summary";
/// Empty file written once the instrument has flushed all data.
pub const SYNC_FINISHED_MARKER: &str = ".sync_finished";
pub const RUN_PATH_FILE: &str = "run_path.txt";
pub const PORE_COUNT_HISTORY_FILE: &str = "pore_count_history.csv";
pub const JSON_REPORT_GLOB: &str = "report*.json";
pub const HTML_REPORT_GLOB: &str = "report*.html";
/// Written into the QC output dir once a failed QC job has been reported.
pub const QC_FAILURE_NOTIFIED_MARKER: &str = ".qc_failure_notified";
/// Written into the QC output dir once a successful QC job has been handed
/// to LIMS and reported.
pub const QC_SUCCESS_NOTIFIED_MARKER: &str = ".qc_success_notified";
/// Written into the run dir when the copy succeeded but the transfer log
/// could not record it. Blocks further copies until an operator resolves it.
pub const TRANSFERRED_UNLOGGED_MARKER: &str = ".transferred_unlogged";

/// Where a QC job leaves its traces inside a run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QcLayout {
    pub output_dir_name: String,
    pub exit_status_file: String,
}

impl QcLayout {
    pub fn output_dir(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(&self.output_dir_name)
    }

    pub fn exit_status_path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(&self.exit_status_file)
    }

    pub fn failure_notified_path(&self, run_dir: &Path) -> PathBuf {
        self.output_dir(run_dir).join(QC_FAILURE_NOTIFIED_MARKER)
    }

    pub fn success_notified_path(&self, run_dir: &Path) -> PathBuf {
        self.output_dir(run_dir).join(QC_SUCCESS_NOTIFIED_MARKER)
    }
}

impl From<&QcSection> for QcLayout {
    fn from(qc: &QcSection) -> Self {
        Self {
            output_dir_name: qc.output_dir_name.clone(),
            exit_status_file: qc.exit_status_file.clone(),
        }
    }
}

/// Recorded outcome of a QC job, read from its exit-status marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Code(i32),
    /// The marker exists but does not hold an integer.
    Unreadable,
}

impl ExitStatus {
    pub fn parse(contents: &str) -> Self {
        contents
            .trim()
            .parse::<i32>()
            .map(ExitStatus::Code)
            .unwrap_or(ExitStatus::Unreadable)
    }

    pub fn is_success(self) -> bool {
        self == ExitStatus::Code(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QcSnapshot {
    pub output_dir_present: bool,
    pub exit_status: Option<ExitStatus>,
    pub failure_notified: bool,
    pub success_notified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSnapshot {
    /// Whether the run directory still exists in the active tree.
    pub present: bool,
    /// File and directory names directly inside the run directory.
    pub entries: BTreeSet<String>,
    /// Only captured for QC-category runs.
    pub qc: Option<QcSnapshot>,
}

impl RunSnapshot {
    pub fn capture(fs: &dyn FileSystem, run_dir: &Path, qc: Option<&QcLayout>) -> Result<Self> {
        if !fs.is_dir(run_dir) {
            return Ok(Self {
                present: false,
                entries: BTreeSet::new(),
                qc: qc.map(|_| QcSnapshot::default()),
            });
        }

        let entries = fs
            .read_dir(run_dir)?
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();

        let qc = match qc {
            Some(layout) => Some(capture_qc(fs, run_dir, layout)?),
            None => None,
        };

        Ok(Self {
            present: true,
            entries,
            qc,
        })
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains(name)
    }

    pub fn has_summary(&self) -> bool {
        self.entries.iter().any(|e| e.contains(SUMMARY_MARKER))
    }

    pub fn has_sync_finished(&self) -> bool {
        self.has(SYNC_FINISHED_MARKER)
    }

    pub fn has_transferred_unlogged(&self) -> bool {
        self.has(TRANSFERRED_UNLOGGED_MARKER)
    }

    /// Entry names matching a shell-style glob, in sorted order.
    pub fn matching(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = Glob::new(pattern)
            .map_err(|e| RunsyncError::Other(anyhow!("invalid glob {pattern:?}: {e}")))?
            .compile_matcher();
        Ok(self
            .entries
            .iter()
            .filter(|e| matcher.is_match(e.as_str()))
            .cloned()
            .collect())
    }

    /// The single entry matching `pattern`; none or several is a missing
    /// artifact.
    pub fn unique_match(&self, pattern: &str, what: &str) -> Result<String> {
        let mut found = self.matching(pattern)?;
        match found.len() {
            0 => Err(RunsyncError::MissingArtifact(format!("missing {what} ({pattern})"))),
            1 => Ok(found.remove(0)),
            n => Err(RunsyncError::MissingArtifact(format!(
                "{n} conflicting {what} files ({pattern}): {}",
                found.join(", ")
            ))),
        }
    }
}

fn capture_qc(fs: &dyn FileSystem, run_dir: &Path, layout: &QcLayout) -> Result<QcSnapshot> {
    let output_dir_present = fs.is_dir(&layout.output_dir(run_dir));

    let exit_path = layout.exit_status_path(run_dir);
    let exit_status = if fs.is_file(&exit_path) {
        Some(ExitStatus::parse(&fs.read_to_string(&exit_path)?))
    } else {
        None
    };

    Ok(QcSnapshot {
        output_dir_present,
        exit_status,
        failure_notified: fs.is_file(&layout.failure_notified_path(run_dir)),
        success_notified: fs.is_file(&layout.success_notified_path(run_dir)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    const RUN: &str = "/data/20240131_1702_1A_PAM12345_abcdef";

    fn layout() -> QcLayout {
        QcLayout {
            output_dir_name: "anglerfish_output".to_string(),
            exit_status_file: ".exitcode_for_anglerfish".to_string(),
        }
    }

    #[test]
    fn absent_directory_is_not_present() {
        let fs = MockFileSystem::new();
        let snap = RunSnapshot::capture(&fs, Path::new(RUN), None).unwrap();
        assert!(!snap.present);
        assert!(snap.entries.is_empty());
    }

    #[test]
    fn captures_markers_and_reports() {
        let fs = MockFileSystem::new();
        fs.add_file(format!("{RUN}/final_summary_PAM12345.txt"), "");
        fs.add_file(format!("{RUN}/report_PAM12345.json"), "{}");
        fs.add_file(format!("{RUN}/report_PAM12345.html"), "");
        fs.add_file(format!("{RUN}/.sync_finished"), "");

        let snap = RunSnapshot::capture(&fs, Path::new(RUN), None).unwrap();
        assert!(snap.present);
        assert!(snap.has_summary());
        assert!(snap.has_sync_finished());
        assert_eq!(
            snap.unique_match(JSON_REPORT_GLOB, "json report").unwrap(),
            "report_PAM12345.json"
        );
    }

    #[test]
    fn report_ambiguity() {
        let fs = MockFileSystem::new();
        fs.add_file(format!("{RUN}/report_a.json"), "{}");
        fs.add_file(format!("{RUN}/report_b.json"), "{}");
        let snap = RunSnapshot::capture(&fs, Path::new(RUN), None).unwrap();

        let err = snap.unique_match(JSON_REPORT_GLOB, "json report").unwrap_err();
        assert!(matches!(err, RunsyncError::MissingArtifact(msg) if msg.contains("2 conflicting")));

        let err = snap.unique_match(HTML_REPORT_GLOB, "html report").unwrap_err();
        assert!(matches!(err, RunsyncError::MissingArtifact(msg) if msg.contains("missing")));
    }

    #[test]
    fn captures_qc_exit_status() {
        let fs = MockFileSystem::new();
        fs.add_dir(format!("{RUN}/anglerfish_output"));
        fs.add_file(format!("{RUN}/.exitcode_for_anglerfish"), "1\n");

        let snap = RunSnapshot::capture(&fs, Path::new(RUN), Some(&layout())).unwrap();
        let qc = snap.qc.unwrap();
        assert!(qc.output_dir_present);
        assert_eq!(qc.exit_status, Some(ExitStatus::Code(1)));
        assert!(!qc.failure_notified);
        assert!(!qc.success_notified);
    }

    #[test]
    fn captures_handled_markers() {
        let fs = MockFileSystem::new();
        fs.add_file(format!("{RUN}/anglerfish_output/.qc_success_notified"), "");
        fs.add_file(format!("{RUN}/.exitcode_for_anglerfish"), "0");
        fs.add_file(format!("{RUN}/.transferred_unlogged"), "");

        let snap = RunSnapshot::capture(&fs, Path::new(RUN), Some(&layout())).unwrap();
        assert!(snap.has_transferred_unlogged());
        let qc = snap.qc.unwrap();
        assert!(qc.success_notified);
        assert!(!qc.failure_notified);
    }

    #[test]
    fn exit_status_parsing() {
        assert!(ExitStatus::parse("0\n").is_success());
        assert_eq!(ExitStatus::parse(" 137 "), ExitStatus::Code(137));
        assert_eq!(ExitStatus::parse("killed"), ExitStatus::Unreadable);
    }
}

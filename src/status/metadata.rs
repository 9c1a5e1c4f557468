// src/status/metadata.rs

//! Metadata captured when a run's status document is first created.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, RunsyncError};
use crate::fs::FileSystem;
use crate::run::snapshot::{PORE_COUNT_HISTORY_FILE, RUN_PATH_FILE};
use crate::run::Run;
use crate::types::InstrumentKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub instrument: InstrumentKind,
    pub flowcell_id: String,
    pub position: String,
    pub start_date: String,
    pub start_time: String,
    /// `experiment/sample/run` as written by the instrument.
    pub run_path: String,
    pub experiment: Option<String>,
    pub sample: Option<String>,
    /// One map per CSV row, keyed by the header.
    pub pore_count_history: Vec<BTreeMap<String, String>>,
}

impl RunMetadata {
    /// Read `run_path.txt` and `pore_count_history.csv` from the run directory.
    ///
    /// Both files must exist; without them the document would be incomplete.
    pub fn collect(fs: &dyn FileSystem, run: &Run) -> Result<Self> {
        let run_path_file = run.dir.join(RUN_PATH_FILE);
        let pore_file = run.dir.join(PORE_COUNT_HISTORY_FILE);
        for required in [&run_path_file, &pore_file] {
            if !fs.is_file(required) {
                return Err(RunsyncError::MissingArtifact(format!(
                    "couldn't find {}",
                    required.display()
                )));
            }
        }

        let run_path = fs.read_to_string(&run_path_file)?.trim().to_string();
        let mut parts = run_path.split('/').filter(|p| !p.is_empty());
        let experiment = parts.next().map(str::to_string);
        let sample = parts.next().map(str::to_string);

        let pore_count_history = parse_csv_rows(&fs.read_to_string(&pore_file)?);

        Ok(Self {
            instrument: run.instrument,
            flowcell_id: run.id.flowcell_id().to_string(),
            position: run.id.position().to_string(),
            start_date: run.id.date().to_string(),
            start_time: run.id.time().to_string(),
            run_path,
            experiment,
            sample,
            pore_count_history,
        })
    }
}

/// Plain comma-separated rows under a header line. Short rows are padded
/// with empty values; blank lines are skipped.
fn parse_csv_rows(contents: &str) -> Vec<BTreeMap<String, String>> {
    let mut lines = contents.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();

    lines
        .map(|line| {
            let mut values = line.split(',').map(str::trim);
            columns
                .iter()
                .map(|c| (c.to_string(), values.next().unwrap_or_default().to_string()))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::types::RunCategory;
    use std::path::PathBuf;

    const DIR: &str = "/seq/promethion/20240131_1702_1A_PAM12345_abc";

    fn run() -> Run {
        Run::new(
            PathBuf::from(DIR),
            PathBuf::from("/seq/promethion"),
            InstrumentKind::Promethion,
            RunCategory::User,
        )
        .unwrap()
    }

    #[test]
    fn collects_path_and_pore_counts() {
        let fs = MockFileSystem::new();
        fs.add_file(format!("{DIR}/run_path.txt"), "P123_exp/P123_1001/20240131_1702_1A_PAM12345_abc\n");
        fs.add_file(
            format!("{DIR}/pore_count_history.csv"),
            "flow_cell_id,timestamp,position,type,num_pores,total_pores\n\
             PAM12345,2024-01-24 12:00:39.757935,1A,qc,6753,6753\n\
             PAM12345,2024-01-23 11:00:39.757935,1A,mux,8000,8000\n",
        );

        let meta = RunMetadata::collect(&fs, &run()).unwrap();
        assert_eq!(meta.experiment.as_deref(), Some("P123_exp"));
        assert_eq!(meta.sample.as_deref(), Some("P123_1001"));
        assert_eq!(meta.flowcell_id, "PAM12345");
        assert_eq!(meta.pore_count_history.len(), 2);
        assert_eq!(meta.pore_count_history[1]["type"], "mux");
        assert_eq!(meta.pore_count_history[0]["num_pores"], "6753");
    }

    #[test]
    fn missing_pore_counts_is_missing_artifact() {
        let fs = MockFileSystem::new();
        fs.add_file(format!("{DIR}/run_path.txt"), "exp/sample/run");
        let err = RunMetadata::collect(&fs, &run()).unwrap_err();
        assert!(matches!(err, RunsyncError::MissingArtifact(m) if m.contains("pore_count_history")));
    }
}

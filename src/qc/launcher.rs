// src/qc/launcher.rs

//! Starting the external demultiplexer.

use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tracing::info;

use crate::config::QcSection;
use crate::errors::{Result, RunsyncError};
use crate::types::BoxFuture;

use super::QcJob;

/// Name of the log file the job writes inside its output directory.
pub const DEMUX_LOG_FILE: &str = "demux.log";

/// Trait abstracting how a demultiplexing job is started.
///
/// `launch` returns as soon as the job is running; completion is observed
/// later through the exit-status marker.
pub trait Demultiplexer: Send + Sync {
    fn launch<'a>(&'a self, job: &'a QcJob) -> BoxFuture<'a, Result<()>>;
}

/// Runs the configured command through `sh -c` and leaves it running after
/// this process exits. The shell writes the command's exit code to the
/// exit-status marker.
#[derive(Debug, Clone)]
pub struct ShellDemultiplexer {
    command: String,
    args: Vec<String>,
}

impl ShellDemultiplexer {
    pub fn new(qc: &QcSection) -> Self {
        Self {
            command: qc.demux_command.clone(),
            args: qc.demux_args.clone(),
        }
    }

    /// The full `sh -c` script for `job`.
    pub fn script(&self, job: &QcJob) -> String {
        let mut words = vec![shell_quote(&self.command)];
        words.extend(self.args.iter().map(|a| shell_quote(&substitute(a, job))));

        let log = job.output_dir.join(DEMUX_LOG_FILE);
        format!(
            "cd {} && {} > {} 2>&1; echo $? > {}",
            shell_quote(&job.run_dir.to_string_lossy()),
            words.join(" "),
            shell_quote(&log.to_string_lossy()),
            shell_quote(&job.exit_status_path.to_string_lossy()),
        )
    }
}

impl Demultiplexer for ShellDemultiplexer {
    fn launch<'a>(&'a self, job: &'a QcJob) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let script = self.script(job);
            info!(run_id = %job.run_id, %script, "launching demultiplexing");

            // The child is not awaited and not killed on drop, so it
            // outlives this invocation.
            let child = Command::new("sh")
                .arg("-c")
                .arg(&script)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .with_context(|| format!("spawning demultiplexer for run {}", job.run_id))
                .map_err(RunsyncError::Other)?;

            info!(run_id = %job.run_id, pid = child.id(), "demultiplexing started");
            Ok(())
        })
    }
}

fn substitute(arg: &str, job: &QcJob) -> String {
    arg.replace("{samplesheet}", &job.samplesheet.to_string_lossy())
        .replace("{output_dir}", &job.output_dir.to_string_lossy())
        .replace("{run_id}", job.run_id.as_str())
}

fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunId;
    use std::path::PathBuf;

    fn job() -> QcJob {
        let run_dir = PathBuf::from("/seq/qc/QC_1/s1/20240131_1702_MN1_FAX1_abc");
        QcJob {
            run_id: RunId::parse("20240131_1702_MN1_FAX1_abc").unwrap(),
            samplesheet: PathBuf::from("/sheets/FAX1's.csv"),
            output_dir: run_dir.join("anglerfish_output"),
            exit_status_path: run_dir.join(".exitcode_for_anglerfish"),
            run_dir,
        }
    }

    #[test]
    fn script_substitutes_and_records_exit_code() {
        let demux = ShellDemultiplexer {
            command: "anglerfish".to_string(),
            args: vec![
                "--samplesheet".to_string(),
                "{samplesheet}".to_string(),
                "--out_fastq".to_string(),
                "{output_dir}".to_string(),
            ],
        };
        let script = demux.script(&job());
        assert_eq!(
            script,
            "cd '/seq/qc/QC_1/s1/20240131_1702_MN1_FAX1_abc' && 'anglerfish' '--samplesheet' \
             '/sheets/FAX1'\\''s.csv' '--out_fastq' \
             '/seq/qc/QC_1/s1/20240131_1702_MN1_FAX1_abc/anglerfish_output' \
             > '/seq/qc/QC_1/s1/20240131_1702_MN1_FAX1_abc/anglerfish_output/demux.log' 2>&1; \
             echo $? > '/seq/qc/QC_1/s1/20240131_1702_MN1_FAX1_abc/.exitcode_for_anglerfish'"
        );
    }
}

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use runsync::config::{
    CategorySection, ConfigFile, InstrumentSection, MailSection, QcSection, RawConfigFile,
    ReportsSection, StatusSection, TransferSection,
};
use runsync::run::RunId;
use runsync::types::TransferAgentKind;
use serde_json::{json, Value};
use tempfile::TempDir;

/// A throwaway sequencing facility: data dirs, archive, cluster, shared
/// report dir and status store, all below one temp dir.
pub struct Facility {
    root: TempDir,
}

impl Facility {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp facility");
        let facility = Self { root };
        for dir in [
            facility.promethion_dir(),
            facility.qc_dir(),
            facility.cluster_dir(),
            facility.shared_dir(),
            facility.store_dir(),
            facility.samplesheets_dir(),
            facility.results_dir(),
            facility.delivery_dir(),
            facility.nas_dir(),
        ] {
            fs::create_dir_all(&dir).expect("create facility dir");
        }
        facility
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn promethion_dir(&self) -> PathBuf {
        self.root().join("sequencing/promethion")
    }

    pub fn promethion_archive(&self) -> PathBuf {
        self.promethion_dir().join("nosync")
    }

    pub fn qc_dir(&self) -> PathBuf {
        self.root().join("sequencing/minion/qc")
    }

    pub fn qc_archive(&self) -> PathBuf {
        self.qc_dir().join("nosync")
    }

    pub fn delivery_dir(&self) -> PathBuf {
        self.root().join("minknow/data")
    }

    pub fn delivery_archive(&self) -> PathBuf {
        self.delivery_dir().join("nosync")
    }

    /// Where delivery runs are mirrored to.
    pub fn nas_dir(&self) -> PathBuf {
        self.root().join("nas/minion")
    }

    pub fn cluster_dir(&self) -> PathBuf {
        self.root().join("cluster")
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.root().join("shared/minknow_reports")
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root().join("statusdb")
    }

    pub fn samplesheets_dir(&self) -> PathBuf {
        self.root().join("samplesheets")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root().join("lims_results")
    }

    pub fn promethion_log(&self) -> PathBuf {
        self.root().join("log/transfer_promethion.tsv")
    }

    pub fn qc_log(&self) -> PathBuf {
        self.root().join("log/transfer_minion_qc.tsv")
    }

    pub fn delivery_log(&self) -> PathBuf {
        self.root().join("log/transfer_minion_delivery.tsv")
    }

    pub fn config(&self) -> ConfigBuilder {
        ConfigBuilder::for_facility(self)
    }

    /// A user run directly below the PromethION data dir.
    pub fn user_run(&self, name: &str) -> RunDir {
        RunDir::create(&self.promethion_dir(), name)
    }

    /// A QC run nested as `<experiment>/<sample>/<run>`.
    pub fn qc_run(&self, experiment: &str, sample: &str, name: &str) -> RunDir {
        RunDir::create(&self.qc_dir().join(experiment).join(sample), name)
    }

    /// A delivery run nested as `<experiment>/<sample>/<run>`.
    pub fn delivery_run(&self, experiment: &str, sample: &str, name: &str) -> RunDir {
        RunDir::create(&self.delivery_dir().join(experiment).join(sample), name)
    }

    /// Drop a sample sheet for `flowcell` into the sample sheet dir.
    pub fn add_samplesheet(&self, project: &str, flowcell: &str) -> PathBuf {
        let path = self
            .samplesheets_dir()
            .join(project)
            .join(format!("{project}_{flowcell}_samplesheet.csv"));
        write(&path, "sample,index\nP1_101,ACGT\n");
        path
    }
}

impl Default for Facility {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a validated `ConfigFile` pointing into a [`Facility`].
///
/// Defaults: PromethION user runs with status tracking, MinION QC runs
/// without, local copy agent, no mail command.
pub struct ConfigBuilder {
    config: RawConfigFile,
    delivery: CategorySection,
}

impl ConfigBuilder {
    pub fn for_facility(f: &Facility) -> Self {
        let mut user = CategorySection {
            ignore_dirs: vec!["nosync".to_string()],
            run_depth: None,
            track_status: true,
            instrument: BTreeMap::new(),
        };
        user.instrument.insert(
            "promethion".to_string(),
            InstrumentSection {
                data_dirs: vec![f.promethion_dir()],
                transfer_log: f.promethion_log(),
                archive_dir: f.promethion_archive(),
                destination: f.cluster_dir().join("promethion").to_string_lossy().into_owned(),
            },
        );

        let mut qc_runs = CategorySection {
            ignore_dirs: vec!["nosync".to_string()],
            run_depth: None,
            track_status: false,
            instrument: BTreeMap::new(),
        };
        qc_runs.instrument.insert(
            "minion".to_string(),
            InstrumentSection {
                data_dirs: vec![f.qc_dir()],
                transfer_log: f.qc_log(),
                archive_dir: f.qc_archive(),
                destination: f.cluster_dir().join("minion/qc").to_string_lossy().into_owned(),
            },
        );

        let mut delivery = CategorySection {
            ignore_dirs: vec!["nosync".to_string()],
            run_depth: None,
            track_status: false,
            instrument: BTreeMap::new(),
        };
        delivery.instrument.insert(
            "minion".to_string(),
            InstrumentSection {
                data_dirs: vec![f.delivery_dir()],
                transfer_log: f.delivery_log(),
                archive_dir: f.delivery_archive(),
                destination: f.nas_dir().to_string_lossy().into_owned(),
            },
        );

        Self {
            delivery,
            config: RawConfigFile {
                mail: MailSection::default(),
                status: Some(StatusSection {
                    store_dir: f.store_dir(),
                    report_types: vec!["AllData".to_string(), "SplitByBarcode".to_string()],
                }),
                reports: Some(ReportsSection {
                    shared_dir: f.shared_dir().to_string_lossy().into_owned(),
                }),
                transfer: TransferSection {
                    agent: TransferAgentKind::Local,
                    ..TransferSection::default()
                },
                qc: Some(QcSection {
                    demux_command: "anglerfish".to_string(),
                    demux_args: vec![
                        "--samplesheet".to_string(),
                        "{samplesheet}".to_string(),
                        "--out_fastq".to_string(),
                        "{output_dir}".to_string(),
                    ],
                    samplesheets_dir: f.samplesheets_dir(),
                    results_dir: Some(f.results_dir()),
                    output_dir_name: "anglerfish_output".to_string(),
                    exit_status_file: ".exitcode_for_anglerfish".to_string(),
                    stats_file_name: "anglerfish_stats.txt".to_string(),
                }),
                user: Some(user),
                qc_runs: Some(qc_runs),
                delivery: None,
            },
        }
    }

    /// Adds MinION delivery runs below [`Facility::delivery_dir`], mirrored
    /// to [`Facility::nas_dir`].
    pub fn with_delivery_runs(mut self) -> Self {
        self.config.delivery = Some(self.delivery.clone());
        self
    }

    pub fn without_qc_runs(mut self) -> Self {
        self.config.qc_runs = None;
        self
    }

    pub fn without_user_runs(mut self) -> Self {
        self.config.user = None;
        self
    }

    pub fn user_track_status(mut self, track: bool) -> Self {
        if let Some(user) = self.config.user.as_mut() {
            user.track_status = track;
        }
        self
    }

    pub fn with_mail_command(mut self, command: &str, recipients: &[&str]) -> Self {
        self.config.mail = MailSection {
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            command: Some(command.to_string()),
            sender: None,
        };
        self
    }

    /// Raw, unvalidated form; for tests of validation itself.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// A run directory being filled the way MinKNOW fills it.
#[derive(Debug, Clone)]
pub struct RunDir {
    path: PathBuf,
}

impl RunDir {
    pub fn create(parent: &Path, name: &str) -> Self {
        let path = parent.join(name);
        fs::create_dir_all(&path).expect("create run dir");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .expect("run dir has a utf-8 name")
    }

    pub fn id(&self) -> RunId {
        RunId::parse(self.name()).expect("run dir has a valid run id")
    }

    /// `run_path.txt` and `pore_count_history.csv`, as written at start.
    pub fn with_metadata(self, run_path: &str) -> Self {
        self.write("run_path.txt", &format!("{run_path}\n"));
        self.write(
            "pore_count_history.csv",
            &format!(
                "flow_cell_id,timestamp,num_pores\n{fc},2024-01-31T17:02:00,7812\n{fc},2024-02-01T17:02:00,6540\n",
                fc = self.id().flowcell_id()
            ),
        );
        self
    }

    pub fn finish_sequencing(&self) -> &Self {
        let id = self.id();
        self.write(
            &format!("final_summary_{}_{}.txt", id.flowcell_id(), id.hash()),
            "instrument=PC24B\nprotocol=sequencing/sequencing_PRO114_DNA_e8_2_400K\n",
        );
        self
    }

    pub fn add_json_report(&self, report: &Value) -> &Self {
        let id = self.id();
        self.write(
            &format!("report_{}_{}_{}.json", id.flowcell_id(), id.date(), id.hash()),
            &report.to_string(),
        );
        self
    }

    pub fn add_html_report(&self) -> &Self {
        let id = self.id();
        self.write(
            &format!("report_{}_{}_{}.html", id.flowcell_id(), id.date(), id.hash()),
            "<html><body>run report</body></html>\n",
        );
        self
    }

    pub fn mark_sync_finished(&self) -> &Self {
        self.write(".sync_finished", "");
        self
    }

    pub fn write(&self, relative: &str, contents: &str) {
        write(&self.path.join(relative), contents);
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }
}

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, contents).expect("write test file");
}

/// A machine report with one kept and two dropped outputs in its last
/// acquisition.
pub fn sample_report() -> Value {
    json!({
        "protocol_run_info": {"flow_cell": {"flow_cell_id": "PAM12345"}},
        "acquisitions": [
            {"acquisition_output": [{"type": "AllData", "plot": [0, 0, 0]}]},
            {"acquisition_output": [
                {"type": "AllData", "plot": [1, 2, 3]},
                {"type": "GenericRead", "plot": [4, 5, 6, 7, 8, 9, 10, 11, 12, 13]},
                {"type": "SplitByBarcode", "plot": [14]},
                {"type": "PoreStatus", "plot": [15, 16, 17, 18, 19, 20]}
            ]}
        ]
    })
}

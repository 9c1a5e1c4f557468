// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{InstrumentKind, RunCategory, TransferAgentKind};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [mail]
/// recipients = ["seq-ops@example.org"]
/// command = "sendmail"
///
/// [status]
/// store_dir = "/srv/statusdb/nanopore_runs"
///
/// [reports]
/// shared_dir = "ngi-internal:/srv/minknow_reports"
///
/// [transfer]
/// rsync_options = ["-Lav", "--checksum", "--chmod=Dg+s,g+rw"]
/// guard_command = ["run-one"]
///
/// [user]
/// ignore_dirs = ["nosync", "qc"]
///
/// [user.instrument.promethion]
/// data_dirs = ["/srv/sequencing/promethion"]
/// transfer_log = "/srv/log/transfer_promethion.tsv"
/// archive_dir = "/srv/sequencing/promethion/nosync"
/// destination = "cluster:/proj/ngi2016003/promethion/"
/// ```
///
/// This is the shape `serde` sees. It is turned into a [`ConfigFile`] by
/// validation (`ConfigFile::try_from`), which is the only way the rest of the
/// crate gets hold of configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub mail: MailSection,

    #[serde(default)]
    pub status: Option<StatusSection>,

    #[serde(default)]
    pub reports: Option<ReportsSection>,

    #[serde(default)]
    pub transfer: TransferSection,

    #[serde(default)]
    pub qc: Option<QcSection>,

    /// `[user]`: customer sequencing runs.
    #[serde(default)]
    pub user: Option<CategorySection>,

    /// `[qc_runs]`: MinION library QC runs.
    #[serde(default)]
    pub qc_runs: Option<CategorySection>,

    /// `[delivery]`: MinION runs mirrored to facility storage.
    #[serde(default)]
    pub delivery: Option<CategorySection>,
}

/// Validated configuration, constructed once at startup and passed by
/// reference into every component.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub mail: MailSection,
    pub status: Option<StatusSection>,
    pub reports: Option<ReportsSection>,
    pub transfer: TransferSection,
    pub qc: Option<QcSection>,
    categories: BTreeMap<RunCategory, CategoryConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        raw: RawConfigFile,
        categories: BTreeMap<RunCategory, CategoryConfig>,
    ) -> Self {
        Self {
            mail: raw.mail,
            status: raw.status,
            reports: raw.reports,
            transfer: raw.transfer,
            qc: raw.qc,
            categories,
        }
    }

    pub fn category(&self, category: RunCategory) -> Option<&CategoryConfig> {
        self.categories.get(&category)
    }

    pub fn categories(&self) -> impl Iterator<Item = (RunCategory, &CategoryConfig)> {
        self.categories.iter().map(|(c, cfg)| (*c, cfg))
    }

    /// Acquisition-output types kept when trimming a machine report.
    pub fn report_types(&self) -> Vec<String> {
        self.status
            .as_ref()
            .map(|s| s.report_types.clone())
            .unwrap_or_else(default_report_types)
    }
}

/// `[mail]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MailSection {
    #[serde(default)]
    pub recipients: Vec<String>,

    /// A sendmail-compatible program reading the message on stdin.
    ///
    /// If `None`, notifications are only written to the log.
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub sender: Option<String>,
}

/// `[status]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusSection {
    /// Directory with one `<run_id>.json` document per run.
    pub store_dir: PathBuf,

    #[serde(default = "default_report_types")]
    pub report_types: Vec<String>,
}

pub fn default_report_types() -> Vec<String> {
    vec!["AllData".to_string(), "SplitByBarcode".to_string()]
}

/// `[reports]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportsSection {
    /// Where `report_<run_id>.html` files are published. May be an rsync
    /// remote (`host:/path`).
    pub shared_dir: String,
}

/// `[transfer]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferSection {
    #[serde(default)]
    pub agent: TransferAgentKind,

    #[serde(default = "default_rsync_command")]
    pub rsync_command: String,

    #[serde(default = "default_rsync_options")]
    pub rsync_options: Vec<String>,

    /// Prefix wrapping the copy so overlapping invocations never copy the
    /// same run twice at once (e.g. `["run-one"]`).
    #[serde(default)]
    pub guard_command: Vec<String>,
}

fn default_rsync_command() -> String {
    "rsync".to_string()
}

fn default_rsync_options() -> Vec<String> {
    vec!["-Lav".to_string(), "--checksum".to_string()]
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            agent: TransferAgentKind::default(),
            rsync_command: default_rsync_command(),
            rsync_options: default_rsync_options(),
            guard_command: Vec::new(),
        }
    }
}

/// `[qc]` section: the demultiplexer and its hand-off locations.
#[derive(Debug, Clone, Deserialize)]
pub struct QcSection {
    pub demux_command: String,

    /// Arguments passed to `demux_command`. `{samplesheet}`, `{output_dir}`
    /// and `{run_id}` are substituted.
    #[serde(default = "default_demux_args")]
    pub demux_args: Vec<String>,

    pub samplesheets_dir: PathBuf,

    /// Where the QC stats file is copied for LIMS. Skipped when unset.
    #[serde(default)]
    pub results_dir: Option<PathBuf>,

    #[serde(default = "default_output_dir_name")]
    pub output_dir_name: String,

    #[serde(default = "default_exit_status_file")]
    pub exit_status_file: String,

    #[serde(default = "default_stats_file_name")]
    pub stats_file_name: String,
}

fn default_demux_args() -> Vec<String> {
    [
        "--samplesheet",
        "{samplesheet}",
        "--out_fastq",
        "{output_dir}",
        "--run_name",
        "anglerfish_run",
        "--threads",
        "2",
        "--lenient",
        "--ont_barcodes",
        "--skip_demux",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_output_dir_name() -> String {
    "anglerfish_output".to_string()
}

fn default_exit_status_file() -> String {
    ".exitcode_for_anglerfish".to_string()
}

fn default_stats_file_name() -> String {
    "anglerfish_stats.txt".to_string()
}

/// `[user]` / `[qc_runs]` / `[delivery]` section as written in TOML.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CategorySection {
    /// Directory names skipped while locating runs (e.g. the archive).
    #[serde(default)]
    pub ignore_dirs: Vec<String>,

    /// How many levels below a data dir run directories live.
    ///
    /// If `None`, user runs sit directly in the data dir (1) while QC and
    /// delivery runs are nested as `<experiment>/<sample>/<run>` (3).
    #[serde(default)]
    pub run_depth: Option<usize>,

    /// Whether runs of this category get a status document.
    #[serde(default = "default_true")]
    pub track_status: bool,

    /// `[<category>.instrument.<name>]` tables, keyed by instrument name.
    #[serde(default)]
    pub instrument: BTreeMap<String, InstrumentSection>,
}

fn default_true() -> bool {
    true
}

impl CategorySection {
    pub fn effective_run_depth(&self, category: RunCategory) -> usize {
        self.run_depth.unwrap_or(match category {
            RunCategory::User => 1,
            RunCategory::Qc | RunCategory::Delivery => 3,
        })
    }
}

/// `[<category>.instrument.<name>]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentSection {
    pub data_dirs: Vec<PathBuf>,

    /// Append-only record of completed transfers.
    pub transfer_log: PathBuf,

    /// Runs are moved here, grouped by project, once transferred.
    pub archive_dir: PathBuf,

    /// rsync destination on the cluster (or a local path for the `local`
    /// agent). Runs land in `<destination>/<run_id>`.
    pub destination: String,
}

/// Validated per-category settings.
#[derive(Debug, Clone)]
pub struct CategoryConfig {
    pub ignore_dirs: Vec<String>,
    pub run_depth: usize,
    pub track_status: bool,
    pub instruments: BTreeMap<InstrumentKind, InstrumentSection>,
}

impl CategoryConfig {
    pub fn instrument(&self, kind: InstrumentKind) -> Option<&InstrumentSection> {
        self.instruments.get(&kind)
    }
}

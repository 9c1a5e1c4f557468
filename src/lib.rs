// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod notify;
pub mod qc;
pub mod run;
pub mod status;
pub mod transfer;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{CliArgs, Command, ProcessArgs};
use crate::config::{load_and_validate, resolve_config_path, ConfigFile};
use crate::engine::{Collaborators, Invocation, InvocationSummary, Mode, RunOutcome};
use crate::fs::{FileSystem, RealFileSystem};
use crate::notify::{LogNotifier, MailNotifier, Notifier};
use crate::qc::{Demultiplexer, DirSampleSheetLookup, SampleSheetLookup, ShellDemultiplexer};
use crate::status::{JsonDirStore, StatusStore};
use crate::transfer::agent::{LocalCopyAgent, RsyncAgent, TransferAgent};
use crate::types::TransferAgentKind;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the production collaborators (filesystem, copy agent, notifier,
///   status store, demultiplexer)
/// - the requested subcommand
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = resolve_config_path(args.config.as_deref());
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    info!(config = %config_path.display(), "configuration loaded");

    let services = Services::production(&cfg);
    let invocation = Invocation::new(&cfg, services.collaborators());

    match args.command {
        Command::Process(ProcessArgs {
            category,
            run,
            samplesheet,
        }) => {
            let invocation = invocation.with_samplesheet(samplesheet.as_deref());
            let outcomes = match run {
                Some(path) => vec![invocation.process_path(&path, Mode::Full).await?],
                None => invocation.process_all(category).await,
            };
            log_summary(&outcomes);
        }
        Command::UpdateDb { run } => {
            if services.store.is_none() {
                anyhow::bail!("update-db needs a [status] section in the config");
            }
            let outcome = invocation.process_path(&run, Mode::StatusOnly).await?;
            log_summary(std::slice::from_ref(&outcome));
        }
        Command::Status { category } => {
            for line in invocation.status(category) {
                println!("{line}");
            }
        }
    }

    Ok(())
}

/// Production collaborators, owned for the length of one invocation.
struct Services {
    fs: Arc<dyn FileSystem>,
    agent: Box<dyn TransferAgent>,
    notifier: Box<dyn Notifier>,
    store: Option<JsonDirStore>,
    demux: Option<ShellDemultiplexer>,
    samplesheets: Option<DirSampleSheetLookup>,
}

impl Services {
    fn production(cfg: &ConfigFile) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

        let agent: Box<dyn TransferAgent> = match cfg.transfer.agent {
            TransferAgentKind::Rsync => Box::new(RsyncAgent::new(&cfg.transfer)),
            TransferAgentKind::Local => Box::new(LocalCopyAgent::new(fs.clone())),
        };

        let notifier: Box<dyn Notifier> = match MailNotifier::from_config(&cfg.mail) {
            Some(mailer) => Box::new(mailer),
            None => {
                warn!("no mail command configured; notifications go to the log only");
                Box::new(LogNotifier)
            }
        };

        let store = cfg
            .status
            .as_ref()
            .map(|s| JsonDirStore::new(fs.clone(), s.store_dir.clone()));
        let demux = cfg.qc.as_ref().map(ShellDemultiplexer::new);
        let samplesheets = cfg
            .qc
            .as_ref()
            .map(|qc| DirSampleSheetLookup::new(fs.clone(), qc.samplesheets_dir.clone()));

        Self {
            fs,
            agent,
            notifier,
            store,
            demux,
            samplesheets,
        }
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            fs: self.fs.as_ref(),
            agent: self.agent.as_ref(),
            notifier: self.notifier.as_ref(),
            store: self.store.as_ref().map(|s| s as &dyn StatusStore),
            demux: self.demux.as_ref().map(|d| d as &dyn Demultiplexer),
            samplesheets: self.samplesheets.as_ref().map(|s| s as &dyn SampleSheetLookup),
        }
    }
}

fn log_summary(outcomes: &[RunOutcome]) {
    for o in outcomes.iter().filter(|o| !o.is_clean()) {
        for err in &o.errors {
            warn!(
                run = o.run_id.as_deref().unwrap_or("-"),
                path = %o.path.display(),
                error = %err,
                "run finished with errors"
            );
        }
    }
    let summary = InvocationSummary::from_outcomes(outcomes);
    info!(
        runs = summary.runs,
        advanced = summary.advanced,
        archived = summary.archived,
        with_errors = summary.with_errors,
        "invocation complete"
    );
}

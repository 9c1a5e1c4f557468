// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{CategoryConfig, CategorySection, ConfigFile, RawConfigFile};
use crate::errors::{Result, RunsyncError};
use crate::types::{InstrumentKind, RunCategory};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::RunsyncError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let categories = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, categories))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<BTreeMap<RunCategory, CategoryConfig>> {
    let mut categories = BTreeMap::new();

    if let Some(section) = &cfg.user {
        categories.insert(RunCategory::User, validate_category(RunCategory::User, section)?);
    }
    if let Some(section) = &cfg.qc_runs {
        categories.insert(RunCategory::Qc, validate_category(RunCategory::Qc, section)?);
    }
    if let Some(section) = &cfg.delivery {
        categories.insert(
            RunCategory::Delivery,
            validate_category(RunCategory::Delivery, section)?,
        );
    }

    if categories.is_empty() {
        return Err(RunsyncError::ConfigError(
            "config must contain a [user], [qc_runs] or [delivery] section".to_string(),
        ));
    }

    if categories.contains_key(&RunCategory::Qc) && cfg.qc.is_none() {
        return Err(RunsyncError::ConfigError(
            "[qc_runs] requires a [qc] section describing the demultiplexer".to_string(),
        ));
    }

    if categories.values().any(|c| c.track_status) && cfg.status.is_none() {
        return Err(RunsyncError::ConfigError(
            "[status].store_dir is required when any category has track_status = true"
                .to_string(),
        ));
    }

    if categories.values().any(|c| c.track_status) && cfg.reports.is_none() {
        return Err(RunsyncError::ConfigError(
            "[reports].shared_dir is required when any category has track_status = true"
                .to_string(),
        ));
    }

    if let Some(status) = &cfg.status {
        if status.report_types.is_empty() {
            return Err(RunsyncError::ConfigError(
                "[status].report_types must not be empty".to_string(),
            ));
        }
    }

    Ok(categories)
}

fn validate_category(category: RunCategory, section: &CategorySection) -> Result<CategoryConfig> {
    let run_depth = section.effective_run_depth(category);
    if !(1..=3).contains(&run_depth) {
        return Err(RunsyncError::ConfigError(format!(
            "[{}].run_depth must be between 1 and 3 (got {run_depth})",
            section_name(category)
        )));
    }

    if section.instrument.is_empty() {
        return Err(RunsyncError::ConfigError(format!(
            "[{}] must configure at least one instrument",
            section_name(category)
        )));
    }

    let mut instruments = BTreeMap::new();
    for (name, inst) in section.instrument.iter() {
        let kind: InstrumentKind = name.parse().map_err(|e: String| {
            RunsyncError::ConfigError(format!("[{}.instrument.{name}]: {e}", section_name(category)))
        })?;

        if category == RunCategory::Qc && !kind.supports_qc() {
            return Err(RunsyncError::ConfigError(format!(
                "instrument '{kind}' cannot be used for QC runs"
            )));
        }
        if category == RunCategory::Delivery && !kind.supports_delivery() {
            return Err(RunsyncError::ConfigError(format!(
                "instrument '{kind}' cannot be used for delivery runs"
            )));
        }

        if inst.data_dirs.is_empty() {
            return Err(RunsyncError::ConfigError(format!(
                "[{}.instrument.{name}].data_dirs must not be empty",
                section_name(category)
            )));
        }

        if inst.destination.trim().is_empty() {
            return Err(RunsyncError::ConfigError(format!(
                "[{}.instrument.{name}].destination must not be empty",
                section_name(category)
            )));
        }

        instruments.insert(kind, inst.clone());
    }

    Ok(CategoryConfig {
        ignore_dirs: section.ignore_dirs.clone(),
        run_depth,
        track_status: section.track_status,
        instruments,
    })
}

fn section_name(category: RunCategory) -> &'static str {
    match category {
        RunCategory::User => "user",
        RunCategory::Qc => "qc_runs",
        RunCategory::Delivery => "delivery",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_raw;

    fn validate(text: &str) -> Result<ConfigFile> {
        ConfigFile::try_from(parse_raw(text)?)
    }

    const USER_ONLY: &str = r#"
[status]
store_dir = "/srv/statusdb"

[reports]
shared_dir = "/srv/reports"

[user]
ignore_dirs = ["nosync"]

[user.instrument.promethion]
data_dirs = ["/srv/sequencing/promethion"]
transfer_log = "/srv/log/transfer_promethion.tsv"
archive_dir = "/srv/sequencing/promethion/nosync"
destination = "cluster:/proj/promethion/"
"#;

    #[test]
    fn accepts_user_only_config() {
        let cfg = validate(USER_ONLY).unwrap();
        let user = cfg.category(RunCategory::User).unwrap();
        assert_eq!(user.run_depth, 1);
        assert!(user.track_status);
        assert!(user.instrument(InstrumentKind::Promethion).is_some());
        assert!(cfg.category(RunCategory::Qc).is_none());
        assert_eq!(cfg.report_types(), vec!["AllData", "SplitByBarcode"]);
        assert_eq!(cfg.transfer.rsync_options, vec!["-Lav", "--checksum"]);
    }

    #[test]
    fn rejects_empty_config() {
        let err = validate("").unwrap_err();
        assert!(matches!(err, RunsyncError::ConfigError(msg) if msg.contains("[delivery]")));
    }

    #[test]
    fn delivery_runs_default_to_nested_minion_dirs() {
        let text = r#"
[delivery]
track_status = false

[delivery.instrument.minion]
data_dirs = ["/var/lib/minknow/data"]
transfer_log = "/var/log/runsync/delivery.tsv"
archive_dir = "/var/lib/minknow/data/nosync"
destination = "nas:/srv/sequencing/minion/"
"#;
        let cfg = validate(text).unwrap();
        let delivery = cfg.category(RunCategory::Delivery).unwrap();
        assert_eq!(delivery.run_depth, 3);
        assert!(delivery.instrument(InstrumentKind::Minion).is_some());

        let err = validate(&text.replace("instrument.minion", "instrument.promethion")).unwrap_err();
        assert!(matches!(err, RunsyncError::ConfigError(msg) if msg.contains("delivery runs")));
    }

    #[test]
    fn rejects_promethion_qc() {
        let text = r#"
[qc]
demux_command = "anglerfish"
samplesheets_dir = "/srv/samplesheets"

[qc_runs]
track_status = false

[qc_runs.instrument.promethion]
data_dirs = ["/srv/qc"]
transfer_log = "/srv/log/qc.tsv"
archive_dir = "/srv/qc/nosync"
destination = "/cluster/qc"
"#;
        let err = validate(text).unwrap_err();
        assert!(matches!(err, RunsyncError::ConfigError(msg) if msg.contains("cannot be used for QC")));
    }

    #[test]
    fn qc_runs_need_qc_section() {
        let text = r#"
[qc_runs]
track_status = false

[qc_runs.instrument.minion]
data_dirs = ["/srv/qc"]
transfer_log = "/srv/log/qc.tsv"
archive_dir = "/srv/qc/nosync"
destination = "/cluster/qc"
"#;
        let err = validate(text).unwrap_err();
        assert!(matches!(err, RunsyncError::ConfigError(msg) if msg.contains("[qc]")));
    }

    #[test]
    fn tracking_status_needs_store() {
        let text = USER_ONLY.replace("[status]\nstore_dir = \"/srv/statusdb\"\n", "");
        let err = validate(&text).unwrap_err();
        assert!(matches!(err, RunsyncError::ConfigError(msg) if msg.contains("store_dir")));
    }

    #[test]
    fn unknown_instrument_is_rejected() {
        let text = USER_ONLY.replace("instrument.promethion", "instrument.gridion");
        let err = validate(&text).unwrap_err();
        assert!(matches!(err, RunsyncError::ConfigError(msg) if msg.contains("gridion")));
    }

    #[test]
    fn run_depth_bounds() {
        let text = USER_ONLY.replace("ignore_dirs = [\"nosync\"]", "run_depth = 5");
        let err = validate(&text).unwrap_err();
        assert!(matches!(err, RunsyncError::ConfigError(msg) if msg.contains("run_depth")));
    }
}

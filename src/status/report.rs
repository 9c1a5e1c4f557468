// src/status/report.rs

//! Trimming of the machine-generated acquisition report.
//!
//! The JSON report carries one `acquisition_output` entry per output type,
//! most of which are bulky per-read diagnostics nobody reads back. Only the
//! entries of the last acquisition whose `type` is allow-listed are kept.

use serde_json::Value;
use tracing::info;

use crate::errors::{Result, RunsyncError};

#[derive(Debug, Clone, PartialEq)]
pub struct TrimmedReport {
    pub report: Value,
    pub original_size: usize,
    pub trimmed_size: usize,
}

impl TrimmedReport {
    /// Space saved, in percent of the original serialized size.
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        let pct = (1.0 - self.trimmed_size as f64 / self.original_size as f64) * 100.0;
        (pct * 100.0).round() / 100.0
    }
}

/// Parse `contents` and drop every `acquisitions[-1].acquisition_output`
/// entry whose type is not in `allowed_types`.
pub fn trim_report(contents: &str, allowed_types: &[String], source: &str) -> Result<TrimmedReport> {
    let mut report: Value = serde_json::from_str(contents)?;
    let original_size = serde_json::to_string(&report)?.len();

    let outputs = report
        .get_mut("acquisitions")
        .and_then(Value::as_array_mut)
        .and_then(|acqs| acqs.last_mut())
        .and_then(|last| last.get_mut("acquisition_output"))
        .and_then(Value::as_array_mut)
        .ok_or_else(|| {
            RunsyncError::MissingArtifact(format!(
                "{source} has no acquisitions[-1].acquisition_output list"
            ))
        })?;

    outputs.retain(|output| {
        output
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| allowed_types.iter().any(|a| a == t))
    });

    let trimmed_size = serde_json::to_string(&report)?.len();
    let trimmed = TrimmedReport {
        report,
        original_size,
        trimmed_size,
    };
    info!(
        report = source,
        reduction_pct = trimmed.reduction_percent(),
        "trimmed unused acquisition outputs from report"
    );
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn allowed() -> Vec<String> {
        vec!["AllData".to_string(), "SplitByBarcode".to_string()]
    }

    #[test]
    fn keeps_only_allowed_types_of_last_acquisition() {
        let report = json!({
            "acquisitions": [
                {"acquisition_output": [{"type": "PerRead", "v": 1}]},
                {"acquisition_output": [
                    {"type": "AllData", "v": 1},
                    {"type": "PerRead", "plot": [1, 2, 3, 4, 5, 6, 7, 8]},
                    {"type": "SplitByBarcode", "v": 2},
                    {"no_type": true}
                ]}
            ]
        });
        let trimmed = trim_report(&report.to_string(), &allowed(), "report.json").unwrap();

        let last = &trimmed.report["acquisitions"][1]["acquisition_output"];
        let types: Vec<&str> = last
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["type"].as_str().unwrap())
            .collect();
        assert_eq!(types, vec!["AllData", "SplitByBarcode"]);
        // earlier acquisitions are left alone
        assert_eq!(trimmed.report["acquisitions"][0]["acquisition_output"][0]["type"], "PerRead");
        assert!(trimmed.trimmed_size < trimmed.original_size);
        assert!(trimmed.reduction_percent() > 0.0);
    }

    #[test]
    fn report_without_acquisitions_is_rejected() {
        let err = trim_report(r#"{"protocol": "x"}"#, &allowed(), "report.json").unwrap_err();
        assert!(matches!(err, RunsyncError::MissingArtifact(_)));
    }

    #[test]
    fn invalid_json_is_json_error() {
        let err = trim_report("{not json", &allowed(), "report.json").unwrap_err();
        assert!(matches!(err, RunsyncError::JsonError(_)));
    }
}

// src/run/id.rs

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::RunsyncError;

/// `YYYYMMDD_HHMM_<position>_<flowcellId>_<hash>`
pub const RUN_ID_PATTERN: &str =
    r"^(\d{8})_(\d{4})_([0-9a-zA-Z]+)_([0-9a-zA-Z]+)_([0-9a-zA-Z]+)$";

static RUN_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(RUN_ID_PATTERN).expect("run id pattern is a valid regex"));

/// Structured identifier of a sequencing run, taken from its directory name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId {
    raw: String,
    date: String,
    time: String,
    position: String,
    flowcell_id: String,
    hash: String,
}

impl RunId {
    pub fn parse(name: &str) -> Result<Self, RunsyncError> {
        let caps = RUN_ID_RE.captures(name).ok_or_else(|| {
            RunsyncError::ValidationFailure(format!(
                "'{name}' does not match the run directory pattern \
                 (yyyymmdd_hhmm_position_flowcell_hash)"
            ))
        })?;

        Ok(Self {
            raw: name.to_string(),
            date: caps[1].to_string(),
            time: caps[2].to_string(),
            position: caps[3].to_string(),
            flowcell_id: caps[4].to_string(),
            hash: caps[5].to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn time(&self) -> &str {
        &self.time
    }

    pub fn position(&self) -> &str {
        &self.position
    }

    pub fn flowcell_id(&self) -> &str {
        &self.flowcell_id
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Loose pre-filter used while scanning: the first `_`-separated component
/// must be an eight digit date. Anything passing this but failing
/// [`RunId::parse`] is reported as not being a run.
pub fn looks_like_run_dir(name: &str) -> bool {
    let first = name.split('_').next().unwrap_or_default();
    first.len() == 8 && first.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for RunId {
    type Err = RunsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunId::parse(s)
    }
}

impl TryFrom<String> for RunId {
    type Error = RunsyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RunId::parse(&value)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.raw
    }
}

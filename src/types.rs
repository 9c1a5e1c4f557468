use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Boxed future returned by the pluggable backends (transfer agent,
/// notifier) so they stay object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sequencing instrument family that produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Promethion,
    Minion,
}

impl InstrumentKind {
    /// Only MinION flow cells are used for library QC.
    pub fn supports_qc(self) -> bool {
        matches!(self, InstrumentKind::Minion)
    }

    /// Delivery runs are mirrored off MinION hosts.
    pub fn supports_delivery(self) -> bool {
        matches!(self, InstrumentKind::Minion)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentKind::Promethion => "promethion",
            InstrumentKind::Minion => "minion",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstrumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "promethion" => Ok(InstrumentKind::Promethion),
            "minion" => Ok(InstrumentKind::Minion),
            other => Err(format!(
                "invalid instrument: {other} (expected \"promethion\" or \"minion\")"
            )),
        }
    }
}

/// Why a run was sequenced.
///
/// - `User`: customer sequencing, synced to the cluster once the instrument
///   has written everything.
/// - `Qc`: library QC on a MinION, demultiplexed locally before transfer.
/// - `Delivery`: MinION runs mirrored to the facility storage while they
///   sequence, then handed over with a finished indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunCategory {
    User,
    Qc,
    Delivery,
}

impl RunCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RunCategory::User => "user",
            RunCategory::Qc => "qc",
            RunCategory::Delivery => "delivery",
        }
    }
}

impl fmt::Display for RunCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(RunCategory::User),
            "qc" => Ok(RunCategory::Qc),
            "delivery" => Ok(RunCategory::Delivery),
            other => Err(format!(
                "invalid run category: {other} (expected \"user\", \"qc\" or \"delivery\")"
            )),
        }
    }
}

/// Lifecycle phase of a status document. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Ongoing,
    Finished,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Ongoing => f.write_str("ongoing"),
            DocumentStatus::Finished => f.write_str("finished"),
        }
    }
}

/// Which copy implementation moves runs to the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferAgentKind {
    /// `rsync` (optionally behind a single-instance guard).
    Rsync,
    /// Recursive copy with per-file blake3 verification; for local targets.
    Local,
}

impl Default for TransferAgentKind {
    fn default() -> Self {
        TransferAgentKind::Rsync
    }
}

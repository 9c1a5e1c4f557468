// src/transfer/mod.rs

//! Moving finished runs off the instrument host.
//!
//! - [`agent`]: how bytes are copied (rsync or verified local copy).
//! - [`log`]: the append-only record of completed transfers.
//! - [`archive`]: moving a transferred run out of the active tree.
//! - [`pipeline`]: the ordered eligibility → transfer → log → archive steps.

pub mod agent;
pub mod archive;
pub mod log;
pub mod pipeline;

pub use agent::{LocalCopyAgent, RsyncAgent, TransferAgent};
pub use log::{TransferLog, TransferOutcome, TransferRecord};
pub use pipeline::{PipelineResult, TransferPipeline};

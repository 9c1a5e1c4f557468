// src/config/mod.rs

//! Configuration loading and validation for runsync.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate category/instrument invariants (`validate.rs`).
//!
//! Configuration is read once per invocation and never mutated afterwards.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_raw, resolve_config_path};
pub use model::{
    CategoryConfig, CategorySection, ConfigFile, InstrumentSection, MailSection, QcSection,
    RawConfigFile, ReportsSection, StatusSection, TransferSection,
};

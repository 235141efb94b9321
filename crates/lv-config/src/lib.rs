//! Longitudinal view configuration loading and validation.
//!
//! This crate provides:
//! - The histogram registry (definitions loaded from a Histograms.json document)
//! - The sources manifest mapping stream names to storage prefixes
//! - Job settings and their resolution (CLI → env → config file → defaults)

pub mod histograms;
pub mod job;
pub mod resolve;
pub mod sources;

pub use histograms::{HistogramDefinition, HistogramKind, HistogramRegistry, RegistryError};
pub use job::{parse_date, ConfigError, DateRange, JobConfig};
pub use resolve::{default_config_path, resolve_config, ConfigOverrides};
pub use sources::{SourcesManifest, StreamSource};

/// Version of the job configuration file format.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

//! Core configuration for the page pipeline.
//!
//! Configuration can be built programmatically, loaded from TOML, YAML or JSON, or
//! discovered as a `loanscan.toml` in the current directory or one of its parents.

pub mod config;

pub use config::{LayoutConfig, PipelineConfig, RecognitionConfig, TableConfig};

//! Configuration loading and management.
//!
//! This module provides utilities for loading pipeline configuration from various
//! sources (TOML, YAML, JSON) and discovering configuration files in the project hierarchy.

use crate::{LoanscanError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default ceiling on pages per document.
pub const DEFAULT_MAX_PAGES: usize = 50;

/// Main pipeline configuration.
///
/// # Example
///
/// ```rust
/// use loanscan::core::config::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.max_pages, 50);
///
/// // let config = PipelineConfig::from_file("loanscan.toml")?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Process pages concurrently on a worker pool
    #[serde(default = "default_true")]
    pub enable_parallel: bool,

    /// Worker pool size (None = number of logical CPUs)
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// Memoize per-page recognition and facade operations by image fingerprint
    #[serde(default = "default_true")]
    pub enable_cache: bool,

    /// Documents with more pages are rejected before any work starts
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Compute page transitions for multi-page documents
    #[serde(default = "default_true")]
    pub analyze_transitions: bool,

    /// Characters kept on each side of a typed token by context preservation
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    #[serde(default)]
    pub recognition: RecognitionConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub table: TableConfig,
}

/// Settings passed to the text-recognition primitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Recognition language(s), e.g. "eng" or "eng+hin"
    #[serde(default = "default_language")]
    pub language: String,

    /// Page segmentation mode
    #[serde(default = "default_psm")]
    pub psm: u8,

    /// Engine mode
    #[serde(default = "default_oem")]
    pub oem: u8,
}

/// Layout region thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_min_region_width")]
    pub min_region_width: u32,

    #[serde(default = "default_min_region_height")]
    pub min_region_height: u32,

    /// Confidence assigned to every heuristically classified region
    #[serde(default = "default_region_confidence")]
    pub region_confidence: f64,
}

/// Table detection and cell organization thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default = "default_min_table_width")]
    pub min_table_width: u32,

    #[serde(default = "default_min_table_height")]
    pub min_table_height: u32,

    #[serde(default = "default_min_cell_width")]
    pub min_cell_width: u32,

    #[serde(default = "default_min_cell_height")]
    pub min_cell_height: u32,

    /// Cells whose top edge lies within this many pixels of a row's first cell join that row
    #[serde(default = "default_row_tolerance")]
    pub row_tolerance: u32,

    /// Minimum run length of a ruling line
    #[serde(default = "default_line_kernel_length")]
    pub line_kernel_length: u32,
}

fn default_true() -> bool {
    true
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

fn default_context_window() -> usize {
    50
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_psm() -> u8 {
    6
}

fn default_oem() -> u8 {
    3
}

fn default_min_region_width() -> u32 {
    20
}

fn default_min_region_height() -> u32 {
    10
}

fn default_region_confidence() -> f64 {
    0.8
}

fn default_min_table_width() -> u32 {
    100
}

fn default_min_table_height() -> u32 {
    50
}

fn default_min_cell_width() -> u32 {
    20
}

fn default_min_cell_height() -> u32 {
    10
}

fn default_row_tolerance() -> u32 {
    10
}

fn default_line_kernel_length() -> u32 {
    40
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_parallel: true,
            max_workers: None,
            enable_cache: true,
            max_pages: default_max_pages(),
            analyze_transitions: true,
            context_window: default_context_window(),
            recognition: RecognitionConfig::default(),
            layout: LayoutConfig::default(),
            table: TableConfig::default(),
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            psm: default_psm(),
            oem: default_oem(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_region_width: default_min_region_width(),
            min_region_height: default_min_region_height(),
            region_confidence: default_region_confidence(),
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            min_table_width: default_min_table_width(),
            min_table_height: default_min_table_height(),
            min_cell_width: default_min_cell_width(),
            min_cell_height: default_min_cell_height(),
            row_tolerance: default_row_tolerance(),
            line_kernel_length: default_line_kernel_length(),
        }
    }
}

impl PipelineConfig {
    /// Resolved worker count: `max_workers` or the number of logical CPUs.
    pub fn worker_count(&self) -> usize {
        self.max_workers.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.max_pages == 0 {
            return Err(LoanscanError::validation("max_pages must be at least 1"));
        }
        if self.max_workers == Some(0) {
            return Err(LoanscanError::validation("max_workers must be at least 1"));
        }
        if self.recognition.language.trim().is_empty() {
            return Err(LoanscanError::validation("recognition.language must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.layout.region_confidence) {
            return Err(LoanscanError::validation(format!(
                "layout.region_confidence must be within [0, 1], got {}",
                self.layout.region_confidence
            )));
        }
        if self.table.row_tolerance == 0 {
            return Err(LoanscanError::validation("table.row_tolerance must be at least 1"));
        }
        if self.table.line_kernel_length < 2 {
            return Err(LoanscanError::validation("table.line_kernel_length must be at least 2"));
        }
        Ok(())
    }

    /// Load configuration, picking the format from the file extension (TOML when unknown).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::load(path, ConfigFormat::from_path(path))
    }

    /// Load configuration from `path` parsed as `format`.
    pub fn load(path: impl AsRef<Path>, format: ConfigFormat) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LoanscanError::validation(format!("Failed to read config file {}: {e}", path.display())))?;

        let parsed = match format {
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yaml_ng::from_str(&content).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str(&content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|e| LoanscanError::validation(format!("Invalid {format} in {}: {e}", path.display())))
    }

    /// Nearest `loanscan.toml` in the current directory or its ancestors.
    pub fn discover() -> Result<Option<Self>> {
        let cwd = std::env::current_dir()?;
        cwd.ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
            .map(|found| Self::load(found, ConfigFormat::Toml))
            .transpose()
    }
}

/// File name looked up by [`PipelineConfig::discover`].
pub const CONFIG_FILE_NAME: &str = "loanscan.toml";

/// Serialization format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            Some("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Toml => "TOML",
            Self::Yaml => "YAML",
            Self::Json => "JSON",
        })
    }
}

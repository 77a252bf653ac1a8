//! Configuration management for presspool
//!
//! Settings are layered with figment: embedded defaults, then user and repository
//! config files (TOML, JSON or YAML), then `PRESSPOOL_` environment variables.
//! The merged result is extracted into [`PressConfig`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod loader;
mod smart_load;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PressConfig {
    /// Worker pool sizing
    pub pool: PoolConfig,

    /// Compression engine settings
    pub engine: EngineConfig,

    /// Where and how outputs are written
    pub output: OutputConfig,

    /// Input boundary checks
    pub input: InputConfig,
}

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of execution units (0 = available cores minus one)
    pub size: usize,
}

/// Compression engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// gzip level, 0-9
    pub level: u32,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Prepended to every output file name
    pub prefix: String,

    /// Output directory; empty writes next to each input
    pub dir: String,
}

/// Input configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Reject inputs that are not PDF documents
    pub pdf_only: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: "compressed_".to_string(),
            dir: String::new(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { pdf_only: true }
    }
}

impl PressConfig {
    /// Number of execution units to start
    pub fn resolve_pool_size(&self) -> usize {
        if self.pool.size > 0 {
            self.pool.size
        } else {
            num_cpus::get().saturating_sub(1).max(1)
        }
    }

    /// Directory an output for `input` is written to
    pub fn output_dir_for(&self, input: &Path) -> PathBuf {
        if self.output.dir.is_empty() {
            input
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        } else {
            PathBuf::from(&self.output.dir)
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.level > 9 {
            anyhow::bail!("engine.level must be between 0 and 9 (got {})", self.engine.level);
        }

        if self.output.prefix.contains(['/', '\\']) {
            anyhow::bail!("output.prefix cannot contain path separators");
        }

        if self.output.prefix.is_empty() && self.output.dir.is_empty() {
            anyhow::bail!("output.prefix cannot be empty when outputs are written next to their inputs");
        }

        Ok(())
    }
}

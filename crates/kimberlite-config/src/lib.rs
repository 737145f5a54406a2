//! Configuration management for the repair orchestrator.
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (KMB_* prefix)
//! 3. kimberlite.local.toml (gitignored, local overrides)
//! 4. kimberlite.toml (git-tracked, project config)
//! 5. ~/.config/kimberlite/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)
//!
//! `kimberlite-repair` defines the *shapes* of
//! [`RepairOrchestratorConfig`](kimberlite_repair::RepairOrchestratorConfig)
//! and per-table [`RepairConfig`](kimberlite_repair::RepairConfig) but
//! deliberately does not parse them from anywhere -- this crate is the
//! embedding application's loader for both, following the same
//! precedence-ordered merge every other `kimberlite-*` subsystem uses.

use anyhow::Result;
use kimberlite_repair::{RepairConfig, RepairOrchestratorConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Top-level configuration for a repair orchestrator deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorAppConfig {
    pub project: ProjectConfig,
    /// Cadences for the cache refresh, metrics supplier, and failure
    /// logger background workers.
    pub orchestrator: RepairOrchestratorConfig,
    /// Per-table scheduling thresholds, keyed by `"<keyspace>.<table>"`.
    /// A table with no entry here falls back to
    /// [`RepairConfig::default`].
    pub tables: BTreeMap<String, RepairConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub data_dir: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: "kimberlite-repair".to_string(), data_dir: PathBuf::from(".kimberlite/data") }
    }
}

impl OrchestratorAppConfig {
    /// Load configuration from default locations.
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from a specific project directory.
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// The [`RepairConfig`] for `table` (`"<keyspace>.<table>"`), falling
    /// back to [`RepairConfig::default`] if the table has no explicit
    /// entry in `tables`.
    #[must_use]
    pub fn repair_config_for(&self, table: &str) -> RepairConfig {
        self.tables.get(table).copied().unwrap_or_default()
    }

    /// Resolve relative paths to absolute, anchored at `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();
        if self.project.data_dir.is_relative() {
            self.project.data_dir = base.join(&self.project.data_dir);
        }
    }
}

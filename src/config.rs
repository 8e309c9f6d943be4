use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{RefIndexError, Result};

/// Name of the configuration file stored inside the `.refindex` directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Name of the hidden directory used to store the index and its settings.
pub const REFINDEX_DIR: &str = ".refindex";

/// Name of the SQLite database file inside the `.refindex` directory.
pub const DATABASE_FILENAME: &str = "refindex.db";

/// Recursion budget used when none is given explicitly.
pub const DEFAULT_MAX_DEPTH: u32 = 99;

/// What the resolver does when the reference index cannot be queried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexErrorPolicy {
    /// Fail the whole walk with `RefIndexError::IndexUnavailable`.
    #[default]
    Propagate,
    /// Treat the failing node as having no referrers and log a warning.
    Ignore,
}

/// Settings for the foreign-reference walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Default recursion budget.
    pub max_depth: u32,
    /// Table whose rows are page boundaries. Never recursed into; the origin
    /// page is excluded from this bucket.
    pub page_table: String,
    /// Tables whose buckets count as foreign references when non-empty.
    pub page_equivalent_tables: Vec<String>,
    pub on_index_error: IndexErrorPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            page_table: "pages".to_string(),
            page_equivalent_tables: vec![
                "pages".to_string(),
                "pages_language_overlay".to_string(),
            ],
            on_index_error: IndexErrorPolicy::Propagate,
        }
    }
}

impl ResolverConfig {
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_page_equivalent_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.page_equivalent_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_index_error_policy(mut self, policy: IndexErrorPolicy) -> Self {
        self.on_index_error = policy;
        self
    }

    pub fn is_page_equivalent(&self, table: &str) -> bool {
        self.page_equivalent_tables.iter().any(|t| t == table)
    }
}

/// Configuration for a reference index project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefIndexConfig {
    /// Schema version of the configuration.
    pub version: u32,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Default for RefIndexConfig {
    fn default() -> Self {
        Self {
            version: 1,
            resolver: ResolverConfig::default(),
        }
    }
}

impl RefIndexConfig {
    /// Checks that the page tables are usable.
    ///
    /// The page table must be one of the page-equivalent tables; otherwise
    /// direct page references would be recorded but never counted.
    pub fn validate(&self) -> Result<()> {
        if self.resolver.page_table.trim().is_empty() {
            return Err(RefIndexError::Config {
                message: "resolver.page_table must not be empty".to_string(),
            });
        }
        if self.resolver.page_equivalent_tables.is_empty() {
            return Err(RefIndexError::Config {
                message: "resolver.page_equivalent_tables must list at least one table"
                    .to_string(),
            });
        }
        if let Some(blank) = self
            .resolver
            .page_equivalent_tables
            .iter()
            .find(|t| t.trim().is_empty())
        {
            return Err(RefIndexError::Config {
                message: format!("resolver.page_equivalent_tables contains a blank entry '{blank}'"),
            });
        }
        if !self.resolver.is_page_equivalent(&self.resolver.page_table) {
            return Err(RefIndexError::Config {
                message: format!(
                    "resolver.page_table '{}' must also be listed in resolver.page_equivalent_tables",
                    self.resolver.page_table
                ),
            });
        }
        Ok(())
    }
}

/// Returns the path to the `.refindex` directory within the given project root.
pub fn get_refindex_dir(project_root: &Path) -> PathBuf {
    project_root.join(REFINDEX_DIR)
}

/// Returns the path to the configuration file within the `.refindex` directory.
pub fn get_config_path(project_root: &Path) -> PathBuf {
    get_refindex_dir(project_root).join(CONFIG_FILENAME)
}

/// Returns the path to the SQLite database within the `.refindex` directory.
pub fn get_database_path(project_root: &Path) -> PathBuf {
    get_refindex_dir(project_root).join(DATABASE_FILENAME)
}

/// Loads and validates the configuration from disk.
///
/// If the configuration file does not exist, returns the default configuration.
pub fn load_config(project_root: &Path) -> Result<RefIndexConfig> {
    let config_path = get_config_path(project_root);

    if !config_path.exists() {
        return Ok(RefIndexConfig::default());
    }

    let contents = fs::read_to_string(&config_path).map_err(|e| RefIndexError::Config {
        message: format!(
            "failed to read config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    let config: RefIndexConfig =
        serde_json::from_str(&contents).map_err(|e| RefIndexError::Config {
            message: format!(
                "failed to parse config file '{}': {}",
                config_path.display(),
                e
            ),
        })?;

    config.validate()?;
    Ok(config)
}

/// Saves the configuration to disk using an atomic write.
///
/// Writes to a temporary file first and then renames it into place.
pub fn save_config(project_root: &Path, config: &RefIndexConfig) -> Result<()> {
    config.validate()?;

    let refindex_dir = get_refindex_dir(project_root);
    fs::create_dir_all(&refindex_dir).map_err(|e| RefIndexError::Config {
        message: format!(
            "failed to create refindex directory '{}': {}",
            refindex_dir.display(),
            e
        ),
    })?;

    let config_path = get_config_path(project_root);
    let tmp_path = config_path.with_extension("tmp");

    let json = serde_json::to_string_pretty(config).map_err(|e| RefIndexError::Config {
        message: format!("failed to serialize config: {}", e),
    })?;

    fs::write(&tmp_path, &json).map_err(|e| RefIndexError::Config {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
    })?;

    fs::rename(&tmp_path, &config_path).map_err(|e| RefIndexError::Config {
        message: format!(
            "failed to rename temporary config file '{}' to '{}': {}",
            tmp_path.display(),
            config_path.display(),
            e
        ),
    })?;

    Ok(())
}

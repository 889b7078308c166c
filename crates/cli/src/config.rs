//! `sq` configuration: `[query]` engine settings and `[loader]` settings,
//! read from TOML.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sheetquery_query::QueryConfig;
use sheetquery_sheet::{LoadOptions, DEFAULT_MAX_ROWS};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "sheetquery";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub query: QueryConfig,
    pub loader: LoaderConfig,
}

/// How workbooks are read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Rows kept per sheet; 0 keeps everything
    pub max_rows_per_sheet: usize,
    /// First row holds column names
    pub has_headers: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_rows_per_sheet: DEFAULT_MAX_ROWS,
            has_headers: true,
        }
    }
}

impl LoaderConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions::default()
            .with_headers(self.has_headers)
            .with_max_rows((self.max_rows_per_sheet > 0).then_some(self.max_rows_per_sheet))
    }
}

/// `<config dir>/sheetquery/config.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.toml"))
}

impl AppConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => AppConfig::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.provenance_column.trim().is_empty() {
            bail!("query.provenance_column must not be empty");
        }
        if self.query.date_sample_size == 0 {
            bail!("query.date_sample_size must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetquery_sheet::JoinType;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[query]\ndefault_join = \"inner\"\n\n[loader]\nmax_rows_per_sheet = 0\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.query.default_join, JoinType::Inner);
        assert_eq!(config.query.provenance_column, "data source");
        assert!(config.loader.has_headers);
        assert_eq!(config.loader.load_options().max_rows_per_sheet, None);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn test_malformed_file_names_the_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[query\n").unwrap();
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());
        config.query.date_sample_size = 0;
        assert!(config.validate().is_err());
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::store::TemplateStore;

/// Settings for the command-line front end and batch operations.
///
/// The metadata core never reads this; it only feeds [`crate::pipeline`]
/// options and the template store location.
///
/// ```rust,no_run
/// use photo_meta::config::Config;
///
/// let mut config = Config::load(Some("config.json".as_ref())).unwrap();
/// config.merge = true;
/// config.output.backup_originals = false;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Template/naming store root. `None` means `~/.photo_meta_editor`.
    pub store_dir: Option<PathBuf>,
    /// Keep existing tags when writing, unless overridden per command.
    pub merge: bool,
    pub output: OutputConfig,
}

/// Output and behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Preview renames and writes without touching any file.
    pub dry_run: bool,
    /// Copy each image to `<name>.<ext>.bak` before its first write.
    pub backup_originals: bool,
    /// Print results as JSON instead of text.
    pub json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup_originals: true,
            json: false,
        }
    }
}

impl Config {
    /// `config.json` in the directory of the running executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(config_path)
    }

    /// The configured store root, or the per-user default.
    pub fn store_root(&self) -> Result<PathBuf> {
        match &self.store_dir {
            Some(dir) => Ok(dir.clone()),
            None => TemplateStore::default_root().context("Could not determine home directory"),
        }
    }

    pub fn open_store(&self) -> Result<TemplateStore> {
        let root = self.store_root()?;
        TemplateStore::open(&root)
            .with_context(|| format!("Failed to open template store at {}", root.display()))
    }
}

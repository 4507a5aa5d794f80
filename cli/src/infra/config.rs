//! Infrastructure implementation of the `ConfigStore` port.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::application::ports::ConfigStore;
use crate::domain::PoolConfigFile;

/// Env var that overrides the config file location.
pub const CONFIG_ENV: &str = "PACO_CONFIG";

/// Production implementation of `ConfigStore` that reads a YAML file on disk.
pub struct YamlConfigStore {
    path: PathBuf,
}

impl YamlConfigStore {
    /// `--config` wins, then `$PACO_CONFIG`, then `~/.paco/config.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is given and the home directory is unknown.
    pub fn locate(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self { path });
        }
        if let Ok(val) = std::env::var(CONFIG_ENV)
            && !val.trim().is_empty()
        {
            return Ok(Self {
                path: PathBuf::from(val),
            });
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self {
            path: home.join(".paco").join("config.yaml"),
        })
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<PoolConfigFile> {
        let path = &self.path;
        if !path.exists() {
            tracing::debug!(config = %path.display(), "no config file; using empty document");
            return Ok(PoolConfigFile::default());
        }
        warn_if_exposed(path);
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(PoolConfigFile::default());
        }
        serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }
}

/// The file holds the credential; it should not be group or world readable.
#[cfg(unix)]
fn warn_if_exposed(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::metadata(path) {
        let mode = meta.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            tracing::warn!(
                config = %path.display(),
                mode = format!("{mode:o}"),
                "config file holds a credential but is readable by other users; chmod 600 it"
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_exposed(_path: &Path) {}

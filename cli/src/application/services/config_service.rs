//! Application service: configuration use-cases.

use crate::application::ports::{ConfigStore, InstanceFs};
use crate::domain::ConfigError;
use crate::domain::config::Resolution;

/// Load and validate the pool configuration.
///
/// The persisted document is the source of truth; the directory scan only
/// runs when `instanceCount` is absent and is reported as a warning.
///
/// # Errors
///
/// Returns a [`ConfigError`] for unreadable files and every validation
/// failure. Nothing remote or instance-related has been touched yet.
pub fn resolve_config(
    store: &impl ConfigStore,
    fs: &impl InstanceFs,
) -> Result<Resolution, ConfigError> {
    let path = store.path();
    let doc = store.load().map_err(|e| ConfigError::Unreadable {
        path: path.display().to_string(),
        reason: format!("{e:#}"),
    })?;
    let resolution = doc.resolve(|pool, root| fs.count_instance_dirs(pool, root))?;
    for warning in &resolution.warnings {
        tracing::info!(config = %path.display(), "{warning}");
    }
    tracing::debug!(
        pool = %resolution.config.pool_name,
        instances = resolution.config.instance_count,
        target = %resolution.config.target.describe(),
        "configuration resolved"
    );
    Ok(resolution)
}

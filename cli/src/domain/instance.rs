//! Runner instance identity.
//!
//! An instance is one pool slot, identified by `(pool_name, index)`. Its name,
//! working directory and unit name are all derived from that pair.

use std::path::PathBuf;

use paco_common::RegistrationState;

use crate::domain::config::PoolConfig;

/// One pool slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerInstance {
    pub pool_name: String,
    /// 1-based, in `1..=instance_count`.
    pub index: u8,
    /// `{pool_name}-runner-{index}`.
    pub name: String,
    pub working_directory: PathBuf,
    pub registration_state: RegistrationState,
    /// Local runner identity files are present on disk.
    pub credentials_present: bool,
}

impl RunnerInstance {
    #[must_use]
    pub fn new(config: &PoolConfig, index: u8) -> Self {
        let name = instance_name(&config.pool_name, index);
        Self {
            pool_name: config.pool_name.clone(),
            index,
            working_directory: config.runners_root.join(&name),
            name,
            registration_state: RegistrationState::Unconfigured,
            credentials_present: false,
        }
    }

    /// Supervisor unit identifier for this instance.
    #[must_use]
    pub fn unit_name(&self) -> String {
        instance_unit_name(&self.name)
    }
}

/// All instances of a pool, in index order.
#[must_use]
pub fn pool_instances(config: &PoolConfig) -> Vec<RunnerInstance> {
    (1..=config.instance_count)
        .map(|i| RunnerInstance::new(config, i))
        .collect()
}

#[must_use]
pub fn instance_name(pool_name: &str, index: u8) -> String {
    format!("{pool_name}-runner-{index}")
}

#[must_use]
pub fn instance_unit_name(instance_name: &str) -> String {
    format!("{instance_name}.service")
}

#[must_use]
pub fn group_unit_name(pool_name: &str) -> String {
    format!("{pool_name}-runners.target")
}

/// Parse an instance directory name back to its index, if it belongs to `pool_name`.
#[must_use]
pub fn parse_instance_index(pool_name: &str, dir_name: &str) -> Option<u8> {
    dir_name
        .strip_prefix(pool_name)?
        .strip_prefix("-runner-")?
        .parse()
        .ok()
        .filter(|i| *i > 0)
}

//! Filesystem infrastructure: implements `InstanceFs` over the runner
//! working directories.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::InstanceFs;
use crate::domain::instance::parse_instance_index;

/// Files the agent writes when it registers. Their presence means the
/// directory still carries an identity.
pub const IDENTITY_FILES: &[&str] = &[".runner", ".credentials", ".credentials_rsaparams"];

/// The agent's job scratch directory inside an instance directory.
pub const WORK_SUBDIR: &str = "_work";

/// Production filesystem implementation of `InstanceFs`.
pub struct LocalInstanceFs;

impl InstanceFs for LocalInstanceFs {
    fn has_identity(&self, work_dir: &Path) -> bool {
        IDENTITY_FILES.iter().any(|f| work_dir.join(f).exists())
    }

    fn clear_identity(&self, work_dir: &Path) -> Result<()> {
        for name in IDENTITY_FILES {
            let path = work_dir.join(name);
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(file = %path.display(), "removed identity file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("removing {}", path.display()));
                }
            }
        }
        let work = work_dir.join(WORK_SUBDIR);
        match std::fs::remove_dir_all(&work) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing directory {}", work.display())),
        }
    }

    fn count_instance_dirs(&self, pool_name: &str, root: &Path) -> usize {
        let Ok(entries) = std::fs::read_dir(root) else {
            return 0;
        };
        entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| parse_instance_index(pool_name, n))
                    .is_some()
            })
            .count()
    }
}

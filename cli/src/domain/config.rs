//! Domain types and validators for pool configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access. The one
//! piece of I/O resolution needs (counting existing instance directories) is
//! supplied by the caller as a closure.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::unit::RestartPolicy;

// ── Constants ────────────────────────────────────────────────────────────────

pub const MIN_INSTANCES: u8 = 1;
pub const MAX_INSTANCES: u8 = 10;
pub const DEFAULT_POOL_NAME: &str = "paco";
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_SERVER_URL: &str = "https://github.com";

static POOL_NAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,31}$").ok());

// ── Secrets ──────────────────────────────────────────────────────────────────

/// Long-lived control-plane credential. Never printed or logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for building the `Authorization` header only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

// ── Registration target ──────────────────────────────────────────────────────

/// Where runners register. Exactly one variant per pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationTarget {
    Organization { name: String },
    User { name: String },
    Repository { url: String },
}

impl RegistrationTarget {
    /// Build the target from the three mutually exclusive config fields.
    /// Blank strings count as unset.
    ///
    /// # Errors
    ///
    /// Returns `MissingTarget` when none is set, `ConflictingTargets` when
    /// more than one is set, `InvalidRepositoryUrl` for an unparseable URL.
    pub fn from_fields(
        org: Option<&str>,
        user: Option<&str>,
        repo_url: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let org = non_blank(org);
        let user = non_blank(user);
        let repo_url = non_blank(repo_url);

        let set: Vec<&str> = [
            org.map(|_| "registrationOrg"),
            user.map(|_| "registrationUser"),
            repo_url.map(|_| "registrationRepoUrl"),
        ]
        .into_iter()
        .flatten()
        .collect();

        match (set.len(), org, user, repo_url) {
            (0, ..) => Err(ConfigError::MissingTarget),
            (1, Some(name), _, _) => Ok(Self::Organization {
                name: name.to_string(),
            }),
            (1, _, Some(name), _) => Ok(Self::User {
                name: name.to_string(),
            }),
            (1, _, _, Some(url)) => {
                let url = url.trim_end_matches('/').to_string();
                if repository_slug(&url).is_none() {
                    return Err(ConfigError::InvalidRepositoryUrl(url));
                }
                Ok(Self::Repository { url })
            }
            _ => Err(ConfigError::ConflictingTargets {
                found: set.join(", "),
            }),
        }
    }

    /// URL handed to the agent's `--url` flag.
    #[must_use]
    pub fn registration_url(&self, server_url: &str) -> String {
        let server = server_url.trim_end_matches('/');
        match self {
            Self::Organization { name } | Self::User { name } => format!("{server}/{name}"),
            Self::Repository { url } => url.clone(),
        }
    }

    /// Short description used in messages, e.g. `org acme`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Organization { name } => format!("org {name}"),
            Self::User { name } => format!("user {name}"),
            Self::Repository { url } => format!("repo {url}"),
        }
    }
}

/// Split a repository URL into `(owner, repo)` by dropping the scheme and host.
///
/// Accepts a trailing `.git` and trailing slashes.
#[must_use]
pub fn repository_slug(url: &str) -> Option<(String, String)> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let mut segments = without_scheme
        .split('/')
        .skip(1)
        .filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?.trim_end_matches(".git");
    if segments.next().is_some() || repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ── Labels ───────────────────────────────────────────────────────────────────

/// Ordered, duplicate-free runner labels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Labels(Vec<String>);

impl Labels {
    /// Parse the comma-joined form. Blanks are dropped, later duplicates are
    /// dropped, order is kept.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLabel` when a label contains whitespace.
    pub fn parse(joined: &str) -> Result<Self, ConfigError> {
        let mut labels: Vec<String> = Vec::new();
        for raw in joined.split(',') {
            let label = raw.trim();
            if label.is_empty() {
                continue;
            }
            if label.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidLabel(label.to_string()));
            }
            if !labels.iter().any(|l| l == label) {
                labels.push(label.to_string());
            }
        }
        Ok(Self(labels))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma-joined form, as the agent CLI expects it.
    #[must_use]
    pub fn joined(&self) -> String {
        self.0.join(",")
    }
}

// ── Persisted document ───────────────────────────────────────────────────────

/// The on-disk key-value document, before validation.
///
/// Unknown keys are ignored so older files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolConfigFile {
    pub pool_name: Option<String>,
    pub instance_count: Option<i64>,
    pub credential: Option<String>,
    pub registration_org: Option<String>,
    pub registration_user: Option<String>,
    pub registration_repo_url: Option<String>,
    pub labels: Option<String>,
    pub group: Option<String>,
    pub runners_root: Option<PathBuf>,
    pub log_directory: Option<PathBuf>,
    pub run_as_user: Option<String>,
    pub api_url: Option<String>,
    pub server_url: Option<String>,
    pub restart_policy: Option<String>,
}

/// Where `instance_count` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountSource {
    Configured,
    /// Degraded mode: recovered by counting instance directories on disk.
    DiscoveredDirectories,
}

/// Fully validated pool configuration. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub pool_name: String,
    pub instance_count: u8,
    pub count_source: CountSource,
    pub target: RegistrationTarget,
    pub labels: Labels,
    /// Runner group; only ever set for organization targets.
    pub group: Option<String>,
    pub credential: Credential,
    pub runners_root: PathBuf,
    pub log_directory: PathBuf,
    pub run_as_user: Option<String>,
    pub api_url: String,
    pub server_url: String,
    pub restart_policy: RestartPolicy,
}

/// A resolved config plus non-fatal notes produced while resolving it.
#[derive(Debug)]
pub struct Resolution {
    pub config: PoolConfig,
    pub warnings: Vec<String>,
}

impl PoolConfigFile {
    /// Pool name with the default applied (not yet validated).
    #[must_use]
    pub fn pool_name_or_default(&self) -> &str {
        non_blank(self.pool_name.as_deref()).unwrap_or(DEFAULT_POOL_NAME)
    }

    /// Runner root directory with the default applied.
    #[must_use]
    pub fn runners_root_or_default(&self) -> PathBuf {
        self.runners_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("/opt").join(self.pool_name_or_default()))
    }

    /// Validate into a [`PoolConfig`].
    ///
    /// `count_existing` is only called when `instanceCount` is absent; it
    /// receives the pool name and runner root and returns how many instance
    /// directories exist.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found. Target and credential are
    /// checked before anything else.
    pub fn resolve(
        &self,
        count_existing: impl FnOnce(&str, &Path) -> usize,
    ) -> Result<Resolution, ConfigError> {
        let mut warnings = Vec::new();

        let target = RegistrationTarget::from_fields(
            self.registration_org.as_deref(),
            self.registration_user.as_deref(),
            self.registration_repo_url.as_deref(),
        )?;
        let credential = non_blank(self.credential.as_deref())
            .map(Credential::new)
            .ok_or(ConfigError::MissingCredential)?;

        let pool_name = self.pool_name_or_default().to_string();
        validate_pool_name(&pool_name)?;

        let runners_root = self.runners_root_or_default();
        require_absolute("runnersRoot", &runners_root)?;
        let log_directory = self
            .log_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("/var/log").join(&pool_name));
        require_absolute("logDirectory", &log_directory)?;

        let (instance_count, count_source) = match self.instance_count {
            Some(count) => (validate_instance_count(count)?, CountSource::Configured),
            None => {
                let found = count_existing(&pool_name, &runners_root);
                if found == 0 {
                    return Err(ConfigError::MissingInstanceCount {
                        root: runners_root.display().to_string(),
                    });
                }
                let count = validate_instance_count(i64::try_from(found).unwrap_or(i64::MAX))?;
                warnings.push(format!(
                    "instanceCount not configured; using {count} from existing runner directories"
                ));
                (count, CountSource::DiscoveredDirectories)
            }
        };

        let labels = Labels::parse(self.labels.as_deref().unwrap_or_default())?;

        let group = match (non_blank(self.group.as_deref()), &target) {
            (Some(group), RegistrationTarget::Organization { .. }) => Some(group.to_string()),
            (Some(group), other) => {
                warnings.push(format!(
                    "group '{group}' ignored: runner groups only apply to organization targets, not {}",
                    other.describe()
                ));
                None
            }
            (None, _) => None,
        };

        let restart_policy = match non_blank(self.restart_policy.as_deref()) {
            None => RestartPolicy::Always,
            Some(raw) => raw.parse()?,
        };

        Ok(Resolution {
            config: PoolConfig {
                pool_name,
                instance_count,
                count_source,
                target,
                labels,
                group,
                credential,
                runners_root,
                log_directory,
                run_as_user: non_blank(self.run_as_user.as_deref()).map(String::from),
                api_url: non_blank(self.api_url.as_deref())
                    .unwrap_or(DEFAULT_API_URL)
                    .trim_end_matches('/')
                    .to_string(),
                server_url: non_blank(self.server_url.as_deref())
                    .unwrap_or(DEFAULT_SERVER_URL)
                    .trim_end_matches('/')
                    .to_string(),
                restart_policy,
            },
            warnings,
        })
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Check `count` ∈ [`MIN_INSTANCES`, `MAX_INSTANCES`].
///
/// # Errors
///
/// Returns `InstanceCountOutOfRange` otherwise.
pub fn validate_instance_count(count: i64) -> Result<u8, ConfigError> {
    u8::try_from(count)
        .ok()
        .filter(|c| (MIN_INSTANCES..=MAX_INSTANCES).contains(c))
        .ok_or(ConfigError::InstanceCountOutOfRange {
            count,
            min: MIN_INSTANCES,
            max: MAX_INSTANCES,
        })
}

/// # Errors
///
/// Returns `InvalidPoolName` if the name cannot be used inside unit names.
pub fn validate_pool_name(name: &str) -> Result<(), ConfigError> {
    match POOL_NAME_RE.as_ref() {
        Some(re) if re.is_match(name) => Ok(()),
        _ => Err(ConfigError::InvalidPoolName(name.to_string())),
    }
}

fn require_absolute(key: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(ConfigError::RelativePath {
            key,
            value: path.display().to_string(),
        })
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────

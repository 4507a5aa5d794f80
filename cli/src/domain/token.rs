//! Short-lived registration/removal tokens and the control-plane endpoints
//! that issue them.

use crate::domain::config::{RegistrationTarget, repository_slug};
use crate::domain::error::BrokerError;

/// What a token authorises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Registration,
    Removal,
}

impl TokenKind {
    fn endpoint_suffix(self) -> &'static str {
        match self {
            Self::Registration => "registration-token",
            Self::Removal => "remove-token",
        }
    }
}

/// A token scoped to one registration target. Held in memory only for the
/// duration of one pool operation, never persisted, never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistrationToken {
    kind: TokenKind,
    value: String,
}

impl RegistrationToken {
    #[must_use]
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// The raw token, for the agent CLI argument only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for RegistrationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegistrationToken({:?}, ***)", self.kind)
    }
}

/// The two tokens fetched once per pool operation and shared by all instances.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub registration: RegistrationToken,
    pub removal: RegistrationToken,
}

/// Path, relative to the API base URL, of the token endpoint for `target`.
///
/// # Errors
///
/// `UnsupportedTarget` for user targets, `Unavailable` for a repository URL
/// that has no `owner/repo` path.
pub fn endpoint_path(kind: TokenKind, target: &RegistrationTarget) -> Result<String, BrokerError> {
    let scope = match target {
        RegistrationTarget::Organization { name } => format!("orgs/{name}"),
        RegistrationTarget::Repository { url } => {
            let (owner, repo) = repository_slug(url).ok_or_else(|| BrokerError::Unavailable {
                endpoint: url.clone(),
                reason: "repository URL has no owner/repo path".to_string(),
            })?;
            format!("repos/{owner}/{repo}")
        }
        RegistrationTarget::User { .. } => {
            return Err(BrokerError::UnsupportedTarget {
                target: target.describe(),
            });
        }
    };
    Ok(format!("{scope}/actions/runners/{}", kind.endpoint_suffix()))
}

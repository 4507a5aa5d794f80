//! Application service: registration/removal token exchange.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::time::Duration;

use serde::Deserialize;

use crate::application::ports::ControlPlane;
use crate::domain::token::endpoint_path;
use crate::domain::{BrokerError, Credential, RegistrationTarget, RegistrationToken, TokenKind, TokenPair};

#[derive(Deserialize)]
struct TokenBody {
    token: Option<String>,
}

/// Fetches short-lived tokens from the control plane. Never retries; the
/// caller decides what a failure means.
pub struct TokenBroker<'a, C: ControlPlane> {
    control_plane: &'a C,
    timeout: Duration,
}

impl<'a, C: ControlPlane> TokenBroker<'a, C> {
    pub fn new(control_plane: &'a C, timeout: Duration) -> Self {
        Self {
            control_plane,
            timeout,
        }
    }

    /// One authenticated POST to the token endpoint of `target`.
    ///
    /// # Errors
    ///
    /// `UnsupportedTarget` for user targets (no request is made),
    /// `Unavailable` for transport errors, timeouts, non-2xx statuses and
    /// empty tokens.
    pub async fn fetch(
        &self,
        kind: TokenKind,
        target: &RegistrationTarget,
        credential: &Credential,
    ) -> Result<RegistrationToken, BrokerError> {
        let path = endpoint_path(kind, target)?;
        let unavailable = |reason: String| BrokerError::Unavailable {
            endpoint: path.clone(),
            reason,
        };

        tracing::debug!(endpoint = %path, ?kind, "requesting token");
        let reply = tokio::time::timeout(self.timeout, self.control_plane.post(&path, credential))
            .await
            .map_err(|_| unavailable(format!("timed out after {}s", self.timeout.as_secs())))?
            .map_err(|e| unavailable(format!("{e:#}")))?;

        if !(200..300).contains(&reply.status) {
            return Err(unavailable(format!("HTTP {}", reply.status)));
        }

        let body: TokenBody = serde_json::from_slice(&reply.body)
            .map_err(|e| unavailable(format!("malformed response: {e}")))?;
        match body.token.filter(|t| !t.trim().is_empty()) {
            Some(token) => Ok(RegistrationToken::new(kind, token)),
            None => Err(unavailable(
                "response carried no token; the credential may lack the required scope"
                    .to_string(),
            )),
        }
    }

    /// Registration and removal tokens for one pool operation.
    ///
    /// # Errors
    ///
    /// Propagates the first [`fetch`](Self::fetch) failure.
    pub async fn fetch_pair(
        &self,
        target: &RegistrationTarget,
        credential: &Credential,
    ) -> Result<TokenPair, BrokerError> {
        let registration = self.fetch(TokenKind::Registration, target, credential).await?;
        let removal = self.fetch(TokenKind::Removal, target, credential).await?;
        Ok(TokenPair {
            registration,
            removal,
        })
    }
}

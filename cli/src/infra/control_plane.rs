//! Infrastructure implementation of the `ControlPlane` port over HTTPS.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{ControlPlane, HttpReply};
use crate::domain::Credential;

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// `reqwest` client bound to one API base URL.
pub struct HttpControlPlane {
    client: reqwest::Client,
    api_url: String,
}

impl HttpControlPlane {
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("paco/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}

impl ControlPlane for HttpControlPlane {
    async fn post(&self, path: &str, credential: &Credential) -> Result<HttpReply> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.expose())
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("reading response from {url}"))?
            .to_vec();
        tracing::debug!(%url, status, "control plane replied");
        Ok(HttpReply { status, body })
    }
}

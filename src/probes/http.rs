// src/probes/http.rs
use crate::health::{HealthProbe, Metadata, ProbeElement, ReportError, Status};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Checks a dependency by issuing `GET` against one of its URLs.
///
/// Any 2xx is healthy, any other status fails with `HTTP <status>`. Transport
/// errors (refused connection, DNS, client timeout) are returned as errors
/// and reported by the report as failures.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    name: String,
    url: Url,
    client: Client,
}

impl HttpProbe {
    pub fn new(name: impl Into<String>, url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(name, url, client))
    }

    /// Shares one connection pool across several probes.
    pub fn with_client(name: impl Into<String>, url: Url, client: Client) -> Self {
        Self {
            name: name.into(),
            url,
            client,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Wraps the probe as a report element. The URL is recorded under the
    /// `url` metadata key after any caller supplied labels, unless the caller
    /// already set `url` themselves.
    ///
    /// The element is cheap to clone, so a report of these can be kept as a
    /// template and lifted into a fresh `Report<Deferred>` per request.
    pub fn into_element(self, mut metadata: Metadata) -> Result<ProbeElement<Arc<HttpProbe>>, ReportError> {
        if metadata.get("url").is_none() {
            metadata.insert("url", self.url.as_str());
        }
        let name = self.name.clone();
        ProbeElement::new(name, Arc::new(self), metadata)
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn check(&self) -> Result<Status> {
        let response = self
            .client
            .get(self.url.as_str())
            .send()
            .await
            .with_context(|| format!("GET {} failed", self.url))?;

        let status = response.status();
        debug!(probe = %self.name, url = %self.url, %status, "HTTP probe responded");

        Ok(Status::from_bool(status.is_success(), || {
            format!("HTTP {}", status)
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

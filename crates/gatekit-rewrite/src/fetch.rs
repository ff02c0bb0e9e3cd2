//! Best-effort subresource fetching.

use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::RewriteError;

/// Fetches linked CSS/JS so the collector can analyze them. Strictly
/// best-effort: a failed or slow fetch yields `None` and that resource
/// simply contributes nothing to the policy.
pub struct SubresourceFetcher {
    client: reqwest::Client,
}

impl SubresourceFetcher {
    /// Create a fetcher with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, RewriteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent("CSPGate/1.0")
            .build()
            .map_err(|e| RewriteError::FetcherInit(e.to_string()))?;

        Ok(Self { client })
    }

    /// Fetch a resource as text.
    pub async fn fetch_text(&self, url: &Url) -> Option<String> {
        match self.client.get(url.clone()).send().await {
            Ok(response) => match response.text().await {
                Ok(text) => {
                    debug!(url = %url, len = text.len(), "dependency fetched");
                    Some(text)
                }
                Err(err) => {
                    warn!(url = %url, %err, "dependency body unreadable, omitting");
                    None
                }
            },
            Err(err) => {
                warn!(url = %url, %err, "dependency fetch failed, omitting");
                None
            }
        }
    }

    /// Fetch every URL in order, keeping only the successes.
    pub async fn fetch_all(&self, urls: &[Url]) -> Vec<String> {
        let mut bodies = Vec::new();
        for url in urls {
            if let Some(text) = self.fetch_text(url).await {
                bodies.push(text);
            }
        }
        bodies
    }
}

// Script fetching for workers created from a URL

use crate::js::error::FetchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// A worker script downloaded from the network
#[derive(Debug, Clone)]
pub struct FetchedScript {
    pub body: String,
    /// URL after redirects; the worker takes this URL's origin
    pub final_url: Url,
}

/// Loads worker scripts by URL
#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedScript, FetchError>;
}

/// Fetcher backed by `reqwest`
///
/// Follows redirects and only accepts `200 OK`.
pub struct HttpScriptFetcher {
    client: Client,
}

impl HttpScriptFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }
}

impl Default for HttpScriptFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl ScriptFetcher for HttpScriptFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedScript, FetchError> {
        tracing::debug!(target: "workerpool", url = %url, "fetching worker script");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                status_line: status_line(status),
                url: url.to_string(),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(|_| FetchError::Decode {
            url: url.to_string(),
        })?;

        Ok(FetchedScript { body, final_url })
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

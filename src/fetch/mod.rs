// src/fetch/mod.rs
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::{error, info};
use url::Url;

use crate::error::{LoadError, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Characters of an error response body kept for the log and the error.
const BODY_SNIPPET: usize = 200;

/// Downloads the static GTFS archive for a category.
#[derive(Debug, Clone)]
pub struct StaticClient {
    client: Client,
    base_url: String,
}

impl StaticClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}?category={category}` with the category percent-encoded.
    pub fn category_url(&self, category: &str) -> Result<Url> {
        Url::parse_with_params(&self.base_url, &[("category", category)])
            .map_err(|e| LoadError::Config(format!("base url {}: {}", self.base_url, e)))
    }

    /// GET the archive into memory. Any non-success status is an error
    /// carrying the start of the response body.
    pub async fn get_static_zip(&self, category: &str) -> Result<Bytes> {
        let url = self.category_url(category)?;
        info!(url = %url, category, "downloading GTFS static ZIP");

        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(BODY_SNIPPET)
                .collect();
            error!(status = status.as_u16(), body = %body, "failed to download GTFS static ZIP");
            return Err(LoadError::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        info!(bytes = bytes.len(), "downloaded GTFS static ZIP");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed_and_category_encoded() -> anyhow::Result<()> {
        let client =
            StaticClient::new("https://example.com/gtfs-static/prasarana//", DEFAULT_TIMEOUT)?;
        assert_eq!(client.base_url(), "https://example.com/gtfs-static/prasarana");
        let url = client.category_url("rapid bus&kl")?;
        assert_eq!(
            url.as_str(),
            "https://example.com/gtfs-static/prasarana?category=rapid+bus%26kl"
        );
        Ok(())
    }

    #[test]
    fn bad_base_url_is_a_config_error() -> anyhow::Result<()> {
        let client = StaticClient::new("not a url", DEFAULT_TIMEOUT)?;
        assert!(matches!(
            client.category_url("x").unwrap_err(),
            LoadError::Config(_)
        ));
        Ok(())
    }
}

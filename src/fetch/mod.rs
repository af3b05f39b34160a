// src/fetch/mod.rs

pub mod urls;

use crate::config::Config;
use anyhow::{Context, Result};
use reqwest::Client;
use url::Url;

/// HTTP access used by the crawler.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    /// GET `url` and return the body as text.
    async fn fetch_page(&self, url: &Url) -> Result<String>;

    /// GET `url` and return the raw body.
    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>>;
}

/// `Fetcher` backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .timeout(cfg.timeout())
            .cookie_store(true)
            .gzip(true)
            .build()
            .context("building HTTP client")?;
        Ok(Self::new(client))
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch_page(&self, url: &Url) -> Result<String> {
        self.client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {}", url))?
            .error_for_status()?
            .text()
            .await
            .with_context(|| format!("reading body from {}", url))
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {}", url))?
            .error_for_status()?;
        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("downloading {}", url))?;
        Ok(bytes.to_vec())
    }
}

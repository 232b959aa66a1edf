use std::borrow::Cow;
use std::io::prelude::*;
use std::time::Duration;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::header::CONTENT_TYPE;

use crate::config::HarvesterConfig;
use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub content: Vec<u8>,
}

impl Page {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Retrieves listing pages. Retries and throttling, if any, live behind this.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<Page, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &HarvesterConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::ClientBuilder::new()
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true);
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| FetchError::Other(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        let http_err = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let resp = self.client.get(url).send().await.map_err(http_err)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content = match resp.headers().get(CONTENT_TYPE) {
            Some(c) if c == "application/x-gzip" || c == "application/gzip" => {
                let compressed = resp.bytes().await.map_err(http_err)?;
                let mut gz = GzDecoder::new(&compressed[..]);
                let mut content = Vec::with_capacity(compressed.len());
                gz.read_to_end(&mut content)
                    .map_err(|source| FetchError::Decode {
                        url: url.to_string(),
                        source,
                    })?;
                content
            }
            _ => resp.bytes().await.map_err(http_err)?.to_vec(),
        };

        Ok(Page {
            url: url.to_string(),
            status: status.as_u16(),
            content,
        })
    }
}

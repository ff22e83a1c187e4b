//! Remote resource fetching from the content API.

use bytes::{Bytes, BytesMut};
use futures::future::Future;
use reqwest::header::{self, HeaderValue};
use serde_json::Value;
use url::Url;

pub use reqwest::Client;

use crate::{Config, Error, Result};

const ACCEPT_JSON: &str = "application/json";
const ACCEPT_PDF: &str = "application/pdf";

/// Remote resource fetcher interface.
///
/// Each call issues exactly one request and never retries.
pub trait Fetcher {
    /// Fetch and parse structured data.
    fn fetch_json(&self, url: &Url) -> impl Future<Output = Result<Value>>;

    /// Fetch an opaque byte buffer.
    fn fetch_bytes(&self, url: &Url) -> impl Future<Output = Result<Bytes>>;
}

/// Fetcher authenticating against the content API with a bearer credential.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    api_key: String,
}

impl HttpFetcher {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::default(),
            api_key: api_key.into(),
        }
    }

    /// Create a fetcher from the API credential and transport settings of `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self::new(config.api_key.as_str()).with_client(builder.build()?))
    }

    #[inline]
    pub fn with_client(self, client: Client) -> Self {
        Self { client, ..self }
    }

    /// Issue an authenticated GET and accumulate the whole response body.
    async fn get(&self, url: &Url, accept: &'static str) -> Result<Bytes> {
        tracing::trace!("GET {url} ({accept})");

        let mut resp = self
            .client
            .get(url.clone())
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, HeaderValue::from_static(accept))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http { status: status.as_u16() });
        }

        let mut body = BytesMut::new();

        while let Some(chunk) = resp.chunk().await? {
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch_json(&self, url: &Url) -> Result<Value> {
        let body = self.get(url, ACCEPT_JSON).await?;

        Ok(serde_json::from_slice(&body)?)
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes> {
        self.get(url, ACCEPT_PDF).await
    }
}

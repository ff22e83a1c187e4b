use bytes::Bytes;
use reqwest::{header, Client};
use url::Url;

use super::BlobStore;
use crate::{Config, Error, Result};

/// Blob store writing to an S3-compatible endpoint with path-style `PUT {endpoint}/{bucket}/{key}` requests.
///
/// Requests are either anonymous or authenticated with a bearer credential (eg. a gateway in front of the object storage).
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    token: Option<String>,
}

impl HttpStore {
    pub fn new(endpoint: Url, bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        crate::lesson::check_key_component("bucket", &bucket)?;

        Ok(Self {
            client: Client::default(),
            endpoint,
            bucket,
            token: None,
        })
    }

    /// Create a store from the endpoint, bucket and transport settings of `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let endpoint = config
            .store_endpoint
            .clone()
            .ok_or_else(|| Error::config("no store endpoint configured"))?;

        let mut builder = Client::builder();

        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self::new(endpoint, config.bucket.as_str())?.with_client(builder.build()?))
    }

    #[inline]
    pub fn with_client(self, client: Client) -> Self {
        Self { client, ..self }
    }

    #[inline]
    pub fn with_token(self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..self
        }
    }

    /// Return the object URL related to this key.
    fn object_url(&self, key: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();

        url.path_segments_mut()
            .map_err(|_| Error::config(format!("store endpoint `{}` cannot be a base URL", self.endpoint)))?
            .pop_if_empty()
            .push(&self.bucket)
            .extend(key.split('/'));

        Ok(url)
    }
}

impl BlobStore for HttpStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        let url = self.object_url(key)?;

        tracing::trace!("PUT {url} ({} bytes, {content_type})", body.len());

        let mut request = self.client.put(url).header(header::CONTENT_TYPE, content_type).body(body);

        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(Error::storage)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::storage(format!("object store responded with HTTP {}", status.as_u16())));
        }

        Ok(())
    }
}

//! Run configuration.
//!
//! A [`Config`] is built once by the host, then threaded explicitly through [`Importer::new`](crate::Importer::new) and the collaborator
//! constructors. Nothing below this module reads the process environment.

use std::num::NonZeroUsize;
use std::time::Duration;

use url::Url;

use crate::{Error, Result};

/// Default admission quota of the per-lesson limiter.
pub const DEFAULT_ASSET_CONCURRENCY: NonZeroUsize = match NonZeroUsize::new(5) {
    Some(quota) => quota,
    None => unreachable!(),
};

pub const ENV_API_URL: &str = "OAK_API_URL";
pub const ENV_API_KEY: &str = "OAK_API_KEY";
pub const ENV_BUCKET: &str = "S3_BUCKET_NAME";
pub const ENV_ASSET_CONCURRENCY: &str = "IMPORTER_ASSET_CONCURRENCY";
pub const ENV_GLOBAL_CONCURRENCY: &str = "IMPORTER_GLOBAL_CONCURRENCY";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "IMPORTER_HTTP_TIMEOUT_SECS";
pub const ENV_STORE_ENDPOINT: &str = "IMPORTER_STORE_ENDPOINT";

/// Importer configuration.
#[derive(Clone)]
pub struct Config {
    /// Listing endpoint returning the lesson records.
    pub api_url: Url,
    /// Bearer credential sent to the content API.
    pub api_key: String,
    /// Destination bucket.
    pub bucket: String,
    /// Quota of the limiter built for each lesson.
    pub asset_concurrency: NonZeroUsize,
    /// Quota of a limiter shared by every asset operation of a run, if any.
    pub global_concurrency: Option<NonZeroUsize>,
    /// Transport timeout applied to every outbound request.
    pub http_timeout: Option<Duration>,
    /// Base URL of an S3-compatible endpoint, used by [`HttpStore`](crate::store::HttpStore).
    pub store_endpoint: Option<Url>,
}

impl Config {
    pub fn new(api_url: Url, api_key: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            api_url,
            api_key: api_key.into(),
            bucket: bucket.into(),
            asset_concurrency: DEFAULT_ASSET_CONCURRENCY,
            global_concurrency: None,
            http_timeout: None,
            store_endpoint: None,
        }
    }

    #[inline]
    pub fn with_asset_concurrency(self, quota: NonZeroUsize) -> Self {
        Self {
            asset_concurrency: quota,
            ..self
        }
    }

    #[inline]
    pub fn with_global_concurrency(self, quota: NonZeroUsize) -> Self {
        Self {
            global_concurrency: Some(quota),
            ..self
        }
    }

    #[inline]
    pub fn with_http_timeout(self, timeout: Duration) -> Self {
        Self {
            http_timeout: Some(timeout),
            ..self
        }
    }

    #[inline]
    pub fn with_store_endpoint(self, endpoint: Url) -> Self {
        Self {
            store_endpoint: Some(endpoint),
            ..self
        }
    }

    /// Build a configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from any variable lookup, see [`Config::from_env()`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| Error::config(format!("missing environment variable `{name}`")))
        };

        let api_url = parse_url(ENV_API_URL, &required(ENV_API_URL)?)?;
        let mut config = Self::new(api_url, required(ENV_API_KEY)?, required(ENV_BUCKET)?);

        if let Some(value) = lookup(ENV_ASSET_CONCURRENCY) {
            config.asset_concurrency = parse_quota(ENV_ASSET_CONCURRENCY, &value)?;
        }
        if let Some(value) = lookup(ENV_GLOBAL_CONCURRENCY) {
            config.global_concurrency = Some(parse_quota(ENV_GLOBAL_CONCURRENCY, &value)?);
        }
        if let Some(value) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            let secs = value
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("`{ENV_HTTP_TIMEOUT_SECS}` must be a number of seconds, got {value:?}")))?;
            config.http_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(value) = lookup(ENV_STORE_ENDPOINT) {
            config.store_endpoint = Some(parse_url(ENV_STORE_ENDPOINT, &value)?);
        }

        Ok(config)
    }
}

// keep the credential out of logs
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url.as_str())
            .field("api_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("asset_concurrency", &self.asset_concurrency)
            .field("global_concurrency", &self.global_concurrency)
            .field("http_timeout", &self.http_timeout)
            .field("store_endpoint", &self.store_endpoint.as_ref().map(Url::as_str))
            .finish()
    }
}

fn parse_url(name: &str, value: &str) -> Result<Url> {
    Url::parse(value.trim()).map_err(|err| Error::config(format!("`{name}` is not a valid URL: {err}")))
}

fn parse_quota(name: &str, value: &str) -> Result<NonZeroUsize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("`{name}` must be a positive integer, got {value:?}")))
}

//! Durable blob storage sinks.
//!
//! A [`BlobStore`] persists a byte payload under a key. The key is the one derived by [`asset_key()`](crate::asset_key), ie. a
//! `{lesson_slug}/{asset_type}.pdf` path made of exactly two safe segments. Puts are atomic from the caller's point of view: either the
//! whole payload becomes visible under its key, or the put fails with [`Error::Storage`](crate::Error::Storage) and nothing does.

use bytes::Bytes;
use futures::future::Future;

mod local;
pub use local::*;

mod remote;
pub use remote::*;

mod memory;
pub use memory::*;

/// Blob store interface.
///
/// Implementors perform a single put per call and never retry.
pub trait BlobStore {
    /// Store `body` under `key`, tagged with `content_type`.
    fn put(&self, key: &str, body: Bytes, content_type: &str) -> impl Future<Output = crate::Result<()>>;
}

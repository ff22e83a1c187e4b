//! A simple crate importing lesson assets into blob storage.
//!
//! A generic, robust and efficient crate providing features dedicated to:
//! - listing lessons and their document assets from a remote content API,
//! - fetching every asset with a bounded number of concurrent requests,
//! - storing asset content under a deterministic `{lesson_slug}/{asset_type}.pdf` key,
//! - reporting the outcome of every single asset, lesson and run.
//!
//! It is a two-level fan-out: all lessons of a listing are processed at once, while the assets of each lesson go through a
//! [`Limiter`](limit::Limiter) admitting 5 of them at a time (an optional global limiter can also bound the whole run). It makes use of
//! cooperative concurrency only: a run is a single future multiplexing every request, nothing is spawned, and the fetcher and store
//! collaborators are shared read-only.
//!
//! As a **strong hypothesis**, we can assume that:
//! - the listing is small enough to be held in memory, and so is each asset;
//! - `lesson_slug`s are made **unique** within a listing.
//!
//! Failures are isolated as values: a failing asset never affects its siblings, a failing lesson never affects other lessons, and a run
//! only fails when its listing cannot be fetched or is not a list of lessons:
//!
//! ```no_run
//! # tokio_test::block_on(async {
//! use importer::{store::FsStore, Config, Importer};
//!
//! let config = Config::from_env()?;
//! let store = FsStore::new("/var/lib/importer", &config.bucket)?;
//! let importer = Importer::from_config(&config, store)?;
//!
//! let envelope = importer.run().await;
//! println!("{}", serde_json::to_string(&envelope).unwrap());
//! # Ok::<_, importer::Error>(())
//! # }).unwrap();
//! ```

mod config;
pub use config::*;

mod error;
pub use error::*;

mod lesson;
pub use lesson::{asset_key, parse_listing, Asset, Lesson, Listed, PDF_CONTENT_TYPE};

mod report;
pub use report::*;

pub mod fetch;
pub mod limit;
pub mod pipeline;
pub mod store;

pub use pipeline::Importer;

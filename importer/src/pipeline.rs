//! The import pipeline: a listing fans out to lessons, each lesson fans out to its assets.
//!
//! ```text
//!     run / import           1 listing fetch, then every lesson at once
//!       L process_lesson     every asset, at most `asset_concurrency` at once (and `global_concurrency` across lessons, if set)
//!         L process_asset    1 binary fetch, then 1 put
//! ```
//!
//! Failures are turned into values as close as possible to where they happen: an asset failure ends up in a failed [`AssetResult`], a
//! lesson-level fault (including a panic or a malformed lesson record) in a failed [`LessonReport`]. Only the listing fetch can fail a
//! whole run.

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;

use futures::future::{self, Future, FutureExt};
use url::Url;

use crate::fetch::{Fetcher, HttpFetcher};
use crate::lesson::{self, Asset, Lesson, Listed, PDF_CONTENT_TYPE};
use crate::limit::Limiter;
use crate::report::{AssetResult, BatchReport, Envelope, LessonReport};
use crate::store::BlobStore;
use crate::{Config, Error, Result};

/// Lesson asset importer.
///
/// All the work of a run is multiplexed within the task awaiting it, nothing is spawned. The fetcher and the store are shared by every
/// asset operation of a run.
#[derive(Debug)]
pub struct Importer<F, S> {
    fetcher: F,
    store: S,
    listing_url: Url,
    asset_concurrency: NonZeroUsize,
    /// A limiter shared by all lessons, bounding the total number of in-flight asset operations.
    global: Option<Limiter>,
}

impl<S: BlobStore> Importer<HttpFetcher, S> {
    /// Create an importer fetching from the content API configured in `config`.
    pub fn from_config(config: &Config, store: S) -> Result<Self> {
        Ok(Self::new(config, HttpFetcher::from_config(config)?, store))
    }
}

impl<F: Fetcher, S: BlobStore> Importer<F, S> {
    pub fn new(config: &Config, fetcher: F, store: S) -> Self {
        Self {
            fetcher,
            store,
            listing_url: config.api_url.clone(),
            asset_concurrency: config.asset_concurrency,
            global: config.global_concurrency.map(Limiter::new),
        }
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a whole import and wrap its outcome for the invoker.
    ///
    /// The envelope is a failure only when the listing could not be fetched or is not a list of lessons. Failed assets and lessons are
    /// reported within a successful envelope.
    pub async fn run(&self) -> Envelope {
        match self.import().await {
            Ok(report) => Envelope::success(report),
            Err(err) => {
                tracing::error!("Error processing lessons: {err}");

                Envelope::failure(&err)
            }
        }
    }

    /// Fetch the listing and process every lesson concurrently.
    ///
    /// Lesson reports follow the listing order.
    pub async fn import(&self) -> Result<BatchReport> {
        let payload = self.fetcher.fetch_json(&self.listing_url).await?;
        let lessons = lesson::parse_listing(payload)?;

        tracing::info!("Processing {} lessons", lessons.len());

        let lessons = future::join_all(lessons.iter().map(|record| self.process_record(record))).await;
        let report = BatchReport { lessons };

        tracing::info!(
            lessons = report.lessons.len(),
            failed_lessons = report.failed_lessons(),
            stored_assets = report.stored_assets(),
            failed_assets = report.failed_assets(),
            "Processing complete"
        );

        Ok(report)
    }

    /// Process a listing record, a malformed one only degrades its own lesson report.
    async fn process_record(&self, record: &Listed<Lesson>) -> LessonReport {
        match record {
            Listed::Valid(lesson) => self.process_lesson(lesson).await,
            Listed::Malformed { error, .. } => {
                lesson_failed(record.lesson_slug(), Error::MalformedRecord(error.clone()).to_string())
            }
        }
    }

    /// Process every asset of a lesson, never failing.
    pub async fn process_lesson(&self, lesson: &Lesson) -> LessonReport {
        let processed = AssertUnwindSafe(self.try_process_lesson(lesson)).catch_unwind().await;

        let error = match processed {
            Ok(Ok(results)) => {
                return LessonReport::Completed {
                    lesson_slug: lesson.lesson_slug.clone(),
                    lesson_title: lesson.lesson_title.clone(),
                    results,
                }
            }
            Ok(Err(err)) => err.to_string(),
            Err(panic) => format!("panicked while processing lesson: {}", panic_message(panic.as_ref())),
        };

        lesson_failed(Some(lesson.lesson_slug.as_str()), error)
    }

    async fn try_process_lesson(&self, lesson: &Lesson) -> Result<Vec<AssetResult>> {
        lesson::check_key_component("lesson slug", &lesson.lesson_slug)?;
        let assets = lesson.assets()?;

        tracing::debug!("Processing lesson: {} ({} assets)", lesson.lesson_slug, assets.len());

        let limiter = Limiter::new(self.asset_concurrency);

        let results = limiter
            .run_all(assets.iter().map(|asset| self.admit(self.process_listed_asset(asset, &lesson.lesson_slug))))
            .await;

        debug_assert_eq!(results.len(), assets.len());

        Ok(results)
    }

    /// Go through the global limiter, if any.
    async fn admit<T>(&self, future: impl Future<Output = T>) -> T {
        match self.global {
            Some(ref limiter) => limiter.run(future).await,
            None => future.await,
        }
    }

    async fn process_listed_asset(&self, listed: &Listed<Asset>, lesson_slug: &str) -> AssetResult {
        match listed {
            Listed::Valid(asset) => self.process_asset(asset, lesson_slug).await,
            Listed::Malformed { error, .. } => {
                let error = Error::MalformedRecord(error.clone());
                tracing::warn!("Error processing asset of lesson: {lesson_slug}: {error}");

                AssetResult::Failed {
                    error: error.to_string(),
                    asset: listed.clone(),
                }
            }
        }
    }

    /// Fetch an asset and write it to the store, never failing.
    pub async fn process_asset(&self, asset: &Asset, lesson_slug: &str) -> AssetResult {
        tracing::debug!("Processing asset: {} for lesson: {lesson_slug}", asset.asset_type);

        match self.store_asset(asset, lesson_slug).await {
            Ok(filename) => {
                tracing::info!("Successfully uploaded {filename}");

                AssetResult::Stored {
                    filename,
                    asset_type: asset.asset_type.clone(),
                }
            }
            Err(err) => {
                tracing::warn!("Error processing asset: {}: {err}", asset.url);

                AssetResult::Failed {
                    error: err.to_string(),
                    asset: Listed::Valid(asset.clone()),
                }
            }
        }
    }

    async fn store_asset(&self, asset: &Asset, lesson_slug: &str) -> Result<String> {
        let key = lesson::asset_key(lesson_slug, &asset.asset_type)?;
        let url = Url::parse(&asset.url).map_err(|source| Error::InvalidUrl {
            url: asset.url.clone(),
            source,
        })?;

        let body = self.fetcher.fetch_bytes(&url).await?;
        self.store.put(&key, body, PDF_CONTENT_TYPE).await?;

        Ok(key)
    }
}

fn lesson_failed(lesson_slug: Option<&str>, error: String) -> LessonReport {
    tracing::error!("Error processing lesson: {}: {error}", lesson_slug.unwrap_or("<no slug>"));

    LessonReport::Failed {
        lesson_slug: lesson_slug.map(str::to_owned),
        error,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;
    use serde_json::{json, Value};

    use super::*;
    use crate::store::MemoryStore;

    const LISTING_URL: &str = "https://api.example.com/lessons";

    #[derive(Debug, Clone, Copy)]
    enum Outcome {
        Body(&'static [u8]),
        Status(u16),
        Panic,
    }

    /// Fetcher serving a fixed listing and fixed asset outcomes, keeping track of calls.
    #[derive(Default)]
    struct FakeFetcher {
        listing: Option<Value>,
        assets: HashMap<String, (Outcome, u64)>,
        json_calls: AtomicUsize,
        bytes_calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeFetcher {
        fn with_listing(self, listing: Value) -> Self {
            Self {
                listing: Some(listing),
                ..self
            }
        }

        fn with_asset(mut self, url: &str, outcome: Outcome, delay: u64) -> Self {
            self.assets.insert(url.to_owned(), (outcome, delay));
            self
        }
    }

    impl Fetcher for FakeFetcher {
        async fn fetch_json(&self, url: &Url) -> Result<Value> {
            assert_eq!(url.as_str(), LISTING_URL);
            self.json_calls.fetch_add(1, Ordering::SeqCst);

            self.listing.clone().ok_or(Error::Http { status: 503 })
        }

        async fn fetch_bytes(&self, url: &Url) -> Result<Bytes> {
            self.bytes_calls.fetch_add(1, Ordering::SeqCst);
            let (outcome, delay) = self.assets.get(url.as_str()).copied().unwrap_or((Outcome::Status(404), 1));

            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            match outcome {
                Outcome::Body(body) => Ok(Bytes::from_static(body)),
                Outcome::Status(status) => Err(Error::Http { status }),
                Outcome::Panic => panic!("fetcher blew up on {url}"),
            }
        }
    }

    /// Store rejecting every put on a given key.
    #[derive(Default)]
    struct FailingStore {
        rejected: &'static str,
        inner: MemoryStore,
    }

    impl BlobStore for FailingStore {
        async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
            if key == self.rejected {
                return Err(Error::storage("access denied"));
            }
            self.inner.put(key, body, content_type).await
        }
    }

    fn config() -> Config {
        Config::new(Url::parse(LISTING_URL).unwrap(), "secret", "pdf-storage")
    }

    fn importer(fetcher: FakeFetcher) -> Importer<FakeFetcher, MemoryStore> {
        Importer::new(&config(), fetcher, MemoryStore::new())
    }

    fn asset_url(i: usize) -> String {
        format!("https://assets.example.com/{i}.pdf")
    }

    #[tokio::test]
    async fn test_process_asset() {
        let fetcher = FakeFetcher::default().with_asset("https://x/w.pdf", Outcome::Body(b"%PDF-w"), 1);
        let importer = importer(fetcher);

        let result = importer.process_asset(&Asset::new("worksheet", "https://x/w.pdf"), "fractions-1").await;

        assert_eq!(
            result,
            AssetResult::Stored {
                filename: "fractions-1/worksheet.pdf".into(),
                asset_type: "worksheet".into()
            }
        );
        let object = importer.store().get("fractions-1/worksheet.pdf").unwrap();
        assert_eq!(object.body, Bytes::from_static(b"%PDF-w"));
        assert_eq!(object.content_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_process_asset_fetch_failure() {
        let fetcher = FakeFetcher::default().with_asset("https://x/q.pdf", Outcome::Status(404), 1);
        let importer = importer(fetcher);
        let asset = Asset::new("quiz", "https://x/q.pdf");

        let result = importer.process_asset(&asset, "fractions-1").await;

        assert_eq!(
            result,
            AssetResult::Failed {
                error: "HTTP error: 404".into(),
                asset: Listed::Valid(asset)
            }
        );
        assert!(importer.store().is_empty());
    }

    #[tokio::test]
    async fn test_process_asset_store_failure() {
        let fetcher = FakeFetcher::default().with_asset("https://x/q.pdf", Outcome::Body(b"%PDF"), 1);
        let store = FailingStore {
            rejected: "fractions-1/quiz.pdf",
            ..Default::default()
        };
        let importer = Importer::new(&config(), fetcher, store);

        let result = importer.process_asset(&Asset::new("quiz", "https://x/q.pdf"), "fractions-1").await;

        assert!(matches!(result, AssetResult::Failed { ref error, .. } if error == "storage error: access denied"), "{result:?}");
    }

    #[tokio::test]
    async fn test_process_asset_rejected_before_fetch() {
        let importer = importer(FakeFetcher::default());

        let result = importer.process_asset(&Asset::new("quiz/../..", "https://x/q.pdf"), "fractions-1").await;
        assert!(matches!(result, AssetResult::Failed { ref error, .. } if error.contains("invalid asset type")), "{result:?}");

        let result = importer.process_asset(&Asset::new("quiz", "not a url"), "fractions-1").await;
        assert!(matches!(result, AssetResult::Failed { ref error, .. } if error.contains("invalid URL")), "{result:?}");

        assert_eq!(importer.fetcher.bytes_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_process_lesson_keeps_asset_order() {
        let mut fetcher = FakeFetcher::default();
        for i in 0..12 {
            // later assets complete first
            fetcher = fetcher.with_asset(&asset_url(i), Outcome::Body(b"%PDF"), 1 + 12 - i as u64);
        }
        let importer = importer(fetcher);

        let lesson = Lesson::new("fractions-1", "Fractions").with_assets((0..12).map(|i| Asset::new(format!("asset-{i}"), asset_url(i))));
        let report = importer.process_lesson(&lesson).await;

        let results = match report {
            LessonReport::Completed {
                lesson_slug,
                lesson_title,
                results,
            } => {
                assert_eq!((lesson_slug.as_str(), lesson_title.as_str()), ("fractions-1", "Fractions"));
                results
            }
            report => panic!("lesson failed: {report:?}"),
        };

        assert_eq!(results.len(), 12);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(
                *result,
                AssetResult::Stored {
                    filename: format!("fractions-1/asset-{i}.pdf"),
                    asset_type: format!("asset-{i}")
                }
            );
        }

        assert_eq!(importer.fetcher.bytes_calls.load(Ordering::SeqCst), 12);
        assert_eq!(importer.fetcher.peak.load(Ordering::SeqCst), 5);
        assert_eq!(importer.store().len(), 12);
    }

    #[tokio::test]
    async fn test_process_lesson_isolates_asset_failures() {
        let fetcher = FakeFetcher::default()
            .with_asset(&asset_url(0), Outcome::Status(500), 1)
            .with_asset(&asset_url(1), Outcome::Body(b"%PDF"), 3)
            .with_asset(&asset_url(2), Outcome::Status(403), 2);
        let importer = importer(fetcher);

        let lesson = Lesson::new("l", "L").with_assets((0..3).map(|i| Asset::new(format!("a{i}"), asset_url(i))));
        let report = importer.process_lesson(&lesson).await;

        let results = report.results();
        assert_eq!(results.len(), 3);
        assert!(matches!(&results[0], AssetResult::Failed { asset: Listed::Valid(asset), .. } if asset.url == asset_url(0)));
        assert_eq!(
            results[1],
            AssetResult::Stored {
                filename: "l/a1.pdf".into(),
                asset_type: "a1".into()
            }
        );
        assert!(matches!(&results[2], AssetResult::Failed { error, .. } if error == "HTTP error: 403"));
        assert_eq!(importer.store().keys(), ["l/a1.pdf"]);
    }

    #[tokio::test]
    async fn test_process_lesson_without_assets() {
        let importer = importer(FakeFetcher::default());

        let report = importer.process_lesson(&Lesson::new("empty", "Empty")).await;
        assert_eq!(
            report,
            LessonReport::Completed {
                lesson_slug: "empty".into(),
                lesson_title: "Empty".into(),
                results: vec![]
            }
        );

        let lesson = Lesson {
            assets: None,
            ..Lesson::new("no-asset-list", "")
        };
        let report = importer.process_lesson(&lesson).await;
        assert_eq!(
            report,
            LessonReport::Failed {
                lesson_slug: Some("no-asset-list".into()),
                error: "malformed record: lesson `no-asset-list` has no asset list".into()
            }
        );
    }

    #[tokio::test]
    async fn test_process_lesson_unsafe_slug() {
        let importer = importer(FakeFetcher::default());
        let lesson = Lesson::new("maths/fractions", "Fractions").with_assets([Asset::new("quiz", asset_url(0))]);

        let report = importer.process_lesson(&lesson).await;

        assert_eq!(
            report,
            LessonReport::Failed {
                lesson_slug: Some("maths/fractions".into()),
                error: "invalid lesson slug for storage key: \"maths/fractions\"".into()
            }
        );
        assert_eq!(importer.fetcher.bytes_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_process_lesson_panic() {
        let fetcher = FakeFetcher::default().with_asset(&asset_url(0), Outcome::Panic, 1);
        let importer = importer(fetcher);
        let lesson = Lesson::new("l", "L").with_assets([Asset::new("quiz", asset_url(0))]);

        let report = importer.process_lesson(&lesson).await;

        assert!(
            matches!(report, LessonReport::Failed { ref error, .. } if error.contains("panicked") && error.contains("fetcher blew up")),
            "{report:?}"
        );
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_run() {
        let fetcher = FakeFetcher::default()
            .with_listing(json!([
                {
                    "lessonSlug": "fractions-1",
                    "lessonTitle": "Fractions",
                    "assets": [
                        { "type": "worksheet", "url": asset_url(0) },
                        { "type": "exit-quiz", "url": asset_url(1) }
                    ]
                },
                {
                    "lessonSlug": "broken",
                    "lessonTitle": "Broken",
                    "assets": [{ "type": "quiz", "url": asset_url(2) }]
                },
                { "lessonSlug": "decimals-1", "lessonTitle": "Decimals", "assets": [] }
            ]))
            .with_asset(&asset_url(0), Outcome::Body(b"%PDF-0"), 3)
            .with_asset(&asset_url(1), Outcome::Status(404), 1)
            .with_asset(&asset_url(2), Outcome::Panic, 2);
        let importer = importer(fetcher);

        let envelope = importer.run().await;

        assert_eq!(envelope.status_code, 200);
        let report = envelope.report().unwrap();
        let slugs: Vec<_> = report.lessons.iter().map(LessonReport::lesson_slug).collect();
        assert_eq!(slugs, [Some("fractions-1"), Some("broken"), Some("decimals-1")]);
        assert_eq!(report.stored_assets(), 1);
        assert_eq!(report.failed_assets(), 1);
        assert_eq!(report.failed_lessons(), 1);
        assert_eq!(importer.store().keys(), ["fractions-1/worksheet.pdf"]);

        assert!(logs_contain("Processing 3 lessons"));
        assert!(logs_contain("Successfully uploaded fractions-1/worksheet.pdf"));
        assert!(logs_contain("Error processing lesson: broken"));
    }

    #[tokio::test]
    async fn test_run_asset_not_found() {
        let fetcher = FakeFetcher::default()
            .with_listing(json!([{
                "lessonSlug": "fractions-1",
                "lessonTitle": "Fractions",
                "assets": [{ "type": "quiz", "url": "https://x/q.pdf" }]
            }]))
            .with_asset("https://x/q.pdf", Outcome::Status(404), 1);
        let importer = importer(fetcher);

        let envelope = importer.run().await;

        assert_eq!(envelope.status_code, 200);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap()["body"]["results"][0]["results"][0],
            json!({
                "success": false,
                "error": "HTTP error: 404",
                "asset": { "type": "quiz", "url": "https://x/q.pdf" }
            })
        );
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_run_malformed_records() {
        let fetcher = FakeFetcher::default()
            .with_listing(json!([
                {
                    "lessonSlug": "fractions-1",
                    "lessonTitle": "Fractions",
                    "assets": [{ "type": "worksheet", "url": asset_url(0) }]
                },
                {
                    "lessonSlug": "decimals-1",
                    "lessonTitle": "Decimals",
                    "assets": [{ "type": "quiz" }, { "type": "worksheet", "url": asset_url(1) }]
                },
                {
                    "lessonSlug": "percentages-1",
                    "lessonTitle": null,
                    "assets": [{ "type": "worksheet", "url": asset_url(2) }]
                },
                { "lessonSlug": 7, "assets": [{ "type": "worksheet", "url": asset_url(3) }] },
                { "lessonSlug": "ratios-1", "assets": "none" }
            ]))
            .with_asset(&asset_url(0), Outcome::Body(b"%PDF-0"), 1)
            .with_asset(&asset_url(1), Outcome::Body(b"%PDF-1"), 1)
            .with_asset(&asset_url(2), Outcome::Body(b"%PDF-2"), 1)
            .with_asset(&asset_url(3), Outcome::Body(b"%PDF-3"), 1);
        let importer = importer(fetcher);

        let envelope = importer.run().await;

        assert_eq!(envelope.status_code, 200);
        let json = serde_json::to_value(&envelope).unwrap();
        let lessons = &json["body"]["results"];

        assert_eq!(
            lessons[0],
            json!({
                "lessonSlug": "fractions-1",
                "lessonTitle": "Fractions",
                "results": [{ "success": true, "filename": "fractions-1/worksheet.pdf", "type": "worksheet" }]
            })
        );

        // a malformed asset fails alone, the listed record is reported as is
        assert_eq!(lessons[1]["results"][0]["success"], json!(false));
        assert_eq!(lessons[1]["results"][0]["asset"], json!({ "type": "quiz" }));
        assert!(lessons[1]["results"][0]["error"].as_str().unwrap().contains("missing field `url`"));
        assert_eq!(lessons[1]["results"][1]["filename"], json!("decimals-1/worksheet.pdf"));

        assert_eq!(lessons[2]["lessonTitle"], json!(""));
        assert_eq!(lessons[2]["results"][0]["success"], json!(true));

        // malformed lessons degrade alone
        assert_eq!(lessons[3].get("lessonSlug"), None);
        assert!(lessons[3]["error"].as_str().unwrap().starts_with("malformed record: "));
        assert_eq!(lessons[4]["lessonSlug"], json!("ratios-1"));
        assert!(lessons[4]["error"].as_str().unwrap().starts_with("malformed record: "));

        assert_eq!(
            importer.store().keys(),
            ["decimals-1/worksheet.pdf", "fractions-1/worksheet.pdf", "percentages-1/worksheet.pdf"]
        );
        assert_eq!(importer.fetcher.bytes_calls.load(Ordering::SeqCst), 3);
        assert!(logs_contain("Error processing lesson: ratios-1: malformed record"));
    }

    #[tokio::test]
    async fn test_run_invalid_listing() {
        let importer = importer(FakeFetcher::default().with_listing(json!({})));

        let envelope = importer.run().await;

        assert_eq!(envelope.status_code, 500);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap()["body"],
            json!({
                "message": "Error processing lessons",
                "error": "invalid response from content API: expected an array of lessons, got an object"
            })
        );
        assert_eq!(importer.fetcher.json_calls.load(Ordering::SeqCst), 1);
        assert_eq!(importer.fetcher.bytes_calls.load(Ordering::SeqCst), 0);
        assert!(importer.store().is_empty());
    }

    #[tokio::test]
    async fn test_run_listing_failure() {
        let importer = importer(FakeFetcher::default());

        let envelope = importer.run().await;

        assert_eq!(envelope.status_code, 500);
        assert!(!envelope.is_success());
        assert_eq!(importer.fetcher.bytes_calls.load(Ordering::SeqCst), 0);
    }

    fn listing(lessons: usize, assets: usize) -> Value {
        (0..lessons)
            .map(|l| {
                json!({
                    "lessonSlug": format!("lesson-{l}"),
                    "lessonTitle": format!("Lesson {l}"),
                    "assets": (0..assets)
                        .map(|a| json!({ "type": format!("asset-{a}"), "url": asset_url(l * assets + a) }))
                        .collect::<Vec<_>>()
                })
            })
            .collect()
    }

    fn fan_out_fetcher(lessons: usize, assets: usize) -> FakeFetcher {
        (0..lessons * assets).fold(FakeFetcher::default().with_listing(listing(lessons, assets)), |fetcher, i| {
            fetcher.with_asset(&asset_url(i), Outcome::Body(b"%PDF"), 5)
        })
    }

    #[tokio::test]
    async fn test_lessons_are_not_bounded_without_global_limit() {
        let importer = importer(fan_out_fetcher(4, 6));

        let report = importer.import().await.unwrap();

        assert_eq!(report.stored_assets(), 24);
        // 5 per lesson, lessons themselves are not throttled
        assert_eq!(importer.fetcher.peak.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn test_global_limit() {
        let config = config().with_global_concurrency(NonZeroUsize::new(3).unwrap());
        let importer = Importer::new(&config, fan_out_fetcher(4, 6), MemoryStore::new());

        let report = importer.import().await.unwrap();

        assert_eq!(report.stored_assets(), 24);
        assert_eq!(importer.store().len(), 24);
        assert_eq!(importer.fetcher.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_asset_concurrency() {
        let config = config().with_asset_concurrency(NonZeroUsize::MIN);
        let importer = Importer::new(&config, fan_out_fetcher(1, 4), MemoryStore::new());

        importer.import().await.unwrap();

        assert_eq!(importer.fetcher.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_over_http() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let base = Url::parse(&server.uri()).unwrap();

        Mock::given(method("GET"))
            .and(path("/lessons"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "lessonSlug": "fractions-1",
                "lessonTitle": "Fractions",
                "assets": [
                    { "type": "worksheet", "url": base.join("/w.pdf").unwrap().to_string() },
                    { "type": "exit-quiz", "url": base.join("/q.pdf").unwrap().to_string() }
                ]
            }])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/w.pdf"))
            .and(header("accept", "application/pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-w".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/q.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let config = Config::new(base.join("/lessons").unwrap(), "secret", "pdf-storage");
        let store = crate::store::FsStore::new(root.path(), &config.bucket).unwrap();
        let importer = Importer::from_config(&config, store).unwrap();

        let envelope = importer.run().await;

        assert_eq!(envelope.status_code, 200);
        let results = envelope.report().unwrap().lessons[0].results();
        assert!(results[0].is_success());
        assert!(matches!(&results[1], AssetResult::Failed { error, asset: Listed::Valid(asset) } if error == "HTTP error: 404" && asset.asset_type == "exit-quiz"));
        assert_eq!(std::fs::read(root.path().join("pdf-storage/fractions-1/worksheet.pdf")).unwrap(), b"%PDF-w");
        assert!(!root.path().join("pdf-storage/fractions-1/exit-quiz.pdf").exists());
    }
}

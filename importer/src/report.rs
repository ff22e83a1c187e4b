//! Result records flowing up from assets to the invoker.
//!
//! Every record serializes to the JSON shape the invoker expects:
//!
//! ```text
//!     - envelope        { statusCode, body }
//!       L body          { message, results: [lesson report] } | { message, error }
//!         L lesson      { lessonSlug, lessonTitle, results: [asset result] } | { lessonSlug?, error }
//!           L asset     { success: true, filename, type } | { success: false, error, asset }
//! ```

use serde::{Serialize, Serializer};

use crate::{Asset, Listed};

pub const SUCCESS_MESSAGE: &str = "Processing complete";
pub const FAILURE_MESSAGE: &str = "Error processing lessons";

/// Outcome of processing one asset, produced exactly once per asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetResult {
    /// Asset fetched and written under `filename`.
    Stored { filename: String, asset_type: String },
    /// Asset record malformed, or its fetch or write failed. The asset is kept as listed to identify it.
    Failed { error: String, asset: Listed<Asset> },
}

impl AssetResult {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }
}

impl Serialize for AssetResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(untagged)]
        enum Repr<'a> {
            Stored {
                success: bool,
                filename: &'a str,
                #[serde(rename = "type")]
                asset_type: &'a str,
            },
            Failed {
                success: bool,
                error: &'a str,
                asset: &'a Listed<Asset>,
            },
        }

        match self {
            Self::Stored { filename, asset_type } => Repr::Stored {
                success: true,
                filename,
                asset_type,
            },
            Self::Failed { error, asset } => Repr::Failed {
                success: false,
                error,
                asset,
            },
        }
        .serialize(serializer)
    }
}

/// Outcome of processing one lesson, produced exactly once per lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LessonReport {
    /// Every asset went through the asset processor, `results` follows the lesson asset order.
    #[serde(rename_all = "camelCase")]
    Completed {
        lesson_slug: String,
        lesson_title: String,
        results: Vec<AssetResult>,
    },
    /// A lesson-level fault stopped the lesson before its results could be collected.
    ///
    /// The slug is missing when the lesson record did not carry a string one.
    #[serde(rename_all = "camelCase")]
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        lesson_slug: Option<String>,
        error: String,
    },
}

impl LessonReport {
    pub fn lesson_slug(&self) -> Option<&str> {
        match self {
            Self::Completed { lesson_slug, .. } => Some(lesson_slug.as_str()),
            Self::Failed { lesson_slug, .. } => lesson_slug.as_deref(),
        }
    }

    /// Asset results, empty for a failed lesson.
    pub fn results(&self) -> &[AssetResult] {
        match self {
            Self::Completed { results, .. } => results,
            Self::Failed { .. } => &[],
        }
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Lesson reports of a whole run, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BatchReport {
    pub lessons: Vec<LessonReport>,
}

impl BatchReport {
    /// Number of lessons that hit a lesson-level fault.
    pub fn failed_lessons(&self) -> usize {
        self.lessons.iter().filter(|lesson| lesson.is_failed()).count()
    }

    /// Number of assets successfully stored.
    pub fn stored_assets(&self) -> usize {
        self.asset_results().filter(|result| result.is_success()).count()
    }

    /// Number of assets that failed.
    pub fn failed_assets(&self) -> usize {
        self.asset_results().filter(|result| !result.is_success()).count()
    }

    fn asset_results(&self) -> impl Iterator<Item = &AssetResult> {
        self.lessons.iter().flat_map(LessonReport::results)
    }
}

/// Top-level wrapper returned to the invoker of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub status_code: u16,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Body {
    Success { message: String, results: BatchReport },
    Failure { message: String, error: String },
}

impl Envelope {
    pub fn success(report: BatchReport) -> Self {
        Self {
            status_code: 200,
            body: Body::Success {
                message: SUCCESS_MESSAGE.to_owned(),
                results: report,
            },
        }
    }

    pub fn failure(error: &crate::Error) -> Self {
        Self {
            status_code: 500,
            body: Body::Failure {
                message: FAILURE_MESSAGE.to_owned(),
                error: error.to_string(),
            },
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self.body, Body::Success { .. })
    }

    /// Batch report of a successful run.
    pub fn report(&self) -> Option<&BatchReport> {
        match &self.body {
            Body::Success { results, .. } => Some(results),
            Body::Failure { .. } => None,
        }
    }
}

//! Outcome model: per-file results and the batch they roll up into.
//!
//! This module does not know about dispatch lanes or sessions. It only
//! defines the shape of results that the aggregator reduces and the UI reads.

use serde::{Deserialize, Serialize};

use super::errors::UploadError;
use super::file::{StagedFile, StagedFileSummary};
use super::ids::BatchId;

/// What the storage client hands back for a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub url: String,
}

impl StoredObject {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Terminal result of one file's upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadResult {
    Success { url: String },
    Failure { reason: UploadError },
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadResult::Success { .. })
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            UploadResult::Success { url } => Some(url),
            UploadResult::Failure { .. } => None,
        }
    }
}

impl From<Result<StoredObject, UploadError>> for UploadResult {
    fn from(result: Result<StoredObject, UploadError>) -> Self {
        match result {
            Ok(stored) => UploadResult::Success { url: stored.url },
            Err(reason) => UploadResult::Failure { reason },
        }
    }
}

/// One file paired with its terminal result.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub file: StagedFile,
    pub result: UploadResult,
}

impl UploadOutcome {
    pub fn new(file: StagedFile, result: UploadResult) -> Self {
        Self { file, result }
    }

    pub fn success(file: StagedFile, url: impl Into<String>) -> Self {
        Self::new(file, UploadResult::Success { url: url.into() })
    }

    pub fn failure(file: StagedFile, reason: UploadError) -> Self {
        Self::new(file, UploadResult::Failure { reason })
    }
}

/// Result of one dispatch run.
///
/// `outcomes` follows input file order; `succeeded_urls` is derived at
/// construction and keeps the same relative order.
#[derive(Debug, Clone)]
pub struct BatchResult {
    batch_id: BatchId,
    outcomes: Vec<UploadOutcome>,
    succeeded_urls: Vec<String>,
}

impl BatchResult {
    pub fn new(batch_id: BatchId, outcomes: Vec<UploadOutcome>) -> Self {
        let succeeded_urls = outcomes
            .iter()
            .filter_map(|o| o.result.url().map(str::to_string))
            .collect();
        Self {
            batch_id,
            outcomes,
            succeeded_urls,
        }
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn outcomes(&self) -> &[UploadOutcome] {
        &self.outcomes
    }

    pub fn succeeded_urls(&self) -> &[String] {
        &self.succeeded_urls
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded_urls.len()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.succeeded_urls.len()
    }

    pub fn all_succeeded(&self) -> bool {
        !self.outcomes.is_empty() && self.failed_count() == 0
    }

    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.succeeded_urls.is_empty()
    }

    pub fn report(&self) -> BatchReport {
        BatchReport {
            batch_id: self.batch_id,
            outcomes: self
                .outcomes
                .iter()
                .map(|o| OutcomeReport {
                    file: o.file.summary(),
                    result: o.result.clone(),
                })
                .collect(),
            succeeded_urls: self.succeeded_urls.clone(),
        }
    }
}

/// Serializable view of a `BatchResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: BatchId,
    pub outcomes: Vec<OutcomeReport>,
    pub succeeded_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub file: StagedFileSummary,
    pub result: UploadResult,
}

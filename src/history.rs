//! Translation history, approved translations and reviewer feedback.
//! Feedback marks a history row APPROVED or CORRECTED and promotes the
//! accepted text into `approved_translations`, which the pipeline reads
//! before anything else.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{FeedbackError, StoreError};
use crate::store::Store;
use crate::translate::cache::ApprovedCache;

/// Review status of one translation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Corrected,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::Approved => "APPROVED",
            ReviewStatus::Corrected => "CORRECTED",
            ReviewStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ReviewStatus::Pending),
            "APPROVED" => Ok(ReviewStatus::Approved),
            "CORRECTED" => Ok(ReviewStatus::Corrected),
            "REJECTED" => Ok(ReviewStatus::Rejected),
            other => Err(format!("unknown review status: {other}")),
        }
    }
}

/// A persisted translation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationHistory {
    pub id: i64,
    pub source_text: String,
    pub source_hash: String,
    pub source_lang: String,
    pub target_lang: String,
    pub translated_text: String,
    pub strategy: String,
    pub page_url: Option<String>,
    pub status: ReviewStatus,
    pub rating: Option<u8>,
    pub corrected_text: Option<String>,
    pub is_from_cache: bool,
    pub match_count: usize,
    pub verification_passed: Option<bool>,
    pub verification_issues: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Insert payload for a new history row.
#[derive(Debug, Clone, Default)]
pub struct HistoryRecord {
    pub source_text: String,
    pub source_hash: String,
    pub source_lang: String,
    pub target_lang: String,
    pub translated_text: String,
    pub strategy: String,
    pub page_url: Option<String>,
    pub is_from_cache: bool,
    pub match_count: usize,
    pub verification_passed: Option<bool>,
    pub verification_issues: Vec<String>,
}

/// Reusable human-approved translation, unique per (source_hash, target_lang).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovedTranslation {
    pub id: i64,
    pub source_hash: String,
    pub target_lang: String,
    pub source_text: String,
    pub approved_text: String,
    pub usage_count: i64,
    pub approval_count: i64,
    pub quality_score: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub corrected: usize,
    pub rejected: usize,
    pub cache_hits: usize,
    pub average_rating: Option<f64>,
}

/// Reviewer feedback on one history row.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub history_id: i64,
    pub status: ReviewStatus,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub corrected_text: Option<String>,
}

/// sha256 hex of the source text, the approved-cache key.
pub fn source_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

const DEFAULT_QUALITY: f64 = 0.8;

fn quality_score(status: ReviewStatus, rating: Option<u8>) -> f64 {
    match (status, rating) {
        (ReviewStatus::Corrected, _) => 1.0,
        (_, Some(r)) => f64::from(r) / 5.0,
        _ => DEFAULT_QUALITY,
    }
}

pub struct FeedbackService {
    store: Arc<Store>,
    cache: Arc<ApprovedCache>,
}

impl FeedbackService {
    pub fn new(store: Arc<Store>, cache: Arc<ApprovedCache>) -> Self {
        Self { store, cache }
    }

    /// Apply reviewer feedback. APPROVED and CORRECTED promote the accepted
    /// text into the approved cache; REJECTED only updates history.
    pub fn submit(
        &self,
        request: &FeedbackRequest,
    ) -> Result<Option<ApprovedTranslation>, FeedbackError> {
        if let Some(rating) = request.rating {
            if !(1..=5).contains(&rating) {
                return Err(FeedbackError::InvalidRating(rating));
            }
        }
        let corrected = request
            .corrected_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        match request.status {
            ReviewStatus::Pending => return Err(FeedbackError::PendingStatus),
            ReviewStatus::Corrected if corrected.is_none() => {
                return Err(FeedbackError::MissingCorrection)
            }
            _ => {}
        }

        let history = self
            .store
            .history(request.history_id)?
            .ok_or(FeedbackError::HistoryNotFound(request.history_id))?;

        self.store
            .update_history_review(history.id, request.status, request.rating, corrected)
            .map_err(|e| match e {
                StoreError::NotFound { id, .. } => FeedbackError::HistoryNotFound(id),
                other => FeedbackError::Store(other),
            })?;

        let accepted = match request.status {
            ReviewStatus::Approved => history.translated_text.as_str(),
            ReviewStatus::Corrected => corrected.unwrap_or_default(),
            _ => {
                info!(history_id = history.id, status = %request.status, "feedback recorded");
                return Ok(None);
            }
        };

        let approved = self.store.upsert_approved(
            &history.source_hash,
            &history.target_lang,
            &history.source_text,
            accepted,
            quality_score(request.status, request.rating),
        )?;
        self.cache.insert(approved.clone());
        info!(
            history_id = history.id,
            status = %request.status,
            approved_id = approved.id,
            approval_count = approved.approval_count,
            "feedback promoted to approved translation"
        );
        Ok(Some(approved))
    }

    pub fn history(&self, id: i64) -> Result<TranslationHistory, FeedbackError> {
        self.store
            .history(id)?
            .ok_or(FeedbackError::HistoryNotFound(id))
    }

    pub fn recent(&self, offset: usize, limit: usize) -> Vec<TranslationHistory> {
        self.store.recent_history(offset, limit).unwrap_or_else(|e| {
            warn!(error = %e, "history query failed");
            Vec::new()
        })
    }

    pub fn stats(&self) -> Result<HistoryStats, FeedbackError> {
        Ok(self.store.history_stats()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn setup() -> (Arc<Store>, FeedbackService, i64) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let cache = Arc::new(ApprovedCache::new(16, Duration::from_secs(60)));
        let id = store
            .insert_history(&HistoryRecord {
                source_text: "공식 굿즈".into(),
                source_hash: source_hash("공식 굿즈"),
                source_lang: "ko".into(),
                target_lang: "en".into(),
                translated_text: "Official goods".into(),
                strategy: "LLM_PRIMARY".into(),
                ..Default::default()
            })
            .unwrap();
        (store.clone(), FeedbackService::new(store, cache), id)
    }

    fn feedback(id: i64, status: ReviewStatus) -> FeedbackRequest {
        FeedbackRequest {
            history_id: id,
            status,
            rating: None,
            corrected_text: None,
        }
    }

    #[test]
    fn test_source_hash_is_sha256_hex() {
        assert_eq!(
            source_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_approve_promotes_translated_text() {
        let (store, service, id) = setup();
        let approved = service
            .submit(&feedback(id, ReviewStatus::Approved))
            .unwrap()
            .unwrap();
        assert_eq!(approved.approved_text, "Official goods");
        assert_eq!(approved.quality_score, DEFAULT_QUALITY);
        assert_eq!(
            store.history(id).unwrap().unwrap().status,
            ReviewStatus::Approved
        );
    }

    #[test]
    fn test_correction_requires_text() {
        let (_, service, id) = setup();
        let err = service
            .submit(&feedback(id, ReviewStatus::Corrected))
            .unwrap_err();
        assert!(matches!(err, FeedbackError::MissingCorrection));

        let mut req = feedback(id, ReviewStatus::Corrected);
        req.corrected_text = Some("Official merch".into());
        let approved = service.submit(&req).unwrap().unwrap();
        assert_eq!(approved.approved_text, "Official merch");
        assert_eq!(approved.quality_score, 1.0);
    }

    #[test]
    fn test_reject_does_not_promote() {
        let (store, service, id) = setup();
        assert!(service
            .submit(&feedback(id, ReviewStatus::Rejected))
            .unwrap()
            .is_none());
        assert_eq!(store.count_approved().unwrap(), 0);
    }

    #[test]
    fn test_repeated_feedback_keeps_one_row() {
        let (store, service, id) = setup();
        service.submit(&feedback(id, ReviewStatus::Approved)).unwrap();
        let mut req = feedback(id, ReviewStatus::Corrected);
        req.corrected_text = Some("Official merch".into());
        let approved = service.submit(&req).unwrap().unwrap();
        assert_eq!(approved.approval_count, 2);
        assert_eq!(store.count_approved().unwrap(), 1);
    }

    #[test]
    fn test_invalid_inputs() {
        let (_, service, id) = setup();
        let mut req = feedback(id, ReviewStatus::Approved);
        req.rating = Some(6);
        assert!(matches!(
            service.submit(&req).unwrap_err(),
            FeedbackError::InvalidRating(6)
        ));
        assert!(matches!(
            service.submit(&feedback(404, ReviewStatus::Approved)).unwrap_err(),
            FeedbackError::HistoryNotFound(404)
        ));
        assert!(matches!(
            service.submit(&feedback(id, ReviewStatus::Pending)).unwrap_err(),
            FeedbackError::PendingStatus
        ));
    }

    #[test]
    fn test_rating_sets_quality() {
        let (_, service, id) = setup();
        let mut req = feedback(id, ReviewStatus::Approved);
        req.rating = Some(4);
        let approved = service.submit(&req).unwrap().unwrap();
        assert!((approved.quality_score - 0.8).abs() < f64::EPSILON);
    }
}

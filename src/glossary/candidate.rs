//! Glossary candidates proposed from live traffic, and their review.
//! A candidate only reaches the glossary through an explicit APPROVE.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CandidateError;
use crate::glossary::tokenizer::split_words;
use crate::language::{contains_hangul, SourceLang, TargetLang};
use crate::store::Store;

pub const INITIAL_CONFIDENCE: f64 = 0.3;
pub const PAGE_URL_BONUS: f64 = 0.1;
pub const REPEAT_STEP: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 1.0;

const MAX_WORDS: usize = 3;
const MAX_CHARS: usize = 20;
const SNIPPET_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CandidateStatus {
    Pending,
    Approved,
    Rejected,
    Merged,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Pending => "PENDING",
            CandidateStatus::Approved => "APPROVED",
            CandidateStatus::Rejected => "REJECTED",
            CandidateStatus::Merged => "MERGED",
        }
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(CandidateStatus::Pending),
            "APPROVED" => Ok(CandidateStatus::Approved),
            "REJECTED" => Ok(CandidateStatus::Rejected),
            "MERGED" => Ok(CandidateStatus::Merged),
            other => Err(format!("unknown candidate status: {other}")),
        }
    }
}

/// Reviewer decision on a pending candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CandidateAction {
    Approve,
    Reject,
}

impl FromStr for CandidateAction {
    type Err = CandidateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVE" => Ok(CandidateAction::Approve),
            "REJECT" => Ok(CandidateAction::Reject),
            _ => Err(CandidateError::InvalidAction(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateGlossaryEntry {
    pub id: i64,
    pub source_ko: String,
    pub target_lang: String,
    pub proposed_translation: String,
    pub confidence: f64,
    pub context_snippet: String,
    pub page_url: Option<String>,
    pub occurrence_count: i64,
    pub status: CandidateStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One observed (source phrase, translation) pair.
#[derive(Debug, Clone)]
pub struct CandidateObservation {
    pub source_ko: String,
    pub target_lang: TargetLang,
    pub proposed_translation: String,
    pub context_snippet: String,
    pub page_url: Option<String>,
}

impl CandidateObservation {
    pub fn initial_confidence(&self) -> f64 {
        let bonus = if self.page_url.as_deref().is_some_and(|u| !u.trim().is_empty()) {
            PAGE_URL_BONUS
        } else {
            0.0
        };
        (INITIAL_CONFIDENCE + bonus).min(MAX_CONFIDENCE)
    }
}

/// Outcome of one review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub candidate: CandidateGlossaryEntry,
    /// Glossary entry created or filled by an approval.
    pub glossary_entry_id: Option<i64>,
}

/// Short, Hangul-bearing phrases are worth proposing as terms.
pub fn is_term_like(source: &str) -> bool {
    let trimmed = source.trim();
    let chars = trimmed.chars().count();
    chars >= 2
        && chars <= MAX_CHARS
        && split_words(trimmed).len() <= MAX_WORDS
        && contains_hangul(trimmed)
}

fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_CHARS).collect()
}

pub struct CandidateService {
    store: Arc<Store>,
}

impl CandidateService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Build an observation when `source` looks like a new glossary term.
    pub fn observation_for(
        &self,
        source: &str,
        translated: &str,
        target: TargetLang,
        page_url: Option<&str>,
    ) -> Option<CandidateObservation> {
        let source = source.trim();
        let translated = translated.trim();
        if target == TargetLang::Ko || translated.is_empty() || !is_term_like(source) {
            return None;
        }
        match self.store.find_glossary_exact(SourceLang::Ko, source) {
            Ok(existing) if !existing.is_empty() => return None,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "candidate glossary check failed");
                return None;
            }
        }
        Some(CandidateObservation {
            source_ko: source.to_string(),
            target_lang: target,
            proposed_translation: translated.to_string(),
            context_snippet: snippet(source),
            page_url: page_url.map(str::to_string),
        })
    }

    /// Record one observation. Repeats raise confidence, never lower it.
    pub fn record(
        &self,
        observation: &CandidateObservation,
    ) -> Result<CandidateGlossaryEntry, CandidateError> {
        let candidate = self.store.upsert_candidate_observation(
            observation,
            observation.initial_confidence(),
            REPEAT_STEP,
        )?;
        debug!(
            id = candidate.id,
            source = %candidate.source_ko,
            confidence = candidate.confidence,
            occurrences = candidate.occurrence_count,
            "candidate observed"
        );
        Ok(candidate)
    }

    /// Extract and record a candidate from a finished translation.
    pub fn extract(
        &self,
        source: &str,
        translated: &str,
        target: TargetLang,
        page_url: Option<&str>,
    ) -> Result<Option<CandidateGlossaryEntry>, CandidateError> {
        match self.observation_for(source, translated, target, page_url) {
            Some(observation) => self.record(&observation).map(Some),
            None => Ok(None),
        }
    }

    pub fn get(&self, id: i64) -> Result<CandidateGlossaryEntry, CandidateError> {
        self.store
            .candidate(id)?
            .ok_or(CandidateError::NotFound(id))
    }

    pub fn list(
        &self,
        status: Option<CandidateStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CandidateGlossaryEntry>, CandidateError> {
        Ok(self.store.list_candidates(status, offset, limit)?)
    }

    pub fn review(
        &self,
        id: i64,
        action: CandidateAction,
    ) -> Result<ReviewOutcome, CandidateError> {
        let outcome = self.store.review_candidate(id, action)?;
        info!(
            id,
            action = ?action,
            status = %outcome.candidate.status,
            glossary_entry_id = ?outcome.glossary_entry_id,
            "candidate reviewed"
        );
        Ok(outcome)
    }

    /// Review with a textual action; an unknown action fails before any write.
    pub fn review_str(&self, id: i64, action: &str) -> Result<ReviewOutcome, CandidateError> {
        let action = action.parse::<CandidateAction>()?;
        self.review(id, action)
    }

    /// Review many ids with one action. Per-id failures are collected.
    pub fn review_batch(
        &self,
        ids: &[i64],
        action: &str,
    ) -> Result<Vec<(i64, Result<ReviewOutcome, CandidateError>)>, CandidateError> {
        let action = action.parse::<CandidateAction>()?;
        Ok(ids.iter().map(|&id| (id, self.review(id, action))).collect())
    }
}

//! Glossary candidates and the atomic review flow.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::glossary::{find_exact, insert_entry, update_entry};
use super::{now_unix, Store};
use crate::error::{CandidateError, StoreError};
use crate::glossary::candidate::{
    CandidateAction, CandidateGlossaryEntry, CandidateObservation, CandidateStatus,
    ReviewOutcome, MAX_CONFIDENCE,
};
use crate::glossary::GlossaryEntry;
use crate::language::{SourceLang, TargetLang};

const CANDIDATE_COLUMNS: &str = "id, source_ko, target_lang, proposed_translation, confidence,
     context_snippet, page_url, occurrence_count, status, created_at, updated_at";

fn row_to_candidate(row: &Row<'_>) -> rusqlite::Result<CandidateGlossaryEntry> {
    let status: String = row.get(8)?;
    Ok(CandidateGlossaryEntry {
        id: row.get(0)?,
        source_ko: row.get(1)?,
        target_lang: row.get(2)?,
        proposed_translation: row.get(3)?,
        confidence: row.get(4)?,
        context_snippet: row.get(5)?,
        page_url: row.get(6)?,
        occurrence_count: row.get(7)?,
        status: status.parse().unwrap_or(CandidateStatus::Pending),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn load_candidate(
    conn: &Connection,
    id: i64,
) -> Result<Option<CandidateGlossaryEntry>, StoreError> {
    let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM glossary_candidates WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id], row_to_candidate)
        .optional()?)
}

fn set_status(conn: &Connection, id: i64, status: CandidateStatus) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE glossary_candidates SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status.as_str(), now_unix()],
    )?;
    Ok(())
}

/// Promote an approved candidate: fill the matching entry's blank column
/// (MERGED) or create a fresh entry (APPROVED).
fn promote(
    conn: &Connection,
    candidate: &CandidateGlossaryEntry,
) -> Result<(CandidateStatus, i64), CandidateError> {
    let target: TargetLang = candidate
        .target_lang
        .parse()
        .map_err(|_| CandidateError::InvalidState {
            id: candidate.id,
            status: format!("unsupported target {}", candidate.target_lang),
        })?;

    let existing = find_exact(conn, SourceLang::Ko, &candidate.source_ko)?;
    if let Some(mut entry) = existing.into_iter().next() {
        if entry.base_translation(target).trim().is_empty() {
            entry.set_base_translation(target, candidate.proposed_translation.clone());
            update_entry(conn, &entry)?;
        }
        return Ok((CandidateStatus::Merged, entry.id));
    }

    let mut entry = GlossaryEntry {
        ko: candidate.source_ko.clone(),
        key_name: format!("candidate_{}", candidate.id),
        page_url: candidate.page_url.clone().unwrap_or_default(),
        ..Default::default()
    };
    entry.set_base_translation(target, candidate.proposed_translation.clone());
    let id = insert_entry(conn, &entry)?;
    Ok((CandidateStatus::Approved, id))
}

impl Store {
    /// Insert a new candidate or bump an existing one's confidence (capped)
    /// and occurrence count. The first proposed translation is kept.
    pub fn upsert_candidate_observation(
        &self,
        observation: &CandidateObservation,
        initial_confidence: f64,
        step: f64,
    ) -> Result<CandidateGlossaryEntry, StoreError> {
        let now = now_unix();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO glossary_candidates
             (source_ko, target_lang, proposed_translation, confidence, context_snippet,
              page_url, occurrence_count, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, 'PENDING', ?7, ?7)
             ON CONFLICT(source_ko, target_lang) DO UPDATE SET
                confidence = MIN(?8, confidence + ?9),
                occurrence_count = occurrence_count + 1,
                updated_at = excluded.updated_at",
            params![
                observation.source_ko,
                observation.target_lang.code(),
                observation.proposed_translation,
                initial_confidence.min(MAX_CONFIDENCE),
                observation.context_snippet,
                observation.page_url,
                now,
                MAX_CONFIDENCE,
                step,
            ],
        )?;
        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} FROM glossary_candidates
             WHERE source_ko = ?1 AND target_lang = ?2"
        );
        Ok(conn.query_row(
            &sql,
            params![observation.source_ko, observation.target_lang.code()],
            row_to_candidate,
        )?)
    }

    pub fn candidate(&self, id: i64) -> Result<Option<CandidateGlossaryEntry>, StoreError> {
        load_candidate(&self.conn(), id)
    }

    /// Candidates ordered by confidence then occurrences, optionally by status.
    pub fn list_candidates(
        &self,
        status: Option<CandidateStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CandidateGlossaryEntry>, StoreError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} FROM glossary_candidates
             WHERE ?1 IS NULL OR status = ?1
             ORDER BY confidence DESC, occurrence_count DESC, id ASC
             LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![status.map(|s| s.as_str()), limit as i64, offset as i64],
            row_to_candidate,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Apply a review in one transaction: candidate status change plus any
    /// glossary insert/merge and its token rows.
    pub fn review_candidate(
        &self,
        id: i64,
        action: CandidateAction,
    ) -> Result<ReviewOutcome, CandidateError> {
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(StoreError::from)?;

        let candidate = load_candidate(&tx, id)?.ok_or(CandidateError::NotFound(id))?;
        if candidate.status != CandidateStatus::Pending {
            return Err(CandidateError::InvalidState {
                id,
                status: candidate.status.to_string(),
            });
        }

        let (status, glossary_entry_id) = match action {
            CandidateAction::Reject => (CandidateStatus::Rejected, None),
            CandidateAction::Approve => {
                let (status, entry_id) = promote(&tx, &candidate)?;
                (status, Some(entry_id))
            }
        };
        set_status(&tx, id, status)?;
        let candidate = load_candidate(&tx, id)?.ok_or(CandidateError::NotFound(id))?;
        tx.commit().map_err(StoreError::from)?;

        Ok(ReviewOutcome {
            candidate,
            glossary_entry_id,
        })
    }
}

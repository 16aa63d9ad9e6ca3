//! Translation history and approved (human-reviewed) translations.

use rusqlite::{params, OptionalExtension, Row};

use super::{now_unix, Store};
use crate::error::StoreError;
use crate::history::{
    ApprovedTranslation, HistoryRecord, HistoryStats, ReviewStatus, TranslationHistory,
};

const HISTORY_COLUMNS: &str = "id, source_text, source_hash, source_lang, target_lang,
     translated_text, strategy, page_url, status, rating, corrected_text, is_from_cache,
     match_count, verification_passed, verification_issues, created_at, updated_at";

const APPROVED_COLUMNS: &str = "id, source_hash, target_lang, source_text, approved_text,
     usage_count, approval_count, quality_score, created_at, updated_at";

fn row_to_history(row: &Row<'_>) -> rusqlite::Result<TranslationHistory> {
    let status: String = row.get(8)?;
    let issues: Option<String> = row.get(14)?;
    Ok(TranslationHistory {
        id: row.get(0)?,
        source_text: row.get(1)?,
        source_hash: row.get(2)?,
        source_lang: row.get(3)?,
        target_lang: row.get(4)?,
        translated_text: row.get(5)?,
        strategy: row.get(6)?,
        page_url: row.get(7)?,
        status: status.parse().unwrap_or(ReviewStatus::Pending),
        rating: row.get::<_, Option<i64>>(9)?.map(|r| r as u8),
        corrected_text: row.get(10)?,
        is_from_cache: row.get::<_, i64>(11)? != 0,
        match_count: row.get::<_, i64>(12)? as usize,
        verification_passed: row.get::<_, Option<i64>>(13)?.map(|v| v != 0),
        verification_issues: issues
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn row_to_approved(row: &Row<'_>) -> rusqlite::Result<ApprovedTranslation> {
    Ok(ApprovedTranslation {
        id: row.get(0)?,
        source_hash: row.get(1)?,
        target_lang: row.get(2)?,
        source_text: row.get(3)?,
        approved_text: row.get(4)?,
        usage_count: row.get(5)?,
        approval_count: row.get(6)?,
        quality_score: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl Store {
    /// Persist one translation attempt. Returns the history id.
    pub fn insert_history(&self, record: &HistoryRecord) -> Result<i64, StoreError> {
        let issues = if record.verification_issues.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&record.verification_issues)?)
        };
        let now = now_unix();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO translation_history
             (source_text, source_hash, source_lang, target_lang, translated_text, strategy,
              page_url, status, is_from_cache, match_count, verification_passed,
              verification_issues, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'PENDING', ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                record.source_text,
                record.source_hash,
                record.source_lang,
                record.target_lang,
                record.translated_text,
                record.strategy,
                record.page_url,
                record.is_from_cache as i64,
                record.match_count as i64,
                record.verification_passed.map(|v| v as i64),
                issues,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn history(&self, id: i64) -> Result<Option<TranslationHistory>, StoreError> {
        let sql = format!("SELECT {HISTORY_COLUMNS} FROM translation_history WHERE id = ?1");
        Ok(self
            .conn()
            .query_row(&sql, params![id], row_to_history)
            .optional()?)
    }

    pub fn recent_history(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TranslationHistory>, StoreError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM translation_history
             ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], row_to_history)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Record reviewer feedback on a history row.
    pub fn update_history_review(
        &self,
        id: i64,
        status: ReviewStatus,
        rating: Option<u8>,
        corrected_text: Option<&str>,
    ) -> Result<(), StoreError> {
        let changed = self.conn().execute(
            "UPDATE translation_history
             SET status = ?2, rating = COALESCE(?3, rating),
                 corrected_text = COALESCE(?4, corrected_text), updated_at = ?5
             WHERE id = ?1",
            params![
                id,
                status.as_str(),
                rating.map(i64::from),
                corrected_text,
                now_unix()
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "translation history",
                id,
            });
        }
        Ok(())
    }

    pub fn history_stats(&self) -> Result<HistoryStats, StoreError> {
        let conn = self.conn();
        let (total, cache_hits, average_rating): (i64, i64, Option<f64>) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_from_cache), 0), AVG(rating)
             FROM translation_history",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let mut stats = HistoryStats {
            total: total as usize,
            cache_hits: cache_hits as usize,
            average_rating,
            ..Default::default()
        };
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM translation_history GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (status, count) = row?;
            match status.parse::<ReviewStatus>() {
                Ok(ReviewStatus::Pending) => stats.pending = count as usize,
                Ok(ReviewStatus::Approved) => stats.approved = count as usize,
                Ok(ReviewStatus::Corrected) => stats.corrected = count as usize,
                Ok(ReviewStatus::Rejected) => stats.rejected = count as usize,
                Err(_) => {}
            }
        }
        Ok(stats)
    }

    pub fn find_approved(
        &self,
        source_hash: &str,
        target_lang: &str,
    ) -> Result<Option<ApprovedTranslation>, StoreError> {
        let sql = format!(
            "SELECT {APPROVED_COLUMNS} FROM approved_translations
             WHERE source_hash = ?1 AND target_lang = ?2"
        );
        Ok(self
            .conn()
            .query_row(&sql, params![source_hash, target_lang], row_to_approved)
            .optional()?)
    }

    /// Non-atomic popularity counter; lost updates under races are acceptable.
    pub fn increment_approved_usage(&self, id: i64) -> Result<(), StoreError> {
        self.conn().execute(
            "UPDATE approved_translations SET usage_count = usage_count + 1, updated_at = ?2
             WHERE id = ?1",
            params![id, now_unix()],
        )?;
        Ok(())
    }

    /// Insert or refresh the approved translation for (hash, lang).
    pub fn upsert_approved(
        &self,
        source_hash: &str,
        target_lang: &str,
        source_text: &str,
        approved_text: &str,
        quality_score: f64,
    ) -> Result<ApprovedTranslation, StoreError> {
        let now = now_unix();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO approved_translations
             (source_hash, target_lang, source_text, approved_text, usage_count,
              approval_count, quality_score, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, 1, ?5, ?6, ?6)
             ON CONFLICT(source_hash, target_lang) DO UPDATE SET
                approved_text = excluded.approved_text,
                source_text = excluded.source_text,
                approval_count = approval_count + 1,
                quality_score = excluded.quality_score,
                updated_at = excluded.updated_at",
            params![source_hash, target_lang, source_text, approved_text, quality_score, now],
        )?;
        let sql = format!(
            "SELECT {APPROVED_COLUMNS} FROM approved_translations
             WHERE source_hash = ?1 AND target_lang = ?2"
        );
        Ok(conn.query_row(&sql, params![source_hash, target_lang], row_to_approved)?)
    }

    /// Most-used approved translations for a target language.
    pub fn top_approved(
        &self,
        target_lang: &str,
        limit: usize,
    ) -> Result<Vec<ApprovedTranslation>, StoreError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {APPROVED_COLUMNS} FROM approved_translations
             WHERE target_lang = ?1
             ORDER BY usage_count DESC, approval_count DESC, id ASC LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![target_lang, limit as i64], row_to_approved)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_approved(&self) -> Result<usize, StoreError> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM approved_translations",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

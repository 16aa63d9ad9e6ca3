//! Glossary rows and the per-language token index.

use std::collections::HashSet;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::{now_unix, Store};
use crate::error::StoreError;
use crate::glossary::tokenizer::{tokenize_for_index, tokenize_multi_lang};
use crate::glossary::GlossaryEntry;
use crate::language::SourceLang;

const ENTRY_COLUMNS: &str = "id, page_url, key_name, ko, en, ja, zh_hans, zh_hant, es, de, fr,
     en_north_america, ja_japan, zh_hans_china, zh_hant_taiwan, es_latin_america";

/// SQLite caps bound parameters per statement; token lookups are chunked.
const TOKEN_CHUNK: usize = 400;

/// One token-index row that matched a query token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenHit {
    pub entry_id: i64,
    pub token: String,
    pub token_length: usize,
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<GlossaryEntry> {
    Ok(GlossaryEntry {
        id: row.get(0)?,
        page_url: row.get(1)?,
        key_name: row.get(2)?,
        ko: row.get(3)?,
        en: row.get(4)?,
        ja: row.get(5)?,
        zh_hans: row.get(6)?,
        zh_hant: row.get(7)?,
        es: row.get(8)?,
        de: row.get(9)?,
        fr: row.get(10)?,
        en_north_america: row.get(11)?,
        ja_japan: row.get(12)?,
        zh_hans_china: row.get(13)?,
        zh_hant_taiwan: row.get(14)?,
        es_latin_america: row.get(15)?,
    })
}

/// Searchable columns for a source language. Fixed identifiers only.
fn columns_for(lang: SourceLang) -> &'static [&'static str] {
    match lang {
        SourceLang::Ko => &["ko"],
        SourceLang::En => &["en", "en_north_america"],
        SourceLang::Ja => &["ja", "ja_japan"],
        SourceLang::Zh => &["zh_hans", "zh_hant", "zh_hans_china", "zh_hant_taiwan"],
    }
}

fn query_entries(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<GlossaryEntry>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, row_to_entry)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub(crate) fn insert_entry(conn: &Connection, entry: &GlossaryEntry) -> Result<i64, StoreError> {
    let now = now_unix();
    conn.execute(
        "INSERT INTO glossary_entries
         (page_url, key_name, ko, en, ja, zh_hans, zh_hant, es, de, fr,
          en_north_america, ja_japan, zh_hans_china, zh_hant_taiwan, es_latin_america,
          created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)",
        params![
            entry.page_url,
            entry.key_name,
            entry.ko.trim(),
            entry.en,
            entry.ja,
            entry.zh_hans,
            entry.zh_hant,
            entry.es,
            entry.de,
            entry.fr,
            entry.en_north_america,
            entry.ja_japan,
            entry.zh_hans_china,
            entry.zh_hant_taiwan,
            entry.es_latin_america,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    let mut stored = entry.clone();
    stored.id = id;
    index_entry(conn, &stored)?;
    Ok(id)
}

pub(crate) fn update_entry(conn: &Connection, entry: &GlossaryEntry) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE glossary_entries SET
            page_url = ?2, key_name = ?3, ko = ?4, en = ?5, ja = ?6, zh_hans = ?7,
            zh_hant = ?8, es = ?9, de = ?10, fr = ?11, en_north_america = ?12,
            ja_japan = ?13, zh_hans_china = ?14, zh_hant_taiwan = ?15,
            es_latin_america = ?16, updated_at = ?17
         WHERE id = ?1",
        params![
            entry.id,
            entry.page_url,
            entry.key_name,
            entry.ko.trim(),
            entry.en,
            entry.ja,
            entry.zh_hans,
            entry.zh_hant,
            entry.es,
            entry.de,
            entry.fr,
            entry.en_north_america,
            entry.ja_japan,
            entry.zh_hans_china,
            entry.zh_hant_taiwan,
            entry.es_latin_america,
            now_unix(),
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound {
            kind: "glossary entry",
            id: entry.id,
        });
    }
    index_entry(conn, entry)
}

pub(crate) fn find_exact(
    conn: &Connection,
    lang: SourceLang,
    text: &str,
) -> Result<Vec<GlossaryEntry>, StoreError> {
    let clause = columns_for(lang)
        .iter()
        .map(|c| format!("{c} = ?1"))
        .collect::<Vec<_>>()
        .join(" OR ");
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM glossary_entries WHERE {clause} ORDER BY id");
    query_entries(conn, &sql, params![text])
}

/// Replace every token row of `entry` (Korean plus tagged target columns).
fn index_entry(conn: &Connection, entry: &GlossaryEntry) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM glossary_tokens WHERE entry_id = ?1",
        params![entry.id],
    )?;
    let mut stmt = conn.prepare_cached(
        "INSERT INTO glossary_tokens (token, entry_id, token_length, lang)
         VALUES (?1, ?2, ?3, ?4)",
    )?;

    let mut insert = |tokens: HashSet<String>, lang: SourceLang| -> Result<(), StoreError> {
        for token in tokens {
            let len = token.chars().count() as i64;
            stmt.execute(params![token, entry.id, len, lang.code()])?;
        }
        Ok(())
    };

    insert(tokenize_for_index(&entry.ko), SourceLang::Ko)?;
    for lang in [SourceLang::En, SourceLang::Ja, SourceLang::Zh] {
        let mut tokens = HashSet::new();
        for field in entry.source_fields(lang) {
            tokens.extend(tokenize_multi_lang(field, lang));
        }
        insert(tokens, lang)?;
    }
    Ok(())
}

impl Store {
    /// Insert a glossary entry and index its tokens. Returns the new id.
    pub fn create_glossary_entry(&self, entry: &GlossaryEntry) -> Result<i64, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let id = insert_entry(&tx, entry)?;
        tx.commit()?;
        debug!(id, ko = %entry.ko, "glossary entry created");
        Ok(id)
    }

    /// Update a glossary entry in place and rebuild its tokens.
    pub fn update_glossary_entry(&self, entry: &GlossaryEntry) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        update_entry(&tx, entry)?;
        tx.commit()?;
        Ok(())
    }

    pub fn glossary_entry(&self, id: i64) -> Result<Option<GlossaryEntry>, StoreError> {
        let conn = self.conn();
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM glossary_entries WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], row_to_entry).optional()?)
    }

    pub fn glossary_entries_by_ids(&self, ids: &[i64]) -> Result<Vec<GlossaryEntry>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        let mut out = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(TOKEN_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM glossary_entries WHERE id IN ({placeholders})"
            );
            out.extend(query_entries(&conn, &sql, params_from_iter(chunk.iter()))?);
        }
        Ok(out)
    }

    /// Entries whose `lang` field equals `text` verbatim.
    pub fn find_glossary_exact(
        &self,
        lang: SourceLang,
        text: &str,
    ) -> Result<Vec<GlossaryEntry>, StoreError> {
        find_exact(&self.conn(), lang, text)
    }

    /// Entries whose `lang` field equals `text` ignoring ASCII case.
    pub fn find_glossary_nocase(
        &self,
        lang: SourceLang,
        text: &str,
    ) -> Result<Vec<GlossaryEntry>, StoreError> {
        let clause = columns_for(lang)
            .iter()
            .map(|c| format!("{c} = ?1 COLLATE NOCASE"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql =
            format!("SELECT {ENTRY_COLUMNS} FROM glossary_entries WHERE {clause} ORDER BY id");
        query_entries(&self.conn(), &sql, params![text])
    }

    /// Entries whose `lang` field contains `word` (case-insensitive for ASCII).
    pub fn find_glossary_containing(
        &self,
        lang: SourceLang,
        word: &str,
        limit: usize,
    ) -> Result<Vec<GlossaryEntry>, StoreError> {
        let clause = columns_for(lang)
            .iter()
            .map(|c| format!("instr(lower({c}), lower(?1)) > 0"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM glossary_entries WHERE {clause} ORDER BY length(ko), id LIMIT ?2"
        );
        query_entries(&self.conn(), &sql, params![word, limit as i64])
    }

    /// Token-index rows for `lang` whose token is in `tokens`.
    pub fn lookup_tokens(
        &self,
        lang: SourceLang,
        tokens: &[String],
    ) -> Result<Vec<TokenHit>, StoreError> {
        let conn = self.conn();
        let mut hits = Vec::new();
        for chunk in tokens.chunks(TOKEN_CHUNK) {
            let placeholders = (0..chunk.len())
                .map(|i| format!("?{}", i + 2))
                .collect::<Vec<_>>()
                .join(",");
            let sql = format!(
                "SELECT entry_id, token, token_length FROM glossary_tokens
                 WHERE lang = ?1 AND token IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql)?;
            let bound = std::iter::once(lang.code().to_string()).chain(chunk.iter().cloned());
            let rows = stmt.query_map(params_from_iter(bound), |row| {
                Ok(TokenHit {
                    entry_id: row.get(0)?,
                    token: row.get(1)?,
                    token_length: row.get::<_, i64>(2)? as usize,
                })
            })?;
            for row in rows {
                hits.push(row?);
            }
        }
        Ok(hits)
    }

    pub fn list_glossary(&self, offset: usize, limit: usize) -> Result<Vec<GlossaryEntry>, StoreError> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM glossary_entries ORDER BY id LIMIT ?1 OFFSET ?2");
        query_entries(&self.conn(), &sql, params![limit as i64, offset as i64])
    }

    pub fn count_glossary(&self) -> Result<usize, StoreError> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM glossary_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Drop and rebuild the whole token index. Returns the number of entries indexed.
    pub fn rebuild_token_index(&self) -> Result<usize, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM glossary_entries ORDER BY id");
        let entries = query_entries(&tx, &sql, [])?;
        tx.execute("DELETE FROM glossary_tokens", [])?;
        for entry in &entries {
            index_entry(&tx, entry)?;
        }
        tx.commit()?;
        info!(entries = entries.len(), "glossary token index rebuilt");
        Ok(entries.len())
    }

    /// Insert many entries in one transaction (seed import).
    pub fn import_glossary(&self, entries: &[GlossaryEntry]) -> Result<usize, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut imported = 0;
        for entry in entries {
            if entry.ko.trim().is_empty() {
                continue;
            }
            insert_entry(&tx, entry)?;
            imported += 1;
        }
        tx.commit()?;
        info!(imported, "glossary imported");
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ko: &str, en: &str) -> GlossaryEntry {
        GlossaryEntry {
            ko: ko.into(),
            en: en.into(),
            page_url: "/goods".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = Store::open_in_memory().unwrap();
        let id = store.create_glossary_entry(&entry("굿즈", "goods")).unwrap();
        let loaded = store.glossary_entry(id).unwrap().unwrap();
        assert_eq!(loaded.ko, "굿즈");
        assert_eq!(loaded.en, "goods");
        assert_eq!(store.count_glossary().unwrap(), 1);
    }

    #[test]
    fn test_tokens_indexed_on_create() {
        let store = Store::open_in_memory().unwrap();
        let id = store.create_glossary_entry(&entry("포토카드", "photocard")).unwrap();
        let hits = store
            .lookup_tokens(SourceLang::Ko, &["포토카드".to_string(), "카드".to_string()])
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.entry_id == id));

        let en_hits = store
            .lookup_tokens(SourceLang::En, &["photocard".to_string()])
            .unwrap();
        assert_eq!(en_hits.len(), 1);
    }

    #[test]
    fn test_update_reindexes() {
        let store = Store::open_in_memory().unwrap();
        let id = store.create_glossary_entry(&entry("응원봉", "light stick")).unwrap();
        let mut e = store.glossary_entry(id).unwrap().unwrap();
        e.ko = "공식 응원봉".into();
        store.update_glossary_entry(&e).unwrap();
        let hits = store
            .lookup_tokens(SourceLang::Ko, &["공식 응원봉".to_string()])
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let mut e = entry("굿즈", "goods");
        e.id = 42;
        assert!(matches!(
            store.update_glossary_entry(&e),
            Err(StoreError::NotFound { id: 42, .. })
        ));
    }

    #[test]
    fn test_cross_language_lookups() {
        let store = Store::open_in_memory().unwrap();
        store.create_glossary_entry(&entry("응원봉", "Light Stick")).unwrap();
        assert_eq!(store.find_glossary_exact(SourceLang::En, "Light Stick").unwrap().len(), 1);
        assert!(store.find_glossary_exact(SourceLang::En, "light stick").unwrap().is_empty());
        assert_eq!(store.find_glossary_nocase(SourceLang::En, "light stick").unwrap().len(), 1);
        assert_eq!(
            store.find_glossary_containing(SourceLang::En, "stick", 10).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_rebuild_index() {
        let store = Store::open_in_memory().unwrap();
        store
            .import_glossary(&[entry("굿즈", "goods"), entry("앨범", "album"), entry(" ", "x")])
            .unwrap();
        assert_eq!(store.rebuild_token_index().unwrap(), 2);
        assert_eq!(store.list_glossary(0, 10).unwrap().len(), 2);
    }
}

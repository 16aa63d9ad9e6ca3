//! Glossary: curated Korean terms, their token index, relevance search,
//! page-context detection and candidate extraction.

pub mod candidate;
pub mod context;
pub mod entry;
pub mod search;
pub mod tokenizer;

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::StoreError;
use crate::store::Store;

pub use candidate::{CandidateAction, CandidateGlossaryEntry, CandidateService, CandidateStatus};
pub use context::{context_description, detect_context};
pub use entry::GlossaryEntry;
pub use search::{GlossarySearch, MatchType, SearchResult};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedFile {
    Wrapped { entries: Vec<GlossaryEntry> },
    Bare(Vec<GlossaryEntry>),
}

/// Parse seed JSON (a bare array or `{"entries": [...]}`), dropping
/// untranslated Korean placeholders from target columns.
pub fn parse_seed(json: &str) -> Result<Vec<GlossaryEntry>, StoreError> {
    let entries = match serde_json::from_str::<SeedFile>(json)? {
        SeedFile::Wrapped { entries } | SeedFile::Bare(entries) => entries,
    };
    Ok(entries
        .into_iter()
        .map(GlossaryEntry::sanitized)
        .filter(|e| !e.ko.is_empty())
        .collect())
}

/// Import the seed file into an empty glossary. Returns the number of rows
/// imported; a non-empty glossary is left untouched.
pub fn load_seed_if_empty(store: &Store, path: &Path) -> Result<usize, StoreError> {
    if store.count_glossary()? > 0 {
        info!(path = %path.display(), "glossary not empty, seed skipped");
        return Ok(0);
    }
    let json = std::fs::read_to_string(path)?;
    let entries = parse_seed(&json)?;
    store.import_glossary(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"{"entries": [
        {"page_url": "/goods", "key_name": "goods_title", "ko": "굿즈", "en": "goods", "ja": "グッズ"},
        {"ko": "응원봉", "en": "light stick", "ja": "응원봉"},
        {"ko": "  ", "en": "blank"}
    ]}"#;

    #[test]
    fn test_parse_seed_sanitizes() {
        let entries = parse_seed(SEED).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].ja, "");
        assert_eq!(entries[0].ja, "グッズ");
    }

    #[test]
    fn test_parse_bare_array() {
        let entries = parse_seed(r#"[{"ko": "배송", "en": "shipping"}]"#).unwrap();
        assert_eq!(entries[0].en, "shipping");
    }

    #[test]
    fn test_seed_only_into_empty_glossary() {
        let dir = std::env::temp_dir().join(format!("seed-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("seed.json");
        std::fs::write(&path, SEED).unwrap();

        let store = Store::open_in_memory().unwrap();
        assert_eq!(load_seed_if_empty(&store, &path).unwrap(), 2);
        assert_eq!(load_seed_if_empty(&store, &path).unwrap(), 0);
        assert_eq!(store.count_glossary().unwrap(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}

//! Tiered glossary relevance search.
//!
//! Korean input is scored exact (100), stem-exact (90), token overlap
//! (at most 60) and substring fallback (30). An entry keeps the score of the
//! first tier that found it. Entries whose page path overlaps the page
//! context get a flat +15 afterwards. Other source languages follow the same
//! shape against their own columns, with case-insensitive equality as the
//! second tier.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::glossary::context::{detect_context, path_within};
use crate::glossary::tokenizer::{split_words, tokenize, tokenize_multi_lang};
use crate::glossary::GlossaryEntry;
use crate::korean::stem;
use crate::language::SourceLang;
use crate::metrics::{MetricsRegistry, Stage, Stopwatch};
use crate::store::{Store, TokenHit};

pub const EXACT_SCORE: f64 = 100.0;
pub const STEM_SCORE: f64 = 90.0;
pub const CASE_INSENSITIVE_SCORE: f64 = 90.0;
pub const TOKEN_MAX_SCORE: f64 = 60.0;
pub const SUBSTRING_SCORE: f64 = 30.0;
pub const PAGE_BONUS: f64 = 15.0;

const TOKEN_COUNT_BONUS: f64 = 2.0;
const TOKEN_COUNT_CAP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Exact,
    StemExact,
    CaseInsensitive,
    Token,
    Substring,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub entry: GlossaryEntry,
    /// Final score including the page bonus.
    pub score: f64,
    /// Tier score before the page bonus.
    pub base_score: f64,
    pub match_type: MatchType,
}

/// Token-tier score for an entry hit by `count` tokens, the longest of which
/// has `longest` chars, against an input of `input_len` chars.
pub fn token_score(longest: usize, count: usize, input_len: usize) -> f64 {
    if input_len == 0 || count == 0 {
        return 0.0;
    }
    let coverage = TOKEN_MAX_SCORE * longest as f64 / input_len as f64;
    let extra = TOKEN_COUNT_BONUS * (count - 1).min(TOKEN_COUNT_CAP) as f64;
    (coverage + extra).min(TOKEN_MAX_SCORE)
}

/// Whether an entry page and the page context share a path, one nested in
/// the other on a segment boundary.
fn page_matches(entry_page: &str, context: &str) -> bool {
    let entry_page = entry_page.trim();
    let context = context.trim();
    path_within(context, entry_page) || path_within(entry_page, context)
}

/// Accumulates results tier by tier; the first tier to score an entry wins.
struct Ranking {
    results: Vec<SearchResult>,
    seen: HashSet<i64>,
}

impl Ranking {
    fn new() -> Self {
        Self {
            results: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn add(&mut self, entry: GlossaryEntry, score: f64, match_type: MatchType) {
        if self.seen.insert(entry.id) {
            self.results.push(SearchResult {
                entry,
                score,
                base_score: score,
                match_type,
            });
        }
    }

    fn contains(&self, id: i64) -> bool {
        self.seen.contains(&id)
    }

    fn len(&self) -> usize {
        self.results.len()
    }

    fn finish(mut self, context: Option<&str>, limit: usize) -> Vec<SearchResult> {
        if let Some(context) = context {
            for result in &mut self.results {
                if page_matches(&result.entry.page_url, context) {
                    result.score += PAGE_BONUS;
                }
            }
        }
        // Exact matches stay ahead of any bonus-lifted lower tier.
        self.results.sort_by(|a, b| {
            let a_exact = a.match_type == MatchType::Exact;
            let b_exact = b.match_type == MatchType::Exact;
            b_exact
                .cmp(&a_exact)
                .then(b.score.total_cmp(&a.score))
                .then(b.base_score.total_cmp(&a.base_score))
                .then(a.entry.id.cmp(&b.entry.id))
        });
        self.results.truncate(limit);
        self.results
    }
}

pub struct GlossarySearch {
    store: Arc<Store>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl GlossarySearch {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Search Korean glossary text.
    pub fn search(&self, text: &str, page_url: Option<&str>, limit: usize) -> Vec<SearchResult> {
        self.search_by_language(text, SourceLang::Ko, page_url, limit)
    }

    /// Search against the columns of `lang`. Store failures degrade to fewer
    /// results; they never fail the search.
    pub fn search_by_language(
        &self,
        text: &str,
        lang: SourceLang,
        page_url: Option<&str>,
        limit: usize,
    ) -> Vec<SearchResult> {
        let trimmed = text.trim();
        if trimmed.is_empty() || limit == 0 {
            return Vec::new();
        }
        let watch = Stopwatch::start();

        let mut ranking = Ranking::new();
        if let Err(e) = self.collect(trimmed, lang, limit, &mut ranking) {
            warn!(error = %e, lang = %lang, "glossary search degraded");
        }

        let context = page_url
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .or_else(|| detect_context(trimmed));
        let results = ranking.finish(context, limit);

        if let Some(metrics) = &self.metrics {
            metrics.observe(Stage::GlossarySearch, watch.elapsed_us());
        }
        debug!(
            lang = %lang,
            results = results.len(),
            top_score = results.first().map(|r| r.score),
            "glossary search"
        );
        results
    }

    fn collect(
        &self,
        text: &str,
        lang: SourceLang,
        limit: usize,
        ranking: &mut Ranking,
    ) -> Result<(), StoreError> {
        for entry in self.store.find_glossary_exact(lang, text)? {
            ranking.add(entry, EXACT_SCORE, MatchType::Exact);
        }

        let words = split_words(text);
        if lang == SourceLang::Ko {
            let stems: HashSet<String> = words.iter().flat_map(|w| stem(w)).collect();
            for candidate in stems {
                for entry in self.store.find_glossary_exact(lang, &candidate)? {
                    ranking.add(entry, STEM_SCORE, MatchType::StemExact);
                }
            }
        } else {
            for entry in self.store.find_glossary_nocase(lang, text)? {
                ranking.add(entry, CASE_INSENSITIVE_SCORE, MatchType::CaseInsensitive);
            }
        }

        let tokens: Vec<String> = if lang == SourceLang::Ko {
            tokenize(text).into_iter().collect()
        } else {
            tokenize_multi_lang(text, lang).into_iter().collect()
        };
        let hits = self.store.lookup_tokens(lang, &tokens)?;
        self.add_token_tier(hits, text.chars().count(), ranking)?;

        if ranking.len() < limit {
            for word in words.iter().filter(|w| w.chars().count() >= 2) {
                for entry in self.store.find_glossary_containing(lang, word, limit)? {
                    ranking.add(entry, SUBSTRING_SCORE, MatchType::Substring);
                }
            }
        }
        Ok(())
    }

    fn add_token_tier(
        &self,
        hits: Vec<TokenHit>,
        input_len: usize,
        ranking: &mut Ranking,
    ) -> Result<(), StoreError> {
        // entry id -> (longest token, distinct tokens)
        let mut per_entry: HashMap<i64, (usize, HashSet<String>)> = HashMap::new();
        for hit in hits.into_iter().filter(|h| !ranking.contains(h.entry_id)) {
            let slot = per_entry.entry(hit.entry_id).or_default();
            slot.0 = slot.0.max(hit.token_length);
            slot.1.insert(hit.token);
        }
        if per_entry.is_empty() {
            return Ok(());
        }

        let mut ids: Vec<i64> = per_entry.keys().copied().collect();
        ids.sort_unstable();
        for entry in self.store.glossary_entries_by_ids(&ids)? {
            if let Some((longest, tokens)) = per_entry.get(&entry.id) {
                let score = token_score(*longest, tokens.len(), input_len);
                if score > 0.0 {
                    ranking.add(entry, score, MatchType::Token);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ko: &str, en: &str, page: &str) -> GlossaryEntry {
        GlossaryEntry {
            ko: ko.into(),
            en: en.into(),
            page_url: page.into(),
            ..Default::default()
        }
    }

    fn seeded() -> GlossarySearch {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .import_glossary(&[
                entry("굿즈", "goods", ""),
                entry("공식 굿즈", "official goods", "/goods"),
                entry("포토카드", "photocard", "/goods"),
                entry("응원봉", "light stick", ""),
                entry("배송", "shipping", "/order"),
            ])
            .unwrap();
        GlossarySearch::new(store)
    }

    #[test]
    fn test_token_score_formula() {
        assert_eq!(token_score(4, 1, 8), 30.0);
        assert_eq!(token_score(4, 3, 8), 34.0);
        assert_eq!(token_score(8, 10, 8), 60.0);
        assert_eq!(token_score(2, 0, 8), 0.0);
    }

    #[test]
    fn test_exact_is_top_with_100() {
        let search = seeded();
        let results = search.search("굿즈", None, 10);
        assert_eq!(results[0].entry.ko, "굿즈");
        assert_eq!(results[0].base_score, EXACT_SCORE);
        assert_eq!(results[0].match_type, MatchType::Exact);
        assert_eq!(
            results.iter().filter(|r| r.match_type == MatchType::Exact).count(),
            1
        );
    }

    #[test]
    fn test_stem_exact() {
        let search = seeded();
        let results = search.search("포토카드를 샀어요", None, 10);
        let top = &results[0];
        assert_eq!(top.entry.ko, "포토카드");
        assert_eq!(top.match_type, MatchType::StemExact);
    }

    #[test]
    fn test_page_bonus_does_not_change_base() {
        let search = seeded();
        let results = search.search("공식 굿즈", Some("/goods/42"), 10);
        let top = &results[0];
        assert_eq!(top.entry.ko, "공식 굿즈");
        assert_eq!(top.base_score, EXACT_SCORE);
        assert_eq!(top.score, EXACT_SCORE + PAGE_BONUS);
    }

    #[test]
    fn test_tiers_do_not_overlap() {
        let search = seeded();
        let results = search.search("굿즈", None, 10);
        let mut ids: Vec<i64> = results.iter().map(|r| r.entry.id).collect();
        let before = ids.len();
        ids.dedup();
        assert_eq!(before, ids.len());
    }

    #[test]
    fn test_limit_truncates() {
        let search = seeded();
        assert!(search.search("공식 굿즈", None, 1).len() <= 1);
        assert!(search.search("   ", None, 10).is_empty());
    }

    #[test]
    fn test_cross_language_tiers() {
        let search = seeded();
        let exact = search.search_by_language("light stick", SourceLang::En, None, 10);
        assert_eq!(exact[0].entry.ko, "응원봉");
        assert_eq!(exact[0].match_type, MatchType::Exact);

        let nocase = search.search_by_language("Light Stick", SourceLang::En, None, 10);
        assert_eq!(nocase[0].match_type, MatchType::CaseInsensitive);
        assert_eq!(nocase[0].base_score, CASE_INSENSITIVE_SCORE);

        let token = search.search_by_language("new photocard set", SourceLang::En, None, 10);
        assert!(token
            .iter()
            .any(|r| r.entry.ko == "포토카드" && r.match_type == MatchType::Token));

        let partial = search.search_by_language("stic", SourceLang::En, None, 10);
        assert_eq!(partial.len(), 1);
        assert_eq!(partial[0].entry.ko, "응원봉");
        assert_eq!(partial[0].match_type, MatchType::Substring);
        assert_eq!(partial[0].score, SUBSTRING_SCORE);
    }

    #[test]
    fn test_page_bonus_never_lifts_stem_over_exact() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .import_glossary(&[entry("응모하기", "enter", ""), entry("응모", "entry", "/event")])
            .unwrap();
        let search = GlossarySearch::new(store);

        let results = search.search("응모하기", Some("/event"), 10);
        assert_eq!(results[0].entry.ko, "응모하기");
        assert_eq!(results[0].match_type, MatchType::Exact);
        assert_eq!(results[1].entry.ko, "응모");
        assert_eq!(results[1].score, STEM_SCORE + PAGE_BONUS);
    }

    #[test]
    fn test_page_bonus_needs_segment_match() {
        assert!(page_matches("/goods", "/goods/42"));
        assert!(page_matches("/goods/42", "/goods"));
        assert!(!page_matches("/goods", "/goodsx"));
        assert!(!page_matches("/", "/goods"));
        assert!(!page_matches("", "/goods"));
    }
}

//! Query/index tokenization. Matching is exact string equality on token sets,
//! so the query side and the index side must produce tokens the same way.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::korean::stem;
use crate::language::SourceLang;

static WORD_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\p{P}]+").expect("word split regex"));

const MIN_TOKEN_CHARS: usize = 2;
const MAX_KOREAN_NGRAM: usize = 8;
const MAX_CJK_NGRAM: usize = 4;

/// Split on whitespace and punctuation, dropping empty pieces.
pub fn split_words(text: &str) -> Vec<String> {
    WORD_SPLIT_RE
        .split(text)
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Character n-grams of every length in `min..=max`.
fn char_ngrams(word: &str, min: usize, max: usize, out: &mut HashSet<String>) {
    let chars: Vec<char> = word.chars().collect();
    for n in min..=max.min(chars.len()) {
        for window in chars.windows(n) {
            out.insert(window.iter().collect());
        }
    }
}

/// Word n-grams joined by a single space.
fn word_ngrams(words: &[String], n: usize, out: &mut HashSet<String>) {
    for window in words.windows(n) {
        out.insert(window.join(" "));
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Korean-oriented tokens: words, their stems, word bi/trigrams and
/// per-word character n-grams (2..=8).
pub fn tokenize(text: &str) -> HashSet<String> {
    let words = split_words(text);
    let mut tokens = HashSet::new();

    for word in &words {
        tokens.insert(word.clone());
        tokens.extend(stem(word));
        char_ngrams(word, MIN_TOKEN_CHARS, MAX_KOREAN_NGRAM, &mut tokens);
    }
    word_ngrams(&words, 2, &mut tokens);
    word_ngrams(&words, 3, &mut tokens);

    tokens.retain(|t| char_len(t) >= MIN_TOKEN_CHARS);
    tokens
}

/// Index-side tokens: `tokenize` plus the whole trimmed text and its stems.
pub fn tokenize_for_index(text: &str) -> HashSet<String> {
    let mut tokens = tokenize(text);
    let full = text.trim();
    if !full.is_empty() {
        tokens.insert(full.to_string());
        tokens.extend(stem(full));
    }
    tokens.retain(|t| char_len(t) >= MIN_TOKEN_CHARS);
    tokens
}

/// Script-aware tokens for cross-language search.
pub fn tokenize_multi_lang(text: &str, lang: SourceLang) -> HashSet<String> {
    match lang {
        SourceLang::Ko => tokenize_for_index(text),
        SourceLang::En => tokenize_latin(text),
        SourceLang::Ja | SourceLang::Zh => tokenize_cjk(text),
    }
}

fn tokenize_latin(text: &str) -> HashSet<String> {
    let normalized = text.trim().to_lowercase();
    let words: Vec<String> = split_words(&normalized);
    let mut tokens: HashSet<String> = words
        .iter()
        .filter(|w| char_len(w) >= MIN_TOKEN_CHARS)
        .cloned()
        .collect();
    let whole = words.join(" ");
    if char_len(&whole) >= MIN_TOKEN_CHARS {
        tokens.insert(whole);
    }
    word_ngrams(&words, 2, &mut tokens);
    tokens
}

fn tokenize_cjk(text: &str) -> HashSet<String> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let mut tokens = HashSet::new();
    if char_len(&compact) >= MIN_TOKEN_CHARS {
        tokens.insert(compact.clone());
    }
    char_ngrams(&compact, MIN_TOKEN_CHARS, MAX_CJK_NGRAM, &mut tokens);
    tokens
}

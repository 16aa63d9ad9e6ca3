//! Jamo-only internet slang (ㅋㅋ, ㅠㅠ, ㄱㅅ ...).
//! Loaded once from JSON; a built-in table ships with the crate so a missing
//! file degrades to defaults instead of failing startup.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::language::{is_hangul_jamo, TargetLang};

const BUILTIN_TABLE: &str = include_str!("../../data/korean_slang.json");

/// Intensity reported for runs longer than anything cataloged.
pub const HIGH_INTENSITY: &str = "high";

#[derive(Debug, Clone, Deserialize)]
pub struct SlangEntry {
    pub pattern: String,
    pub meaning: String,
    #[serde(default = "default_intensity")]
    pub intensity: String,
    #[serde(default)]
    pub translations: HashMap<String, String>,
}

fn default_intensity() -> String {
    "medium".to_string()
}

impl SlangEntry {
    /// Catalog translation for `lang`, falling back to English.
    pub fn translation_for(&self, lang: TargetLang) -> Option<&str> {
        self.translations
            .get(lang.code())
            .or_else(|| self.translations.get(TargetLang::En.code()))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct SlangFile {
    #[allow(dead_code)]
    version: u32,
    entries: Vec<SlangEntry>,
}

/// A successful slang lookup.
#[derive(Debug, Clone)]
pub struct SlangMatch {
    pub entry: SlangEntry,
    pub translated_text: String,
    pub intensity: String,
}

pub struct SlangDictionary {
    exact: HashMap<String, SlangEntry>,
    /// Single-character runs (ㅋㅋ, ㅋㅋㅋ, ...) grouped by character, longest first.
    runs: HashMap<char, Vec<SlangEntry>>,
}

/// True iff every non-whitespace character is a bare consonant/vowel jamo
/// and there is at least one of them.
pub fn is_jamo_only(text: &str) -> bool {
    let mut seen = false;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        if !is_hangul_jamo(c) {
            return false;
        }
        seen = true;
    }
    seen
}

/// The repeated character if `text` is one character repeated.
fn repeated_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    let first = chars.next()?;
    chars.all(|c| c == first).then_some(first)
}

impl SlangDictionary {
    pub fn from_entries(entries: Vec<SlangEntry>) -> Self {
        let mut exact = HashMap::new();
        let mut runs: HashMap<char, Vec<SlangEntry>> = HashMap::new();

        for entry in entries {
            let pattern = entry.pattern.trim().to_string();
            if pattern.is_empty() {
                continue;
            }
            if let Some(c) = repeated_char(&pattern) {
                runs.entry(c).or_default().push(entry.clone());
            }
            exact.insert(pattern, entry);
        }

        for list in runs.values_mut() {
            list.sort_by(|a, b| b.pattern.chars().count().cmp(&a.pattern.chars().count()));
        }

        Self { exact, runs }
    }

    /// Parse a JSON table (`{"version":1,"entries":[...]}`).
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let file: SlangFile = serde_json::from_str(json)?;
        Ok(Self::from_entries(file.entries))
    }

    /// Table bundled with the crate.
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_TABLE).unwrap_or_else(|e| {
            warn!(error = %e, "built-in slang table is malformed, using empty");
            Self::empty()
        })
    }

    pub fn load_from_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let dict = Self::from_json(&content)?;
        info!(path = %path.display(), entries = dict.len(), "slang dictionary loaded");
        Ok(dict)
    }

    /// Load from `path` when given, otherwise (or on failure) the built-in table.
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                warn!(error = %e, path = %p.display(), "slang file load failed, using built-in table");
                Self::builtin()
            }),
            None => Self::builtin(),
        }
    }

    pub fn empty() -> Self {
        Self {
            exact: HashMap::new(),
            runs: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// Look up a jamo-only input. Exact patterns win; otherwise a run of one
    /// repeated jamo maps to the longest cataloged run that fits, and runs
    /// longer than every cataloged pattern are reported as high intensity.
    pub fn lookup(&self, text: &str, target: TargetLang) -> Option<SlangMatch> {
        let key: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if key.is_empty() {
            return None;
        }

        if let Some(entry) = self.exact.get(&key) {
            let translated = entry.translation_for(target)?.to_string();
            return Some(SlangMatch {
                entry: entry.clone(),
                translated_text: translated,
                intensity: entry.intensity.clone(),
            });
        }

        let c = repeated_char(&key)?;
        let candidates = self.runs.get(&c)?;
        let input_len = key.chars().count();
        let longest = candidates.first()?;
        let longest_len = longest.pattern.chars().count();

        let chosen = candidates
            .iter()
            .find(|e| e.pattern.chars().count() <= input_len)
            .or_else(|| candidates.last())?;

        let intensity = if input_len > longest_len {
            HIGH_INTENSITY.to_string()
        } else {
            chosen.intensity.clone()
        };

        let translated = chosen.translation_for(target)?.to_string();
        Some(SlangMatch {
            entry: chosen.clone(),
            translated_text: translated,
            intensity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_jamo_only() {
        assert!(is_jamo_only("ㅋㅋㅋ"));
        assert!(is_jamo_only("ㅠㅠ ㅠㅠ"));
        assert!(!is_jamo_only("ㅋㅋ웃겨"));
        assert!(!is_jamo_only("lol"));
        assert!(!is_jamo_only(""));
        assert!(!is_jamo_only("   "));
    }

    #[test]
    fn test_builtin_loads() {
        let dict = SlangDictionary::builtin();
        assert!(!dict.is_empty());
    }

    #[test]
    fn test_exact_match() {
        let dict = SlangDictionary::builtin();
        let m = dict.lookup("ㄱㅅ", TargetLang::En).unwrap();
        assert_eq!(m.translated_text, "thx");
        assert_eq!(m.intensity, "low");
    }

    #[test]
    fn test_long_run_is_high_intensity() {
        let dict = SlangDictionary::builtin();
        let m = dict.lookup("ㅋㅋㅋㅋㅋㅋㅋㅋㅋㅋ", TargetLang::En).unwrap();
        assert_eq!(m.entry.pattern, "ㅋㅋㅋㅋㅋ");
        assert_eq!(m.entry.intensity, "medium");
        assert_eq!(m.intensity, HIGH_INTENSITY);
    }

    #[test]
    fn test_run_between_patterns_uses_longest_fit() {
        let dict = SlangDictionary::builtin();
        let m = dict.lookup("ㅋㅋㅋㅋ", TargetLang::En).unwrap();
        assert_eq!(m.entry.pattern, "ㅋㅋㅋ");
        assert_eq!(m.intensity, "medium");
    }

    #[test]
    fn test_short_run_uses_shortest_pattern() {
        let entries = vec![SlangEntry {
            pattern: "ㅎㅎㅎ".into(),
            meaning: "laugh".into(),
            intensity: "low".into(),
            translations: HashMap::from([("en".to_string(), "hehehe".to_string())]),
        }];
        let dict = SlangDictionary::from_entries(entries);
        let m = dict.lookup("ㅎㅎ", TargetLang::En).unwrap();
        assert_eq!(m.entry.pattern, "ㅎㅎㅎ");
        assert_eq!(m.intensity, "low");
    }

    #[test]
    fn test_unknown_returns_none() {
        let dict = SlangDictionary::builtin();
        assert!(dict.lookup("ㅍㅍㅍ", TargetLang::En).is_none());
        assert!(dict.lookup("ㅁㄴㅇㄹ", TargetLang::Ja).is_none());
    }

    #[test]
    fn test_repeated_runs_never_blank() {
        let dict = SlangDictionary::builtin();
        for c in ['ㅋ', 'ㅎ', 'ㅠ', 'ㅜ', 'ㅇ', 'ㄱ', 'ㅂ', 'ㅍ'] {
            for n in 2..12 {
                let s: String = std::iter::repeat(c).take(n).collect();
                assert!(is_jamo_only(&s));
                if let Some(m) = dict.lookup(&s, TargetLang::Es) {
                    assert!(!m.translated_text.trim().is_empty());
                }
            }
        }
    }

    #[test]
    fn test_fallback_to_english_translation() {
        let entries = vec![SlangEntry {
            pattern: "ㅇㅋ".into(),
            meaning: "ok".into(),
            intensity: "low".into(),
            translations: HashMap::from([("en".to_string(), "OK".to_string())]),
        }];
        let dict = SlangDictionary::from_entries(entries);
        assert_eq!(dict.lookup("ㅇㅋ", TargetLang::De).unwrap().translated_text, "OK");
    }
}

//! Glossary rows: a canonical Korean term with per-language translations and
//! business-corrected locale overrides.

use serde::{Deserialize, Serialize};

use crate::language::{contains_hangul, SourceLang, TargetLang};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlossaryEntry {
    pub id: i64,
    pub page_url: String,
    pub key_name: String,
    pub ko: String,
    pub en: String,
    pub ja: String,
    pub zh_hans: String,
    pub zh_hant: String,
    pub es: String,
    pub de: String,
    pub fr: String,
    /// Locale overrides, preferred over the base column when set.
    pub en_north_america: Option<String>,
    pub ja_japan: Option<String>,
    pub zh_hans_china: Option<String>,
    pub zh_hant_taiwan: Option<String>,
    pub es_latin_america: Option<String>,
}

fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

impl GlossaryEntry {
    pub fn base_translation(&self, lang: TargetLang) -> &str {
        match lang {
            TargetLang::Ko => &self.ko,
            TargetLang::En => &self.en,
            TargetLang::Ja => &self.ja,
            TargetLang::ZhHans => &self.zh_hans,
            TargetLang::ZhHant => &self.zh_hant,
            TargetLang::Es => &self.es,
            TargetLang::De => &self.de,
            TargetLang::Fr => &self.fr,
        }
    }

    pub fn locale_override(&self, lang: TargetLang) -> Option<&str> {
        match lang {
            TargetLang::En => self.en_north_america.as_deref(),
            TargetLang::Ja => self.ja_japan.as_deref(),
            TargetLang::ZhHans => self.zh_hans_china.as_deref(),
            TargetLang::ZhHant => self.zh_hant_taiwan.as_deref(),
            TargetLang::Es => self.es_latin_america.as_deref(),
            _ => None,
        }
    }

    /// Locale override first, then the base column, else empty.
    pub fn best_translation(&self, lang: TargetLang) -> &str {
        self.locale_override(lang)
            .and_then(non_blank)
            .or_else(|| non_blank(self.base_translation(lang)))
            .unwrap_or("")
    }

    pub fn has_translation(&self, lang: TargetLang) -> bool {
        !self.best_translation(lang).is_empty()
    }

    pub fn set_base_translation(&mut self, lang: TargetLang, text: String) {
        match lang {
            TargetLang::Ko => self.ko = text,
            TargetLang::En => self.en = text,
            TargetLang::Ja => self.ja = text,
            TargetLang::ZhHans => self.zh_hans = text,
            TargetLang::ZhHant => self.zh_hant = text,
            TargetLang::Es => self.es = text,
            TargetLang::De => self.de = text,
            TargetLang::Fr => self.fr = text,
        }
    }

    /// Non-blank field values searchable for a source language.
    pub fn source_fields(&self, lang: SourceLang) -> Vec<&str> {
        let fields: Vec<&str> = match lang {
            SourceLang::Ko => vec![self.ko.as_str()],
            SourceLang::En => vec![self.en.as_str(), self.en_north_america.as_deref().unwrap_or("")],
            SourceLang::Ja => vec![self.ja.as_str(), self.ja_japan.as_deref().unwrap_or("")],
            SourceLang::Zh => vec![
                self.zh_hans.as_str(),
                self.zh_hant.as_str(),
                self.zh_hans_china.as_deref().unwrap_or(""),
                self.zh_hant_taiwan.as_deref().unwrap_or(""),
            ],
        };
        fields.into_iter().filter_map(non_blank).collect()
    }

    /// Spreadsheet exports leave untranslated cells holding the Korean text.
    /// Those are cleared so they never count as a translation.
    pub fn sanitized(mut self) -> Self {
        for lang in TargetLang::ALL {
            if lang != TargetLang::Ko && contains_hangul(self.base_translation(lang)) {
                self.set_base_translation(lang, String::new());
            }
        }
        for field in [
            &mut self.en_north_america,
            &mut self.ja_japan,
            &mut self.zh_hans_china,
            &mut self.zh_hant_taiwan,
            &mut self.es_latin_america,
        ] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty() || contains_hangul(v)) {
                *field = None;
            }
        }
        self.ko = self.ko.trim().to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goods() -> GlossaryEntry {
        GlossaryEntry {
            ko: "굿즈".into(),
            en: "goods".into(),
            ja: "グッズ".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_override_preferred() {
        let mut entry = goods();
        assert_eq!(entry.best_translation(TargetLang::En), "goods");
        entry.en_north_america = Some("merch".into());
        assert_eq!(entry.best_translation(TargetLang::En), "merch");
    }

    #[test]
    fn test_blank_override_falls_back() {
        let mut entry = goods();
        entry.en_north_america = Some("  ".into());
        assert_eq!(entry.best_translation(TargetLang::En), "goods");
    }

    #[test]
    fn test_missing_translation_is_empty() {
        let entry = goods();
        assert_eq!(entry.best_translation(TargetLang::Fr), "");
        assert!(!entry.has_translation(TargetLang::De));
        assert_eq!(entry.best_translation(TargetLang::Ko), "굿즈");
    }

    #[test]
    fn test_sanitized_clears_korean_placeholders() {
        let entry = GlossaryEntry {
            ko: "응모하기".into(),
            en: "Enter".into(),
            es: "응모하기".into(),
            ..Default::default()
        }
        .sanitized();
        assert_eq!(entry.en, "Enter");
        assert_eq!(entry.es, "");
    }

    #[test]
    fn test_source_fields() {
        let mut entry = goods();
        entry.en_north_america = Some("merch".into());
        assert_eq!(entry.source_fields(SourceLang::En), vec!["goods", "merch"]);
        assert!(entry.source_fields(SourceLang::Zh).is_empty());
    }
}

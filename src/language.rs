//! Language codes and script-histogram language detection.
//! Detection only distinguishes the four script-detectable source languages;
//! target languages are a separate, wider set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A source language the detector can tell apart by script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLang {
    Ko,
    En,
    Ja,
    Zh,
}

impl SourceLang {
    pub fn code(self) -> &'static str {
        match self {
            SourceLang::Ko => "ko",
            SourceLang::En => "en",
            SourceLang::Ja => "ja",
            SourceLang::Zh => "zh",
        }
    }

    /// English display name used in prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            SourceLang::Ko => "Korean",
            SourceLang::En => "English",
            SourceLang::Ja => "Japanese",
            SourceLang::Zh => "Chinese",
        }
    }
}

impl fmt::Display for SourceLang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for SourceLang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ko" | "kr" | "ko-kr" => Ok(SourceLang::Ko),
            "en" | "en-us" | "en-gb" => Ok(SourceLang::En),
            "ja" | "jp" | "ja-jp" => Ok(SourceLang::Ja),
            "zh" | "zh-cn" | "zh-tw" | "zh-hans" | "zh-hant" => Ok(SourceLang::Zh),
            other => Err(format!("unsupported source language: {other}")),
        }
    }
}

/// A language the service can translate into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetLang {
    #[serde(rename = "ko")]
    Ko,
    #[serde(rename = "en")]
    En,
    #[serde(rename = "ja")]
    Ja,
    #[serde(rename = "zh-Hans")]
    ZhHans,
    #[serde(rename = "zh-Hant")]
    ZhHant,
    #[serde(rename = "es")]
    Es,
    #[serde(rename = "de")]
    De,
    #[serde(rename = "fr")]
    Fr,
}

impl TargetLang {
    pub const ALL: [TargetLang; 8] = [
        TargetLang::Ko,
        TargetLang::En,
        TargetLang::Ja,
        TargetLang::ZhHans,
        TargetLang::ZhHant,
        TargetLang::Es,
        TargetLang::De,
        TargetLang::Fr,
    ];

    pub fn code(self) -> &'static str {
        match self {
            TargetLang::Ko => "ko",
            TargetLang::En => "en",
            TargetLang::Ja => "ja",
            TargetLang::ZhHans => "zh-Hans",
            TargetLang::ZhHant => "zh-Hant",
            TargetLang::Es => "es",
            TargetLang::De => "de",
            TargetLang::Fr => "fr",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TargetLang::Ko => "Korean",
            TargetLang::En => "English",
            TargetLang::Ja => "Japanese",
            TargetLang::ZhHans => "Simplified Chinese",
            TargetLang::ZhHant => "Traditional Chinese",
            TargetLang::Es => "Spanish",
            TargetLang::De => "German",
            TargetLang::Fr => "French",
        }
    }

    /// Languages written in Latin script.
    pub fn is_latin(self) -> bool {
        matches!(
            self,
            TargetLang::En | TargetLang::Es | TargetLang::De | TargetLang::Fr
        )
    }

    /// Whether a detected output language is acceptable for this target.
    /// Short Japanese outputs made only of kanji detect as `zh`, so those are
    /// tolerated up to a few characters.
    pub fn accepts_detected(self, detected: SourceLang, output_chars: usize) -> bool {
        match self {
            TargetLang::Ko => detected == SourceLang::Ko,
            TargetLang::Ja => {
                detected == SourceLang::Ja || (detected == SourceLang::Zh && output_chars <= 8)
            }
            TargetLang::ZhHans | TargetLang::ZhHant => detected == SourceLang::Zh,
            _ => detected == SourceLang::En,
        }
    }

    /// The source language that shares this target's glossary column family.
    pub fn as_source(self) -> Option<SourceLang> {
        match self {
            TargetLang::Ko => Some(SourceLang::Ko),
            TargetLang::En => Some(SourceLang::En),
            TargetLang::Ja => Some(SourceLang::Ja),
            TargetLang::ZhHans | TargetLang::ZhHant => Some(SourceLang::Zh),
            _ => None,
        }
    }
}

impl fmt::Display for TargetLang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TargetLang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ko" | "kr" => Ok(TargetLang::Ko),
            "en" | "en-us" | "en-gb" => Ok(TargetLang::En),
            "ja" | "jp" => Ok(TargetLang::Ja),
            "zh" | "zh-cn" | "zh-hans" | "zh-sg" => Ok(TargetLang::ZhHans),
            "zh-tw" | "zh-hk" | "zh-hant" => Ok(TargetLang::ZhHant),
            "es" => Ok(TargetLang::Es),
            "de" => Ok(TargetLang::De),
            "fr" => Ok(TargetLang::Fr),
            other => Err(format!("unsupported target language: {other}")),
        }
    }
}

const HANGUL_RATIO: f64 = 0.3;
const KANA_RATIO: f64 = 0.2;
const CJK_RATIO: f64 = 0.3;

/// Punctuation ignored before counting scripts.
const IGNORED_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '\'', '"', '(', ')', '[', ']', '{', '}', '<', '>', '-', '_',
    '/', '\\', '@', '#', '$', '%', '^', '&', '*', '+', '=', '~', '`', '|', '。', '、', '，',
    '！', '？', '：', '；', '「', '」', '『', '』', '（', '）', '…', '·', '・', '～', '“', '”',
    '‘', '’',
];

pub fn is_hangul_syllable(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

/// Hangul compatibility jamo (ㄱ..ㅣ) and conjoining jamo.
pub fn is_hangul_jamo(c: char) -> bool {
    ('\u{3131}'..='\u{318E}').contains(&c) || ('\u{1100}'..='\u{11FF}').contains(&c)
}

pub fn is_hangul(c: char) -> bool {
    is_hangul_syllable(c) || is_hangul_jamo(c)
}

pub fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{309F}').contains(&c) || ('\u{30A0}'..='\u{30FF}').contains(&c)
}

pub fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c) || ('\u{3400}'..='\u{4DBF}').contains(&c)
}

pub fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic() || ('\u{00C0}'..='\u{024F}').contains(&c)
}

pub fn contains_hangul(text: &str) -> bool {
    text.chars().any(is_hangul)
}

/// Classify `text` into ko / ja / zh / en by script histogram.
/// Kana is checked before CJK so kanji-heavy Japanese still reads as `ja`.
pub fn detect_language(text: &str) -> SourceLang {
    let mut total = 0usize;
    let mut hangul = 0usize;
    let mut kana = 0usize;
    let mut cjk = 0usize;

    for c in text.chars() {
        if c.is_whitespace() || c.is_ascii_digit() || IGNORED_PUNCTUATION.contains(&c) {
            continue;
        }
        total += 1;
        if is_hangul(c) {
            hangul += 1;
        } else if is_kana(c) {
            kana += 1;
        } else if is_cjk_ideograph(c) {
            cjk += 1;
        }
    }

    if total == 0 {
        return SourceLang::En;
    }

    let total = total as f64;
    if hangul as f64 / total > HANGUL_RATIO {
        SourceLang::Ko
    } else if kana as f64 / total > KANA_RATIO {
        SourceLang::Ja
    } else if cjk as f64 / total > CJK_RATIO {
        SourceLang::Zh
    } else {
        SourceLang::En
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_symbols_default_to_english() {
        assert_eq!(detect_language(""), SourceLang::En);
        assert_eq!(detect_language("   123 !!! "), SourceLang::En);
    }

    #[test]
    fn test_detects_each_script() {
        assert_eq!(detect_language("굿즈 구매하기"), SourceLang::Ko);
        assert_eq!(detect_language("ㅋㅋㅋㅋ"), SourceLang::Ko);
        assert_eq!(detect_language("Buy official goods"), SourceLang::En);
        assert_eq!(detect_language("商品を購入する"), SourceLang::Ja);
        assert_eq!(detect_language("购买商品"), SourceLang::Zh);
        assert_eq!(detect_language("Café à côté"), SourceLang::En);
    }

    #[test]
    fn test_kana_checked_before_cjk() {
        // Mostly kanji, a little kana.
        assert_eq!(detect_language("公式商品を買う"), SourceLang::Ja);
    }

    #[test]
    fn test_mixed_korean_and_latin() {
        assert_eq!(detect_language("BTS 앨범 구매"), SourceLang::Ko);
    }

    #[test]
    fn test_target_lang_parsing() {
        assert_eq!("zh".parse::<TargetLang>().unwrap(), TargetLang::ZhHans);
        assert_eq!("zh-TW".parse::<TargetLang>().unwrap(), TargetLang::ZhHant);
        assert_eq!("EN".parse::<TargetLang>().unwrap(), TargetLang::En);
        assert!("xx".parse::<TargetLang>().is_err());
    }

    #[test]
    fn test_language_compatibility() {
        assert!(TargetLang::Es.accepts_detected(SourceLang::En, 20));
        assert!(TargetLang::ZhHant.accepts_detected(SourceLang::Zh, 20));
        assert!(TargetLang::Ja.accepts_detected(SourceLang::Zh, 2));
        assert!(!TargetLang::Ja.accepts_detected(SourceLang::Zh, 30));
        assert!(!TargetLang::En.accepts_detected(SourceLang::Ko, 5));
    }
}

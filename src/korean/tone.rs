//! Formality detection from Korean sentence endings.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tone {
    Formal,
    Casual,
    Neutral,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Formal => "FORMAL",
            Tone::Casual => "CASUAL",
            Tone::Neutral => "NEUTRAL",
        }
    }

    /// Prompt hint for the LLM, if the tone is worth mentioning.
    pub fn prompt_hint(self) -> Option<&'static str> {
        match self {
            Tone::Formal => Some(
                "The source uses formal/polite Korean. Use a polite, respectful register in the translation.",
            ),
            Tone::Casual => Some(
                "The source uses casual Korean (banmal). Use a friendly, informal register in the translation.",
            ),
            Tone::Neutral => None,
        }
    }
}

const FORMAL_ENDINGS: &[&str] = &[
    "습니다", "습니까", "십시오", "니다", "니까", "세요", "셔요", "시죠", "어요", "아요", "해요",
    "에요", "예요", "네요", "군요", "죠", "요",
];

const CASUAL_ENDINGS: &[&str] = &[
    "거든", "잖아", "구나", "해줘", "할게", "줘", "해", "야", "어", "아", "워", "지", "냐", "니",
    "자", "래", "네", "게", "군", "ㅋ", "ㅎ",
];

fn longest_first(list: &[&'static str]) -> Vec<&'static str> {
    let mut sorted = list.to_vec();
    sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    sorted
}

static FORMAL_SORTED: Lazy<Vec<&'static str>> = Lazy::new(|| longest_first(FORMAL_ENDINGS));
static CASUAL_SORTED: Lazy<Vec<&'static str>> = Lazy::new(|| longest_first(CASUAL_ENDINGS));

fn classify_sentence(sentence: &str) -> Option<Tone> {
    let trimmed = sentence.trim_end_matches(|c: char| {
        c.is_whitespace() || matches!(c, '~' | '～' | ',' | '…' | '^' | '"' | '\'' | ')')
    });
    if trimmed.is_empty() {
        return None;
    }
    if FORMAL_SORTED.iter().any(|e| trimmed.ends_with(e)) {
        return Some(Tone::Formal);
    }
    if CASUAL_SORTED.iter().any(|e| trimmed.ends_with(e)) {
        return Some(Tone::Casual);
    }
    None
}

/// Majority vote over sentences; a nonzero tie resolves to FORMAL.
pub fn detect_tone(text: &str) -> Tone {
    let mut formal = 0usize;
    let mut casual = 0usize;

    for sentence in text.split(['.', '!', '?', '\n', '。', '！', '？']) {
        match classify_sentence(sentence) {
            Some(Tone::Formal) => formal += 1,
            Some(Tone::Casual) => casual += 1,
            _ => {}
        }
    }

    if formal == 0 && casual == 0 {
        Tone::Neutral
    } else if casual > formal {
        Tone::Casual
    } else {
        Tone::Formal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formal() {
        assert_eq!(detect_tone("감사합니다. 확인해 주세요."), Tone::Formal);
        assert_eq!(detect_tone("배송은 언제 되나요?"), Tone::Formal);
    }

    #[test]
    fn test_casual() {
        assert_eq!(detect_tone("고마워. 확인해줘"), Tone::Casual);
        assert_eq!(detect_tone("이거 진짜 예쁘다 ㅋㅋ"), Tone::Casual);
    }

    #[test]
    fn test_tie_breaks_formal() {
        assert_eq!(detect_tone("감사합니다. 고마워"), Tone::Formal);
    }

    #[test]
    fn test_neutral() {
        assert_eq!(detect_tone("굿즈"), Tone::Neutral);
        assert_eq!(detect_tone(""), Tone::Neutral);
        assert_eq!(detect_tone("포토카드 세트"), Tone::Neutral);
    }

    #[test]
    fn test_casual_majority() {
        assert_eq!(detect_tone("좋아! 최고야! 감사합니다."), Tone::Casual);
    }
}

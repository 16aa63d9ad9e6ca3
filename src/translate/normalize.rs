//! Input validation, LLM output clean-up and localized user-facing messages.

use serde::{Deserialize, Serialize};

use crate::korean::is_jamo_only;
use crate::language::TargetLang;

/// Marker the model is told to emit for untranslatable input.
pub const UNTRANSLATABLE_SENTINEL: &str = "[[UNTRANSLATABLE]]";
/// Markers treated as an explicit model-side failure.
const FAILURE_MARKERS: &[&str] = &["[[TRANSLATION_FAILED]]", "[[ERROR]]"];

pub const MIN_INPUT_CHARS: usize = 2;
pub const MAX_INPUT_CHARS: usize = 5000;

const QUOTE_PAIRS: &[(char, char)] = &[
    ('"', '"'),
    ('\'', '\''),
    ('“', '”'),
    ('‘', '’'),
    ('「', '」'),
    ('『', '』'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationReason {
    Empty,
    TooShort,
    NoLetters,
    TooLong,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::Empty => "EMPTY",
            ValidationReason::TooShort => "TOO_SHORT",
            ValidationReason::NoLetters => "NO_LETTERS",
            ValidationReason::TooLong => "TOO_LONG",
        }
    }
}

/// Reject input that should never reach a translator. Letters include bare
/// jamo, so keyboard slang passes.
pub fn validate(text: &str) -> Result<(), ValidationReason> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationReason::Empty);
    }
    let chars = trimmed.chars().count();
    if chars < MIN_INPUT_CHARS {
        return Err(ValidationReason::TooShort);
    }
    if !trimmed.chars().any(char::is_alphabetic) {
        return Err(ValidationReason::NoLetters);
    }
    if chars > MAX_INPUT_CHARS {
        return Err(ValidationReason::TooLong);
    }
    Ok(())
}

pub fn validation_message(reason: ValidationReason, lang: TargetLang) -> &'static str {
    use TargetLang::*;
    use ValidationReason::*;
    match (reason, lang) {
        (Empty, Ko) => "번역할 텍스트를 입력해 주세요.",
        (Empty, En) => "Please enter text to translate.",
        (Empty, Ja) => "翻訳するテキストを入力してください。",
        (Empty, ZhHans) => "请输入要翻译的文本。",
        (Empty, ZhHant) => "請輸入要翻譯的文字。",
        (Empty, Es) => "Introduce el texto que deseas traducir.",
        (Empty, De) => "Bitte gib den zu übersetzenden Text ein.",
        (Empty, Fr) => "Veuillez saisir le texte à traduire.",
        (TooShort, Ko) => "번역하기에 텍스트가 너무 짧습니다.",
        (TooShort, En) => "The text is too short to translate.",
        (TooShort, Ja) => "テキストが短すぎて翻訳できません。",
        (TooShort, ZhHans) => "文本太短，无法翻译。",
        (TooShort, ZhHant) => "文字太短，無法翻譯。",
        (TooShort, Es) => "El texto es demasiado corto para traducirlo.",
        (TooShort, De) => "Der Text ist zu kurz für eine Übersetzung.",
        (TooShort, Fr) => "Le texte est trop court pour être traduit.",
        (NoLetters, Ko) => "번역할 수 있는 문자가 없습니다.",
        (NoLetters, En) => "The text contains no translatable letters.",
        (NoLetters, Ja) => "翻訳できる文字が含まれていません。",
        (NoLetters, ZhHans) => "文本中没有可翻译的文字。",
        (NoLetters, ZhHant) => "文字中沒有可翻譯的內容。",
        (NoLetters, Es) => "El texto no contiene letras que traducir.",
        (NoLetters, De) => "Der Text enthält keine übersetzbaren Buchstaben.",
        (NoLetters, Fr) => "Le texte ne contient aucune lettre à traduire.",
        (TooLong, Ko) => "텍스트가 너무 깁니다. 5000자 이하로 입력해 주세요.",
        (TooLong, En) => "The text is too long. Please keep it under 5000 characters.",
        (TooLong, Ja) => "テキストが長すぎます。5000文字以内で入力してください。",
        (TooLong, ZhHans) => "文本过长，请控制在5000字以内。",
        (TooLong, ZhHant) => "文字過長，請控制在5000字以內。",
        (TooLong, Es) => "El texto es demasiado largo. Máximo 5000 caracteres.",
        (TooLong, De) => "Der Text ist zu lang. Maximal 5000 Zeichen.",
        (TooLong, Fr) => "Le texte est trop long. 5000 caractères maximum.",
    }
}

/// Shown when the model says the input cannot be translated.
pub fn untranslatable_message(lang: TargetLang) -> &'static str {
    match lang {
        TargetLang::Ko => "번역할 수 없는 텍스트입니다.",
        TargetLang::En => "This text could not be translated.",
        TargetLang::Ja => "このテキストは翻訳できませんでした。",
        TargetLang::ZhHans => "无法翻译此文本。",
        TargetLang::ZhHant => "無法翻譯此文字。",
        TargetLang::Es => "No se pudo traducir este texto.",
        TargetLang::De => "Dieser Text konnte nicht übersetzt werden.",
        TargetLang::Fr => "Ce texte n'a pas pu être traduit.",
    }
}

/// Shown when the translator itself failed (error, timeout, blank output).
pub fn failure_message(lang: TargetLang) -> &'static str {
    match lang {
        TargetLang::Ko => "번역 중 오류가 발생했습니다. 잠시 후 다시 시도해 주세요.",
        TargetLang::En => "Translation failed. Please try again later.",
        TargetLang::Ja => "翻訳中にエラーが発生しました。しばらくしてから再度お試しください。",
        TargetLang::ZhHans => "翻译失败，请稍后再试。",
        TargetLang::ZhHant => "翻譯失敗，請稍後再試。",
        TargetLang::Es => "La traducción ha fallado. Inténtalo de nuevo más tarde.",
        TargetLang::De => "Die Übersetzung ist fehlgeschlagen. Bitte versuche es später erneut.",
        TargetLang::Fr => "La traduction a échoué. Veuillez réessayer plus tard.",
    }
}

/// Lowercase with whitespace runs collapsed, for echo comparison.
pub fn normalize_for_compare(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Remove matching quote pairs wrapping the whole text.
pub fn strip_wrapping_quotes(text: &str) -> &str {
    let mut current = text.trim();
    loop {
        let mut chars = current.chars();
        let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
            return current;
        };
        let wrapped = QUOTE_PAIRS
            .iter()
            .any(|&(open, close)| first == open && last == close);
        if !wrapped {
            return current;
        }
        current = current[first.len_utf8()..current.len() - last.len_utf8()].trim();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    Translated,
    /// Model emitted the untranslatable sentinel.
    Untranslatable,
    /// Blank output or a failure marker.
    Failed,
    /// Output repeated the input.
    Echoed,
    /// Jamo-only input returned verbatim after a sentinel.
    JamoFallback,
}

#[derive(Debug, Clone)]
pub struct PostProcessed {
    /// Text to return to the caller.
    pub text: String,
    /// Model output after quote stripping, before any substitution.
    pub cleaned: String,
    pub outcome: PostOutcome,
}

impl PostProcessed {
    /// Outcomes whose model output is worth verifying.
    pub fn is_verifiable(&self) -> bool {
        matches!(self.outcome, PostOutcome::Translated | PostOutcome::Echoed)
    }
}

/// Clean one raw model response for `original`.
pub fn post_process(raw: &str, original: &str, target: TargetLang) -> PostProcessed {
    let cleaned = strip_wrapping_quotes(raw).to_string();
    let jamo_input = is_jamo_only(original);

    let (text, outcome) = if cleaned.contains(UNTRANSLATABLE_SENTINEL) {
        if jamo_input {
            (original.trim().to_string(), PostOutcome::JamoFallback)
        } else {
            (untranslatable_message(target).to_string(), PostOutcome::Untranslatable)
        }
    } else if cleaned.is_empty() || FAILURE_MARKERS.iter().any(|m| cleaned.contains(m)) {
        (failure_message(target).to_string(), PostOutcome::Failed)
    } else if !jamo_input && normalize_for_compare(&cleaned) == normalize_for_compare(original) {
        (untranslatable_message(target).to_string(), PostOutcome::Echoed)
    } else {
        (cleaned.clone(), PostOutcome::Translated)
    };

    PostProcessed {
        text,
        cleaned,
        outcome,
    }
}

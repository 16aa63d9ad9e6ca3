//! Output verification and consistency against approved translations.

use std::collections::HashSet;

use serde::Serialize;

use crate::glossary::tokenizer::split_words;
use crate::history::ApprovedTranslation;
use crate::language::{detect_language, TargetLang};
use crate::translate::normalize::normalize_for_compare;

const ORIGINAL_RETURNED_MIN_CHARS: usize = 3;
pub const CONSISTENCY_THRESHOLD: f64 = 0.7;
pub const MAX_CONSISTENCY_ISSUES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    EmptyResult,
    OriginalReturned,
    LanguageMismatch,
    GlossaryMismatch,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::EmptyResult => "EMPTY_RESULT",
            IssueKind::OriginalReturned => "ORIGINAL_RETURNED",
            IssueKind::LanguageMismatch => "LANGUAGE_MISMATCH",
            IssueKind::GlossaryMismatch => "GLOSSARY_MISMATCH",
        }
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, IssueKind::EmptyResult | IssueKind::OriginalReturned)
    }

    pub fn is_retriable(&self) -> bool {
        !matches!(self, IssueKind::LanguageMismatch)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl VerificationIssue {
    fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationResult {
    /// False only when a blocking issue is present.
    pub passed: bool,
    pub issues: Vec<VerificationIssue>,
    pub should_retry: bool,
}

impl VerificationResult {
    pub fn has(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }

    /// Issue codes for history storage.
    pub fn issue_codes(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.kind.as_str().to_string()).collect()
    }
}

/// A glossary term the output is expected to carry.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedTerm {
    pub source: String,
    pub expected: String,
}

pub fn verify(
    original: &str,
    translated: &str,
    target: TargetLang,
    terms: &[ExpectedTerm],
) -> VerificationResult {
    let mut issues = Vec::new();
    let output = translated.trim();

    if output.is_empty() {
        issues.push(VerificationIssue::new(
            IssueKind::EmptyResult,
            "translation is empty",
        ));
    } else {
        let normalized_original = normalize_for_compare(original);
        if normalized_original.chars().count() > ORIGINAL_RETURNED_MIN_CHARS
            && normalize_for_compare(output) == normalized_original
        {
            issues.push(VerificationIssue::new(
                IssueKind::OriginalReturned,
                "translation is identical to the source text",
            ));
        }

        let detected = detect_language(output);
        if !target.accepts_detected(detected, output.chars().count()) {
            issues.push(VerificationIssue::new(
                IssueKind::LanguageMismatch,
                format!("output looks like {detected}, expected {target}"),
            ));
        }

        let lowered = output.to_lowercase();
        for term in terms {
            let expected = term.expected.trim();
            if !expected.is_empty() && !lowered.contains(&expected.to_lowercase()) {
                issues.push(VerificationIssue::new(
                    IssueKind::GlossaryMismatch,
                    format!("'{}' should be translated as '{}'", term.source, expected),
                ));
            }
        }
    }

    VerificationResult {
        passed: !issues.iter().any(|i| i.kind.is_blocking()),
        should_retry: issues.iter().any(|i| i.kind.is_retriable()),
        issues,
    }
}

/// Lowercased word set used for overlap scoring.
pub fn word_set(text: &str) -> HashSet<String> {
    split_words(&text.to_lowercase()).into_iter().collect()
}

/// Shared words over the larger word count, in [0, 1].
pub fn word_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let denominator = a.len().max(b.len());
    if denominator == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / denominator as f64
}

/// Advisory: a near-identical approved source translated differently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyIssue {
    pub existing_source: String,
    pub existing_translation: String,
    pub new_source: String,
    pub new_translation: String,
    pub similarity: f64,
}

pub fn check_consistency(
    source: &str,
    translation: &str,
    approved: &[ApprovedTranslation],
) -> Vec<ConsistencyIssue> {
    let source_words = word_set(source);
    let normalized_translation = normalize_for_compare(translation);

    let mut issues: Vec<ConsistencyIssue> = approved
        .iter()
        .filter_map(|a| {
            let similarity = word_similarity(&source_words, &word_set(&a.source_text));
            let differs = normalize_for_compare(&a.approved_text) != normalized_translation;
            (similarity >= CONSISTENCY_THRESHOLD && differs).then(|| ConsistencyIssue {
                existing_source: a.source_text.clone(),
                existing_translation: a.approved_text.clone(),
                new_source: source.to_string(),
                new_translation: translation.to_string(),
                similarity,
            })
        })
        .collect();
    issues.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    issues.truncate(MAX_CONSISTENCY_ISSUES);
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approved(source: &str, text: &str) -> ApprovedTranslation {
        ApprovedTranslation {
            id: 0,
            source_hash: String::new(),
            target_lang: "en".into(),
            source_text: source.into(),
            approved_text: text.into(),
            usage_count: 0,
            approval_count: 1,
            quality_score: 1.0,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_clean_translation_passes() {
        let result = verify("공식 굿즈", "Official goods", TargetLang::En, &[]);
        assert!(result.passed);
        assert!(!result.should_retry);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_original_returned_blocks_and_retries() {
        let result = verify("Hello World", " hello   world ", TargetLang::Ja, &[]);
        assert!(!result.passed);
        assert!(result.should_retry);
        assert!(result.has(IssueKind::OriginalReturned));
    }

    #[test]
    fn test_short_original_not_flagged() {
        let result = verify("abc", "abc", TargetLang::En, &[]);
        assert!(!result.has(IssueKind::OriginalReturned));
    }

    #[test]
    fn test_empty_result() {
        let result = verify("안녕하세요", "  ", TargetLang::En, &[]);
        assert!(!result.passed);
        assert!(result.should_retry);
        assert_eq!(result.issue_codes(), vec!["EMPTY_RESULT"]);
    }

    #[test]
    fn test_language_mismatch_is_informational() {
        let result = verify("공식 굿즈", "公式商品です", TargetLang::En, &[]);
        assert!(result.has(IssueKind::LanguageMismatch));
        assert!(result.passed);
        assert!(!result.should_retry);
    }

    #[test]
    fn test_glossary_mismatch_retries_without_failing() {
        let terms = vec![ExpectedTerm {
            source: "응원봉".into(),
            expected: "Light Stick".into(),
        }];
        let missing = verify("응원봉 구매", "Buy a glow wand", TargetLang::En, &terms);
        assert!(missing.passed);
        assert!(missing.should_retry);
        assert!(missing.has(IssueKind::GlossaryMismatch));

        let present = verify("응원봉 구매", "Buy a light stick", TargetLang::En, &terms);
        assert!(!present.has(IssueKind::GlossaryMismatch));
    }

    #[test]
    fn test_similarity() {
        let a = word_set("공식 굿즈 판매");
        let b = word_set("공식 굿즈 예약");
        assert!((word_similarity(&a, &b) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(word_similarity(&HashSet::new(), &b), 0.0);
    }

    #[test]
    fn test_consistency_reports_divergent_pairs() {
        let pool = vec![
            approved("공식 굿즈 판매 안내", "Official goods sale notice"),
            approved("공식 굿즈 판매 안내", "official goods sale notice"),
            approved("배송 안내", "Shipping notice"),
        ];
        let issues = check_consistency("공식 굿즈 판매 안내", "Official merch sale info", &pool);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].similarity, 1.0);

        let none = check_consistency("공식 굿즈 판매 안내", "Official goods sale notice", &pool);
        assert!(none.is_empty());
    }

    #[test]
    fn test_consistency_caps_results() {
        let pool: Vec<_> = (0..5)
            .map(|i| approved("공식 굿즈 판매", &format!("variant {i}")))
            .collect();
        assert_eq!(check_consistency("공식 굿즈 판매", "new", &pool).len(), 3);
    }
}

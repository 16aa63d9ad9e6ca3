//! Translation decision pipeline.
//! Request and result types, the LLM backend seam, and the strategy ladder:
//! validation, approved cache, slang, glossary direct, then LLM with or
//! without glossary hints.

pub mod batch;
pub mod cache;
pub mod chat_client;
pub mod normalize;
pub mod orchestrator;
pub mod prompts;
pub mod verify;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::korean::Tone;
use crate::language::{SourceLang, TargetLang};

pub use normalize::ValidationReason;
pub use orchestrator::Translator;
pub use verify::{ConsistencyIssue, IssueKind, VerificationIssue, VerificationResult};

/// Prompt pair sent to the text generator.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_output_tokens: u32,
    /// Ask the backend for a JSON object (batch mode).
    pub json_output: bool,
}

/// Text generator behind the pipeline. Always fallible.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Which rung of the decision ladder produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TranslationStrategy {
    ValidationError,
    ApprovedCache,
    SlangDecode,
    GlossaryDirect,
    RagAssisted,
    LlmPrimary,
}

impl TranslationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationStrategy::ValidationError => "VALIDATION_ERROR",
            TranslationStrategy::ApprovedCache => "APPROVED_CACHE",
            TranslationStrategy::SlangDecode => "SLANG_DECODE",
            TranslationStrategy::GlossaryDirect => "GLOSSARY_DIRECT",
            TranslationStrategy::RagAssisted => "RAG_ASSISTED",
            TranslationStrategy::LlmPrimary => "LLM_PRIMARY",
        }
    }
}

impl fmt::Display for TranslationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    pub target_lang: TargetLang,
    #[serde(default)]
    pub page_url: Option<String>,
    /// Skips detection when set.
    #[serde(default)]
    pub source_lang: Option<SourceLang>,
}

impl TranslateRequest {
    pub fn new(text: impl Into<String>, target_lang: TargetLang) -> Self {
        Self {
            text: text.into(),
            target_lang,
            page_url: None,
            source_lang: None,
        }
    }

    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = Some(page_url.into());
        self
    }

    pub fn with_source_lang(mut self, source_lang: SourceLang) -> Self {
        self.source_lang = Some(source_lang);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTranslateRequest {
    pub text: String,
    pub target_langs: Vec<TargetLang>,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub source_lang: Option<SourceLang>,
}

/// Outcome of one translation. Always well-formed, even when degraded.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationResult {
    pub original_text: String,
    pub translated_text: String,
    pub source_lang: SourceLang,
    pub target_lang: TargetLang,
    /// Page context used for prompting and boosting.
    pub context_used: Option<String>,
    pub matched_glossary_ids: Vec<i64>,
    pub match_scores: Vec<f64>,
    pub history_id: Option<i64>,
    pub is_from_cache: bool,
    pub translation_strategy: TranslationStrategy,
    pub detected_tone: Option<Tone>,
    pub is_validation_error: bool,
    pub validation_reason: Option<ValidationReason>,
    /// Slang intensity when decoded from the slang table.
    pub slang_intensity: Option<String>,
    pub verification_issues: Vec<VerificationIssue>,
    pub consistency_issues: Vec<ConsistencyIssue>,
}

impl TranslationResult {
    pub(crate) fn new(
        original_text: &str,
        translated_text: String,
        source_lang: SourceLang,
        target_lang: TargetLang,
        strategy: TranslationStrategy,
    ) -> Self {
        Self {
            original_text: original_text.to_string(),
            translated_text,
            source_lang,
            target_lang,
            context_used: None,
            matched_glossary_ids: Vec::new(),
            match_scores: Vec::new(),
            history_id: None,
            is_from_cache: false,
            translation_strategy: strategy,
            detected_tone: None,
            is_validation_error: false,
            validation_reason: None,
            slang_intensity: None,
            verification_issues: Vec::new(),
            consistency_issues: Vec::new(),
        }
    }
}

/// Per-language results of one batch request, in request order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchTranslationResult {
    pub original_text: String,
    pub source_lang: SourceLang,
    pub results: Vec<TranslationResult>,
}

impl BatchTranslationResult {
    pub fn get(&self, lang: TargetLang) -> Option<&TranslationResult> {
        self.results.iter().find(|r| r.target_lang == lang)
    }
}

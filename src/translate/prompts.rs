//! Prompt construction for single, retry and batch calls.

use std::fmt::Write as _;

use crate::korean::Tone;
use crate::language::{SourceLang, TargetLang};
use crate::translate::normalize::UNTRANSLATABLE_SENTINEL;
use crate::translate::verify::VerificationIssue;
use crate::translate::CompletionRequest;

/// Glossary term injected as terminology guidance.
#[derive(Debug, Clone, PartialEq)]
pub struct GlossaryHint {
    pub source: String,
    pub target: String,
}

/// Previously approved pair shown to the model as an example.
#[derive(Debug, Clone, PartialEq)]
pub struct FewShotExample {
    pub source: String,
    pub translation: String,
}

/// Everything a prompt can carry besides the text itself.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub tone: Option<Tone>,
    pub page_description: Option<String>,
    pub glossary: Vec<GlossaryHint>,
    pub few_shots: Vec<FewShotExample>,
}

const KOREAN_SYSTEM_PROMPT: &str = "You are a professional Korean translator for a K-pop fandom \
commerce platform (official merchandise, albums, memberships, fan events). Translate the user's \
Korean text naturally for fans. Keep artist names, group names and product codes as they are. \
Korean internet slang and jamo-only expressions (ㅋㅋ, ㅠㅠ, ㄱㅅ) must be rendered by meaning, \
not transliterated. Output only the translation, nothing else.";

const FOREIGN_SYSTEM_PROMPT: &str = "You are a professional translator for a K-pop fandom \
commerce platform (official merchandise, albums, memberships, fan events). Keep artist names, \
group names and product codes as they are. Output only the translation, nothing else.";

fn untranslatable_rule() -> String {
    format!(
        "If the input has no translatable meaning, output exactly {UNTRANSLATABLE_SENTINEL} and nothing else."
    )
}

/// Estimate max_tokens from input size, capped by `ceiling`.
pub fn estimate_max_tokens(text: &str, languages: usize, ceiling: u32) -> u32 {
    // CJK-heavy input runs close to one token per char on the way out.
    let chars = text.chars().count() as f64;
    let per_language = chars * 2.0 * 1.15 + 32.0;
    let estimate = (per_language * languages.max(1) as f64 + 16.0) as u32;
    estimate.clamp(64, ceiling.max(64))
}

fn system_prompt(source: SourceLang, targets: &[TargetLang], ctx: &PromptContext) -> String {
    let mut prompt = if source == SourceLang::Ko {
        KOREAN_SYSTEM_PROMPT.to_string()
    } else {
        format!(
            "{FOREIGN_SYSTEM_PROMPT} The source text is written in {}.",
            source.display_name()
        )
    };
    let names: Vec<&str> = targets.iter().map(|t| t.display_name()).collect();
    let _ = write!(prompt, "\nTarget language: {}.", names.join(", "));
    let _ = write!(prompt, "\n{}", untranslatable_rule());

    if let Some(hint) = ctx.tone.and_then(Tone::prompt_hint) {
        let _ = write!(prompt, "\n{hint}");
    }
    if let Some(description) = &ctx.page_description {
        let _ = write!(prompt, "\nPage context: {description}.");
    }
    if !ctx.glossary.is_empty() {
        prompt.push_str("\nUse these glossary terms exactly when they appear:");
        for hint in &ctx.glossary {
            let _ = write!(prompt, "\n- {} => {}", hint.source, hint.target);
        }
    }
    if !ctx.few_shots.is_empty() {
        prompt.push_str("\nApproved translations of similar text:");
        for example in &ctx.few_shots {
            let _ = write!(prompt, "\n- {} => {}", example.source, example.translation);
        }
    }
    prompt
}

pub fn build_single(
    text: &str,
    source: SourceLang,
    target: TargetLang,
    ctx: &PromptContext,
    ceiling: u32,
) -> CompletionRequest {
    CompletionRequest {
        system_prompt: system_prompt(source, &[target], ctx),
        user_prompt: format!(
            "Translate from {} to {}:\n\n{}",
            source.display_name(),
            target.display_name(),
            text.trim()
        ),
        max_output_tokens: estimate_max_tokens(text, 1, ceiling),
        json_output: false,
    }
}

/// Corrective prompt listing what the previous attempt got wrong.
pub fn build_retry(
    text: &str,
    source: SourceLang,
    target: TargetLang,
    ctx: &PromptContext,
    previous: &str,
    issues: &[VerificationIssue],
    ceiling: u32,
) -> CompletionRequest {
    let mut user = format!(
        "Translate from {} to {}:\n\n{}\n\nA previous attempt produced:\n{}\n\nFix these issues:",
        source.display_name(),
        target.display_name(),
        text.trim(),
        previous.trim()
    );
    for issue in issues {
        let _ = write!(user, "\n- {}: {}", issue.kind.as_str(), issue.message);
    }
    if !ctx.glossary.is_empty() {
        user.push_str("\nRequired terminology:");
        for hint in &ctx.glossary {
            let _ = write!(user, "\n- {} => {}", hint.source, hint.target);
        }
    }
    CompletionRequest {
        system_prompt: system_prompt(source, &[target], ctx),
        user_prompt: user,
        max_output_tokens: estimate_max_tokens(text, 1, ceiling),
        json_output: false,
    }
}

/// One call for many targets; the answer is a JSON object keyed by code.
pub fn build_batch(
    text: &str,
    source: SourceLang,
    targets: &[TargetLang],
    ctx: &PromptContext,
    ceiling: u32,
) -> CompletionRequest {
    let codes: Vec<&str> = targets.iter().map(|t| t.code()).collect();
    let mut system = system_prompt(source, targets, ctx);
    let _ = write!(
        system,
        "\nRespond with a single JSON object whose keys are exactly these language codes: {}. \
         Each value is the translation into that language.",
        serde_json::to_string(&codes).unwrap_or_default()
    );
    CompletionRequest {
        system_prompt: system,
        user_prompt: format!("Translate from {}:\n\n{}", source.display_name(), text.trim()),
        max_output_tokens: estimate_max_tokens(text, targets.len(), ceiling * targets.len().max(1) as u32),
        json_output: true,
    }
}

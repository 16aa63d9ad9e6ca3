//! Multi-target translation in one LLM call.
//!
//! Detection, validation, tone and glossary search run once. Each language
//! then gets its own cache, slang and glossary-direct shot; whatever is left
//! goes out as a single JSON request keyed by language code. Batch output is
//! verified for reporting only and never retried.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::language::TargetLang;
use crate::metrics::{self, Stage, Stopwatch};
use crate::translate::normalize::{failure_message, post_process, PostOutcome, PostProcessed};
use crate::translate::orchestrator::{validation_result, GlossaryContext, Input};
use crate::translate::prompts::{self, GlossaryHint, PromptContext};
use crate::translate::verify::{check_consistency, verify};
use crate::translate::{
    BatchTranslateRequest, BatchTranslationResult, TranslationResult, Translator,
};

/// Pull a language-keyed object out of a model response. Tolerates code
/// fences and chatter around the object. Non-string values are ignored.
pub fn parse_batch_response(raw: &str) -> Option<HashMap<TargetLang, String>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    let object: HashMap<String, Value> = serde_json::from_str(&raw[start..=end]).ok()?;
    let parsed: HashMap<TargetLang, String> = object
        .into_iter()
        .filter_map(|(key, value)| {
            let lang = key.parse::<TargetLang>().ok()?;
            let text = value.as_str()?.to_string();
            Some((lang, text))
        })
        .collect();
    Some(parsed)
}

/// Keep the first occurrence of every language.
fn dedup_targets(targets: &[TargetLang]) -> Vec<TargetLang> {
    let mut seen = Vec::with_capacity(targets.len());
    for &lang in targets {
        if !seen.contains(&lang) {
            seen.push(lang);
        }
    }
    seen
}

/// One hint line per term carrying every requested translation.
fn batch_hints(
    translator: &Translator,
    input: &Input,
    glossary: &GlossaryContext,
    targets: &[TargetLang],
) -> Vec<GlossaryHint> {
    let mut merged: Vec<(String, Vec<String>)> = Vec::new();
    for &lang in targets {
        let (hints, _) = translator.glossary_hints(input, glossary, lang);
        for hint in hints {
            let line = format!("{}: {}", lang.code(), hint.target);
            match merged.iter_mut().find(|(source, _)| *source == hint.source) {
                Some((_, lines)) => lines.push(line),
                None => merged.push((hint.source, vec![line])),
            }
        }
    }
    merged
        .into_iter()
        .map(|(source, lines)| GlossaryHint {
            source,
            target: lines.join("; "),
        })
        .collect()
}

impl Translator {
    /// Translate one text into several languages. Results follow the request
    /// order with duplicates removed.
    pub async fn translate_batch(&self, request: &BatchTranslateRequest) -> BatchTranslationResult {
        let watch = Stopwatch::start();
        let request_id = metrics::request_id();
        let targets = dedup_targets(&request.target_langs);

        let input = match self.prepare(&request.text, request.source_lang, request.page_url.as_deref()) {
            Ok(input) => input,
            Err((source, reason)) => {
                let results: Vec<TranslationResult> = targets
                    .iter()
                    .map(|&lang| validation_result(&request.text, source, reason, lang))
                    .collect();
                for result in &results {
                    self.metrics.record_strategy(result.translation_strategy, None);
                }
                self.metrics.observe(Stage::Batch, watch.elapsed_us());
                return BatchTranslationResult {
                    original_text: request.text.clone(),
                    source_lang: source,
                    results,
                };
            }
        };

        let glossary = self.glossary_context(&input);
        let mut resolved: HashMap<TargetLang, TranslationResult> = HashMap::new();
        let mut remaining = Vec::new();
        for &lang in &targets {
            let early = self
                .cached_or_slang(&input, lang)
                .or_else(|| self.glossary_direct(&input, &glossary, lang));
            match early {
                Some(result) => {
                    resolved.insert(lang, result);
                }
                None => remaining.push(lang),
            }
        }

        if !remaining.is_empty() {
            for result in self.batch_llm(&input, &glossary, &remaining).await {
                resolved.insert(result.target_lang, result);
            }
        }

        let results: Vec<TranslationResult> = targets
            .iter()
            .filter_map(|lang| resolved.remove(lang))
            .collect();
        for result in &results {
            self.metrics.record_strategy(result.translation_strategy, None);
        }
        let elapsed_us = watch.elapsed_us();
        self.metrics.observe(Stage::Batch, elapsed_us);
        debug!(
            request_id,
            languages = targets.len(),
            llm_languages = remaining.len(),
            elapsed_ms = elapsed_us / 1000,
            "batch translation finished"
        );
        BatchTranslationResult {
            original_text: input.text.clone(),
            source_lang: input.source,
            results,
        }
    }

    async fn batch_llm(
        &self,
        input: &Input,
        glossary: &GlossaryContext,
        targets: &[TargetLang],
    ) -> Vec<TranslationResult> {
        let ctx = PromptContext {
            tone: input.tone,
            page_description: glossary.page_description(),
            glossary: batch_hints(self, input, glossary, targets),
            few_shots: Vec::new(),
        };
        let request = prompts::build_batch(
            &input.text,
            input.source,
            targets,
            &ctx,
            self.settings.max_output_tokens,
        );
        let timeout = self.settings.batch_timeout(targets.len());

        let raw = match self.call_llm(&request, timeout, Stage::LlmCall).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, languages = targets.len(), "batch LLM call failed");
                return targets
                    .iter()
                    .map(|&lang| self.batch_result(input, glossary, lang, None))
                    .collect();
            }
        };

        let mut parsed = match parse_batch_response(&raw) {
            Some(parsed) => parsed,
            None if targets.len() == 1 => {
                debug!("batch response is not JSON, using raw text");
                HashMap::from([(targets[0], raw.clone())])
            }
            None => {
                warn!(languages = targets.len(), "batch response could not be parsed");
                HashMap::new()
            }
        };

        targets
            .iter()
            .map(|&lang| {
                let output = parsed
                    .remove(&lang)
                    .map(|text| post_process(&text, &input.text, lang));
                self.batch_result(input, glossary, lang, output)
            })
            .collect()
    }

    /// Result for one language of a batch call. `None` means the language got
    /// no usable output.
    fn batch_result(
        &self,
        input: &Input,
        glossary: &GlossaryContext,
        lang: TargetLang,
        output: Option<PostProcessed>,
    ) -> TranslationResult {
        let strategy = glossary.strategy();
        let Some(output) = output else {
            let mut result =
                self.base_result(input, lang, failure_message(lang).to_string(), strategy);
            self.attach_glossary(&mut result, glossary);
            result.history_id = self.record_history(input, &result, None);
            return result;
        };

        let (_, expected) = self.glossary_hints(input, glossary, lang);
        let verification = output
            .is_verifiable()
            .then(|| verify(&input.text, &output.cleaned, lang, &expected));

        let mut result = self.base_result(input, lang, output.text.clone(), strategy);
        self.attach_glossary(&mut result, glossary);
        if let Some(check) = &verification {
            result.verification_issues = check.issues.clone();
        }
        if output.outcome == PostOutcome::Translated {
            let pool = self.approved_pool(lang);
            result.consistency_issues = check_consistency(&input.text, &output.text, &pool);
        }
        result.history_id = self.record_history(input, &result, verification.as_ref());
        self.schedule_extraction(input, &output, lang);
        result
    }
}

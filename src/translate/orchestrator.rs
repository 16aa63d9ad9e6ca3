//! The decision pipeline. Strategies are tried in order and the first one
//! that applies wins:
//! VALIDATION_ERROR → APPROVED_CACHE → SLANG_DECODE → GLOSSARY_DIRECT →
//! RAG_ASSISTED / LLM_PRIMARY.
//! `translate` never fails: store and LLM errors degrade the result and are
//! logged.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::LlmError;
use crate::glossary::search::{MatchType, SearchResult, EXACT_SCORE};
use crate::glossary::{context_description, detect_context, GlossarySearch};
use crate::history::{source_hash, ApprovedTranslation, HistoryRecord};
use crate::korean::{detect_tone, is_jamo_only, SlangDictionary, Tone};
use crate::language::{detect_language, SourceLang, TargetLang};
use crate::metrics::{self, Event, MetricsRegistry, Stage, Stopwatch};
use crate::scheduler::{ExtractionScheduler, ExtractionTask};
use crate::state_machine::{AttemptMachine, AttemptState};
use crate::store::Store;
use crate::translate::cache::ApprovedCache;
use crate::translate::normalize::{
    failure_message, post_process, validate, validation_message, PostOutcome, PostProcessed,
    ValidationReason,
};
use crate::translate::prompts::{self, FewShotExample, GlossaryHint, PromptContext};
use crate::translate::verify::{
    check_consistency, verify, word_set, ExpectedTerm, VerificationResult,
};
use crate::translate::{
    CompletionRequest, LlmBackend, TranslateRequest, TranslationResult, TranslationStrategy,
};

/// Tunables taken from `AppConfig`.
#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    pub search_limit: usize,
    pub min_candidate_score: f64,
    pub few_shot_examples: usize,
    pub consistency_pool: usize,
    pub llm_timeout: Duration,
    pub batch_timeout_per_lang: Duration,
    pub max_output_tokens: u32,
    pub extraction_enabled: bool,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl TranslatorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            search_limit: config.search.limit,
            min_candidate_score: config.search.min_candidate_score,
            few_shot_examples: config.search.few_shot_examples,
            consistency_pool: config.search.consistency_pool,
            llm_timeout: config.llm.timeout(),
            batch_timeout_per_lang: Duration::from_secs(config.llm.batch_timeout_per_lang_secs),
            max_output_tokens: config.llm.max_output_tokens,
            extraction_enabled: config.extraction.enabled,
        }
    }

    pub(super) fn batch_timeout(&self, languages: usize) -> Duration {
        self.llm_timeout + self.batch_timeout_per_lang * languages.saturating_sub(1) as u32
    }
}

/// Validated input shared by every strategy.
#[derive(Debug, Clone)]
pub(super) struct Input {
    pub text: String,
    pub source: SourceLang,
    pub hash: String,
    pub page_url: Option<String>,
    pub tone: Option<Tone>,
}

/// Glossary context computed once per request.
#[derive(Debug, Clone)]
pub(super) struct GlossaryContext {
    pub results: Vec<SearchResult>,
    /// Results at or above the prompt-hint threshold.
    pub candidates: Vec<SearchResult>,
    pub context: Option<String>,
}

impl GlossaryContext {
    pub fn strategy(&self) -> TranslationStrategy {
        if self.candidates.is_empty() {
            TranslationStrategy::LlmPrimary
        } else {
            TranslationStrategy::RagAssisted
        }
    }

    pub fn page_description(&self) -> Option<String> {
        self.context
            .as_deref()
            .and_then(context_description)
            .map(str::to_string)
    }

    fn match_ids(&self) -> Vec<i64> {
        self.candidates.iter().map(|r| r.entry.id).collect()
    }

    fn match_scores(&self) -> Vec<f64> {
        self.candidates.iter().map(|r| r.score).collect()
    }
}

pub struct Translator {
    pub(super) store: Arc<Store>,
    pub(super) search: GlossarySearch,
    pub(super) slang: Arc<SlangDictionary>,
    pub(super) llm: Option<Arc<dyn LlmBackend>>,
    pub(super) cache: Arc<ApprovedCache>,
    pub(super) extraction: Option<Arc<ExtractionScheduler>>,
    pub(super) metrics: Arc<MetricsRegistry>,
    pub(super) settings: TranslatorSettings,
}

impl Translator {
    /// Pipeline over `store` with the built-in slang table and default settings.
    /// Without an LLM backend every LLM-bound request degrades to the
    /// localized failure message.
    pub fn new(store: Arc<Store>, llm: Option<Arc<dyn LlmBackend>>) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let config = AppConfig::default();
        Self {
            search: GlossarySearch::new(Arc::clone(&store)).with_metrics(Arc::clone(&metrics)),
            store,
            slang: Arc::new(SlangDictionary::builtin()),
            llm,
            cache: Arc::new(ApprovedCache::new(config.cache.capacity, config.cache.ttl())),
            extraction: None,
            metrics,
            settings: TranslatorSettings::from_config(&config),
        }
    }

    pub fn with_slang(mut self, slang: Arc<SlangDictionary>) -> Self {
        self.slang = slang;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ApprovedCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.search = GlossarySearch::new(Arc::clone(&self.store)).with_metrics(Arc::clone(&metrics));
        self.metrics = metrics;
        self
    }

    pub fn with_extraction(mut self, scheduler: Arc<ExtractionScheduler>) -> Self {
        self.extraction = Some(scheduler);
        self
    }

    pub fn with_settings(mut self, settings: TranslatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn cache(&self) -> &Arc<ApprovedCache> {
        &self.cache
    }

    /// Translate one text into one language.
    pub async fn translate(&self, request: &TranslateRequest) -> TranslationResult {
        let watch = Stopwatch::start();
        let request_id = metrics::request_id();
        let target = request.target_lang;

        let input = match self.prepare(&request.text, request.source_lang, request.page_url.as_deref()) {
            Ok(input) => input,
            Err((source, reason)) => {
                let result = validation_result(&request.text, source, reason, target);
                return self.finish(result, watch, &request_id);
            }
        };

        if let Some(result) = self.cached_or_slang(&input, target) {
            return self.finish(result, watch, &request_id);
        }

        let glossary = self.glossary_context(&input);
        if let Some(result) = self.glossary_direct(&input, &glossary, target) {
            return self.finish(result, watch, &request_id);
        }

        let result = self.translate_with_llm(&input, &glossary, target).await;
        self.finish(result, watch, &request_id)
    }

    /// Detect the source and validate.
    pub(super) fn prepare(
        &self,
        text: &str,
        source_lang: Option<SourceLang>,
        page_url: Option<&str>,
    ) -> Result<Input, (SourceLang, ValidationReason)> {
        let trimmed = text.trim();
        let source = source_lang.unwrap_or_else(|| detect_language(trimmed));
        if let Err(reason) = validate(text) {
            debug!(reason = reason.as_str(), "input rejected");
            return Err((source, reason));
        }
        Ok(Input {
            text: trimmed.to_string(),
            source,
            hash: source_hash(trimmed),
            page_url: page_url
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            tone: (source == SourceLang::Ko).then(|| detect_tone(trimmed)),
        })
    }

    /// APPROVED_CACHE, then SLANG_DECODE.
    pub(super) fn cached_or_slang(&self, input: &Input, target: TargetLang) -> Option<TranslationResult> {
        if let Some(approved) = self.lookup_approved(&input.hash, target) {
            if let Err(e) = self.store.increment_approved_usage(approved.id) {
                warn!(error = %e, "approved usage increment failed");
            }
            let mut result = self.base_result(
                input,
                target,
                approved.approved_text.clone(),
                TranslationStrategy::ApprovedCache,
            );
            result.is_from_cache = true;
            result.history_id = self.record_history(input, &result, None);
            return Some(result);
        }

        if input.source == SourceLang::Ko && is_jamo_only(&input.text) {
            if let Some(hit) = self.slang.lookup(&input.text, target) {
                let mut result = self.base_result(
                    input,
                    target,
                    hit.translated_text,
                    TranslationStrategy::SlangDecode,
                );
                result.slang_intensity = Some(hit.intensity);
                result.history_id = self.record_history(input, &result, None);
                return Some(result);
            }
        }
        None
    }

    /// L1 cache first, then the store. Store hits warm the cache.
    fn lookup_approved(&self, hash: &str, target: TargetLang) -> Option<ApprovedTranslation> {
        if let Some(hit) = self.cache.get(hash, target.code()) {
            return Some(hit);
        }
        match self.store.find_approved(hash, target.code()) {
            Ok(Some(approved)) => {
                self.cache.insert(approved.clone());
                Some(approved)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "approved translation lookup failed");
                None
            }
        }
    }

    pub(super) fn glossary_context(&self, input: &Input) -> GlossaryContext {
        let limit = self.settings.search_limit;
        let page_url = input.page_url.as_deref();
        let results = if input.source == SourceLang::Ko {
            self.search.search(&input.text, page_url, limit)
        } else {
            self.search
                .search_by_language(&input.text, input.source, page_url, limit)
        };
        let candidates = results
            .iter()
            .filter(|r| r.score >= self.settings.min_candidate_score)
            .cloned()
            .collect();
        GlossaryContext {
            results,
            candidates,
            context: input
                .page_url
                .clone()
                .or_else(|| detect_context(&input.text).map(str::to_string)),
        }
    }

    /// GLOSSARY_DIRECT: Korean source, a single pure exact match, and a
    /// non-blank translation for `target`.
    pub(super) fn glossary_direct(
        &self,
        input: &Input,
        glossary: &GlossaryContext,
        target: TargetLang,
    ) -> Option<TranslationResult> {
        if input.source != SourceLang::Ko {
            return None;
        }
        let mut exact = glossary
            .results
            .iter()
            .filter(|r| r.match_type == MatchType::Exact && r.base_score == EXACT_SCORE);
        let hit = exact.next()?;
        if exact.next().is_some() {
            return None;
        }
        let translation = hit.entry.best_translation(target);
        if translation.is_empty() {
            return None;
        }

        let mut result = self.base_result(
            input,
            target,
            translation.to_string(),
            TranslationStrategy::GlossaryDirect,
        );
        result.context_used = glossary.context.clone();
        result.matched_glossary_ids = vec![hit.entry.id];
        result.match_scores = vec![hit.score];
        result.history_id = self.record_history(input, &result, None);
        Some(result)
    }

    /// Glossary hints for the prompt, and the subset of terms present in the
    /// input that the output is expected to carry.
    pub(super) fn glossary_hints(
        &self,
        input: &Input,
        glossary: &GlossaryContext,
        target: TargetLang,
    ) -> (Vec<GlossaryHint>, Vec<ExpectedTerm>) {
        let lowered_input = input.text.to_lowercase();
        let mut hints = Vec::new();
        let mut expected = Vec::new();
        for candidate in &glossary.candidates {
            let entry = &candidate.entry;
            let source_term = if input.source == SourceLang::Ko {
                entry.ko.trim().to_string()
            } else {
                entry
                    .source_fields(input.source)
                    .first()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| entry.ko.trim().to_string())
            };
            let translation = entry.best_translation(target);
            if source_term.is_empty() || translation.is_empty() {
                continue;
            }
            if lowered_input.contains(&source_term.to_lowercase()) {
                expected.push(ExpectedTerm {
                    source: source_term.clone(),
                    expected: translation.to_string(),
                });
            }
            hints.push(GlossaryHint {
                source: source_term,
                target: translation.to_string(),
            });
        }
        (hints, expected)
    }

    /// Highest-usage approved translations for `target`.
    pub(super) fn approved_pool(&self, target: TargetLang) -> Vec<ApprovedTranslation> {
        self.store
            .top_approved(target.code(), self.settings.consistency_pool)
            .unwrap_or_else(|e| {
                warn!(error = %e, "approved pool query failed");
                Vec::new()
            })
    }

    /// Approved pairs sharing the most words with the input.
    fn few_shots(&self, input: &Input, pool: &[ApprovedTranslation]) -> Vec<FewShotExample> {
        let words = word_set(&input.text);
        let mut ranked: Vec<(usize, &ApprovedTranslation)> = pool
            .iter()
            .map(|a| (words.intersection(&word_set(&a.source_text)).count(), a))
            .filter(|(overlap, _)| *overlap > 0)
            .collect();
        // Stable: equal overlap keeps usage order.
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked
            .into_iter()
            .take(self.settings.few_shot_examples)
            .map(|(_, a)| FewShotExample {
                source: a.source_text.clone(),
                translation: a.approved_text.clone(),
            })
            .collect()
    }

    /// RAG_ASSISTED / LLM_PRIMARY with verification and at most one retry.
    async fn translate_with_llm(
        &self,
        input: &Input,
        glossary: &GlossaryContext,
        target: TargetLang,
    ) -> TranslationResult {
        let strategy = glossary.strategy();
        let (hints, expected) = self.glossary_hints(input, glossary, target);
        let pool = self.approved_pool(target);
        let ctx = PromptContext {
            tone: input.tone,
            page_description: glossary.page_description(),
            glossary: hints,
            few_shots: self.few_shots(input, &pool),
        };
        let ceiling = self.settings.max_output_tokens;
        let request = prompts::build_single(&input.text, input.source, target, &ctx, ceiling);

        let mut machine = AttemptMachine::new();
        let _ = machine.transition(AttemptState::FirstAttempt);
        let first = match self
            .call_llm(&request, self.settings.llm_timeout, Stage::LlmCall)
            .await
        {
            Ok(raw) => post_process(&raw, &input.text, target),
            Err(e) => {
                warn!(error = %e, strategy = %strategy, "LLM call failed");
                let _ = machine.transition(AttemptState::Failed);
                let mut result =
                    self.base_result(input, target, failure_message(target).to_string(), strategy);
                self.attach_glossary(&mut result, glossary);
                result.history_id = self.record_history(input, &result, None);
                return result;
            }
        };

        let mut final_output = first;
        let mut verification: Option<VerificationResult> = None;
        if final_output.is_verifiable() {
            let _ = machine.transition(AttemptState::Verifying);
            let check = verify(&input.text, &final_output.cleaned, target, &expected);
            if check.should_retry && machine.can_retry() {
                let _ = machine.transition(AttemptState::Retrying);
                debug!(issues = ?check.issue_codes(), "retrying with corrections");
                let retry = prompts::build_retry(
                    &input.text,
                    input.source,
                    target,
                    &ctx,
                    &final_output.cleaned,
                    &check.issues,
                    ceiling,
                );
                match self
                    .call_llm(&retry, self.settings.llm_timeout, Stage::LlmRetry)
                    .await
                {
                    Ok(raw) => final_output = post_process(&raw, &input.text, target),
                    Err(e) => warn!(error = %e, "retry call failed, keeping first attempt"),
                }
                verification = final_output
                    .is_verifiable()
                    .then(|| verify(&input.text, &final_output.cleaned, target, &expected));
            } else {
                verification = Some(check);
            }
        }
        let _ = machine.transition(AttemptState::Accepted);

        let mut result = self.base_result(input, target, final_output.text.clone(), strategy);
        self.attach_glossary(&mut result, glossary);
        if let Some(check) = &verification {
            result.verification_issues = check.issues.clone();
        }
        if final_output.outcome == PostOutcome::Translated {
            result.consistency_issues = check_consistency(&input.text, &final_output.text, &pool);
        }
        result.history_id = self.record_history(input, &result, verification.as_ref());
        self.schedule_extraction(input, &final_output, target);
        debug!(llm_calls = machine.llm_calls(), "llm path done");
        result
    }

    pub(super) async fn call_llm(
        &self,
        request: &CompletionRequest,
        timeout: Duration,
        stage: Stage,
    ) -> Result<String, LlmError> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| LlmError::NotConfigured("no LLM backend".into()))?;
        let watch = Stopwatch::start();
        let outcome = match tokio::time::timeout(timeout, llm.complete(request)).await {
            Ok(result) => result,
            Err(_) => {
                self.metrics.event(Event::LlmTimeout);
                Err(LlmError::Timeout)
            }
        };
        self.metrics.observe(stage, watch.elapsed_us());
        outcome
    }

    pub(super) fn base_result(
        &self,
        input: &Input,
        target: TargetLang,
        text: String,
        strategy: TranslationStrategy,
    ) -> TranslationResult {
        let mut result = TranslationResult::new(&input.text, text, input.source, target, strategy);
        result.detected_tone = input.tone;
        result.context_used = input.page_url.clone();
        result
    }

    pub(super) fn attach_glossary(&self, result: &mut TranslationResult, glossary: &GlossaryContext) {
        result.context_used = glossary.context.clone();
        result.matched_glossary_ids = glossary.match_ids();
        result.match_scores = glossary.match_scores();
    }

    /// Persist the attempt. A failed write only loses the history id.
    pub(super) fn record_history(
        &self,
        input: &Input,
        result: &TranslationResult,
        verification: Option<&VerificationResult>,
    ) -> Option<i64> {
        let record = HistoryRecord {
            source_text: input.text.clone(),
            source_hash: input.hash.clone(),
            source_lang: input.source.code().to_string(),
            target_lang: result.target_lang.code().to_string(),
            translated_text: result.translated_text.clone(),
            strategy: result.translation_strategy.as_str().to_string(),
            page_url: input.page_url.clone(),
            is_from_cache: result.is_from_cache,
            match_count: result.matched_glossary_ids.len(),
            verification_passed: verification.map(|v| v.passed),
            verification_issues: verification.map(|v| v.issue_codes()).unwrap_or_default(),
        };
        match self.store.insert_history(&record) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "history write failed");
                None
            }
        }
    }

    /// Fire-and-forget candidate extraction for Korean sources.
    pub(super) fn schedule_extraction(&self, input: &Input, output: &PostProcessed, target: TargetLang) {
        if !self.settings.extraction_enabled
            || input.source != SourceLang::Ko
            || output.outcome != PostOutcome::Translated
        {
            return;
        }
        if let Some(scheduler) = &self.extraction {
            scheduler.submit(ExtractionTask {
                source_text: input.text.clone(),
                translated_text: output.text.clone(),
                target_lang: target,
                page_url: input.page_url.clone(),
                enqueued_at: std::time::Instant::now(),
            });
        }
    }

    fn finish(&self, result: TranslationResult, watch: Stopwatch, request_id: &str) -> TranslationResult {
        let elapsed_us = watch.elapsed_us();
        self.metrics.observe(Stage::Translate, elapsed_us);
        self.metrics
            .record_strategy(result.translation_strategy, Some(elapsed_us));
        info!(
            request_id,
            strategy = %result.translation_strategy,
            source_lang = %result.source_lang,
            target_lang = %result.target_lang,
            history_id = ?result.history_id,
            elapsed_ms = elapsed_us / 1000,
            "translation finished"
        );
        result
    }
}

/// Terminal VALIDATION_ERROR result; nothing is persisted.
pub(super) fn validation_result(
    text: &str,
    source: SourceLang,
    reason: ValidationReason,
    target: TargetLang,
) -> TranslationResult {
    let mut result = TranslationResult::new(
        text,
        validation_message(reason, target).to_string(),
        source,
        target,
        TranslationStrategy::ValidationError,
    );
    result.is_validation_error = true;
    result.validation_reason = Some(reason);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::glossary::GlossaryEntry;
    use crate::translate::normalize::untranslatable_message;
    use crate::translate::test_support::ScriptedBackend;
    use crate::translate::IssueKind;

    fn store_with(entries: &[(&str, &str)]) -> Arc<Store> {
        let store = Arc::new(Store::open_in_memory().unwrap());
        for (ko, en) in entries {
            store
                .create_glossary_entry(&GlossaryEntry {
                    ko: ko.to_string(),
                    en: en.to_string(),
                    ..Default::default()
                })
                .unwrap();
        }
        store.rebuild_token_index().unwrap();
        store
    }

    fn translator(store: Arc<Store>, backend: Arc<ScriptedBackend>) -> Translator {
        Translator::new(store, Some(backend as Arc<dyn LlmBackend>))
    }

    #[tokio::test]
    async fn test_glossary_direct_skips_llm() {
        let store = store_with(&[("굿즈", "goods")]);
        let backend = Arc::new(ScriptedBackend::default());
        let t = translator(store.clone(), backend.clone());

        let result = t.translate(&TranslateRequest::new("굿즈", TargetLang::En)).await;
        assert_eq!(result.translation_strategy, TranslationStrategy::GlossaryDirect);
        assert_eq!(result.translated_text, "goods");
        assert_eq!(result.match_scores, vec![100.0]);
        assert_eq!(backend.calls(), 0);

        let history = store.history(result.history_id.unwrap()).unwrap().unwrap();
        assert_eq!(history.strategy, "GLOSSARY_DIRECT");
        assert_eq!(
            t.metrics().strategy_count(TranslationStrategy::GlossaryDirect),
            1
        );
        let snapshot = t.metrics().snapshot();
        assert_eq!(snapshot.stages["translate"].observed, 1);
        assert_eq!(snapshot.stages["glossary_search"].observed, 1);
        assert!(!snapshot.stages.contains_key("llm_call"));
    }

    #[tokio::test]
    async fn test_ambiguous_exact_match_goes_to_llm() {
        let store = store_with(&[("굿즈", "goods"), ("굿즈", "merch")]);
        let backend = Arc::new(ScriptedBackend::replying(&["goods (merch)"]));
        let t = translator(store, backend.clone());

        let result = t.translate(&TranslateRequest::new("굿즈", TargetLang::En)).await;
        assert_eq!(result.translation_strategy, TranslationStrategy::RagAssisted);
        assert_eq!(result.matched_glossary_ids.len(), 2);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_validation_error_is_localized_and_unrecorded() {
        let store = store_with(&[]);
        let backend = Arc::new(ScriptedBackend::default());
        let t = translator(store.clone(), backend.clone());

        let result = t.translate(&TranslateRequest::new("1234", TargetLang::Ja)).await;
        assert!(result.is_validation_error);
        assert_eq!(result.validation_reason, Some(ValidationReason::NoLetters));
        assert_eq!(
            result.translated_text,
            validation_message(ValidationReason::NoLetters, TargetLang::Ja)
        );
        assert!(result.history_id.is_none());
        assert!(store.recent_history(0, 10).unwrap().is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_slang_run_reports_high_intensity() {
        let t = translator(store_with(&[]), Arc::new(ScriptedBackend::default()));
        let result = t
            .translate(&TranslateRequest::new("ㅋ".repeat(10), TargetLang::En))
            .await;
        assert_eq!(result.translation_strategy, TranslationStrategy::SlangDecode);
        assert_eq!(result.slang_intensity.as_deref(), Some("high"));
    }

    #[tokio::test]
    async fn test_approved_translation_served_from_cache() {
        let store = store_with(&[]);
        let text = "공식 굿즈 판매 안내";
        store
            .upsert_approved(&source_hash(text), "en", text, "Official goods sale notice", 1.0)
            .unwrap();
        let backend = Arc::new(ScriptedBackend::default());
        let t = translator(store.clone(), backend.clone());

        let result = t.translate(&TranslateRequest::new(text, TargetLang::En)).await;
        assert_eq!(result.translation_strategy, TranslationStrategy::ApprovedCache);
        assert!(result.is_from_cache);
        assert_eq!(result.translated_text, "Official goods sale notice");
        assert_eq!(backend.calls(), 0);
        assert_eq!(t.cache().len(), 1);

        let approved = store.find_approved(&source_hash(text), "en").unwrap().unwrap();
        assert_eq!(approved.usage_count, 1);
    }

    #[tokio::test]
    async fn test_original_returned_triggers_one_retry() {
        let text = "오늘 공연 정말 좋았어요";
        let backend = Arc::new(ScriptedBackend::replying(&[text, "Today's concert was great"]));
        let t = translator(store_with(&[]), backend.clone());

        let result = t.translate(&TranslateRequest::new(text, TargetLang::En)).await;
        assert_eq!(result.translation_strategy, TranslationStrategy::LlmPrimary);
        assert_eq!(result.translated_text, "Today's concert was great");
        assert_eq!(backend.calls(), 2);
        assert!(backend.requests.lock()[1].user_prompt.contains("ORIGINAL_RETURNED"));
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let text = "오늘 공연 정말 좋았어요";
        let backend = Arc::new(ScriptedBackend::replying(&[text, text, "unused"]));
        let t = translator(store_with(&[]), backend.clone());

        let result = t.translate(&TranslateRequest::new(text, TargetLang::En)).await;
        assert_eq!(backend.calls(), 2);
        assert_eq!(result.translated_text, untranslatable_message(TargetLang::En));
        assert!(result
            .verification_issues
            .iter()
            .any(|i| i.kind == IssueKind::OriginalReturned));
    }

    #[tokio::test]
    async fn test_glossary_mismatch_corrected_on_retry() {
        let store = store_with(&[("응원봉", "light stick")]);
        let backend = Arc::new(ScriptedBackend::replying(&[
            "Buy a glow wand",
            "Buy a light stick",
        ]));
        let t = translator(store.clone(), backend.clone());

        let result = t
            .translate(&TranslateRequest::new("응원봉 구매", TargetLang::En))
            .await;
        assert_eq!(result.translation_strategy, TranslationStrategy::RagAssisted);
        assert_eq!(result.translated_text, "Buy a light stick");
        assert!(result.verification_issues.is_empty());
        assert!(backend.requests.lock()[0]
            .system_prompt
            .contains("응원봉 => light stick"));

        let history = store.history(result.history_id.unwrap()).unwrap().unwrap();
        assert_eq!(history.verification_passed, Some(true));
        assert_eq!(history.match_count, 1);
    }

    #[tokio::test]
    async fn test_llm_failure_returns_localized_message() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(LlmError::Timeout)]));
        let t = translator(store_with(&[]), backend.clone());

        let result = t
            .translate(&TranslateRequest::new("배송 안내 드립니다", TargetLang::De))
            .await;
        assert_eq!(result.translated_text, failure_message(TargetLang::De));
        assert_eq!(backend.calls(), 1);
        assert!(result.history_id.is_some());
    }

    #[tokio::test]
    async fn test_missing_backend_degrades() {
        let t = Translator::new(store_with(&[]), None);
        let result = t
            .translate(&TranslateRequest::new("배송 안내 드립니다", TargetLang::En))
            .await;
        assert_eq!(result.translated_text, failure_message(TargetLang::En));
        assert_eq!(result.translation_strategy, TranslationStrategy::LlmPrimary);
    }

    #[tokio::test]
    async fn test_few_shots_and_consistency_from_approved_pool() {
        let store = store_with(&[]);
        let approved = "공식 굿즈 판매 안내";
        store
            .upsert_approved(&source_hash(approved), "en", approved, "Official goods sale notice", 1.0)
            .unwrap();
        let backend = Arc::new(ScriptedBackend::replying(&["Official merch sale info, thanks"]));
        let t = translator(store, backend.clone());

        let result = t
            .translate(&TranslateRequest::new("공식 굿즈 판매 안내 드립니다", TargetLang::En))
            .await;
        assert_eq!(result.consistency_issues.len(), 1);
        assert_eq!(result.consistency_issues[0].existing_translation, "Official goods sale notice");
        assert!(backend.requests.lock()[0]
            .system_prompt
            .contains("Official goods sale notice"));
    }

    #[tokio::test]
    async fn test_tone_hint_reaches_prompt() {
        let cases = [
            ("고마워. 확인해줘", Tone::Casual),
            ("감사합니다. 확인해 주세요.", Tone::Formal),
        ];
        for (text, tone) in cases {
            let backend = Arc::new(ScriptedBackend::replying(&["Thanks, please check it"]));
            let t = translator(store_with(&[]), backend.clone());

            let result = t.translate(&TranslateRequest::new(text, TargetLang::En)).await;
            assert_eq!(result.detected_tone, Some(tone));
            let hint = tone.prompt_hint().unwrap();
            assert!(backend.requests.lock()[0].system_prompt.contains(hint));
        }
    }

    #[tokio::test]
    async fn test_foreign_source_gets_no_tone_hint() {
        let backend = Arc::new(ScriptedBackend::replying(&["注文を確認してください"]));
        let t = translator(store_with(&[]), backend.clone());

        let result = t
            .translate(&TranslateRequest::new("Please check your order", TargetLang::Ja))
            .await;
        assert!(result.detected_tone.is_none());
        let prompt = backend.requests.lock()[0].system_prompt.clone();
        for tone in [Tone::Formal, Tone::Casual] {
            assert!(!prompt.contains(tone.prompt_hint().unwrap()));
        }
    }

    #[tokio::test]
    async fn test_foreign_source_searches_its_own_columns() {
        let store = store_with(&[("응원봉", "light stick")]);
        let backend = Arc::new(ScriptedBackend::replying(&["ペンライトを購入"]));
        let t = translator(store, backend.clone());

        let result = t
            .translate(&TranslateRequest::new("Buy a light stick", TargetLang::Ja))
            .await;
        assert_eq!(result.source_lang, SourceLang::En);
        assert!(result.detected_tone.is_none());
        assert_eq!(backend.calls(), 1);
        assert!(backend.requests.lock()[0].system_prompt.contains("written in English"));
    }
}

//! End-to-end pipeline behavior against an in-memory store and a scripted
//! LLM backend.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use hallyu_translate::glossary::search::MatchType;
use hallyu_translate::glossary::{
    CandidateService, CandidateStatus, GlossaryEntry, GlossarySearch,
};
use hallyu_translate::history::{source_hash, FeedbackRequest, FeedbackService, ReviewStatus};
use hallyu_translate::korean::{detect_tone, Tone};
use hallyu_translate::translate::cache::ApprovedCache;
use hallyu_translate::translate::normalize::{validate, ValidationReason};
use hallyu_translate::translate::verify::verify;
use hallyu_translate::translate::{CompletionRequest, IssueKind};
use hallyu_translate::{
    AppConfig, AppContext, BatchTranslateRequest, LlmBackend, LlmError, Store, TargetLang,
    TranslateRequest, TranslationStrategy, Translator,
};

#[derive(Default)]
struct MockLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl MockLlm {
    fn with(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl LlmBackend for MockLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.seen.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Api("no scripted reply".into())))
    }
}

fn seeded_store() -> Arc<Store> {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let entries = [
        ("굿즈", "goods", "/shop"),
        ("굿즈 세트", "goods set", "/shop"),
        ("공식 굿즈", "official goods", "/shop"),
        ("응원봉", "light stick", "/shop/lightstick"),
    ];
    for (ko, en, page) in entries {
        store
            .create_glossary_entry(&GlossaryEntry {
                ko: ko.into(),
                en: en.into(),
                page_url: page.into(),
                ..Default::default()
            })
            .unwrap();
    }
    store.rebuild_token_index().unwrap();
    store
}

fn translator(store: Arc<Store>, llm: Arc<MockLlm>) -> Translator {
    Translator::new(store, Some(llm as Arc<dyn LlmBackend>))
}

#[tokio::test]
async fn goods_resolves_directly_from_glossary() {
    let llm = MockLlm::with(&[]);
    let t = translator(seeded_store(), llm.clone());

    let result = t.translate(&TranslateRequest::new("굿즈", TargetLang::En)).await;
    assert_eq!(result.translation_strategy, TranslationStrategy::GlossaryDirect);
    assert_eq!(result.translated_text, "goods");
    assert!(!result.is_from_cache);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn exact_match_always_ranks_first() {
    let store = seeded_store();
    let search = GlossarySearch::new(store);
    let results = search.search("굿즈", None, 10);
    assert_eq!(results[0].entry.ko, "굿즈");
    assert_eq!(results[0].base_score, 100.0);
    assert_eq!(results[0].match_type, MatchType::Exact);
    assert!(results.len() > 1);
    assert!(results[1..].iter().all(|r| r.base_score < 100.0));
}

#[tokio::test]
async fn long_laughter_run_is_high_intensity() {
    let t = translator(seeded_store(), MockLlm::with(&[]));
    let result = t
        .translate(&TranslateRequest::new("ㅋㅋㅋㅋㅋㅋㅋㅋㅋㅋ", TargetLang::En))
        .await;
    assert_eq!(result.translation_strategy, TranslationStrategy::SlangDecode);
    assert_eq!(result.slang_intensity.as_deref(), Some("high"));
    assert!(!result.translated_text.trim().is_empty());
}

#[test]
fn validation_reasons() {
    assert_eq!(validate(""), Err(ValidationReason::Empty));
    assert_eq!(validate("a"), Err(ValidationReason::TooShort));
    assert_eq!(validate("1234"), Err(ValidationReason::NoLetters));
    assert_eq!(validate("ab"), Ok(()));
}

#[tokio::test]
async fn empty_input_is_a_validation_error() {
    let store = seeded_store();
    let t = translator(store.clone(), MockLlm::with(&[]));
    let result = t.translate(&TranslateRequest::new("", TargetLang::Ja)).await;
    assert!(result.is_validation_error);
    assert_eq!(result.translation_strategy, TranslationStrategy::ValidationError);
    assert_eq!(result.validation_reason, Some(ValidationReason::Empty));
    assert!(store.recent_history(0, 10).unwrap().is_empty());
}

#[test]
fn tone_detection_scenarios() {
    assert_eq!(detect_tone("감사합니다. 확인해 주세요."), Tone::Formal);
    assert_eq!(detect_tone("고마워. 확인해줘"), Tone::Casual);
    assert_eq!(detect_tone("감사합니다. 확인해줘"), Tone::Formal);
}

#[test]
fn echoed_translation_fails_verification() {
    let result = verify("Hello World", "hello   world", TargetLang::Ja, &[]);
    assert!(!result.passed);
    assert!(result.should_retry);
    assert!(result.has(IssueKind::OriginalReturned));
}

#[tokio::test]
async fn retry_budget_is_one() {
    let text = "내일 팬미팅 일정 알려주세요";
    let llm = MockLlm::with(&[text, text, text]);
    let t = translator(seeded_store(), llm.clone());

    let result = t.translate(&TranslateRequest::new(text, TargetLang::En)).await;
    assert_eq!(llm.calls(), 2);
    assert_eq!(result.translation_strategy, TranslationStrategy::LlmPrimary);
    assert_eq!(result.detected_tone, Some(Tone::Formal));
}

#[test]
fn repeated_extraction_raises_confidence_monotonically() {
    let store = seeded_store();
    let candidates = CandidateService::new(store);
    let mut last = 0.0;
    for _ in 0..12 {
        let candidate = candidates
            .extract("포토카드", "photo card", TargetLang::En, None)
            .unwrap()
            .unwrap();
        assert!(candidate.confidence >= last);
        assert!(candidate.confidence <= 1.0);
        last = candidate.confidence;
    }
    assert!((last - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn feedback_keeps_one_approved_row_and_feeds_the_cache() {
    let store = seeded_store();
    let cache = Arc::new(ApprovedCache::new(16, std::time::Duration::from_secs(60)));
    let llm = MockLlm::with(&["Please tell me tomorrow's fan meeting schedule"]);
    let t = translator(store.clone(), llm.clone()).with_cache(cache.clone());
    let feedback = FeedbackService::new(store.clone(), cache);

    let text = "내일 팬미팅 일정 알려주세요";
    let first = t.translate(&TranslateRequest::new(text, TargetLang::En)).await;
    let history_id = first.history_id.unwrap();

    feedback
        .submit(&FeedbackRequest {
            history_id,
            status: ReviewStatus::Approved,
            rating: Some(5),
            corrected_text: None,
        })
        .unwrap();
    let approved = feedback
        .submit(&FeedbackRequest {
            history_id,
            status: ReviewStatus::Corrected,
            rating: None,
            corrected_text: Some("Please share tomorrow's fan meeting schedule".into()),
        })
        .unwrap()
        .unwrap();
    assert_eq!(approved.approval_count, 2);
    assert_eq!(store.count_approved().unwrap(), 1);

    let second = t.translate(&TranslateRequest::new(text, TargetLang::En)).await;
    assert_eq!(second.translation_strategy, TranslationStrategy::ApprovedCache);
    assert!(second.is_from_cache);
    assert_eq!(second.translated_text, "Please share tomorrow's fan meeting schedule");
    assert_eq!(llm.calls(), 1);
    assert_eq!(
        store.find_approved(&source_hash(text), "en").unwrap().unwrap().usage_count,
        1
    );
}

#[tokio::test]
async fn batch_parses_json_and_falls_back_per_language() {
    let llm = MockLlm::with(&[
        "```json\n{\"ja\": \"明日のファンミーティングの日程を教えてください\", \"fr\": \"Dites-moi le programme de demain\"}\n```",
    ]);
    let t = translator(seeded_store(), llm.clone());
    let batch = t
        .translate_batch(&BatchTranslateRequest {
            text: "내일 팬미팅 일정 알려주세요".into(),
            target_langs: vec![TargetLang::Ja, TargetLang::Fr, TargetLang::De],
            page_url: None,
            source_lang: None,
        })
        .await;

    assert_eq!(llm.calls(), 1);
    assert_eq!(batch.results.len(), 3);
    assert!(batch
        .get(TargetLang::Ja)
        .unwrap()
        .translated_text
        .starts_with("明日"));
    assert!(batch.get(TargetLang::Fr).unwrap().translated_text.starts_with("Dites"));
    let german = batch.get(TargetLang::De).unwrap();
    assert_eq!(
        german.translated_text,
        hallyu_translate::translate::normalize::failure_message(TargetLang::De)
    );
}

#[tokio::test]
async fn app_context_extracts_candidates_in_background() {
    let mut config = AppConfig::default();
    config.database_path = ":memory:".into();
    let llm = MockLlm::with(&["light stick case"]);
    let mut ctx = AppContext::build(config, Some(llm as Arc<dyn LlmBackend>)).unwrap();
    ctx.index_ready().await;

    let result = ctx
        .translator
        .translate(&TranslateRequest::new("응원봉 케이스", TargetLang::En))
        .await;
    assert_eq!(result.translation_strategy, TranslationStrategy::LlmPrimary);

    let candidates = Arc::clone(&ctx.candidates);
    ctx.shutdown().await;
    let pending = candidates
        .list(Some(CandidateStatus::Pending), 0, 10)
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].source_ko, "응원봉 케이스");
    assert_eq!(pending[0].proposed_translation, "light stick case");
}

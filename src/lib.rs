//! Hallyu Translate: Korean-source, glossary-aware translation for a K-pop
//! fandom commerce platform.
//! Main library: service wiring, logging setup and the background workers.

pub mod config;
pub mod error;
pub mod glossary;
pub mod history;
pub mod korean;
pub mod language;
pub mod metrics;
pub mod scheduler;
pub mod state_machine;
pub mod store;
pub mod translate;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use config::AppConfig;
pub use error::{CandidateError, ConfigError, FeedbackError, LlmError, StoreError};
pub use language::{SourceLang, TargetLang};
pub use store::Store;
pub use translate::{
    BatchTranslateRequest, BatchTranslationResult, LlmBackend, TranslateRequest,
    TranslationResult, TranslationStrategy, Translator,
};

use config::LlmConfig;
use glossary::CandidateService;
use history::FeedbackService;
use korean::SlangDictionary;
use metrics::MetricsRegistry;
use scheduler::{spawn_index_build, ExtractionScheduler};
use translate::cache::ApprovedCache;
use translate::chat_client::ChatCompletionClient;
use translate::orchestrator::TranslatorSettings;

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
/// Safe to call more than once.
pub fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hallyu_translate=info")),
        )
        .with_target(true)
        .with_thread_ids(true);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// HTTP backend from config, or None when no API key is available.
pub fn llm_from_config(config: &LlmConfig) -> Option<Arc<dyn LlmBackend>> {
    match ChatCompletionClient::new(config) {
        Ok(client) => {
            info!(model = %config.model, base_url = %config.base_url, "LLM client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!(error = %e, "LLM client init failed (API key missing?), LLM strategies degrade");
            None
        }
    }
}

/// Shared application state.
pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<Store>,
    pub metrics: Arc<MetricsRegistry>,
    pub translator: Arc<Translator>,
    pub feedback: FeedbackService,
    pub candidates: Arc<CandidateService>,
    pub extraction: Arc<ExtractionScheduler>,
    worker: Option<JoinHandle<()>>,
    index_build: Option<JoinHandle<usize>>,
}

impl AppContext {
    /// Open the store, seed it and start the background workers.
    /// Must be called from inside a tokio runtime.
    pub fn build(config: AppConfig, llm: Option<Arc<dyn LlmBackend>>) -> Result<Self, StoreError> {
        info!(database = %config.database_path.display(), "hallyu-translate starting");

        let store = Arc::new(Store::open(&config.database_path)?);
        if let Some(path) = &config.glossary_seed_path {
            match glossary::load_seed_if_empty(&store, path) {
                Ok(0) => {}
                Ok(imported) => info!(imported, path = %path.display(), "glossary seeded"),
                Err(e) => warn!(error = %e, path = %path.display(), "glossary seed failed"),
            }
        }
        let index_build = spawn_index_build(Arc::clone(&store));

        let metrics = Arc::new(MetricsRegistry::new());
        let slang = Arc::new(SlangDictionary::load_or_builtin(config.slang_path.as_deref()));
        let cache = Arc::new(ApprovedCache::new(config.cache.capacity, config.cache.ttl()));
        let candidates = Arc::new(CandidateService::new(Arc::clone(&store)));

        let extraction = Arc::new(ExtractionScheduler::new(
            config.extraction.queue_capacity,
            Arc::clone(&metrics),
        ));
        let worker = if config.extraction.enabled {
            extraction.start(Arc::clone(&candidates))
        } else {
            info!("candidate extraction disabled");
            None
        };

        let translator = Translator::new(Arc::clone(&store), llm)
            .with_slang(slang)
            .with_cache(Arc::clone(&cache))
            .with_metrics(Arc::clone(&metrics))
            .with_extraction(Arc::clone(&extraction))
            .with_settings(TranslatorSettings::from_config(&config));

        Ok(Self {
            feedback: FeedbackService::new(Arc::clone(&store), cache),
            translator: Arc::new(translator),
            config,
            store,
            metrics,
            candidates,
            extraction,
            worker,
            index_build: Some(index_build),
        })
    }

    /// Wait for the startup index build. Returns the number of entries
    /// indexed, or 0 when already awaited.
    pub async fn index_ready(&mut self) -> usize {
        match self.index_build.take() {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                warn!(error = %e, "index build task failed");
                0
            }),
            None => 0,
        }
    }

    /// Drain pending extraction work and stop the worker.
    pub async fn shutdown(mut self) {
        self.index_ready().await;
        self.extraction.shutdown();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "extraction worker ended abnormally");
            }
        }
        info!("hallyu-translate stopped");
    }
}

//! Background work off the request path.
//! Candidate extraction runs on a bounded tokio mpsc queue drained by one
//! worker task. Submitting never blocks and never fails the caller: a full
//! queue drops the task with a warning. Startup index builds run on the
//! blocking pool.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::glossary::CandidateService;
use crate::language::TargetLang;
use crate::metrics::{Event, MetricsRegistry};
use crate::store::Store;

/// One finished Korean-source translation to mine for glossary candidates.
#[derive(Debug)]
pub struct ExtractionTask {
    pub source_text: String,
    pub translated_text: String,
    pub target_lang: TargetLang,
    pub page_url: Option<String>,
    pub enqueued_at: Instant,
}

pub struct ExtractionScheduler {
    tx: mpsc::Sender<ExtractionTask>,
    // Mutex for interior mutability (scheduler lives behind Arc)
    rx: Mutex<Option<mpsc::Receiver<ExtractionTask>>>,
    cancel: CancellationToken,
    metrics: Arc<MetricsRegistry>,
}

impl ExtractionScheduler {
    pub fn new(capacity: usize, metrics: Arc<MetricsRegistry>) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            cancel: CancellationToken::new(),
            metrics,
        }
    }

    /// Queue a task. Returns false when it was dropped.
    pub fn submit(&self, task: ExtractionTask) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(task)) => {
                self.metrics.event(Event::ExtractionDropped);
                warn!(source = %task.source_text, "extraction queue full, task dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("extraction queue closed, task dropped");
                false
            }
        }
    }

    /// Take the receiver (call once to start the worker loop).
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<ExtractionTask>> {
        self.rx.lock().take()
    }

    /// Start the worker. Returns None if it was already started.
    pub fn start(&self, candidates: Arc<CandidateService>) -> Option<JoinHandle<()>> {
        let rx = self.take_receiver()?;
        Some(tokio::spawn(run_worker(rx, candidates, self.cancel.clone())))
    }

    /// Stop the worker after it drains what is already queued.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<ExtractionTask>,
    candidates: Arc<CandidateService>,
    cancel: CancellationToken,
) {
    info!("extraction worker started");
    loop {
        tokio::select! {
            task = rx.recv() => match task {
                Some(task) => process(task, &candidates).await,
                None => break,
            },
            _ = cancel.cancelled() => {
                while let Ok(task) = rx.try_recv() {
                    process(task, &candidates).await;
                }
                break;
            }
        }
    }
    info!("extraction worker exiting");
}

async fn process(task: ExtractionTask, candidates: &Arc<CandidateService>) {
    let wait_ms = task.enqueued_at.elapsed().as_millis() as u64;
    let service = Arc::clone(candidates);
    let result = tokio::task::spawn_blocking(move || {
        service.extract(
            &task.source_text,
            &task.translated_text,
            task.target_lang,
            task.page_url.as_deref(),
        )
    })
    .await;

    match result {
        Ok(Ok(Some(candidate))) => debug!(
            id = candidate.id,
            confidence = candidate.confidence,
            wait_ms,
            "candidate extracted"
        ),
        Ok(Ok(None)) => {}
        Ok(Err(e)) => warn!(error = %e, "candidate extraction failed"),
        Err(e) => error!(error = %e, "candidate extraction task panicked"),
    }
}

/// Rebuild the glossary token index without blocking startup.
pub fn spawn_index_build(store: Arc<Store>) -> JoinHandle<usize> {
    tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        match store.rebuild_token_index() {
            Ok(entries) => {
                info!(
                    entries,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "startup index build done"
                );
                entries
            }
            Err(e) => {
                warn!(error = %e, "startup index build failed");
                0
            }
        }
    })
}

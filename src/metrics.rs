//! In-process pipeline metrics.
//!
//! Latency is tracked per [`Stage`] and per [`TranslationStrategy`] over a
//! sliding window of recent samples. Rare events (dropped extraction work,
//! LLM timeouts) are plain counters. `hallyu-translate stats` prints a
//! [`MetricsSnapshot`].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

use crate::translate::TranslationStrategy;

const DEFAULT_WINDOW: usize = 512;

/// Fresh id for correlating one request's log lines.
pub fn request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Timed section of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Translate,
    Batch,
    GlossarySearch,
    LlmCall,
    LlmRetry,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Translate => "translate",
            Stage::Batch => "batch",
            Stage::GlossarySearch => "glossary_search",
            Stage::LlmCall => "llm_call",
            Stage::LlmRetry => "llm_retry",
        }
    }
}

/// Counted occurrences that carry no latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    ExtractionDropped,
    LlmTimeout,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ExtractionDropped => "extraction_dropped",
            Event::LlmTimeout => "llm_timeout",
        }
    }
}

/// Started clock; read it with [`Stopwatch::elapsed_us`].
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch(Instant);

impl Stopwatch {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed_us(&self) -> u64 {
        u64::try_from(self.0.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

/// Most recent `capacity` samples plus lifetime totals.
#[derive(Debug)]
struct LatencyWindow {
    samples: VecDeque<u64>,
    capacity: usize,
    observed: u64,
    max_us: u64,
}

impl LatencyWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            observed: 0,
            max_us: 0,
        }
    }

    fn push(&mut self, us: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(us);
        self.observed += 1;
        self.max_us = self.max_us.max(us);
    }

    fn sorted(&self) -> Vec<u64> {
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        sorted
    }

    fn summary(&self) -> LatencySummary {
        let sorted = self.sorted();
        let mean_us = if sorted.is_empty() {
            0
        } else {
            sorted.iter().sum::<u64>() / sorted.len() as u64
        };
        LatencySummary {
            observed: self.observed,
            mean_us,
            p50_us: nearest_rank(&sorted, 50.0),
            p95_us: nearest_rank(&sorted, 95.0),
            p99_us: nearest_rank(&sorted, 99.0),
            max_us: self.max_us,
        }
    }
}

/// Nearest-rank percentile over sorted samples; 0 when empty.
fn nearest_rank(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = ((p.clamp(0.0, 100.0) / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    /// Samples seen since start, including those evicted from the window.
    pub observed: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    /// Lifetime maximum.
    pub max_us: u64,
}

/// Strategy outcome counts with their end-to-end latency.
#[derive(Debug, Clone, Serialize)]
pub struct StrategySnapshot {
    pub count: u64,
    pub latency: Option<LatencySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub stages: BTreeMap<&'static str, LatencySummary>,
    pub strategies: BTreeMap<&'static str, StrategySnapshot>,
    pub events: BTreeMap<&'static str, u64>,
}

#[derive(Debug, Default)]
struct StrategyStats {
    count: u64,
    latency: Option<LatencyWindow>,
}

#[derive(Debug)]
pub struct MetricsRegistry {
    stages: Mutex<HashMap<Stage, LatencyWindow>>,
    strategies: Mutex<HashMap<TranslationStrategy, StrategyStats>>,
    events: Mutex<HashMap<Event, u64>>,
    window: usize,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Registry keeping the last `window` samples per series.
    pub fn with_window(window: usize) -> Self {
        Self {
            stages: Mutex::new(HashMap::new()),
            strategies: Mutex::new(HashMap::new()),
            events: Mutex::new(HashMap::new()),
            window,
        }
    }

    pub fn observe(&self, stage: Stage, elapsed_us: u64) {
        self.stages
            .lock()
            .entry(stage)
            .or_insert_with(|| LatencyWindow::new(self.window))
            .push(elapsed_us);
        tracing::trace!(stage = stage.as_str(), elapsed_us, "stage timed");
    }

    /// Count one result for `strategy`. Batch members share one call, so
    /// they pass no latency of their own.
    pub fn record_strategy(&self, strategy: TranslationStrategy, elapsed_us: Option<u64>) {
        let mut strategies = self.strategies.lock();
        let stats = strategies.entry(strategy).or_default();
        stats.count += 1;
        if let Some(us) = elapsed_us {
            stats
                .latency
                .get_or_insert_with(|| LatencyWindow::new(self.window))
                .push(us);
        }
    }

    pub fn event(&self, event: Event) {
        *self.events.lock().entry(event).or_insert(0) += 1;
    }

    pub fn strategy_count(&self, strategy: TranslationStrategy) -> u64 {
        self.strategies
            .lock()
            .get(&strategy)
            .map_or(0, |stats| stats.count)
    }

    pub fn event_count(&self, event: Event) -> u64 {
        self.events.lock().get(&event).copied().unwrap_or(0)
    }

    /// Stage latency percentile in microseconds (p in 0..=100), 0 when unseen.
    pub fn percentile(&self, stage: Stage, p: f64) -> u64 {
        self.stages
            .lock()
            .get(&stage)
            .map_or(0, |window| nearest_rank(&window.sorted(), p))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let stages = self
            .stages
            .lock()
            .iter()
            .map(|(stage, window)| (stage.as_str(), window.summary()))
            .collect();
        let strategies = self
            .strategies
            .lock()
            .iter()
            .map(|(strategy, stats)| {
                let snapshot = StrategySnapshot {
                    count: stats.count,
                    latency: stats.latency.as_ref().map(LatencyWindow::summary),
                };
                (strategy.as_str(), snapshot)
            })
            .collect();
        let events = self
            .events
            .lock()
            .iter()
            .map(|(event, count)| (event.as_str(), *count))
            .collect();
        MetricsSnapshot {
            stages,
            strategies,
            events,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

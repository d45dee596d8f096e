//! Analysis: periodic pattern-frequency ranking over the ledger.
//!
//! [`AnalysisEngine::spawn`] starts a small pool of workers, each waking on
//! its own fixed interval. A worker first checks the shared "last emitted"
//! timestamp and skips the tick if another worker reported within the
//! interval. That check is a debounce, not mutual exclusion: two workers can
//! pass it together and both report.
//!
//! Past the debounce, the worker holds the ledger lock for the whole scan and
//! stamps "last emitted" before releasing it.

use crate::ledger::{Ledger, LedgerView};
use crate::types::ConnectionId;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const REPORT_CHANNEL_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

/// How the configured pattern text is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternMode {
    /// Plain substring.
    #[default]
    Literal,
    /// `regex` crate syntax.
    Regex,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid pattern {pattern:?}: {source}")]
pub struct PatternError {
    pattern: String,
    #[source]
    source: regex::Error,
}

/// A compiled, case-insensitive search pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    text: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(text: &str, mode: PatternMode) -> Result<Self, PatternError> {
        let source = match mode {
            PatternMode::Literal => regex::escape(text),
            PatternMode::Regex => text.to_string(),
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|source| PatternError {
                pattern: text.to_string(),
                source,
            })?;
        Ok(Self {
            text: text.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Non-overlapping matches in `line` after trimming surrounding whitespace.
    pub fn count(&self, line: &str) -> usize {
        self.regex.find_iter(line.trim()).count()
    }
}

// ---------------------------------------------------------------------------
// Frequency table and report
// ---------------------------------------------------------------------------

/// One row of a ranking: a document's title and its match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ranked {
    pub connection: ConnectionId,
    pub title: String,
    pub count: usize,
}

/// Documents with at least one match, highest count first.
pub type FrequencyTable = Vec<Ranked>;

/// Count `pattern` in every document and rank the documents.
///
/// Ties keep the ledger's document order (first-line order). Documents with no
/// match are left out.
pub fn analyze(view: &LedgerView<'_>, pattern: &Pattern) -> FrequencyTable {
    let mut table: FrequencyTable = view
        .documents()
        .filter_map(|doc| {
            let count: usize = view.chain_from(doc.head).map(|r| pattern.count(r.content())).sum();
            if count == 0 {
                return None;
            }
            let title = view
                .record(doc.head)
                .map(|r| r.content().trim_end().to_string())
                .unwrap_or_default();
            Some(Ranked {
                connection: doc.id,
                title,
                count,
            })
        })
        .collect();

    table.sort_by(|a, b| b.count.cmp(&a.count));
    table
}

/// Output format for emitted reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrequencyReport {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub pattern: String,
    pub table: FrequencyTable,
}

impl FrequencyReport {
    pub fn render(&self, format: ReportFormat) -> Result<String, serde_json::Error> {
        match format {
            ReportFormat::Text => Ok(self.to_string()),
            ReportFormat::Json => serde_json::to_string(self),
        }
    }
}

impl std::fmt::Display for FrequencyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Book titles sorted by frequency of '{}':", self.pattern)?;
        for row in &self.table {
            write!(f, "\n{}: {}", row.title, row.count)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Shared state for the analysis workers.
pub struct AnalysisEngine {
    ledger: Arc<Ledger>,
    pattern: Pattern,
    interval: Duration,
    format: ReportFormat,
    last_emitted: Mutex<Option<Instant>>,
    reports: broadcast::Sender<Arc<FrequencyReport>>,
}

impl AnalysisEngine {
    pub fn new(
        ledger: Arc<Ledger>,
        pattern: Pattern,
        interval: Duration,
        format: ReportFormat,
    ) -> Arc<Self> {
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Arc::new(Self {
            ledger,
            pattern,
            interval,
            format,
            last_emitted: Mutex::new(None),
            reports,
        })
    }

    /// Receive every report emitted after this call. A slow receiver lags;
    /// it never holds up a worker.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<FrequencyReport>> {
        self.reports.subscribe()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn last_emitted(&self) -> MutexGuard<'_, Option<Instant>> {
        self.last_emitted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One worker wake-up. Returns the report if this tick emitted one, or
    /// `None` if the debounce skipped it.
    pub fn tick(&self) -> Option<Arc<FrequencyReport>> {
        let now = Instant::now();
        if let Some(last) = *self.last_emitted() {
            if now.duration_since(last) < self.interval {
                tracing::trace!("another worker reported within the interval, skipping");
                return None;
            }
        }

        let table = self.ledger.read(|view| {
            let table = analyze(&view, &self.pattern);
            *self.last_emitted() = Some(now);
            table
        });

        let report = Arc::new(FrequencyReport {
            generated_at: chrono::Utc::now(),
            pattern: self.pattern.as_str().to_string(),
            table,
        });
        self.emit(&report);
        Some(report)
    }

    fn emit(&self, report: &Arc<FrequencyReport>) {
        match report.render(self.format) {
            Ok(rendered) => {
                for line in rendered.lines() {
                    tracing::info!(target: "bookworm::report", "{line}");
                }
            }
            Err(err) => tracing::error!(%err, "failed to render frequency report"),
        }
        // No subscribers is normal when nobody is listening.
        let _ = self.reports.send(Arc::clone(report));
    }

    /// Start `worker_count` workers. They run until `cancel` fires.
    pub fn spawn(self: &Arc<Self>, worker_count: usize, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        tracing::info!(
            workers = worker_count,
            interval = ?self.interval,
            pattern = %self.pattern.as_str(),
            "starting analysis workers"
        );
        (0..worker_count)
            .map(|worker_id| {
                let engine = Arc::clone(self);
                let cancel = cancel.clone();
                tokio::spawn(async move { engine.worker_loop(worker_id, cancel).await })
            })
            .collect()
    }

    async fn worker_loop(&self, worker_id: usize, cancel: CancellationToken) {
        tracing::debug!(worker_id, "analysis worker started");
        let mut timer = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {
                    self.tick();
                }
            }
        }
        tracing::debug!(worker_id, "analysis worker stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

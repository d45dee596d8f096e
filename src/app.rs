//! App: wires settings, ledger, analysis workers and the accept loop.

use anyhow::Context;
use bookworm_core::analysis::AnalysisEngine;
use bookworm_core::config::Settings;
use bookworm_core::Ledger;
use bookworm_server::{FsSink, SequenceCounter, Server, SessionContext, SessionOutcome};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running server. Dropping it does not stop anything; cancel the token
/// passed to [`App::start`] and then [`App::join`].
pub struct App {
    local_addr: SocketAddr,
    ledger: Arc<Ledger>,
    engine: Arc<AnalysisEngine>,
    server: JoinHandle<Vec<SessionOutcome>>,
    workers: Vec<JoinHandle<()>>,
}

impl App {
    /// Bind the listener and start the analysis workers and accept loop.
    pub async fn start(settings: Settings, cancel: CancellationToken) -> anyhow::Result<Self> {
        let Settings {
            bind,
            port,
            output_dir,
            max_line_bytes,
            pattern,
            interval,
            worker_count,
            report_format,
        } = settings;

        let ledger = Arc::new(Ledger::new());
        let engine = AnalysisEngine::new(Arc::clone(&ledger), pattern, interval, report_format);

        let ctx = SessionContext {
            ledger: Arc::clone(&ledger),
            sink: Arc::new(FsSink::new(&output_dir)),
            counter: Arc::new(SequenceCounter::new()),
            max_line_bytes,
            cancel: cancel.clone(),
        };
        let server = Server::bind(SocketAddr::new(bind, port), ctx)
            .await
            .context("starting listener")?;
        let local_addr = server.local_addr();
        tracing::info!(output_dir = %output_dir.display(), "books will be written on close");

        let workers = engine.spawn(worker_count, cancel);
        let server = tokio::spawn(server.run());

        Ok(Self {
            local_addr,
            ledger,
            engine,
            server,
            workers,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn engine(&self) -> &Arc<AnalysisEngine> {
        &self.engine
    }

    /// Wait for the accept loop and workers to stop.
    pub async fn join(self) -> anyhow::Result<Vec<SessionOutcome>> {
        let outcomes = self.server.await.context("accept loop panicked")?;
        for worker in self.workers {
            worker.await.context("analysis worker panicked")?;
        }
        let stats = self.ledger.stats();
        tracing::info!(
            books = outcomes.len(),
            lines = stats.lines,
            documents = stats.documents,
            "server stopped"
        );
        Ok(outcomes)
    }
}

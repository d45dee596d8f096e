//! Server: TCP accept loop spawning one session task per connection.
//!
//! There is no connection limit. On cancellation the loop stops accepting,
//! the sessions see the same token and close their documents, and [`Server::run`]
//! returns once every book has been handed to the sink.

use crate::session::{run_session, SessionContext, SessionOutcome};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Pause after a failed `accept` so a persistent error (e.g. out of file
/// descriptors) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read listener address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// Source of inbound connections.
pub(crate) trait Accept: Send + Sync + 'static {
    type Stream: AsyncRead + Unpin + Send + 'static;

    fn accept(&self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Accept for TcpListener {
    type Stream = TcpStream;

    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    ctx: SessionContext,
}

impl Server {
    pub async fn bind(addr: SocketAddr, ctx: SessionContext) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;
        tracing::info!(%local_addr, "server is listening");
        Ok(Self {
            listener,
            local_addr,
            ctx,
        })
    }

    /// The bound address; useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept until `ctx.cancel` fires, then wait for open sessions to finish.
    pub async fn run(self) -> Vec<SessionOutcome> {
        let Self { listener, ctx, .. } = self;
        serve(listener, ctx).await
    }
}

async fn serve<L: Accept>(listener: L, ctx: SessionContext) -> Vec<SessionOutcome> {
    let mut sessions = JoinSet::new();
    let mut finished = Vec::new();

    // Armed only after a failed accept; accepting resumes when it fires.
    let backoff = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(backoff);
    let mut backing_off = false;

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = &mut backoff, if backing_off => backing_off = false,
            accepted = listener.accept(), if !backing_off => match accepted {
                Ok((stream, peer)) => {
                    let ctx = ctx.clone();
                    sessions.spawn(async move { run_session(&ctx, stream, peer).await });
                }
                Err(err) => {
                    tracing::warn!(%err, "accept failed");
                    backoff.as_mut().reset(Instant::now() + ACCEPT_BACKOFF);
                    backing_off = true;
                }
            },
            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                finished.extend(reap(joined));
            }
        }
    }

    tracing::info!(open = sessions.len(), "shutting down, waiting for open sessions");
    drop(listener);
    while let Some(joined) = sessions.join_next().await {
        finished.extend(reap(joined));
    }
    finished
}

fn reap(joined: Result<SessionOutcome, tokio::task::JoinError>) -> Option<SessionOutcome> {
    match joined {
        Ok(outcome) => {
            tracing::debug!(connection = %outcome.connection, lines = outcome.lines, "session finished");
            Some(outcome)
        }
        Err(err) => {
            tracing::error!(%err, "session task failed");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

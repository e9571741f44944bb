//! LLRP listener: accepts client connections and runs one protocol loop each

use crate::connection::{ConnectionSettings, run_connection};
use crate::registry::TagRegistryHandle;
use crate::session::Session;
use crate::{EmulatorError, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

/// A bound LLRP listener.
pub struct LlrpServer {
    listener: TcpListener,
    session: Session,
    registry: TagRegistryHandle,
    settings: ConnectionSettings,
}

impl LlrpServer {
    /// Bind the listener. Failure here is fatal for the process.
    pub async fn bind(
        addr: SocketAddr,
        session: Session,
        registry: TagRegistryHandle,
        settings: ConnectionSettings,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| EmulatorError::Bind { addr: addr.to_string(), source })?;
        Ok(Self { listener, session, registry, settings })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `cancel` fires.
    ///
    /// Connection tasks are detached; a failing peer only ends its own task.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        info!(addr = %self.local_addr()?, "Listening for LLRP connections");
        let mut accept_errors = 0u32;

        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("LLRP listener shutting down");
                    break;
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    accept_errors = 0;
                    info!(%peer, "LLRP connection initiated");
                    let _ = stream.set_nodelay(true);

                    let session = self.session.clone();
                    let tags = self.registry.subscribe();
                    let settings = self.settings.clone();
                    tokio::spawn(
                        async move { log_connection_end(run_connection(stream, session, tags, settings).await) }
                        .instrument(info_span!("llrp", %peer)),
                    );
                }
                Err(e) => {
                    // Usually fd exhaustion; back off instead of spinning
                    accept_errors += 1;
                    error!("Accept error ({}): {}", accept_errors, e);
                    let backoff = Duration::from_millis(50 * (1 << accept_errors.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        Ok(())
    }
}

/// Peer and transport failures log at `warn`, anything else at `error`.
fn log_connection_end(result: Result<()>) {
    match result {
        Ok(()) => info!("LLRP connection closed"),
        Err(e) if e.is_connection_fatal() => warn!("Closing LLRP connection: {}", e),
        Err(e) => error!("LLRP connection failed: {}", e),
    }
}

//! Tag management channel
//!
//! Newline-delimited JSON over TCP. Each request line gets exactly one
//! response line:
//!
//! ```text
//! > {"action":"add","tags":[{"PCBits":"3000","EPC":"302db319a0000040000002b8"}]}
//! < {"status":"ok","tags":[{"PCBits":"3000","EPC":"302db319a0000040000002b8"}]}
//! > {"action":"retrieve"}
//! < {"status":"ok","tags":[...]}
//! > {"action":"delete","tags":[{"PCBits":"zz","EPC":"00"}]}
//! < {"status":"error","message":"invalid PCBits 'zz'"}
//! ```
//!
//! A request with any undecodable tag is rejected as a whole.

use crate::registry::{TagAction, TagRegistryHandle};
use crate::tag::{Tag, TagRecord};
use crate::{EmulatorError, Result};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

const MAX_LINE_LEN: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagementAction {
    Add,
    Delete,
    Retrieve,
}

impl From<ManagementAction> for TagAction {
    fn from(action: ManagementAction) -> Self {
        match action {
            ManagementAction::Add => TagAction::Add,
            ManagementAction::Delete => TagAction::Delete,
            ManagementAction::Retrieve => TagAction::Retrieve,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementRequest {
    pub action: ManagementAction,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ManagementResponse {
    Ok { tags: Vec<TagRecord> },
    Error { message: String },
}

impl ManagementResponse {
    fn error(err: impl std::fmt::Display) -> Self {
        ManagementResponse::Error { message: err.to_string() }
    }
}

/// Decode one request line and run it against the registry.
pub async fn handle_line(registry: &TagRegistryHandle, line: &str) -> ManagementResponse {
    let request: ManagementRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return ManagementResponse::error(format!("malformed request: {e}")),
    };
    match handle_request(registry, request).await {
        Ok(tags) => ManagementResponse::Ok { tags: tags.iter().map(Tag::to_record).collect() },
        Err(e) => ManagementResponse::error(e),
    }
}

pub async fn handle_request(registry: &TagRegistryHandle, request: ManagementRequest) -> Result<Vec<Tag>> {
    let tags = request.tags.iter().map(Tag::from_record).collect::<Result<Vec<_>>>()?;
    let result = registry.request(request.action.into(), tags).await?;
    debug!(action = ?request.action, affected = result.len(), "Management request handled");
    Ok(result)
}

/// A bound management listener.
pub struct ManagementServer {
    listener: TcpListener,
    registry: TagRegistryHandle,
}

impl ManagementServer {
    pub async fn bind(addr: SocketAddr, registry: TagRegistryHandle) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| EmulatorError::Bind { addr: addr.to_string(), source })?;
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        info!(addr = %self.local_addr()?, "Listening for management connections");
        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    let registry = self.registry.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(
                        async move {
                            if let Err(e) = serve_client(stream, registry, cancel).await {
                                warn!("Management client error: {}", e);
                            }
                        }
                        .instrument(info_span!("management", %peer)),
                    );
                }
                Err(e) => warn!("Management accept error: {}", e),
            }
        }
        info!("Management listener stopped");
        Ok(())
    }
}

/// Serve one management client until it disconnects.
pub async fn serve_client<S>(stream: S, registry: TagRegistryHandle, cancel: CancellationToken) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LEN));
    debug!("Management client connected");

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next() => line,
        };
        let Some(line) = line else { break };
        let line = line.map_err(|e| EmulatorError::connection_failed_with_source("management read", Box::new(e)))?;
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(&registry, &line).await;
        let encoded = serde_json::to_string(&response)
            .map_err(|e| EmulatorError::parse("management response", e.to_string()))?;
        lines
            .send(encoded)
            .await
            .map_err(|e| EmulatorError::connection_failed_with_source("management write", Box::new(e)))?;
    }

    debug!("Management client disconnected");
    Ok(())
}

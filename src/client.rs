//! LLRP client mode
//!
//! Connects to a reader (real or emulated), completes the handshake, answers
//! keepalives and decodes every RO_ACCESS_REPORT it receives. Handy for
//! smoke-testing a reader without a middleware stack.

use crate::llrp::{LlrpCodec, LlrpMessage, MessageType, decode_ro_access_report};
use crate::session::MessageIdCounter;
use crate::{EmulatorError, Result};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Keepalive period requested in SET_READER_CONFIG; 0 asks for none.
    pub keepalive_interval_ms: u32,
    pub max_inbound_message: usize,
}

/// What a client session observed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClientStats {
    pub reports: u64,
    pub tags: u64,
    pub keepalives: u64,
}

/// Connect to `addr`, retrying once per second, and run until the reader
/// disconnects or `cancel` fires.
pub async fn run_client(
    addr: SocketAddr,
    message_ids: MessageIdCounter,
    settings: ClientSettings,
    cancel: CancellationToken,
) -> Result<ClientStats> {
    let Some(stream) = connect_with_retry(addr, &cancel).await else {
        return Ok(ClientStats::default());
    };
    info!(%addr, "Connected to LLRP reader");
    drive_client(stream, message_ids, settings, cancel).await
}

/// `None` when cancelled before a connection was made.
async fn connect_with_retry(addr: SocketAddr, cancel: &CancellationToken) -> Option<TcpStream> {
    let mut attempts = 0u32;
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => return None,
            result = TcpStream::connect(addr) => result,
        };
        match result {
            Ok(stream) => return Some(stream),
            Err(e) => {
                attempts += 1;
                warn!(%addr, attempts, "Connect failed: {}", e);
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}

/// Run the client side of the protocol over an established stream.
pub async fn drive_client<S>(
    stream: S,
    message_ids: MessageIdCounter,
    settings: ClientSettings,
    cancel: CancellationToken,
) -> Result<ClientStats>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, LlrpCodec::new(settings.max_inbound_message));
    let mut stats = ClientStats::default();

    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Client cancelled");
                break;
            }
            message = framed.next() => message,
        };
        let Some(message) = message.transpose()? else {
            info!("Reader closed the connection");
            break;
        };

        match message.message_type() {
            Some(MessageType::ReaderEventNotification) => {
                info!(message_id = message.id, "Received READER_EVENT_NOTIFICATION");
                let id = message_ids.next();
                framed.send(LlrpMessage::set_reader_config(id, settings.keepalive_interval_ms)).await?;
            }
            Some(MessageType::Keepalive) => {
                info!(message_id = message.id, "Received KEEPALIVE");
                stats.keepalives += 1;
                framed.send(LlrpMessage::keepalive_ack(message.id)).await?;
            }
            Some(MessageType::SetReaderConfigResponse) => {
                info!(message_id = message.id, "Received SET_READER_CONFIG_RESPONSE");
            }
            Some(MessageType::RoAccessReport) => {
                let started = Instant::now();
                match decode_ro_access_report(message.encoded_len() as u32, &message.body) {
                    Ok(events) => {
                        stats.reports += 1;
                        stats.tags += events.len() as u64;
                        for event in &events {
                            debug!(epc = %crate::tag::encode_hex(&event.epc), pc = ?event.pc_bits, "Tag read");
                        }
                        info!(
                            message_id = message.id,
                            tags = events.len(),
                            bytes = message.body.len(),
                            elapsed = ?started.elapsed(),
                            "Received RO_ACCESS_REPORT"
                        );
                    }
                    Err(e) => warn!(message_id = message.id, "Undecodable RO_ACCESS_REPORT: {}", e),
                }
            }
            Some(other) => debug!(kind = %other, "Ignoring message"),
            None => warn!("{}", EmulatorError::UnknownHeader { header: message.header }),
        }
    }

    Ok(stats)
}

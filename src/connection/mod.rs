//! Per-connection LLRP protocol loop
//!
//! One loop drives one client connection through
//! `AwaitingSetup -> Streaming -> Closed`:
//!
//! - On start the reader announces itself with READER_EVENT_NOTIFICATION.
//! - `AwaitingSetup` waits for SET_READER_CONFIG (answered with
//!   SET_READER_CONFIG_RESPONSE) or KEEPALIVE_ACK. Either enters `Streaming`.
//!   Anything else closes the connection.
//! - `Streaming` sends an immediate report burst and then multiplexes the
//!   report timer, the optional keepalive timer, tag-set snapshots and inbound
//!   messages. A keepalive tick sends KEEPALIVE and drops back to
//!   `AwaitingSetup` until the client acknowledges it.
//!
//! Every handler runs to completion before the loop selects again, so a tag
//! update never interrupts a report that is being written.
//!
//! The loop is generic over the transport so it can be driven by a
//! `TcpStream` in production and an in-memory duplex pipe in tests.

use crate::llrp::{LlrpCodec, LlrpMessage, MessageType};
use crate::registry::TagSnapshot;
use crate::report::{FrameSequence, build_frames};
use crate::session::Session;
use crate::{EmulatorError, Result};
use futures::{SinkExt, StreamExt};
use rand::seq::SliceRandom;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, trace, warn};


/// Timing and sizing for one connection.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub report_interval: Duration,
    /// `None` disables keepalives.
    pub keepalive_interval: Option<Duration>,
    /// Largest RO_ACCESS_REPORT to build; 0 means no cap.
    pub max_pdu: usize,
    /// Largest inbound message accepted before the connection is dropped.
    pub max_inbound_message: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(1),
            keepalive_interval: None,
            max_pdu: 1500,
            max_inbound_message: crate::llrp::codec::DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingSetup,
    Streaming,
    Closed,
}

/// Run the protocol loop until the peer disconnects or misbehaves.
///
/// Returns `Ok(())` for a clean close (peer EOF) and the error that ended the
/// connection otherwise.
pub async fn run_connection<S>(
    stream: S,
    session: Session,
    tags: watch::Receiver<TagSnapshot>,
    settings: ConnectionSettings,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    let (reader, writer) = tokio::io::split(stream);
    let codec = LlrpCodec::new(settings.max_inbound_message);
    let mut protocol = ProtocolLoop {
        inbound: FramedRead::new(reader, codec.clone()),
        outbound: FramedWrite::new(writer, codec),
        frames: FrameSequence::default(),
        session,
        tags,
        settings,
    };
    protocol.rebuild_frames();

    let result = protocol.run().await;
    // Best effort; the peer may already be gone
    let _ = protocol.outbound.close().await;
    result
}

struct ProtocolLoop<S> {
    inbound: FramedRead<ReadHalf<S>, LlrpCodec>,
    outbound: FramedWrite<WriteHalf<S>, LlrpCodec>,
    frames: FrameSequence,
    session: Session,
    tags: watch::Receiver<TagSnapshot>,
    settings: ConnectionSettings,
}

impl<S> ProtocolLoop<S>
where
    S: AsyncRead + AsyncWrite,
{
    async fn run(&mut self) -> Result<()> {
        let id = self.session.message_ids.next();
        self.send(LlrpMessage::reader_event_notification(id, now_micros())).await?;
        info!(message_id = id, "Sent READER_EVENT_NOTIFICATION");

        let mut state = ConnectionState::AwaitingSetup;
        loop {
            let next = match state {
                ConnectionState::AwaitingSetup => self.await_setup().await?,
                ConnectionState::Streaming => self.stream_reports().await?,
                ConnectionState::Closed => break,
            };
            if next != state {
                debug!(from = ?state, to = ?next, "Connection state change");
            }
            state = next;
        }
        Ok(())
    }

    async fn await_setup(&mut self) -> Result<ConnectionState> {
        let Some(message) = self.inbound.next().await.transpose()? else {
            info!("Client closed connection during setup");
            return Ok(ConnectionState::Closed);
        };

        match message.message_type() {
            Some(MessageType::SetReaderConfig) => {
                info!(message_id = message.id, "Received SET_READER_CONFIG");
                self.send_config_response().await?;
                Ok(ConnectionState::Streaming)
            }
            Some(MessageType::KeepaliveAck) => {
                debug!(message_id = message.id, "Received KEEPALIVE_ACK");
                Ok(ConnectionState::Streaming)
            }
            Some(other) => {
                warn!(kind = %other, "Unexpected message while awaiting setup");
                Err(EmulatorError::connection_failed(format!("unexpected {other} while awaiting setup")))
            }
            None => Err(EmulatorError::UnknownHeader { header: message.header }),
        }
    }

    async fn stream_reports(&mut self) -> Result<ConnectionState> {
        if self.tags.has_changed().unwrap_or(false) {
            self.rebuild_frames();
        }
        self.send_reports(true).await?;

        let mut report = ticker(self.settings.report_interval);
        let mut keepalive = self.settings.keepalive_interval.map(ticker);
        let mut tags_open = true;

        loop {
            tokio::select! {
                _ = report.tick() => self.send_reports(false).await?,
                _ = next_tick(&mut keepalive) => {
                    self.send_keepalive().await?;
                    return Ok(ConnectionState::AwaitingSetup);
                }
                changed = self.tags.changed(), if tags_open => match changed {
                    Ok(()) => self.rebuild_frames(),
                    Err(_) => {
                        debug!("Tag registry gone, keeping last snapshot");
                        tags_open = false;
                    }
                },
                message = self.inbound.next() => match message.transpose()? {
                    Some(message) => self.handle_streaming_message(message).await?,
                    None => {
                        info!("Client closed connection");
                        return Ok(ConnectionState::Closed);
                    }
                },
            }
        }
    }

    async fn handle_streaming_message(&mut self, message: LlrpMessage) -> Result<()> {
        match message.message_type() {
            Some(MessageType::KeepaliveAck) => {
                trace!(message_id = message.id, "KEEPALIVE_ACK while streaming");
                Ok(())
            }
            Some(MessageType::SetReaderConfig) => {
                info!(message_id = message.id, "Received SET_READER_CONFIG while streaming");
                self.send_config_response().await
            }
            Some(other) => {
                debug!(kind = %other, "Ignoring message while streaming");
                Ok(())
            }
            None => Err(EmulatorError::UnknownHeader { header: message.header }),
        }
    }

    async fn send_config_response(&mut self) -> Result<()> {
        let id = self.session.message_ids.next();
        self.send(LlrpMessage::set_reader_config_response(id)).await?;
        info!(message_id = id, "Sent SET_READER_CONFIG_RESPONSE");
        Ok(())
    }

    async fn send_keepalive(&mut self) -> Result<()> {
        let id = self.session.keepalive_ids.next();
        self.send(LlrpMessage::keepalive(id)).await?;
        info!(message_id = id, "Sent KEEPALIVE, waiting for KEEPALIVE_ACK");
        Ok(())
    }

    /// Send every frame once, in random order, one message ID per frame.
    async fn send_reports(&mut self, initial: bool) -> Result<()> {
        if self.frames.is_empty() {
            trace!("No tags to report");
            return Ok(());
        }

        let mut order: Vec<usize> = (0..self.frames.len()).collect();
        order.shuffle(&mut rand::rng());

        for index in order {
            let payload = self.frames[index].payload.clone();
            let id = self.session.message_ids.next();
            self.outbound.feed(LlrpMessage::ro_access_report(id, payload)).await?;
        }
        self.outbound.flush().await?;

        let reports = self.frames.len();
        let tags = self.frames.total_tag_count();
        if initial {
            info!(reports, tags, "Sent initial RO_ACCESS_REPORT burst");
        } else {
            debug!(reports, tags, "Sent RO_ACCESS_REPORT");
        }
        Ok(())
    }

    fn rebuild_frames(&mut self) {
        let snapshot = self.tags.borrow_and_update().clone();
        self.frames = build_frames(&snapshot, self.settings.max_pdu);
        debug!(tags = snapshot.len(), frames = self.frames.len(), "Rebuilt report frames");
    }

    async fn send(&mut self, message: LlrpMessage) -> Result<()> {
        self.outbound.send(message).await
    }
}

/// Interval whose first tick is one period from now.
fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn now_micros() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_micros() as u64).unwrap_or(0)
}

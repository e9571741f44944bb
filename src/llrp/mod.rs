//! LLRP binary codec (the subset a logical reader needs to stream tag reports)
//!
//! Everything on the wire is big-endian. A message is a 10 byte header
//! (`u16 rsvd|version|type`, `u32 length`, `u32 message id`) followed by a body
//! of TLV and TV parameters.
//!
//! ## Layout
//!
//! - [`header`] - message type constants and the `Rsvd+Ver+Type` field
//! - [`param`] - parameter encoders (EPCData, EPC-96, C1G2-PC, TagReportData, ...)
//! - [`message`] - top-level messages the reader sends and receives
//! - [`decode`] - client-side RO_ACCESS_REPORT decoding
//! - [`codec`] - `tokio_util` framing for TCP streams
//!
//! Encoders are pure functions: the same input always yields the same bytes.

pub mod codec;
pub mod decode;
pub mod header;
pub mod message;
pub mod param;

pub use codec::LlrpCodec;
pub use decode::{TagReadEvent, decode_ro_access_report};
pub use header::{MESSAGE_HEADER_LEN, MessageType};
pub use message::LlrpMessage;
pub use param::tag_report_data;

//! Mock LLRP logical reader for RFID tag streams.
//!
//! `llrp_emu` speaks enough of the Low Level Reader Protocol (LLRP 1.0.1) to
//! stand in for a real reader in front of RFID middleware: it completes the
//! connection handshake, then streams a synthetic tag population as
//! periodic RO_ACCESS_REPORT messages while the population is edited live.
//!
//! # Features
//!
//! - **Byte-exact codec**: EPC-96 and EPCData forms, C1G2 PC, PeakRSSI and
//!   read-op results
//! - **Size-bounded reports**: tags are packed into frames under a max PDU
//! - **Live updates**: every connection sees every tag-set change
//! - **Tooling**: client mode, event-cycle simulation and a JSON management channel
//!
//! # Architecture
//!
//! ```text
//! management / simulator --> TagRegistry (actor) --watch--> connection loops --> TCP
//!                                                            |
//!                                                    build_frames + llrp codec
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use llrp_emu::{EmulatorConfig, LlrpServer, TagRegistry, tag::store};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EmulatorConfig::default();
//!     let cancel = CancellationToken::new();
//!     let registry = TagRegistry::spawn(store::load_tags("tags.csv")?, cancel.clone());
//!
//!     let server = LlrpServer::bind(
//!         config.llrp_addr(),
//!         config.session(),
//!         registry,
//!         config.connection_settings(),
//!     )
//!     .await?;
//!     server.run(cancel).await?;
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod llrp;
pub mod report;
pub mod session;
pub mod tag;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

// Reader runtime
pub mod connection;
pub mod registry;
pub mod server;

// Tooling around the reader
pub mod client;
pub mod management;
pub mod simulation;

// Core exports
pub use config::EmulatorConfig;
pub use error::*;
pub use report::{Frame, FrameSequence, build_frames};
pub use session::{MessageIdCounter, Session};
pub use tag::{Tag, TagRecord};

// Runtime exports
pub use connection::{ConnectionSettings, run_connection};
pub use registry::{TagAction, TagRegistry, TagRegistryHandle, TagSnapshot};
pub use server::LlrpServer;

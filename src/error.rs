//! Error types for the emulator.
//!
//! All fallible operations in the crate return [`EmulatorError`]. The variants
//! fall into a few groups:
//!
//! - **Input errors**: malformed tag records, bit strings and persisted files
//! - **Protocol errors**: frames that cannot be parsed or carry an unknown header
//! - **I/O errors**: socket and file failures, listener bind failures
//!
//! Protocol and I/O errors observed on a single LLRP connection only ever end
//! that connection; see [`EmulatorError::is_connection_fatal`].
//!
//! ```rust
//! use llrp_emu::EmulatorError;
//!
//! let err = EmulatorError::parse("RO_ACCESS_REPORT", "TRD runs past report end");
//! assert!(err.to_string().contains("RO_ACCESS_REPORT"));
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for emulator operations.
pub type Result<T, E = EmulatorError> = std::result::Result<T, E>;

/// Main error type for emulator operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EmulatorError {
    #[error("invalid PCBits '{value}'")]
    InvalidPcBits { value: String },

    #[error("invalid EPC '{value}': {reason}")]
    InvalidEpc { value: String, reason: String },

    #[error("binary string of length {length} is not byte aligned")]
    NonByteAlignedBinaryString { length: usize },

    #[error("binary string of length {length} is shorter than one byte")]
    BinaryStringTooShort { length: usize },

    #[error("invalid tag record at line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("unknown LLRP header {header} (0x{header:04x})")]
    UnknownHeader { header: u16 },

    #[error("LLRP message length {length} outside 10..={max}")]
    FrameLength { length: u32, max: usize },

    #[error("tag file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection error: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("tag registry is no longer running")]
    RegistryClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EmulatorError {
    /// Returns whether this error, seen on an LLRP connection, ends that connection.
    ///
    /// Input errors are reported back to whoever supplied the input and never
    /// affect a live connection.
    pub fn is_connection_fatal(&self) -> bool {
        match self {
            EmulatorError::Parse { .. } => true,
            EmulatorError::UnknownHeader { .. } => true,
            EmulatorError::FrameLength { .. } => true,
            EmulatorError::Connection { .. } => true,
            EmulatorError::Io(_) => true,
            EmulatorError::InvalidPcBits { .. } => false,
            EmulatorError::InvalidEpc { .. } => false,
            EmulatorError::NonByteAlignedBinaryString { .. } => false,
            EmulatorError::BinaryStringTooShort { .. } => false,
            EmulatorError::InvalidRecord { .. } => false,
            EmulatorError::File { .. } => false,
            EmulatorError::Bind { .. } => false,
            EmulatorError::Config { .. } => false,
            EmulatorError::RegistryClosed => false,
        }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        EmulatorError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for EPC errors.
    pub fn invalid_epc(value: impl Into<String>, reason: impl Into<String>) -> Self {
        EmulatorError::InvalidEpc { value: value.into(), reason: reason.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EmulatorError::File { path: path.into(), source }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        EmulatorError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        EmulatorError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        EmulatorError::Config { reason: reason.into() }
    }
}

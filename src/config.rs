//! Emulator configuration
//!
//! Every field has a default, so a YAML file only needs the keys it changes:
//!
//! ```yaml
//! port: 5084
//! report_interval_ms: 500
//! keepalive_interval_secs: 10
//! tag_file: tags.csv
//! ```
//!
//! Command-line flags are applied on top of whatever the file provides.

use crate::connection::ConnectionSettings;
use crate::session::Session;
use crate::{EmulatorError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// LLRP listening (server) or connecting (client) address.
    pub ip: IpAddr,
    pub port: u16,
    /// Interval between RO_ACCESS_REPORT bursts in milliseconds.
    pub report_interval_ms: u64,
    /// KEEPALIVE interval in seconds; 0 disables keepalives.
    pub keepalive_interval_secs: u64,
    /// Largest RO_ACCESS_REPORT in bytes; 0 means unbounded.
    pub max_pdu: usize,
    pub initial_message_id: u32,
    pub initial_keepalive_id: u32,
    /// CSV or binary tag file loaded at startup.
    pub tag_file: Option<PathBuf>,
    /// Management channel port; 0 disables it.
    pub management_port: u16,
    pub max_inbound_message: usize,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5084,
            report_interval_ms: 1000,
            keepalive_interval_secs: 0,
            max_pdu: 1500,
            initial_message_id: 1000,
            initial_keepalive_id: 80000,
            tag_file: None,
            management_port: 3000,
            max_inbound_message: crate::llrp::codec::DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

impl EmulatorConfig {
    /// Load and validate a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| EmulatorError::file_error(path, e))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(content)
            .map_err(|e| EmulatorError::config(format!("YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.report_interval_ms == 0 {
            return Err(EmulatorError::config("report_interval_ms must be greater than 0"));
        }
        if self.max_inbound_message < crate::llrp::MESSAGE_HEADER_LEN {
            return Err(EmulatorError::config("max_inbound_message is smaller than an LLRP header"));
        }
        Ok(())
    }

    pub fn llrp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Management listener address, or `None` when disabled.
    pub fn management_addr(&self) -> Option<SocketAddr> {
        (self.management_port != 0).then(|| SocketAddr::new(self.ip, self.management_port))
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_interval_secs != 0).then(|| Duration::from_secs(self.keepalive_interval_secs))
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            report_interval: self.report_interval(),
            keepalive_interval: self.keepalive_interval(),
            max_pdu: self.max_pdu,
            max_inbound_message: self.max_inbound_message,
        }
    }

    pub fn session(&self) -> Session {
        Session::new(self.initial_message_id, self.initial_keepalive_id)
    }
}

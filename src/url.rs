//! Source configuration and its URL form.
//!
//! Parses URLs in the format:
//! rtp://GROUP[:PORT][?options]
//!
//! Options:
//! - iface: IPv4 interface for the multicast join
//! - ssrc: only accept this SSRC (decimal or 0x hex, 0 = first seen)
//! - in: force the input channel count (1 or 2) instead of the payload table
//! - out: output channel count (1 or 2)
//! - type: output sample type (float, complex, short)
//! - quiet: suppress session change notices
//! - timeout: receive timeout in ms
//! - sessions: how many sessions may be tracked at once

use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use crate::codec::{OutputLayout, SampleType};
use crate::error::{Error, Result};

/// Upper bound on `max_sessions`
pub const MAX_SESSIONS: usize = 1024;

/// Everything the source needs besides the host's output buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Multicast group (or unicast address) with optional port
    pub group: String,
    /// Interface for the multicast join
    pub interface: Option<Ipv4Addr>,
    /// SSRC filter, 0 accepts the first stream seen
    pub ssrc: u32,
    /// Forced input channel count; None uses the payload type table
    pub input_channels: Option<u8>,
    /// Output channel count (1 or 2)
    pub output_channels: u8,
    /// Output sample type
    pub sample_type: SampleType,
    /// Suppress session change notices
    pub quiet: bool,
    /// Bound on each blocking receive
    pub recv_timeout: Duration,
    /// Registry capacity
    pub max_sessions: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            group: "239.1.2.3:5004".to_string(),
            interface: None,
            ssrc: 0,
            input_channels: None,
            output_channels: 1,
            sample_type: SampleType::Float,
            quiet: false,
            recv_timeout: Duration::from_millis(100),
            max_sessions: 1,
        }
    }
}

fn parse_u32(value: &str) -> std::result::Result<u32, std::num::ParseIntError> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "" | "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl SourceConfig {
    /// Parse an rtp:// URL.
    ///
    /// # Examples
    /// ```
    /// use rtp_pcm_source::SourceConfig;
    ///
    /// let cfg = SourceConfig::parse("rtp://239.1.2.3:5004?out=2&ssrc=0x1234").unwrap();
    /// assert_eq!(cfg.output_channels, 2);
    /// assert_eq!(cfg.ssrc, 0x1234);
    /// ```
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if !url.to_lowercase().starts_with("rtp://") {
            return Err(Error::InvalidUrl("URL must start with rtp://".to_string()));
        }

        let rest = &url[6..];
        let mut result = Self::default();

        let (group, query) = match rest.find('?') {
            Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
            None => (rest, None),
        };

        if group.is_empty() {
            return Err(Error::InvalidUrl("missing group address".to_string()));
        }
        result.group = group.to_string();

        if let Some(query) = query {
            for param in query.split('&').filter(|p| !p.is_empty()) {
                let mut parts = param.splitn(2, '=');
                let key = parts.next().unwrap_or("");
                let value = parts.next().unwrap_or("");

                match key {
                    "iface" | "interface" => {
                        result.interface = Some(
                            Ipv4Addr::from_str(value)
                                .map_err(|e| Error::InvalidUrl(format!("invalid interface '{}': {}", value, e)))?,
                        );
                    }
                    "ssrc" => {
                        result.ssrc = parse_u32(value)
                            .map_err(|e| Error::InvalidUrl(format!("invalid ssrc '{}': {}", value, e)))?;
                    }
                    "in" | "input" => {
                        let channels: u8 = value
                            .parse()
                            .map_err(|e| Error::InvalidUrl(format!("invalid input channels '{}': {}", value, e)))?;
                        // 0 means "from the payload type"
                        result.input_channels = (channels != 0).then_some(channels);
                    }
                    "out" | "channels" | "ch" => {
                        result.output_channels = value
                            .parse()
                            .map_err(|e| Error::InvalidUrl(format!("invalid output channels '{}': {}", value, e)))?;
                    }
                    "type" => {
                        result.sample_type = value.parse()?;
                    }
                    "quiet" => {
                        result.quiet = parse_bool(value)
                            .ok_or_else(|| Error::InvalidUrl(format!("invalid quiet flag '{}'", value)))?;
                    }
                    "timeout" => {
                        let ms: u64 = value
                            .parse()
                            .map_err(|e| Error::InvalidUrl(format!("invalid timeout '{}': {}", value, e)))?;
                        result.recv_timeout = Duration::from_millis(ms);
                    }
                    "sessions" => {
                        result.max_sessions = value
                            .parse()
                            .map_err(|e| Error::InvalidUrl(format!("invalid session count '{}': {}", value, e)))?;
                    }
                    _ => {
                        // Ignore unknown parameters
                    }
                }
            }
        }

        Ok(result)
    }

    /// Check the configuration and pick the output layout.
    pub fn validate(&self) -> Result<OutputLayout> {
        if let Some(ch) = self.input_channels {
            if !(1..=2).contains(&ch) {
                return Err(Error::InvalidConfiguration(format!(
                    "input channel count must be 1 or 2, got {}",
                    ch
                )));
            }
        }
        if self.max_sessions == 0 {
            return Err(Error::InvalidConfiguration("at least one session is required".to_string()));
        }
        if self.max_sessions > MAX_SESSIONS {
            return Err(Error::InvalidConfiguration(format!(
                "at most {} sessions can be tracked, got {}",
                MAX_SESSIONS, self.max_sessions
            )));
        }
        if self.recv_timeout.is_zero() {
            return Err(Error::InvalidConfiguration("receive timeout must be non-zero".to_string()));
        }
        OutputLayout::new(self.sample_type, self.output_channels)
    }
}

impl FromStr for SourceConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

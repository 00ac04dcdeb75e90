//! Exporter configuration
//!
//! Loaded from a YAML file with two sections:
//!
//! ```yaml
//! quota_exporter:
//!   api_url: "http://quota.internal/api/quota"
//!   scrape_interval: 600
//!   request_timeout: "3m"
//! server:
//!   listen_address: "0.0.0.0"
//!   listen_port: 9533
//! ```
//!
//! Missing or zero values fall back to the defaults below. Only `api_url` is
//! mandatory; [`Config::validate`] rejects a config without it.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default pause between the end of one cycle and the start of the next
pub const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(600);

/// Default deadline for a single quota API request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";

/// Default HTTP listen port
pub const DEFAULT_LISTEN_PORT: u16 = 9533;

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved exporter configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Quota collection settings
    pub collector: CollectorConfig,

    /// HTTP server settings
    pub server: ServerConfig,
}

/// Settings driving the fetch cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    /// Quota API endpoint (POSTed to with an empty body)
    pub api_url: String,

    /// Sleep between the end of a cycle and the next one
    pub scrape_interval: Duration,

    /// Deadline for each quota API request
    pub request_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            scrape_interval: DEFAULT_SCRAPE_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Settings for the `/metrics` and `/health` listener
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen_address: String,
    pub listen_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            listen_port: DEFAULT_LISTEN_PORT,
        }
    }
}

impl ServerConfig {
    /// Resolve the listen address into a socket address.
    ///
    /// `listen_address` must be an IP literal (v4 or v6).
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.listen_address.trim().parse().map_err(|e| {
            Error::Config(format!(
                "invalid listen address {}: {}",
                self.listen_address, e
            ))
        })?;
        Ok(SocketAddr::new(ip, self.listen_port))
    }

    /// Replace address and port from a full socket address.
    pub fn set_socket_addr(&mut self, addr: SocketAddr) {
        self.listen_address = addr.ip().to_string();
        self.listen_port = addr.port();
    }
}

// =============================================================================
// File Format
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    quota_exporter: RawCollectorConfig,
    #[serde(default)]
    server: RawServerConfig,
}

#[derive(Debug, Default, Deserialize)]
struct RawCollectorConfig {
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    scrape_interval: Option<u64>,
    #[serde(default)]
    request_timeout: Option<RawDuration>,
}

#[derive(Debug, Default, Deserialize)]
struct RawServerConfig {
    #[serde(default)]
    listen_address: Option<String>,
    #[serde(default)]
    listen_port: Option<u16>,
}

/// A duration written either as bare seconds or as a unit string ("3m")
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl RawDuration {
    fn resolve(&self) -> Result<Duration> {
        match self {
            RawDuration::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            RawDuration::Text(s) if s.trim().is_empty() => Ok(Duration::ZERO),
            RawDuration::Text(s) => parse_duration(s),
        }
    }
}

impl Config {
    /// Read and resolve a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Resolve a YAML document, applying defaults for absent or zero values.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let raw: RawConfig = if contents.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(contents)?
        };

        let scrape_interval = match raw.quota_exporter.scrape_interval {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => DEFAULT_SCRAPE_INTERVAL,
        };

        let request_timeout = match raw.quota_exporter.request_timeout {
            Some(ref value) => {
                let timeout = value.resolve()?;
                if timeout.is_zero() {
                    DEFAULT_REQUEST_TIMEOUT
                } else {
                    timeout
                }
            }
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let server_defaults = ServerConfig::default();

        Ok(Self {
            collector: CollectorConfig {
                api_url: raw.quota_exporter.api_url.unwrap_or_default(),
                scrape_interval,
                request_timeout,
            },
            server: ServerConfig {
                listen_address: raw
                    .server
                    .listen_address
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or(server_defaults.listen_address),
                listen_port: raw
                    .server
                    .listen_port
                    .filter(|p| *p > 0)
                    .unwrap_or(server_defaults.listen_port),
            },
        })
    }

    /// Reject configurations the exporter cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.collector.api_url.trim().is_empty() {
            return Err(Error::Config(
                "quota_exporter.api_url is missing".to_string(),
            ));
        }
        self.server.socket_addr()?;
        Ok(())
    }
}

/// Parse a duration string like "3m", "1h30m", "1m30.5s", "500ms" or "45".
///
/// Each component is a decimal number followed by one of `ns`, `us`, `ms`,
/// `s`, `m`, `h` or `d`. A trailing number without a unit is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::DurationParse("empty duration string".to_string()));
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let overflow = || Error::DurationParse(format!("duration overflows: {}", s));

    let mut total = Duration::ZERO;
    let mut rest = s;

    while !rest.is_empty() {
        let (number, tail) = rest.split_at(rest.find(|c: char| !is_number(c)).unwrap_or(rest.len()));
        let (unit, tail) = tail.split_at(tail.find(is_number).unwrap_or(tail.len()));
        rest = tail;

        let value: f64 = number
            .parse()
            .map_err(|_| Error::DurationParse(format!("invalid number in duration: {}", s)))?;

        let secs = match unit.to_ascii_lowercase().as_str() {
            "ns" => value / 1e9,
            "us" | "µs" => value / 1e6,
            "ms" => value / 1e3,
            "" | "s" => value,
            "m" => value * 60.0,
            "h" => value * 3600.0,
            "d" => value * 86400.0,
            other => {
                return Err(Error::DurationParse(format!(
                    "unknown duration unit: {}",
                    other
                )))
            }
        };

        let part = Duration::try_from_secs_f64(secs).map_err(|_| overflow())?;
        total = total.checked_add(part).ok_or_else(overflow)?;
    }

    Ok(total)
}

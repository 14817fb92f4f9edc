use crate::error::ConfigError;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::info;

/// UDP port the wallbox listens on and answers from
pub const KEBA_UDP_PORT: u16 = 7090;
pub const DEFAULT_POLL_SECS: u64 = 10;
pub const DEFAULT_METRICS_PORT: u16 = 11521;
pub const DEFAULT_ACCESSORY_NAME: &str = "KEBA P30 Wallbox";

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub device_address: SocketAddr,
    pub bind_address: SocketAddr,
    pub poll_interval: Duration,
    pub verbose_reports: bool,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
    pub accessory_name: String,
}

impl MonitorConfig {
    /// Reads the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of a variable
    /// if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let device = lookup("KEBA_ADDRESS")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing("KEBA_ADDRESS"))?;
        let device_address = parse_address("KEBA_ADDRESS", &device)?;

        let bind_address = match lookup("KEBA_BIND") {
            Some(value) => parse_address("KEBA_BIND", &value)?,
            None => SocketAddr::from(([0, 0, 0, 0], KEBA_UDP_PORT)),
        };

        let poll_secs = parse_number(
            "KEBA_POLL_SECS",
            lookup("KEBA_POLL_SECS"),
            DEFAULT_POLL_SECS,
        )?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidNumber {
                name: "KEBA_POLL_SECS",
                value: "0".to_string(),
            });
        }

        let metrics_port = parse_number(
            "METRICS_PORT",
            lookup("METRICS_PORT"),
            DEFAULT_METRICS_PORT,
        )?;

        Ok(Self {
            device_address,
            bind_address,
            poll_interval: Duration::from_secs(poll_secs),
            verbose_reports: parse_bool_or(lookup("KEBA_VERBOSE"), true),
            metrics_enabled: parse_bool_or(lookup("METRICS_EXPOSURE"), true),
            metrics_port,
            accessory_name: lookup("ACCESSORY_NAME")
                .unwrap_or_else(|| DEFAULT_ACCESSORY_NAME.to_string()),
        })
    }

    pub fn metrics_address(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.metrics_port))
    }

    pub fn log_summary(&self) {
        info!("Wallbox monitor config:");
        info!("  Accessory: {}", self.accessory_name);
        info!("  Wallbox: {}", self.device_address);
        info!("  Bind: {}", self.bind_address);
        info!("  Poll interval: {:?}", self.poll_interval);
        info!("  Per-report logging: {}", self.verbose_reports);
        if self.metrics_enabled {
            info!("  Metrics port: {}", self.metrics_port);
        } else {
            info!("  Metrics: disabled");
        }
    }
}

/// Accepts `ip:port` or a bare IP, which gets the wallbox UDP port
fn parse_address(name: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    let value = value.trim();
    value
        .parse::<SocketAddr>()
        .or_else(|_| {
            value
                .parse::<IpAddr>()
                .map(|ip| SocketAddr::new(ip, KEBA_UDP_PORT))
        })
        .map_err(|_| ConfigError::InvalidAddress {
            name,
            value: value.to_string(),
        })
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}

/// Parses a boolean flag; unset uses `default`, anything unparsable is false
fn parse_bool_or(val: Option<String>, default: bool) -> bool {
    match val {
        None => default,
        Some(val) => val.trim().to_ascii_lowercase().parse().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = tokio_test::assert_ok!(MonitorConfig::from_lookup(lookup_from(&[(
            "KEBA_ADDRESS",
            "192.168.1.23"
        )])));

        assert_eq!(config.device_address, "192.168.1.23:7090".parse().unwrap());
        assert_eq!(config.bind_address, "0.0.0.0:7090".parse().unwrap());
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert!(config.verbose_reports);
        assert!(config.metrics_enabled);
        assert_eq!(config.metrics_address(), "0.0.0.0:11521".parse().unwrap());
        assert_eq!(config.accessory_name, "KEBA P30 Wallbox");
    }

    #[test]
    fn test_overrides() {
        let config = MonitorConfig::from_lookup(lookup_from(&[
            ("KEBA_ADDRESS", "10.0.0.5:7091"),
            ("KEBA_BIND", "127.0.0.1:0"),
            ("KEBA_POLL_SECS", "5"),
            ("KEBA_VERBOSE", "FALSE"),
            ("METRICS_EXPOSURE", "false"),
            ("METRICS_PORT", "9100"),
            ("ACCESSORY_NAME", "Carport"),
        ]))
        .unwrap();

        assert_eq!(config.device_address, "10.0.0.5:7091".parse().unwrap());
        assert_eq!(config.bind_address, "127.0.0.1:0".parse().unwrap());
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(!config.verbose_reports);
        assert!(!config.metrics_enabled);
        assert_eq!(config.metrics_port, 9100);
        assert_eq!(config.accessory_name, "Carport");
    }

    #[test]
    fn test_missing_address() {
        assert_eq!(
            MonitorConfig::from_lookup(lookup_from(&[])),
            Err(ConfigError::Missing("KEBA_ADDRESS"))
        );
        assert_eq!(
            MonitorConfig::from_lookup(lookup_from(&[("KEBA_ADDRESS", "  ")])),
            Err(ConfigError::Missing("KEBA_ADDRESS"))
        );
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            MonitorConfig::from_lookup(lookup_from(&[("KEBA_ADDRESS", "wallbox.local")])),
            Err(ConfigError::InvalidAddress {
                name: "KEBA_ADDRESS",
                value: "wallbox.local".to_string()
            })
        );
        assert_eq!(
            MonitorConfig::from_lookup(lookup_from(&[
                ("KEBA_ADDRESS", "192.168.1.23"),
                ("METRICS_PORT", "99999"),
            ])),
            Err(ConfigError::InvalidNumber {
                name: "METRICS_PORT",
                value: "99999".to_string()
            })
        );
        assert!(matches!(
            MonitorConfig::from_lookup(lookup_from(&[
                ("KEBA_ADDRESS", "192.168.1.23"),
                ("KEBA_POLL_SECS", "0"),
            ])),
            Err(ConfigError::InvalidNumber {
                name: "KEBA_POLL_SECS",
                ..
            })
        ));
    }

    #[test]
    fn test_parse_bool_or() {
        assert!(parse_bool_or(None, true));
        assert!(!parse_bool_or(None, false));
        assert!(parse_bool_or(Some("True".to_string()), false));
        assert!(parse_bool_or(Some(" TRUE ".to_string()), false));
        assert!(!parse_bool_or(Some("false".to_string()), true));
        // Anything unrecognised switches the flag off
        assert!(!parse_bool_or(Some("yes".to_string()), true));
        assert!(!parse_bool_or(Some("1".to_string()), true));
        assert!(!parse_bool_or(Some("".to_string()), true));
    }
}

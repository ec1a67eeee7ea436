//! Service configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use saga::ConsumerConfig;
use thiserror::Error;

/// The five deployable services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    OrderService,
    Inventory,
    Warehouse,
    Shipper,
    Notification,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Service::OrderService => "order-service",
            Service::Inventory => "inventory",
            Service::Warehouse => "warehouse",
            Service::Shipper => "shipper",
            Service::Notification => "notification",
        }
    }

    /// Default HTTP port, so all services can run side by side on one host.
    pub fn default_port(&self) -> u16 {
        match self {
            Service::OrderService => 8080,
            Service::Inventory => 8081,
            Service::Warehouse => 8082,
            Service::Shipper => 8083,
            Service::Notification => 8084,
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Invalid configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Validated configuration for one service instance.
///
/// Reads from environment variables:
/// - `HOST` / `PORT`: HTTP listener (default `0.0.0.0` / per service)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `NATS_URL`: bus address (default `nats://localhost:4222`)
/// - `CONSUMER_GROUP`: durable consumer name prefix (default: service name)
/// - `LEDGER_PATH`: ledger database file (default `/tmp/<service>.db`)
/// - `POLL_TIMEOUT_MS`: consumer poll window (default `5000`)
/// - `DEDUP_TTL_SECS`: ledger record TTL (default 7 days)
/// - `LEDGER_SWEEP_SECS`: expired-record sweep interval (default `3600`)
/// - `SHUTDOWN_GRACE_SECS`: HTTP drain deadline (default `10`)
/// - `NOTIFICATION_FROM`: notification sender address (default `orders@ppe4all`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub service: Service,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub nats_url: String,
    pub consumer_group: String,
    pub ledger_path: PathBuf,
    pub poll_timeout: Duration,
    pub dedup_ttl: Duration,
    pub ledger_sweep_interval: Duration,
    pub shutdown_grace: Duration,
    pub notification_from: String,
}

impl Config {
    /// Defaults for `service` with no environment applied.
    pub fn defaults(service: Service) -> Self {
        Self {
            service,
            host: "0.0.0.0".to_string(),
            port: service.default_port(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            nats_url: "nats://localhost:4222".to_string(),
            consumer_group: service.name().to_string(),
            ledger_path: PathBuf::from(format!("/tmp/{}.db", service.name())),
            poll_timeout: saga::DEFAULT_POLL_TIMEOUT,
            dedup_ttl: ledger::DEFAULT_TTL,
            ledger_sweep_interval: Duration::from_secs(3600),
            shutdown_grace: Duration::from_secs(10),
            notification_from: saga::DEFAULT_FROM.to_string(),
        }
    }

    /// Loads configuration from the process environment.
    pub fn from_env(service: Service) -> Result<Self, ConfigError> {
        Self::from_lookup(service, |var| std::env::var(var).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup(
        service: Service,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::defaults(service);

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse_port(&port)?;
        }
        if let Some(level) = lookup("RUST_LOG") {
            config.log_level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            config.log_format = parse_log_format(&format)?;
        }
        if let Some(url) = lookup("NATS_URL") {
            config.nats_url = url;
        }
        if let Some(group) = lookup("CONSUMER_GROUP") {
            config.consumer_group = group;
        }
        if let Some(path) = lookup("LEDGER_PATH") {
            config.ledger_path = PathBuf::from(path);
        }
        if let Some(ms) = lookup("POLL_TIMEOUT_MS") {
            config.poll_timeout = Duration::from_millis(parse_positive("POLL_TIMEOUT_MS", &ms)?);
        }
        if let Some(secs) = lookup("DEDUP_TTL_SECS") {
            config.dedup_ttl = Duration::from_secs(parse_positive("DEDUP_TTL_SECS", &secs)?);
        }
        if let Some(secs) = lookup("LEDGER_SWEEP_SECS") {
            config.ledger_sweep_interval =
                Duration::from_secs(parse_positive("LEDGER_SWEEP_SECS", &secs)?);
        }
        if let Some(secs) = lookup("SHUTDOWN_GRACE_SECS") {
            config.shutdown_grace =
                Duration::from_secs(parse_positive("SHUTDOWN_GRACE_SECS", &secs)?);
        }
        if let Some(from) = lookup("NOTIFICATION_FROM") {
            config.notification_from = from;
        }

        Ok(config)
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            poll_timeout: self.poll_timeout,
            dedup_ttl: self.dedup_ttl,
            ..ConsumerConfig::default()
        }
    }
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|e| invalid("PORT", value, e))
}

fn parse_positive(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(invalid(var, value, "must be greater than zero")),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(var, value, e)),
    }
}

fn parse_log_format(value: &str) -> Result<LogFormat, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        _ => Err(invalid("LOG_FORMAT", value, "expected `text` or `json`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(service: Service, vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(service, |k| vars.get(k).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(Service::Warehouse, &[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8082);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.consumer_group, "warehouse");
        assert_eq!(config.ledger_path, PathBuf::from("/tmp/warehouse.db"));
        assert_eq!(config.poll_timeout, Duration::from_millis(5000));
        assert_eq!(config.dedup_ttl, Duration::from_secs(604_800));
        assert_eq!(config.ledger_sweep_interval, Duration::from_secs(3600));
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
        assert_eq!(config.notification_from, "orders@ppe4all");
    }

    #[test]
    fn test_each_service_has_its_own_port() {
        let ports: Vec<u16> = [
            Service::OrderService,
            Service::Inventory,
            Service::Warehouse,
            Service::Shipper,
            Service::Notification,
        ]
        .iter()
        .map(Service::default_port)
        .collect();
        assert_eq!(ports, vec![8080, 8081, 8082, 8083, 8084]);
    }

    #[test]
    fn test_overrides() {
        let config = load(
            Service::Inventory,
            &[
                ("HOST", "127.0.0.1"),
                ("PORT", "9000"),
                ("LOG_FORMAT", "JSON"),
                ("NATS_URL", "nats://bus:4222"),
                ("CONSUMER_GROUP", "inventory-eu"),
                ("LEDGER_PATH", "/var/lib/inventory.db"),
                ("POLL_TIMEOUT_MS", "250"),
                ("DEDUP_TTL_SECS", "60"),
                ("SHUTDOWN_GRACE_SECS", "3"),
            ],
        )
        .unwrap();

        assert_eq!(config.addr(), "127.0.0.1:9000");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.nats_url, "nats://bus:4222");
        assert_eq!(config.consumer_group, "inventory-eu");
        assert_eq!(config.ledger_path, PathBuf::from("/var/lib/inventory.db"));
        assert_eq!(
            config.consumer_config(),
            ConsumerConfig {
                poll_timeout: Duration::from_millis(250),
                dedup_ttl: Duration::from_secs(60),
                poll_error_backoff: saga::DEFAULT_POLL_ERROR_BACKOFF,
            }
        );
        assert_eq!(config.shutdown_grace, Duration::from_secs(3));
    }

    #[test]
    fn test_rejects_zero_durations() {
        let err = load(Service::Shipper, &[("POLL_TIMEOUT_MS", "0")]).unwrap_err();
        assert!(err.to_string().starts_with("POLL_TIMEOUT_MS"));
        assert!(load(Service::Shipper, &[("DEDUP_TTL_SECS", "0")]).is_err());
    }

    #[test]
    fn test_rejects_unparseable_values() {
        assert!(load(Service::OrderService, &[("PORT", "eighty")]).is_err());
        assert!(load(Service::OrderService, &[("PORT", "70000")]).is_err());
        assert!(load(Service::OrderService, &[("LEDGER_SWEEP_SECS", "-1")]).is_err());
        assert!(load(Service::OrderService, &[("LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn test_addr_default() {
        assert_eq!(Config::defaults(Service::OrderService).addr(), "0.0.0.0:8080");
    }
}

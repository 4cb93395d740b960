//! Configuration parsing for the market-pricing pipeline.
//!
//! The runner reads its settings from a single JSON config file. Every field is
//! optional; the `effective_*()` accessors supply defaults. Component names
//! (`reader`, `market_data_source`, `market_data_publisher`) are resolved into
//! their kind enums once, at startup.
//!
//! # Example config
//!
//! ```json
//! {
//!   "MarketPricing": { "module_name": "market-pricing", "log_path": "/tmp/log" },
//!   "reader": "time-reader",
//!   "market_data_source": "ecb",
//!   "market_data_publisher": "kafka-publisher",
//!   "poll_interval_sec": 120,
//!   "since_policy": "fixed",
//!   "on_fetch_error": "skip",
//!   "ecb": { "frequency": "D" },
//!   "kafka": { "topic": "ECB-FX", "properties_file": "./config/kafka.properties" }
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::MpError;
use crate::types::{FetchErrorPolicy, PublisherKind, ReaderKind, SincePolicy, SourceKind};

pub const DEFAULT_MODULE_NAME: &str = "market-pricing";
pub const DEFAULT_POLL_INTERVAL_SEC: u64 = 120;
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 5_000;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    #[serde(rename = "MarketPricing")]
    pub market_pricing: Option<ModuleMeta>,

    /// Reader name: `"time-reader"` or `"one-shot"`.
    pub reader: Option<String>,

    /// Source name: `"ecb"` or `"simulator"`.
    pub market_data_source: Option<String>,

    /// Publisher name: `"console-publisher"` or `"kafka-publisher"`.
    pub market_data_publisher: Option<String>,

    /// Timer reader tick period in seconds (default: 120).
    pub poll_interval_sec: Option<u64>,

    /// Fire the first tick immediately instead of after one period.
    pub poll_on_start: Option<bool>,

    /// Watermark behaviour between ticks.
    pub since_policy: Option<SincePolicy>,

    /// Per-currency failure behaviour.
    pub on_fetch_error: Option<FetchErrorPolicy>,

    /// Data channel bound (default: 1, minimum 1).
    pub channel_capacity: Option<usize>,

    /// Upper bound on the shutdown drain wait in milliseconds.
    pub drain_timeout_ms: Option<u64>,

    /// Remote source settings.
    pub ecb: Option<EcbConfig>,

    /// Kafka publisher settings.
    pub kafka: Option<KafkaConfig>,
}

/// Module metadata block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

impl AppConfig {
    pub fn module_name(&self) -> String {
        self.market_pricing
            .as_ref()
            .and_then(|m| m.module_name.clone())
            .unwrap_or_else(|| DEFAULT_MODULE_NAME.to_string())
    }

    pub fn log_path(&self) -> Option<String> {
        self.market_pricing.as_ref().and_then(|m| m.log_path.clone())
    }

    pub fn reader_kind(&self) -> Result<ReaderKind, MpError> {
        self.reader.as_deref().unwrap_or(ReaderKind::TimeReader.as_str()).parse()
    }

    pub fn source_kind(&self) -> Result<SourceKind, MpError> {
        self.market_data_source.as_deref().unwrap_or(SourceKind::Ecb.as_str()).parse()
    }

    pub fn publisher_kind(&self) -> Result<PublisherKind, MpError> {
        self.market_data_publisher.as_deref().unwrap_or(PublisherKind::Console.as_str()).parse()
    }

    pub fn effective_poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_sec.unwrap_or(DEFAULT_POLL_INTERVAL_SEC).max(1))
    }

    pub fn effective_poll_on_start(&self) -> bool {
        self.poll_on_start.unwrap_or(false)
    }

    pub fn effective_since_policy(&self) -> SincePolicy {
        self.since_policy.unwrap_or_default()
    }

    pub fn effective_fetch_error_policy(&self) -> FetchErrorPolicy {
        self.on_fetch_error.unwrap_or_default()
    }

    pub fn effective_channel_capacity(&self) -> usize {
        self.channel_capacity.unwrap_or(1).max(1)
    }

    pub fn effective_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms.unwrap_or(DEFAULT_DRAIN_TIMEOUT_MS))
    }

    pub fn effective_ecb(&self) -> EcbConfig {
        self.ecb.clone().unwrap_or_default()
    }

    pub fn effective_kafka(&self) -> KafkaConfig {
        self.kafka.clone().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// ECB
// ---------------------------------------------------------------------------

/// Request construction settings for the ECB data web service.
///
/// Requests look like
/// `{service_root}/data/{flow_ref}/{frequency}.{currency}.{base}.{exr_type}.{series_variation}`.
#[derive(Debug, Clone, Deserialize)]
pub struct EcbConfig {
    #[serde(default = "default_service_root")]
    pub service_root: String,

    /// Dataflow reference; also the first segment of every record key.
    #[serde(default = "default_flow_ref")]
    pub flow_ref: String,

    /// `D` (daily), `M` (monthly), `A` (annual).
    #[serde(default = "default_frequency")]
    pub frequency: String,

    /// Exchange-rate type (`SP00` is the foreign exchange reference rate).
    #[serde(default = "default_exr_type")]
    pub exr_type: String,

    /// Series variation (`A` is average).
    #[serde(default = "default_series_variation")]
    pub series_variation: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
}

impl Default for EcbConfig {
    fn default() -> Self {
        Self {
            service_root: default_service_root(),
            flow_ref: default_flow_ref(),
            frequency: default_frequency(),
            exr_type: default_exr_type(),
            series_variation: default_series_variation(),
            request_timeout_sec: default_request_timeout_sec(),
        }
    }
}

fn default_service_root() -> String {
    "https://data-api.ecb.europa.eu/service".into()
}
fn default_flow_ref() -> String {
    "EXR".into()
}
fn default_frequency() -> String {
    "D".into()
}
fn default_exr_type() -> String {
    "SP00".into()
}
fn default_series_variation() -> String {
    "A".into()
}
fn default_request_timeout_sec() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Kafka
// ---------------------------------------------------------------------------

/// Environment variable → librdkafka property name.
pub const KAFKA_ENV_MAP: &[(&str, &str)] = &[
    ("KAFKA_BOOTSTRAP_SERVERS", "bootstrap.servers"),
    ("KAFKA_SECURITY_PROTOCOL", "security.protocol"),
    ("KAFKA_SASL_MECHANISMS", "sasl.mechanisms"),
    ("KAFKA_SASL_USERNAME", "sasl.username"),
    ("KAFKA_SASL_PASSWORD", "sasl.password"),
    ("KAFKA_ACKS", "acks"),
];

/// Kafka publisher settings.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Inline producer properties (highest precedence after env).
    #[serde(default)]
    pub properties: HashMap<String, String>,

    /// Optional Java-style properties file with producer settings.
    #[serde(default)]
    pub properties_file: Option<PathBuf>,

    /// Read the `KAFKA_*` variables in [`KAFKA_ENV_MAP`]; all are required.
    #[serde(default)]
    pub from_env: bool,

    /// How long to wait for each delivery report.
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            properties: HashMap::new(),
            properties_file: None,
            from_env: false,
            delivery_timeout_ms: default_delivery_timeout_ms(),
        }
    }
}

fn default_topic() -> String {
    "ECB-FX".into()
}
fn default_delivery_timeout_ms() -> u64 {
    15_000
}

impl KafkaConfig {
    /// Merge producer properties: file, then inline map, then environment.
    ///
    /// `env` is the variable lookup (normally `std::env::var(..).ok()`).
    pub fn resolve_properties<F>(&self, env: F) -> Result<HashMap<String, String>, MpError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut props = match &self.properties_file {
            Some(path) => read_properties(path)?,
            None => HashMap::new(),
        };
        props.extend(self.properties.iter().map(|(k, v)| (k.clone(), v.clone())));

        if self.from_env {
            for (var, prop) in KAFKA_ENV_MAP {
                match env(var).filter(|v| !v.is_empty()) {
                    Some(value) => {
                        props.insert((*prop).to_string(), value);
                    }
                    None => return Err(MpError::Config(format!("missing environment variable {var}"))),
                }
            }
        }

        if !props.contains_key("bootstrap.servers") {
            return Err(MpError::Config("kafka properties must set bootstrap.servers".into()));
        }
        Ok(props)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and parse a JSON config file.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Parse `key=value` lines; `#`/`!` comments and blank lines are skipped.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('!'))
        .filter_map(|l| match l.split_once('=') {
            Some((k, v)) => Some((k.trim().to_string(), v.trim().to_string())),
            None => {
                warn!("[config] ignoring properties line without '=': {l}");
                None
            }
        })
        .collect()
}

/// Read a Java-style properties file.
pub fn read_properties(path: &Path) -> Result<HashMap<String, String>, MpError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| MpError::Config(format!("cannot read properties file {}: {e}", path.display())))?;
    Ok(parse_properties(&content))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.module_name(), "market-pricing");
        assert_eq!(cfg.reader_kind().unwrap(), ReaderKind::TimeReader);
        assert_eq!(cfg.source_kind().unwrap(), SourceKind::Ecb);
        assert_eq!(cfg.publisher_kind().unwrap(), PublisherKind::Console);
        assert_eq!(cfg.effective_poll_interval(), Duration::from_secs(120));
        assert_eq!(cfg.effective_since_policy(), SincePolicy::Fixed);
        assert_eq!(cfg.effective_fetch_error_policy(), FetchErrorPolicy::Skip);
        assert_eq!(cfg.effective_channel_capacity(), 1);
        assert_eq!(cfg.effective_ecb().flow_ref, "EXR");
        assert_eq!(cfg.effective_kafka().topic, "ECB-FX");
    }

    #[test]
    fn full_config_parses() {
        let json = r#"{
            "MarketPricing": { "module_name": "fx", "log_path": "/tmp/log" },
            "reader": "one-shot",
            "market_data_source": "simulator",
            "market_data_publisher": "kafka-publisher",
            "poll_interval_sec": 5,
            "since_policy": "advance",
            "on_fetch_error": "halt",
            "channel_capacity": 0,
            "ecb": { "frequency": "M", "service_root": "http://localhost:9000" },
            "kafka": { "topic": "FX", "properties": { "bootstrap.servers": "b:9092" } }
        }"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.module_name(), "fx");
        assert_eq!(cfg.log_path().as_deref(), Some("/tmp/log"));
        assert_eq!(cfg.reader_kind().unwrap(), ReaderKind::OneShot);
        assert_eq!(cfg.source_kind().unwrap(), SourceKind::Simulator);
        assert_eq!(cfg.publisher_kind().unwrap(), PublisherKind::Kafka);
        assert_eq!(cfg.effective_since_policy(), SincePolicy::Advance);
        assert_eq!(cfg.effective_fetch_error_policy(), FetchErrorPolicy::Halt);
        assert_eq!(cfg.effective_channel_capacity(), 1); // clamped
        let ecb = cfg.effective_ecb();
        assert_eq!(ecb.frequency, "M");
        assert_eq!(ecb.exr_type, "SP00"); // default kept
        assert_eq!(cfg.effective_kafka().topic, "FX");
    }

    #[test]
    fn unknown_publisher_is_config_error() {
        let cfg: AppConfig = serde_json::from_str(r#"{"market_data_publisher":"pigeon"}"#).unwrap();
        let err = cfg.publisher_kind().unwrap_err();
        assert!(err.to_string().contains("console-publisher kafka-publisher"));
    }

    #[test]
    fn properties_skip_comments() {
        let props = parse_properties("# comment\n! other\n\nbootstrap.servers = b:9092\nacks=all\nnot a pair\n");
        assert_eq!(props.len(), 2);
        assert_eq!(props["bootstrap.servers"], "b:9092");
        assert_eq!(props["acks"], "all");
    }

    #[test]
    fn kafka_properties_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bootstrap.servers=file:9092\nacks=1").unwrap();

        let cfg = KafkaConfig {
            properties_file: Some(file.path().to_path_buf()),
            properties: HashMap::from([("acks".to_string(), "all".to_string())]),
            ..Default::default()
        };
        let props = cfg.resolve_properties(|_| None).unwrap();
        assert_eq!(props["bootstrap.servers"], "file:9092");
        assert_eq!(props["acks"], "all");
    }

    #[test]
    fn kafka_env_requires_every_variable() {
        let cfg = KafkaConfig { from_env: true, ..Default::default() };
        let err = cfg.resolve_properties(|var| (var == "KAFKA_BOOTSTRAP_SERVERS").then(|| "env:9092".into()));
        assert!(err.unwrap_err().to_string().contains("KAFKA_SECURITY_PROTOCOL"));

        let props = cfg.resolve_properties(|var| Some(format!("{var}-value"))).unwrap();
        assert_eq!(props["bootstrap.servers"], "KAFKA_BOOTSTRAP_SERVERS-value");
        assert_eq!(props["sasl.username"], "KAFKA_SASL_USERNAME-value");
    }

    #[test]
    fn kafka_without_bootstrap_fails() {
        let err = KafkaConfig::default().resolve_properties(|_| None).unwrap_err();
        assert!(matches!(err, MpError::Config(_)));
    }

    #[test]
    fn load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"reader":"one-shot"}}"#).unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.reader_kind().unwrap(), ReaderKind::OneShot);
    }
}

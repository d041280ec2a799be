//! Configuration types for the publisher
//!
//! This module defines all configuration structures used throughout the
//! crate. The desired-state loader is `PublisherConfig::from_json_str` plus
//! `validate()`: parse a declarative description of the records that should
//! exist, then fail fast with a configuration error before anything touches
//! the network.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::record::{DesiredRecord, validate_domain_name};

/// Load a desired record array from a JSON file
///
/// Loader failures are configuration errors: they happen pre-flight and
/// abort the run before anything touches the network.
pub fn load_records_file(path: impl AsRef<Path>) -> Result<Vec<DesiredRecord>, crate::Error> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::config(format!("Failed to read records file {}: {}", path.display(), e))
    })?;
    let records: Vec<DesiredRecord> = serde_json::from_str(&data).map_err(|e| {
        crate::Error::config(format!("Failed to parse records file {}: {}", path.display(), e))
    })?;
    Ok(records)
}

/// Main publisher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// The zone being reconciled
    pub zone: ZoneConfig,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// The desired record set for the zone
    pub records: Vec<DesiredRecord>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl PublisherConfig {
    /// Parse a configuration document from JSON
    pub fn from_json_str(json: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Pre-flight check: no side effects, fails with the first violation.
    /// An empty desired set is only meaningful when orphan deletion is on
    /// (a run that can only delete).
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.zone.validate()?;
        self.provider.validate()?;
        self.engine.validate()?;

        if self.records.is_empty() && !self.engine.delete_orphans {
            return Err(crate::Error::config(
                "No records configured and orphan deletion is disabled; the run would do nothing",
            ));
        }

        let mut seen = HashSet::new();
        for record in &self.records {
            record.validate()?;
            let key = record.key();
            if !seen.insert(key.clone()) {
                return Err(crate::Error::config(format!(
                    "Duplicate desired record identity: {}",
                    key
                )));
            }
        }

        Ok(())
    }
}

/// Zone identification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone name (e.g. "example.com")
    pub name: String,

    /// Provider-assigned zone ID. When absent the provider discovers it
    /// from the zone name.
    #[serde(default)]
    pub zone_id: Option<String>,
}

impl ZoneConfig {
    /// Create a zone config with auto-discovered zone ID
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zone_id: None,
        }
    }

    /// Validate the zone configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_domain_name(&self.name)
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Zone ID (optional, can be auto-detected)
        zone_id: Option<String>,
        /// Account ID (optional)
        account_id: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Cloudflare {
            api_token: String::new(),
            zone_id: None,
            account_id: None,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of retry attempts for transiently-failed operations
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Exponential backoff base between retry attempts (in seconds).
    /// Attempt n waits `retry_delay_secs << n`.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Maximum number of concurrently executing operations
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Sustained API request rate shared by all workers (requests/second).
    /// 0 disables rate limiting.
    #[serde(default = "default_rate_limit_per_sec")]
    pub rate_limit_per_sec: u32,

    /// Burst capacity of the rate limiter
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,

    /// Overall run deadline (in seconds). Once past it no new operation is
    /// issued; in-flight ones finish on their own timeouts. 0 disables it.
    #[serde(default)]
    pub run_timeout_secs: u64,

    /// Delete remote records whose identity matches no desired record.
    /// On by default: the zone converges to exactly the declared set.
    #[serde(default = "default_delete_orphans")]
    pub delete_orphans: bool,
}

impl EngineConfig {
    /// Validate engine settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_retries > 10 {
            return Err(crate::Error::config(format!(
                "max_retries must be at most 10. Got: {}",
                self.max_retries
            )));
        }
        if self.retry_delay_secs > 300 {
            return Err(crate::Error::config(format!(
                "retry_delay_secs must be at most 300. Got: {}",
                self.retry_delay_secs
            )));
        }
        if self.concurrency == 0 || self.concurrency > 64 {
            return Err(crate::Error::config(format!(
                "concurrency must be between 1 and 64. Got: {}",
                self.concurrency
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            concurrency: default_concurrency(),
            rate_limit_per_sec: default_rate_limit_per_sec(),
            rate_limit_burst: default_rate_limit_burst(),
            run_timeout_secs: 0,
            delete_orphans: default_delete_orphans(),
        }
    }
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_concurrency() -> usize {
    4
}

// The Cloudflare API allows 1200 requests per 5 minutes; 4/s stays under it.
fn default_rate_limit_per_sec() -> u32 {
    4
}

fn default_rate_limit_burst() -> u32 {
    8
}

fn default_delete_orphans() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;

    fn base_config(records: Vec<DesiredRecord>) -> PublisherConfig {
        PublisherConfig {
            zone: ZoneConfig::new("example.com"),
            provider: ProviderConfig::Cloudflare {
                api_token: "test-token".to_string(),
                zone_id: None,
                account_id: None,
            },
            records,
            engine: EngineConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        let config = base_config(vec![DesiredRecord::new(
            "www.example.com",
            RecordType::A,
            "1.2.3.4",
        )]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_records_allowed_only_with_orphan_deletion() {
        let mut config = base_config(vec![]);
        assert!(config.validate().is_ok());

        config.engine.delete_orphans = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_identities_rejected() {
        let config = base_config(vec![
            DesiredRecord::new("www.example.com", RecordType::A, "1.2.3.4"),
            DesiredRecord::new("WWW.example.com", RecordType::A, "5.6.7.8"),
        ]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn malformed_record_rejected() {
        let config = base_config(vec![DesiredRecord::new(
            "www.example.com",
            RecordType::A,
            "not-an-ip",
        )]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_token_rejected() {
        let mut config = base_config(vec![DesiredRecord::new(
            "www.example.com",
            RecordType::A,
            "1.2.3.4",
        )]);
        config.provider = ProviderConfig::Cloudflare {
            api_token: String::new(),
            zone_id: None,
            account_id: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn records_file_loads_and_classifies_failures() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{ "name": "www.example.com", "type": "A", "value": "1.2.3.4" }}]"#
        )
        .unwrap();

        let records = load_records_file(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "www.example.com");

        // Malformed JSON and missing files are configuration errors.
        let mut broken = tempfile::NamedTempFile::new().unwrap();
        write!(broken, "not json").unwrap();
        assert!(matches!(
            load_records_file(broken.path()),
            Err(crate::Error::Config(_))
        ));
        assert!(matches!(
            load_records_file("/nonexistent/records.json"),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn config_parses_from_json() {
        let json = r#"{
            "zone": { "name": "example.com" },
            "provider": { "type": "cloudflare", "api_token": "tok", "zone_id": null, "account_id": null },
            "records": [
                { "name": "www.example.com", "type": "A", "value": "1.2.3.4", "ttl": 300, "proxied": true }
            ]
        }"#;

        let config = PublisherConfig::from_json_str(json).unwrap();
        assert_eq!(config.records.len(), 1);
        assert_eq!(config.records[0].proxied, Some(true));
        assert_eq!(config.engine.max_retries, 3);
        assert!(config.engine.delete_orphans);
        assert!(config.validate().is_ok());
    }
}

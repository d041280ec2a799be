// # DNS Record Model
//
// Data model for the reconciliation engine:
//
// - **RecordType**: the DNS record types the publisher manages
// - **RecordKey**: the (name, type) identity records are reconciled under
// - **DesiredRecord**: a record declared in configuration
// - **RemoteRecord**: a record as it exists at the provider (with its
//   provider-assigned ID)
//
// ## Identity
//
// Records are uniquely identified by (name, type). Names are normalized to
// lowercase ASCII before comparison, since DNS names are case-insensitive.
// Duplicate remote entries sharing one identity are collapsed by the diff
// engine to a single canonical record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};

/// Maximum length of a TXT record value accepted by the loader
const MAX_TXT_VALUE_LEN: usize = 2048;

/// DNS record types managed by the publisher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    AAAA,
    /// Canonical name record
    CNAME,
    /// Text record
    TXT,
    /// Mail exchange record
    MX,
}

impl RecordType {
    /// The wire name of the record type, as used by provider APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
            RecordType::CNAME => "CNAME",
            RecordType::TXT => "TXT",
            RecordType::MX => "MX",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::AAAA),
            "CNAME" => Ok(RecordType::CNAME),
            "TXT" => Ok(RecordType::TXT),
            "MX" => Ok(RecordType::MX),
            other => Err(Error::invalid_input(format!(
                "Unsupported record type: {}",
                other
            ))),
        }
    }
}

/// Reconciliation identity of a record: (name, type)
///
/// The name is normalized to lowercase on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Fully-qualified record name, lowercase
    pub name: String,
    /// Record type
    pub record_type: RecordType,
}

impl RecordKey {
    /// Create a key, normalizing the name to lowercase
    pub fn new(name: &str, record_type: RecordType) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            record_type,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.record_type)
    }
}

/// A record declared in configuration: the state that *should* exist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredRecord {
    /// Fully-qualified record name (e.g. "www.example.com")
    pub name: String,

    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,

    /// Record value: IP literal for A/AAAA, target domain for CNAME/MX,
    /// free text for TXT
    pub value: String,

    /// Time-to-live in seconds (1 = provider-automatic)
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Whether the record is proxied through the provider's edge.
    /// `None` means "don't care": an existing record's proxy setting is
    /// left alone and never forces an update.
    #[serde(default)]
    pub proxied: Option<bool>,

    /// MX preference; required for MX records, ignored elsewhere
    #[serde(default)]
    pub priority: Option<u16>,
}

fn default_ttl() -> u32 {
    300
}

impl DesiredRecord {
    /// Create a desired record with default ttl and no proxy/priority
    pub fn new(name: impl Into<String>, record_type: RecordType, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type,
            value: value.into(),
            ttl: default_ttl(),
            proxied: None,
            priority: None,
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the proxied flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = Some(proxied);
        self
    }

    /// Set the MX preference
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = Some(priority);
        self
    }

    /// The reconciliation identity of this record
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.name, self.record_type)
    }

    /// Validate the record
    ///
    /// Checks the name is a syntactically valid domain name, the value is
    /// well-formed for the record type, and the TTL is in range. Returns a
    /// [`Error::Config`] on the first violation.
    pub fn validate(&self) -> Result<()> {
        validate_domain_name(&self.name)?;

        match self.record_type {
            RecordType::A => {
                if self.value.parse::<Ipv4Addr>().is_err() {
                    return Err(Error::config(format!(
                        "A record {} has a value that is not a valid IPv4 literal: '{}'",
                        self.name, self.value
                    )));
                }
            }
            RecordType::AAAA => {
                if self.value.parse::<Ipv6Addr>().is_err() {
                    return Err(Error::config(format!(
                        "AAAA record {} has a value that is not a valid IPv6 literal: '{}'",
                        self.name, self.value
                    )));
                }
            }
            RecordType::CNAME => {
                validate_domain_name(&self.value).map_err(|e| {
                    Error::config(format!("CNAME record {} has an invalid target: {}", self.name, e))
                })?;
            }
            RecordType::MX => {
                validate_domain_name(&self.value).map_err(|e| {
                    Error::config(format!("MX record {} has an invalid exchange: {}", self.name, e))
                })?;
                if self.priority.is_none() {
                    return Err(Error::config(format!(
                        "MX record {} requires a priority",
                        self.name
                    )));
                }
            }
            RecordType::TXT => {
                if self.value.is_empty() {
                    return Err(Error::config(format!(
                        "TXT record {} has an empty value",
                        self.name
                    )));
                }
                if self.value.len() > MAX_TXT_VALUE_LEN {
                    return Err(Error::config(format!(
                        "TXT record {} value too long: {} bytes (max {})",
                        self.name,
                        self.value.len(),
                        MAX_TXT_VALUE_LEN
                    )));
                }
            }
        }

        if self.ttl != 1 && !(30..=86_400).contains(&self.ttl) {
            return Err(Error::config(format!(
                "Record {} has TTL {} out of range (1 for automatic, or 30..=86400)",
                self.name, self.ttl
            )));
        }

        Ok(())
    }
}

/// A record as it currently exists at the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Provider-assigned record identifier
    pub id: String,

    /// Fully-qualified record name
    pub name: String,

    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,

    /// Current record value
    pub value: String,

    /// Current TTL in seconds
    pub ttl: u32,

    /// Whether the record is proxied through the provider's edge
    #[serde(default)]
    pub proxied: Option<bool>,

    /// MX preference, where applicable
    #[serde(default)]
    pub priority: Option<u16>,
}

impl RemoteRecord {
    /// The reconciliation identity of this record
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.name, self.record_type)
    }

    /// Whether this remote record already satisfies a desired record
    ///
    /// Value and TTL always compare. `proxied` and `priority` compare only
    /// when the desired side specifies them.
    pub fn satisfies(&self, desired: &DesiredRecord) -> bool {
        if self.value != desired.value || self.ttl != desired.ttl {
            return false;
        }
        if let Some(proxied) = desired.proxied
            && self.proxied.unwrap_or(false) != proxied
        {
            return false;
        }
        if let Some(priority) = desired.priority
            && self.priority != Some(priority)
        {
            return false;
        }
        true
    }
}

/// Validate that a string is a syntactically valid domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::config("Domain name cannot be empty"));
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        return Err(Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare implementation of the `DnsProvider`
// capability interface: list, create, update and delete records in a zone
// via the Cloudflare API v4.
//
// ## Responsibilities
//
// - One HTTP request per trait call (plus pagination for listings)
// - Full error classification for the reconciler: 401/403 map to fatal
//   auth errors, 400/422 to non-retryable rejections, 429/5xx/timeouts to
//   transient errors the engine may retry
// - NO retry logic, NO backoff, NO rate limiting (owned by the Reconciler)
// - NO caching of zone or record state between calls
// - Dry-run mode for safe testing: reads execute, mutations are logged and
//   reported as successes without issuing the request
//
// ## Security
//
// - The API token NEVER appears in logs or Debug output
// - The provider fails fast if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List zones: GET `/zones?name=...`
// - List DNS records: GET `/zones/:zone_id/dns_records?page=N&per_page=100`
// - Create DNS record: POST `/zones/:zone_id/dns_records`
// - Update DNS record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use publisher_core::config::ProviderConfig;
use publisher_core::record::{DesiredRecord, RecordType, RemoteRecord};
use publisher_core::traits::{DnsProvider, DnsProviderFactory};
use publisher_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for record listings
const LIST_PAGE_SIZE: u32 = 100;

/// Cloudflare DNS provider
///
/// Stateless and single-shot: every trait call resolves what it needs and
/// issues its own requests. All coordination (retries, backoff, rate
/// limiting, scheduling) is owned by the `Reconciler`.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone lookup, record listing)
/// - Log the intended mutation payloads
/// - **NOT** actually modify DNS records
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token. Never log this value.
    api_token: String,

    /// Zone ID (optional, can be auto-detected from the zone name)
    zone_id: Option<String>,

    /// Account ID (optional, for some operations)
    account_id: Option<String>,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip mutations
    dry_run: bool,

    /// API base URL, overridable for tests
    base_url: String,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("account_id", &self.account_id)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/* ── Cloudflare API wire types ─────────────────────────────────────── */

/// The standard Cloudflare v4 response envelope
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct CfZone {
    id: String,
}

/// A DNS record as returned by the Cloudflare API
#[derive(Debug, Deserialize)]
struct CfRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    ttl: u32,
    #[serde(default)]
    proxied: Option<bool>,
    #[serde(default)]
    priority: Option<u16>,
}

impl CfRecord {
    /// Convert to the core model. Returns None for record types the
    /// publisher does not manage (NS, SOA, CAA, ...), which must stay
    /// invisible to the diff engine so they are never treated as orphans.
    fn into_remote(self) -> Option<RemoteRecord> {
        let record_type: RecordType = self.record_type.parse().ok()?;
        Some(RemoteRecord {
            id: self.id,
            name: self.name,
            record_type,
            value: self.content,
            ttl: self.ttl,
            proxied: self.proxied,
            priority: self.priority,
        })
    }
}

/// Build the JSON payload for a create or update
fn record_payload(record: &DesiredRecord) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "name": record.name,
        "type": record.record_type.as_str(),
        "content": record.value,
        "ttl": record.ttl,
    });
    if let Some(proxied) = record.proxied {
        payload["proxied"] = serde_json::Value::Bool(proxied);
    }
    if let Some(priority) = record.priority {
        payload["priority"] = serde_json::json!(priority);
    }
    payload
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_id`: Optional zone ID (can be auto-detected)
    /// - `account_id`: Optional account ID
    /// - `dry_run`: If true, perform GET requests but skip mutations
    ///
    /// # Security
    ///
    /// The API token will NEVER be logged or displayed in error messages.
    pub fn new(
        api_token: impl Into<String>,
        zone_id: Option<String>,
        account_id: Option<String>,
        dry_run: bool,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        let api_token = api_token.into();

        if api_token.is_empty() {
            panic!("Cloudflare API token cannot be empty");
        }

        Self {
            api_token,
            zone_id,
            account_id,
            client,
            dry_run,
            base_url: CLOUDFLARE_API_BASE.to_string(),
        }
    }

    /// Create a new Cloudflare provider (production/live mode)
    pub fn new_live(
        api_token: impl Into<String>,
        zone_id: Option<String>,
        account_id: Option<String>,
    ) -> Self {
        Self::new(api_token, zone_id, account_id, false)
    }

    /// Create a new Cloudflare provider (dry-run mode)
    ///
    /// In dry-run mode the provider performs all GET requests but skips
    /// mutations, logging what would have been changed.
    pub fn new_dry_run(
        api_token: impl Into<String>,
        zone_id: Option<String>,
        account_id: Option<String>,
    ) -> Self {
        Self::new(api_token, zone_id, account_id, true)
    }

    /// Override the API base URL (testing against a local mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Get the zone ID for a zone name
    ///
    /// If zone_id is pre-configured, returns it directly. Otherwise queries
    /// the Cloudflare API to find the zone ID for the given zone name.
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn get_zone_id(&self, zone: &str) -> Result<String> {
        if let Some(ref zone_id) = self.zone_id {
            tracing::debug!("Using pre-configured zone ID");
            return Ok(zone_id.to_string());
        }

        tracing::debug!("Looking up zone ID for zone: {}", zone);

        let url = format!("{}/zones?name={}", self.base_url, zone);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(map_request_error)?;

        let envelope: ApiEnvelope<Vec<CfZone>> = parse_envelope(response, "zone lookup").await?;

        let zone_id = envelope
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|z| z.id)
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", zone)))?;

        tracing::debug!("Found zone ID: {}", zone_id);
        Ok(zone_id)
    }
}

/// Map a reqwest transport error onto the crate taxonomy
///
/// Timeouts and connection failures are transient; anything else is a
/// provider error.
fn map_request_error(err: reqwest::Error) -> Error {
    if err.is_timeout() || err.is_connect() {
        Error::transient(format!("HTTP request failed: {}", err))
    } else {
        Error::provider("cloudflare", format!("HTTP request failed: {}", err))
    }
}

/// Map an unsuccessful HTTP status onto the crate taxonomy
fn map_http_status(status: reqwest::StatusCode, context: &str, body: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions ({}). Status: {}",
            context, status
        )),
        400 | 422 => Error::rejected(format!("{}: {} - {}", context, status, body)),
        404 => Error::not_found(format!("{}: {}", context, body)),
        429 => Error::transient(format!("Rate limited ({}). Status: {}", context, status)),
        500..=599 => Error::transient(format!(
            "Cloudflare server error ({}): {} - {}",
            context, status, body
        )),
        _ => Error::provider("cloudflare", format!("{}: {} - {}", context, status, body)),
    }
}

/// Check the HTTP status and decode the Cloudflare response envelope
///
/// A 2xx response with `success: false` carries API-level errors in the
/// envelope; those are rejections (the request was understood and refused).
async fn parse_envelope<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<ApiEnvelope<T>> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(map_http_status(status, context, &body));
    }

    let envelope: ApiEnvelope<T> = response
        .json()
        .await
        .map_err(|e| Error::provider("cloudflare", format!("Failed to parse response: {}", e)))?;

    if !envelope.success {
        let detail = envelope
            .errors
            .iter()
            .map(|e| format!("{} (code {})", e.message, e.code))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::rejected(format!("{}: {}", context, detail)));
    }

    Ok(envelope)
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// List all managed records in the zone
    ///
    /// Paginates until `result_info.total_pages` is exhausted. Record types
    /// the publisher does not manage are filtered out here so the diff
    /// engine never sees them.
    ///
    /// # API Calls
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?page=1&per_page=100
    /// GET /zones/:zone_id/dns_records?page=2&per_page=100
    /// ...
    /// ```
    async fn list_records(&self, zone: &str) -> Result<Vec<RemoteRecord>> {
        let zone_id = self.get_zone_id(zone).await?;

        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}/zones/{}/dns_records?page={}&per_page={}",
                self.base_url, zone_id, page, LIST_PAGE_SIZE
            );

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.api_token)
                .header("Content-Type", "application/json")
                .send()
                .await
                .map_err(map_request_error)?;

            let envelope: ApiEnvelope<Vec<CfRecord>> =
                parse_envelope(response, "record listing").await?;

            let batch = envelope.result.unwrap_or_default();
            for record in batch {
                let name = record.name.clone();
                match record.into_remote() {
                    Some(remote) => records.push(remote),
                    None => tracing::debug!("Skipping unmanaged record type for {}", name),
                }
            }

            let total_pages = envelope
                .result_info
                .as_ref()
                .map(|info| info.total_pages.max(1))
                .unwrap_or(1);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!("Listed {} managed records in zone {}", records.len(), zone);
        Ok(records)
    }

    /// Create a record in the zone
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// { "name": "...", "type": "A", "content": "1.2.3.4", "ttl": 300 }
    /// ```
    async fn create_record(&self, zone: &str, record: &DesiredRecord) -> Result<RemoteRecord> {
        let zone_id = self.get_zone_id(zone).await?;
        let payload = record_payload(record);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would POST to /zones/{}/dns_records with payload: {}",
                zone_id,
                payload
            );
            return Ok(RemoteRecord {
                id: "dry-run".to_string(),
                name: record.name.clone(),
                record_type: record.record_type,
                value: record.value.clone(),
                ttl: record.ttl,
                proxied: record.proxied,
                priority: record.priority,
            });
        }

        let url = format!("{}/zones/{}/dns_records", self.base_url, zone_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(map_request_error)?;

        let envelope: ApiEnvelope<CfRecord> = parse_envelope(response, "record create").await?;

        let created = envelope
            .result
            .ok_or_else(|| Error::provider("cloudflare", "Create returned no record"))?;

        tracing::info!("Created record {} ({})", created.name, created.id);
        created
            .into_remote()
            .ok_or_else(|| Error::provider("cloudflare", "Create returned an unmanaged type"))
    }

    /// Overwrite an existing record
    ///
    /// # API Call
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// { "name": "...", "type": "A", "content": "1.2.3.4", "ttl": 300 }
    /// ```
    async fn update_record(&self, zone: &str, record_id: &str, record: &DesiredRecord) -> Result<()> {
        let zone_id = self.get_zone_id(zone).await?;
        let payload = record_payload(record);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would PUT to /zones/{}/dns_records/{} with payload: {}",
                zone_id,
                record_id,
                payload
            );
            return Ok(());
        }

        let url = format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record_id);
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(map_request_error)?;

        let _: ApiEnvelope<CfRecord> = parse_envelope(response, "record update").await?;

        tracing::info!("Updated record {} -> {}", record_id, record.value);
        Ok(())
    }

    /// Delete a record
    ///
    /// # API Call
    ///
    /// ```http
    /// DELETE /zones/:zone_id/dns_records/:record_id
    /// ```
    async fn delete_record(&self, zone: &str, record_id: &str) -> Result<()> {
        let zone_id = self.get_zone_id(zone).await?;

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would DELETE /zones/{}/dns_records/{}",
                zone_id,
                record_id
            );
            return Ok(());
        }

        let url = format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record_id);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(map_http_status(status, "record delete", &body));
        }

        tracing::info!("Deleted record {}", record_id);
        Ok(())
    }

    fn supports_record(&self, record: &DesiredRecord) -> bool {
        // Cloudflare supports all managed types; proxying only applies to
        // address and alias records.
        if record.proxied == Some(true)
            && !matches!(
                record.record_type,
                RecordType::A | RecordType::AAAA | RecordType::CNAME
            )
        {
            return false;
        }
        record.name.contains('.') && record.name.len() <= 253
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                zone_id,
                account_id,
            } => {
                if api_token.is_empty() {
                    return Err(Error::config("Cloudflare API token is required"));
                }

                // Check for dry-run mode environment variable
                let dry_run = std::env::var("HOME_PUBLISHER_MODE")
                    .unwrap_or_default()
                    .to_lowercase()
                    == "dry-run";

                if dry_run {
                    tracing::warn!(
                        "Cloudflare provider running in DRY-RUN mode - no changes will be made"
                    );
                }

                Ok(Box::new(CloudflareProvider::new(
                    api_token.clone(),
                    zone_id.clone(),
                    account_id.clone(),
                    dry_run,
                )))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// This function should be called during initialization to make the
/// Cloudflare provider available.
pub fn register(registry: &publisher_core::ProviderRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_creation() {
        let factory = CloudflareFactory;

        let config = ProviderConfig::Cloudflare {
            api_token: "test_token".to_string(),
            zone_id: Some("test_zone".to_string()),
            account_id: None,
        };

        let provider = factory.create(&config);
        assert!(provider.is_ok());
    }

    #[test]
    fn factory_missing_token() {
        let factory = CloudflareFactory;

        let config = ProviderConfig::Cloudflare {
            api_token: "".to_string(),
            zone_id: None,
            account_id: None,
        };

        let provider = factory.create(&config);
        assert!(provider.is_err());
    }

    #[test]
    #[should_panic(expected = "API token cannot be empty")]
    fn empty_token_panics() {
        CloudflareProvider::new("", None, None, false);
    }

    #[test]
    fn dry_run_mode() {
        let provider_dry = CloudflareProvider::new_dry_run("token", None, None);
        let provider_live = CloudflareProvider::new_live("token", None, None);

        assert!(provider_dry.dry_run);
        assert!(!provider_live.dry_run);
    }

    #[test]
    fn supports_managed_records() {
        let provider = CloudflareProvider::new("token", None, None, false);

        let a = DesiredRecord::new("www.example.com", RecordType::A, "1.2.3.4");
        assert!(provider.supports_record(&a));

        // Proxying a TXT record is not a thing
        let txt = DesiredRecord::new("www.example.com", RecordType::TXT, "v=spf1").with_proxied(true);
        assert!(!provider.supports_record(&txt));

        let proxied_a = a.clone().with_proxied(true);
        assert!(provider.supports_record(&proxied_a));

        let mut bare = a;
        bare.name = "localhost".to_string();
        assert!(!provider.supports_record(&bare));
    }

    #[test]
    fn provider_name_is_cloudflare() {
        let provider = CloudflareProvider::new("token", None, None, false);
        assert_eq!(provider.provider_name(), "cloudflare");
    }

    #[test]
    fn api_token_not_exposed_in_debug() {
        let provider = CloudflareProvider::new("secret_token_12345", None, None, false);

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("CloudflareProvider"));
        assert!(debug_str.contains("REDACTED"));
    }

    #[test]
    fn unmanaged_record_types_are_filtered() {
        let ns = CfRecord {
            id: "1".to_string(),
            name: "example.com".to_string(),
            record_type: "NS".to_string(),
            content: "ns1.cloudflare.com".to_string(),
            ttl: 86400,
            proxied: None,
            priority: None,
        };
        assert!(ns.into_remote().is_none());

        let a = CfRecord {
            id: "2".to_string(),
            name: "www.example.com".to_string(),
            record_type: "A".to_string(),
            content: "1.2.3.4".to_string(),
            ttl: 300,
            proxied: Some(true),
            priority: None,
        };
        let remote = a.into_remote().unwrap();
        assert_eq!(remote.record_type, RecordType::A);
        assert_eq!(remote.proxied, Some(true));
    }

    #[test]
    fn payload_includes_optional_fields_only_when_set() {
        let plain = DesiredRecord::new("www.example.com", RecordType::A, "1.2.3.4");
        let payload = record_payload(&plain);
        assert!(payload.get("proxied").is_none());
        assert!(payload.get("priority").is_none());
        assert_eq!(payload["type"], "A");
        assert_eq!(payload["ttl"], 300);

        let mx = DesiredRecord::new("example.com", RecordType::MX, "mail.example.com")
            .with_priority(10);
        let payload = record_payload(&mx);
        assert_eq!(payload["priority"], 10);
    }

    #[test]
    fn status_mapping_matches_error_taxonomy() {
        use reqwest::StatusCode;

        assert!(map_http_status(StatusCode::UNAUTHORIZED, "t", "").is_fatal());
        assert!(map_http_status(StatusCode::FORBIDDEN, "t", "").is_fatal());
        assert!(map_http_status(StatusCode::TOO_MANY_REQUESTS, "t", "").is_transient());
        assert!(map_http_status(StatusCode::BAD_GATEWAY, "t", "").is_transient());
        assert!(matches!(
            map_http_status(StatusCode::UNPROCESSABLE_ENTITY, "t", ""),
            Error::Rejected(_)
        ));
        assert!(matches!(
            map_http_status(StatusCode::NOT_FOUND, "t", ""),
            Error::NotFound(_)
        ));
    }
}

// # DNS Provider Trait
//
// Defines the capability interface the reconciler drives: list, create,
// update, and delete records in a zone.
//
// ## Implementations
//
// - Cloudflare: `publisher-provider-cloudflare` crate
// - In-memory fake: contract tests in this crate
//
// ## Trust Level: Untrusted
//
// Providers are single-shot executors with strict limitations:
//
// Allowed:
// - Perform HTTP/HTTPS API calls to their endpoints only
// - Paginate a listing until exhausted
// - Parse provider-specific responses
// - Return success or failure (the reconciler handles retry)
//
// Forbidden:
// - Spawn tasks or threads
// - Implement retry, backoff, or rate limiting (owned by `Reconciler`)
// - Cache state beyond a single request
// - Decide whether an operation is needed (owned by the diff engine)
//
// If a provider implemented its own retries, the reconciler could not
// control the request rate, backoff would compound across layers, and a
// run's operation accounting would no longer match what hit the wire.
// Correct approach: return a classified error and let the reconciler decide.

use async_trait::async_trait;

use crate::record::{DesiredRecord, RemoteRecord};

/// Trait for DNS provider implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks; the
/// reconciler shares one instance between concurrent workers.
///
/// # Error Classification
///
/// Implementations map their transport/API failures onto the crate error
/// taxonomy: timeouts, connection failures, 5xx and 429 become
/// [`Error::Transient`](crate::Error::Transient) (retryable); 401/403
/// become [`Error::Auth`](crate::Error::Auth) (fatal); a rejected payload
/// (4xx validation failure) becomes
/// [`Error::Rejected`](crate::Error::Rejected) (recorded, not retried).
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List all records currently present in the zone
    ///
    /// Paginates until exhausted. Idempotent; no side effects.
    ///
    /// # Parameters
    ///
    /// - `zone`: The zone name (e.g. "example.com")
    async fn list_records(&self, zone: &str) -> Result<Vec<RemoteRecord>, crate::Error>;

    /// Create a record in the zone
    ///
    /// # Returns
    ///
    /// The created record, including its provider-assigned ID.
    async fn create_record(
        &self,
        zone: &str,
        record: &DesiredRecord,
    ) -> Result<RemoteRecord, crate::Error>;

    /// Overwrite an existing record, addressed by its provider-assigned ID
    async fn update_record(
        &self,
        zone: &str,
        record_id: &str,
        record: &DesiredRecord,
    ) -> Result<(), crate::Error>;

    /// Delete a record, addressed by its provider-assigned ID
    async fn delete_record(&self, zone: &str, record_id: &str) -> Result<(), crate::Error>;

    /// Check if this provider can manage the given record
    ///
    /// Some providers have limitations on record types or names.
    fn supports_record(&self, record: &DesiredRecord) -> bool;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}

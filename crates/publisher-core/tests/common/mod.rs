//! Test doubles and common utilities for contract tests
//!
//! The in-memory provider implements the full `DnsProvider` capability
//! interface against a `Vec<RemoteRecord>`, with injectable failures so
//! tests can verify retry, rejection and partial-failure behavior without
//! any real network.

use async_trait::async_trait;
use publisher_core::config::{EngineConfig, ProviderConfig, PublisherConfig, ZoneConfig};
use publisher_core::error::{Error, Result};
use publisher_core::record::{DesiredRecord, RecordType, RemoteRecord};
use publisher_core::traits::DnsProvider;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// An in-memory DnsProvider backed by a record vector
///
/// Failure injection:
/// - [`reject`](Self::reject): mutations touching a name always fail with a
///   rejection (never retryable)
/// - [`fail_transient`](Self::fail_transient): the next N mutations touching
///   a name fail transiently, then succeed
/// - [`fail_list_transient`](Self::fail_list_transient) /
///   [`fail_list_auth`](Self::fail_list_auth): listing failures
/// - [`set_op_delay`](Self::set_op_delay): every mutation sleeps first
#[derive(Default)]
pub struct InMemoryProvider {
    records: Mutex<Vec<RemoteRecord>>,
    next_id: AtomicUsize,

    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    delete_calls: AtomicUsize,

    /// Chronological log of applied mutations, e.g. "create www.example.com"
    op_log: Mutex<Vec<String>>,

    /// Names whose mutations are always rejected
    reject_names: Mutex<HashSet<String>>,
    /// Name -> remaining transient failures for mutations
    transient_failures: Mutex<HashMap<String, usize>>,
    /// Remaining transient failures for list_records
    list_transient_failures: AtomicUsize,
    /// Fail all listings with an auth error
    list_auth_failure: Mutex<bool>,
    /// Artificial latency per mutation
    op_delay: Mutex<Option<Duration>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the provider with pre-existing remote records
    pub fn seeded(records: Vec<RemoteRecord>) -> Self {
        let provider = Self::new();
        *provider.records.lock().unwrap() = records;
        provider
    }

    /// Snapshot of the current remote state
    pub fn records(&self) -> Vec<RemoteRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Chronological log of applied mutations
    pub fn op_log(&self) -> Vec<String> {
        self.op_log.lock().unwrap().clone()
    }

    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_call_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_call_count(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn mutation_call_count(&self) -> usize {
        self.create_call_count() + self.update_call_count() + self.delete_call_count()
    }

    /// Always reject mutations touching `name`
    pub fn reject(&self, name: &str) {
        self.reject_names
            .lock()
            .unwrap()
            .insert(name.to_ascii_lowercase());
    }

    /// Fail the next `times` mutations touching `name` transiently
    pub fn fail_transient(&self, name: &str, times: usize) {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(name.to_ascii_lowercase(), times);
    }

    /// Fail the next `times` listings transiently
    pub fn fail_list_transient(&self, times: usize) {
        self.list_transient_failures.store(times, Ordering::SeqCst);
    }

    /// Fail every listing with an auth error
    pub fn fail_list_auth(&self) {
        *self.list_auth_failure.lock().unwrap() = true;
    }

    /// Sleep for `delay` before every mutation
    pub fn set_op_delay(&self, delay: Duration) {
        *self.op_delay.lock().unwrap() = Some(delay);
    }

    /// Apply injected failures for a mutation touching `name`
    fn gate(&self, name: &str) -> Result<()> {
        let name = name.to_ascii_lowercase();
        if self.reject_names.lock().unwrap().contains(&name) {
            return Err(Error::rejected(format!("invalid record value for {}", name)));
        }
        let mut failures = self.transient_failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&name)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(Error::transient(format!("connection reset for {}", name)));
        }
        Ok(())
    }

    async fn maybe_delay(&self) {
        let delay = *self.op_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DnsProvider for InMemoryProvider {
    async fn list_records(&self, _zone: &str) -> Result<Vec<RemoteRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if *self.list_auth_failure.lock().unwrap() {
            return Err(Error::auth("invalid token"));
        }
        let remaining = self.list_transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.list_transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::transient("listing timed out"));
        }

        Ok(self.records())
    }

    async fn create_record(&self, _zone: &str, record: &DesiredRecord) -> Result<RemoteRecord> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        self.gate(&record.name)?;

        let id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let created = RemoteRecord {
            id,
            name: record.name.clone(),
            record_type: record.record_type,
            value: record.value.clone(),
            ttl: record.ttl,
            proxied: record.proxied,
            priority: record.priority,
        };
        self.records.lock().unwrap().push(created.clone());
        self.op_log
            .lock()
            .unwrap()
            .push(format!("create {}", record.name));
        Ok(created)
    }

    async fn update_record(
        &self,
        _zone: &str,
        record_id: &str,
        record: &DesiredRecord,
    ) -> Result<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        self.gate(&record.name)?;

        let mut records = self.records.lock().unwrap();
        let target = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| Error::not_found(format!("no record with id {}", record_id)))?;
        target.value = record.value.clone();
        target.ttl = record.ttl;
        target.proxied = record.proxied.or(target.proxied);
        target.priority = record.priority.or(target.priority);
        self.op_log
            .lock()
            .unwrap()
            .push(format!("update {}", record.name));
        Ok(())
    }

    async fn delete_record(&self, _zone: &str, record_id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;

        let name = {
            let records = self.records.lock().unwrap();
            records
                .iter()
                .find(|r| r.id == record_id)
                .map(|r| r.name.clone())
                .ok_or_else(|| Error::not_found(format!("no record with id {}", record_id)))?
        };
        self.gate(&name)?;

        self.records.lock().unwrap().retain(|r| r.id != record_id);
        self.op_log.lock().unwrap().push(format!("delete {}", name));
        Ok(())
    }

    fn supports_record(&self, _record: &DesiredRecord) -> bool {
        true
    }

    fn provider_name(&self) -> &'static str {
        "in-memory"
    }
}

/// A desired A record with default ttl
pub fn desired(name: &str, value: &str) -> DesiredRecord {
    DesiredRecord::new(name, RecordType::A, value)
}

/// A remote A record with default ttl
pub fn remote(id: &str, name: &str, value: &str) -> RemoteRecord {
    RemoteRecord {
        id: id.to_string(),
        name: name.to_string(),
        record_type: RecordType::A,
        value: value.to_string(),
        ttl: 300,
        proxied: None,
        priority: None,
    }
}

/// Helper to create a test configuration: no rate limit, zero backoff base
/// so retries don't slow the suite down
pub fn test_config(records: Vec<DesiredRecord>) -> PublisherConfig {
    PublisherConfig {
        zone: ZoneConfig::new("example.com"),
        provider: ProviderConfig::Cloudflare {
            api_token: "test-token".to_string(),
            zone_id: None,
            account_id: None,
        },
        records,
        engine: EngineConfig {
            max_retries: 3,
            retry_delay_secs: 0,
            concurrency: 4,
            rate_limit_per_sec: 0,
            rate_limit_burst: 1,
            run_timeout_secs: 0,
            delete_orphans: true,
        },
    }
}

/// Shorthand for building a reconciler over an in-memory provider
pub fn reconciler_over(
    provider: &Arc<InMemoryProvider>,
    config: PublisherConfig,
) -> (
    publisher_core::Reconciler,
    tokio::sync::mpsc::Receiver<publisher_core::EngineEvent>,
) {
    let handle: Arc<dyn DnsProvider> = Arc::clone(provider) as Arc<dyn DnsProvider>;
    publisher_core::Reconciler::new(handle, config).expect("reconciler construction succeeds")
}

//! Core reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Fetching the zone's current records via DnsProvider
//! - Computing the desired-vs-remote diff
//! - Applying the diff with bounded concurrency, rate limiting and retry
//! - Aggregating per-operation failures into a run report
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐                       ┌──────────────┐
//! │ Desired set  │──────┐         ┌──────│ DnsProvider  │
//! │ (config)     │      ▼         ▼      │ (list)       │
//! └──────────────┘   ┌──────────────┐    └──────────────┘
//!                    │ Diff Engine  │
//!                    └──────────────┘
//!                           │
//!                           ▼
//!                    ┌──────────────┐    ┌──────────────┐
//!                    │  Reconciler  │───▶│ DnsProvider  │
//!                    │ (workers)    │    │ (mutations)  │
//!                    └──────────────┘    └──────────────┘
//! ```
//!
//! ## Execution order
//!
//! Deletes run first, then creates, then updates; delete-before-create
//! avoids transient name collisions on providers that reject duplicate
//! names. Operations within a phase touch distinct record identities, so
//! they run concurrently on a bounded worker pool; a shared token-bucket
//! limiter gates the aggregate API request rate.
//!
//! ## Failure isolation
//!
//! A fatal error (config, auth) aborts the run before any mutation. Any
//! other per-operation failure is recorded in the run report and the
//! remaining operations still execute: one bad record must not block
//! reconciliation of the rest.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::time::{Duration, Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::config::PublisherConfig;
use crate::diff::{self, Diff, RecordUpdate};
use crate::error::{Error, Result};
use crate::limiter::RateLimiter;
use crate::record::{DesiredRecord, RecordKey, RemoteRecord};
use crate::report::{OpFailure, OpKind, RunReport};
use crate::traits::DnsProvider;

/// Capacity of the engine event channel. When full, new events are dropped
/// (with a warning log) rather than blocking reconciliation.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Ceiling on a single backoff sleep, whatever the configured base
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A reconciliation pass started
    RunStarted {
        desired_records: usize,
    },

    /// Remote state was fetched
    FetchCompleted {
        remote_records: usize,
    },

    /// An operation succeeded
    OpSucceeded {
        op: OpKind,
        key: RecordKey,
    },

    /// An operation failed after exhausting its retries
    OpFailed {
        op: OpKind,
        key: RecordKey,
        error: String,
        attempts: usize,
    },

    /// An operation was not issued because the run deadline passed
    OpSkipped {
        op: OpKind,
        key: RecordKey,
    },

    /// The pass finished
    RunCompleted {
        applied: usize,
        failed: usize,
    },
}

/// A planned mutation, carried from the diff into the worker pool
#[derive(Debug, Clone)]
enum Operation {
    Create(DesiredRecord),
    Update(RecordUpdate),
    Delete(RemoteRecord),
}

impl Operation {
    fn kind(&self) -> OpKind {
        match self {
            Operation::Create(_) => OpKind::Create,
            Operation::Update(_) => OpKind::Update,
            Operation::Delete(_) => OpKind::Delete,
        }
    }

    fn key(&self) -> RecordKey {
        match self {
            Operation::Create(record) => record.key(),
            Operation::Update(update) => update.desired.key(),
            Operation::Delete(record) => record.key(),
        }
    }

    fn record_id(&self) -> Option<&str> {
        match self {
            Operation::Create(_) => None,
            Operation::Update(update) => Some(&update.id),
            Operation::Delete(record) => Some(&record.id),
        }
    }
}

/// How an individual operation ended
#[derive(Debug)]
enum OpStatus {
    Succeeded,
    Skipped,
    Failed { error: String },
}

#[derive(Debug)]
struct OpOutcome {
    op: OpKind,
    key: RecordKey,
    record_id: Option<String>,
    attempts: usize,
    status: OpStatus,
}

/// Core reconciliation engine
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`] — validates configuration
/// 2. Execute one pass with [`Reconciler::run()`]
/// 3. Inspect the returned [`RunReport`]
///
/// The provider handle is acquired by the caller before construction and
/// dropped when the Reconciler is; there is no process-global state.
///
/// ## Threading
///
/// `run()` drives all operations from one task; mutations are fanned out to
/// worker tasks bounded by `engine.concurrency` and gated by a shared
/// token-bucket limiter.
pub struct Reconciler {
    /// DNS provider executing the actual API calls
    provider: Arc<dyn DnsProvider>,

    /// Validated configuration, including the desired record set
    config: PublisherConfig,

    /// Token bucket shared by all workers
    limiter: Arc<RateLimiter>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `provider`: DNS provider implementation
    /// - `config`: Publisher configuration (validated here)
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields
    /// engine events. The receiver may be dropped if events are not needed.
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        config: PublisherConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let limiter = Arc::new(RateLimiter::new(
            config.engine.rate_limit_per_sec,
            config.engine.rate_limit_burst,
        ));

        let reconciler = Self {
            provider,
            config,
            limiter,
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Execute one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: The pass ran to completion; check
    ///   [`RunReport::succeeded()`] for per-operation failures
    /// - `Err(Error)`: A fatal error aborted the run before any mutation
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::new();

        self.emit_event(EngineEvent::RunStarted {
            desired_records: self.config.records.len(),
        });

        let deadline = match self.config.engine.run_timeout_secs {
            0 => None,
            secs => Some(Instant::now() + Duration::from_secs(secs)),
        };

        // Pre-flight: every desired record must be manageable by this
        // provider before anything mutates.
        for record in &self.config.records {
            if !self.provider.supports_record(record) {
                return Err(Error::config(format!(
                    "Provider {} does not support record {}",
                    self.provider.provider_name(),
                    record.key()
                )));
            }
        }

        let remote = self.fetch_remote().await?;
        report.fetched = remote.len();
        info!(
            zone = %self.config.zone.name,
            records = remote.len(),
            "fetched remote state"
        );
        self.emit_event(EngineEvent::FetchCompleted {
            remote_records: remote.len(),
        });

        let plan = diff::diff(
            &self.config.records,
            &remote,
            self.config.engine.delete_orphans,
        );
        report.unchanged = plan.unchanged;

        info!(
            creates = plan.to_create.len(),
            updates = plan.to_update.len(),
            deletes = plan.to_delete.len(),
            unchanged = plan.unchanged,
            "computed reconciliation plan"
        );

        if plan.is_empty() {
            debug!("zone already converged, nothing to do");
        } else {
            let Diff {
                to_create,
                to_update,
                to_delete,
                ..
            } = plan;

            // Delete before create, update last.
            self.execute_phase(
                "delete",
                to_delete.into_iter().map(Operation::Delete).collect(),
                deadline,
                &mut report,
            )
            .await;
            self.execute_phase(
                "create",
                to_create.into_iter().map(Operation::Create).collect(),
                deadline,
                &mut report,
            )
            .await;
            self.execute_phase(
                "update",
                to_update.into_iter().map(Operation::Update).collect(),
                deadline,
                &mut report,
            )
            .await;
        }

        report.finished_at = chrono::Utc::now();
        self.emit_event(EngineEvent::RunCompleted {
            applied: report.applied(),
            failed: report.failures.len(),
        });

        if report.succeeded() {
            info!(summary = %report.summary(), "reconciliation complete");
        } else {
            warn!(summary = %report.summary(), "reconciliation finished with failures");
        }

        Ok(report)
    }

    /// Fetch remote state, retrying transient failures
    ///
    /// A fatal or non-transient error propagates and aborts the run: no
    /// mutation is issued without a trustworthy view of remote state.
    async fn fetch_remote(&self) -> Result<Vec<RemoteRecord>> {
        let mut attempt = 0;
        loop {
            self.limiter.acquire().await;
            match self.provider.list_records(&self.config.zone.name).await {
                Ok(records) => return Ok(records),
                Err(e) if e.is_transient() && attempt < self.config.engine.max_retries => {
                    attempt += 1;
                    let wait = backoff(self.config.engine.retry_delay_secs, attempt);
                    warn!(
                        attempt,
                        error = %e,
                        "transient failure listing records, retrying in {:?}",
                        wait
                    );
                    sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run one phase of the plan on the worker pool
    ///
    /// All operations in a phase touch distinct record identities, so they
    /// share no mutable state and can run concurrently. The phase is a
    /// barrier: it returns once every operation has been recorded.
    async fn execute_phase(
        &self,
        phase: &str,
        ops: Vec<Operation>,
        deadline: Option<Instant>,
        report: &mut RunReport,
    ) {
        if ops.is_empty() {
            return;
        }
        debug!(phase, operations = ops.len(), "executing phase");

        let semaphore = Arc::new(Semaphore::new(self.config.engine.concurrency));
        let mut handles = Vec::with_capacity(ops.len());

        for op in ops {
            let semaphore = Arc::clone(&semaphore);
            let provider = Arc::clone(&self.provider);
            let limiter = Arc::clone(&self.limiter);
            let zone = self.config.zone.name.clone();
            let max_retries = self.config.engine.max_retries;
            let backoff_base = self.config.engine.retry_delay_secs;

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                apply_with_retry(
                    provider,
                    limiter,
                    &zone,
                    op,
                    max_retries,
                    backoff_base,
                    deadline,
                )
                .await
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(outcome) => self.record_outcome(outcome, report),
                Err(e) => error!(phase, "operation task panicked: {}", e),
            }
        }
    }

    /// Fold an operation outcome into the report and emit its event
    fn record_outcome(&self, outcome: OpOutcome, report: &mut RunReport) {
        match outcome.status {
            OpStatus::Succeeded => {
                match outcome.op {
                    OpKind::Create => report.created += 1,
                    OpKind::Update => report.updated += 1,
                    OpKind::Delete => report.deleted += 1,
                }
                self.emit_event(EngineEvent::OpSucceeded {
                    op: outcome.op,
                    key: outcome.key,
                });
            }
            OpStatus::Skipped => {
                report.skipped += 1;
                report.failures.push(OpFailure {
                    op: outcome.op,
                    key: outcome.key.clone(),
                    record_id: outcome.record_id,
                    error: "run timeout exceeded before the operation was issued".to_string(),
                    attempts: 0,
                });
                self.emit_event(EngineEvent::OpSkipped {
                    op: outcome.op,
                    key: outcome.key,
                });
            }
            OpStatus::Failed { error } => {
                report.failures.push(OpFailure {
                    op: outcome.op,
                    key: outcome.key.clone(),
                    record_id: outcome.record_id,
                    error: error.clone(),
                    attempts: outcome.attempts,
                });
                self.emit_event(EngineEvent::OpFailed {
                    op: outcome.op,
                    key: outcome.key,
                    error,
                    attempts: outcome.attempts,
                });
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Send event, logging a warning if the channel is full. Dropping is
        // preferable to blocking reconciliation on a slow consumer.
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event");
        }
    }
}

/// Execute one operation with engine-owned retry
///
/// Only transient errors are retried; a rejection is recorded on the first
/// attempt. Once the run deadline has passed, no new attempt is issued —
/// an operation that never started is reported as skipped.
async fn apply_with_retry(
    provider: Arc<dyn DnsProvider>,
    limiter: Arc<RateLimiter>,
    zone: &str,
    op: Operation,
    max_retries: usize,
    backoff_base_secs: u64,
    deadline: Option<Instant>,
) -> OpOutcome {
    let kind = op.kind();
    let key = op.key();
    let record_id = op.record_id().map(str::to_string);

    if past(deadline) {
        debug!(op = %kind, %key, "run deadline passed, not issuing operation");
        return OpOutcome {
            op: kind,
            key,
            record_id,
            attempts: 0,
            status: OpStatus::Skipped,
        };
    }

    let mut attempts = 0;
    loop {
        attempts += 1;
        limiter.acquire().await;

        let result = match &op {
            Operation::Create(record) => {
                provider.create_record(zone, record).await.map(|created| {
                    debug!(%key, id = %created.id, "created record");
                })
            }
            Operation::Update(update) => {
                provider.update_record(zone, &update.id, &update.desired).await
            }
            Operation::Delete(record) => provider.delete_record(zone, &record.id).await,
        };

        match result {
            Ok(()) => {
                debug!(op = %kind, %key, attempts, "operation succeeded");
                return OpOutcome {
                    op: kind,
                    key,
                    record_id,
                    attempts,
                    status: OpStatus::Succeeded,
                };
            }
            Err(e) if e.is_transient() && attempts <= max_retries && !past(deadline) => {
                let wait = backoff(backoff_base_secs, attempts);
                warn!(
                    op = %kind,
                    %key,
                    attempt = attempts,
                    error = %e,
                    "transient failure, retrying in {:?}",
                    wait
                );
                sleep(wait).await;
            }
            Err(e) => {
                return OpOutcome {
                    op: kind,
                    key,
                    record_id,
                    attempts,
                    status: OpStatus::Failed {
                        error: e.to_string(),
                    },
                };
            }
        }
    }
}

/// Exponential backoff: `base << attempt`, capped
fn backoff(base_secs: u64, attempt: usize) -> Duration {
    let secs = base_secs.saturating_mul(1u64 << attempt.min(6) as u32);
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

fn past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        assert_eq!(backoff(5, 1), Duration::from_secs(10));
        assert_eq!(backoff(5, 2), Duration::from_secs(20));
        assert_eq!(backoff(5, 3), Duration::from_secs(40));
        assert_eq!(backoff(5, 10), MAX_BACKOFF);
        assert_eq!(backoff(0, 3), Duration::from_secs(0));
    }

    #[test]
    fn engine_events_compare() {
        let event = EngineEvent::OpSucceeded {
            op: OpKind::Create,
            key: RecordKey::new("www.example.com", crate::record::RecordType::A),
        };
        assert_eq!(event.clone(), event);
    }
}

// # publisher-core
//
// Core library for the home-publisher DNS reconciliation engine.
//
// ## Architecture Overview
//
// This library provides the core functionality for declarative DNS
// publishing:
// - **record**: the data model (desired/remote records, identity keys)
// - **config**: desired-state loading and validation
// - **DnsProvider**: trait for listing and mutating records via provider APIs
// - **diff**: pure desired-vs-remote diff computation
// - **Reconciler**: applies a diff with retry, rate limiting and bounded
//   concurrency, producing a per-run report
// - **ProviderRegistry**: plugin-based registry for DNS providers
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from provider
//    implementations
// 2. **Single Pass**: One linear reconciliation per invocation; no daemon
// 3. **Plugin-Based**: Providers are registered dynamically, no hard-coded
//    if-else
// 4. **Failure Isolation**: One bad record never blocks the rest of a run

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod limiter;
pub mod record;
pub mod registry;
pub mod report;
pub mod traits;

// Re-export core types for convenience
pub use config::{EngineConfig, ProviderConfig, PublisherConfig, ZoneConfig};
pub use diff::{Diff, RecordUpdate};
pub use engine::{EngineEvent, Reconciler};
pub use error::{Error, Result};
pub use limiter::RateLimiter;
pub use record::{DesiredRecord, RecordKey, RecordType, RemoteRecord};
pub use registry::ProviderRegistry;
pub use report::{OpFailure, OpKind, RunReport};
pub use traits::{DnsProvider, DnsProviderFactory};

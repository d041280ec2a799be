//! Core trait definitions
//!
//! The provider seam: the diff engine and reconciler are written against
//! [`DnsProvider`], so core logic is testable against an in-memory fake and
//! decoupled from any specific vendor SDK.

pub mod dns_provider;

pub use dns_provider::{DnsProvider, DnsProviderFactory};

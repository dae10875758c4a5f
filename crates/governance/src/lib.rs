//! # sintra-governance
//!
//! Delegated-authority governance for autonomous agents.
//!
//! An agent may run whole classes of commands without per-instance human
//! approval. This crate decides, for each incoming command, whether those
//! delegations still hold, and revokes them automatically when an external
//! confidence check records an unacknowledged behavioral regression.
//!
//! ## Components
//!
//! - [`pattern`]: declarative command patterns (`deploy *`, `** rm -rf **`)
//! - [`EvidenceScanner`]: finds regression evidence in an [`EvidenceSource`]
//! - [`DelegationResolver`]: pattern-only lookup over a [`DelegationRegistry`]
//! - [`ApprovalStore`]: durable `ACTIVE` / `SUSPENDED` state per class
//! - [`SuspensionOrchestrator`]: `auto_suspend(command) -> Vec<Decision>`
//! - [`OperatorJournal`]: hash-chained log of every suspension written
//!
//! ## Failure model
//!
//! Malformed patterns match nothing and malformed evidence is ignored. The
//! only error `auto_suspend` returns is
//! [`GovernanceError::StoreUnavailable`]; what to do with it (block or fail
//! open) is left to the caller.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sintra_governance::{
//!     DelegationClass, DirectoryEvidenceSource, JsonFileApprovalStore, StaticRegistry,
//!     SuspensionOrchestrator,
//! };
//!
//! # async fn example() -> sintra_governance::GovernanceResult<()> {
//! let registry = Arc::new(StaticRegistry::with_classes([DelegationClass::new(
//!     "deploys",
//!     "deploy *",
//! )]));
//! let orchestrator = SuspensionOrchestrator::new(
//!     registry,
//!     Arc::new(DirectoryEvidenceSource::new(".sintra/confidence")),
//!     Arc::new(JsonFileApprovalStore::new(".sintra/approvals.json")),
//! );
//!
//! for decision in orchestrator.auto_suspend("deploy prod").await? {
//!     println!("{} suspended={} ({})", decision.class_id, decision.suspended, decision.reason);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod config;
mod error;
pub mod evidence;
pub mod journal;
pub mod orchestrator;
pub mod pattern;
pub mod registry;
pub mod store;
mod types;

pub use config::GovernanceConfig;
pub use error::{GovernanceError, GovernanceResult, StoreOperation};
pub use evidence::{
    ConfidenceCheckRecord, DirectoryEvidenceSource, EvidenceScanner, EvidenceSource,
    InMemoryEvidenceSource, RawRecord,
};
pub use journal::{JournalEntry, JournalVerification, JsonlJournal, MemoryJournal, OperatorJournal};
pub use orchestrator::SuspensionOrchestrator;
pub use pattern::{matches, CommandPattern, PatternError};
pub use registry::{DelegationRegistry, DelegationResolver, StaticRegistry};
pub use store::{ApprovalStore, InMemoryApprovalStore, JsonFileApprovalStore, WriteOutcome};
pub use types::{
    ApprovalStatus, Decision, DecisionReason, DelegationClass, Evidence, EvidenceKind,
    StatusReport, SuspensionDetails, SuspensionReason, SuspensionRecord,
};

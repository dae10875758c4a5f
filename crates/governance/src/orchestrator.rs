//! Suspension orchestrator: the per-command decision procedure.
//!
//! For every delegation class whose pattern matches the command:
//!
//! - already `SUSPENDED` in the approval store: report `SUSPENDED`, no scan;
//! - `ACTIVE` with no unacknowledged regression evidence: report `NONE`;
//! - `ACTIVE` with evidence: write a suspension and report
//!   `CONFIDENCE_REGRESSION`.
//!
//! Nothing is cached between calls.

use crate::error::GovernanceResult;
use crate::evidence::{EvidenceScanner, EvidenceSource};
use crate::journal::OperatorJournal;
use crate::registry::{DelegationRegistry, DelegationResolver};
use crate::store::{ApprovalStore, WriteOutcome};
use crate::types::{DelegationClass, Decision, Evidence, StatusReport, SuspensionRecord};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Composes resolver, scanner, and approval store into `auto_suspend`.
pub struct SuspensionOrchestrator {
    resolver: DelegationResolver,
    scanner: EvidenceScanner,
    store: Arc<dyn ApprovalStore>,
    journal: Option<Arc<dyn OperatorJournal>>,
}

impl SuspensionOrchestrator {
    pub fn new(
        registry: Arc<dyn DelegationRegistry>,
        evidence: Arc<dyn EvidenceSource>,
        store: Arc<dyn ApprovalStore>,
    ) -> Self {
        Self {
            resolver: DelegationResolver::new(registry),
            scanner: EvidenceScanner::new(evidence),
            store,
            journal: None,
        }
    }

    /// Record every new suspension in an operator journal.
    pub fn with_journal(mut self, journal: Arc<dyn OperatorJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_max_pattern_len(mut self, limit: usize) -> Self {
        self.resolver = self.resolver.with_max_pattern_len(limit);
        self.scanner = self.scanner.with_max_pattern_len(limit);
        self
    }

    pub fn resolver(&self) -> &DelegationResolver {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<dyn ApprovalStore> {
        &self.store
    }

    /// One decision per matching delegation class, in registry order.
    ///
    /// Fails only with `StoreUnavailable`; no partial decision list is
    /// returned in that case.
    #[instrument(skip(self), fields(candidates = tracing::field::Empty))]
    pub async fn auto_suspend(&self, command: &str) -> GovernanceResult<Vec<Decision>> {
        let candidates = self.resolver.resolve(command);
        tracing::Span::current().record("candidates", candidates.len());

        let mut decisions = Vec::with_capacity(candidates.len());
        for class in &candidates {
            decisions.push(self.decide(command, class).await?);
        }
        Ok(decisions)
    }

    pub async fn get_status(&self, class_id: &str) -> GovernanceResult<StatusReport> {
        self.store.get_status(class_id).await
    }

    /// Run the evidence scan off the async executor.
    pub async fn find_regression_evidence(&self, pattern: &str) -> Option<Evidence> {
        let scanner = self.scanner.clone();
        let pattern = pattern.to_string();
        match tokio::task::spawn_blocking(move || scanner.find_regression_evidence(&pattern)).await {
            Ok(evidence) => evidence,
            Err(e) => {
                warn!(error = %e, "evidence scan aborted, treating as no evidence");
                None
            }
        }
    }

    async fn decide(&self, command: &str, class: &DelegationClass) -> GovernanceResult<Decision> {
        let status = self.store.get_status(&class.class_id).await?;
        if status.is_suspended() {
            debug!(class_id = %class.class_id, "delegation already suspended");
            return Ok(Decision::already_suspended(&class.class_id));
        }

        let Some(evidence) = self.find_regression_evidence(&class.pattern).await else {
            return Ok(Decision::active(&class.class_id));
        };

        let record = SuspensionRecord::from_evidence(&class.class_id, command, &evidence, Utc::now());
        match self.store.write_suspension(record).await? {
            WriteOutcome::Recorded(record) => {
                info!(
                    class_id = %record.class_id,
                    evidence_source = %record.details.evidence_source,
                    suspension_id = %record.suspension_id,
                    "delegation suspended on confidence regression"
                );
                self.journal(&record).await;
                Ok(Decision::newly_suspended(&class.class_id))
            }
            WriteOutcome::AlreadySuspended(existing) => {
                warn!(
                    class_id = %existing.class_id,
                    kept = %existing.suspension_id,
                    "concurrent suspension already recorded"
                );
                Ok(Decision::already_suspended(&class.class_id))
            }
        }
    }

    async fn journal(&self, record: &SuspensionRecord) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(record).await {
                warn!(class_id = %record.class_id, error = %e, "failed to journal suspension");
            }
        }
    }
}

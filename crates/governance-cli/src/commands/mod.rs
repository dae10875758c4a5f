//! Command implementations

pub mod check;
pub mod journal;
pub mod status;

use crate::error::CliResult;
use sintra_governance::{
    DirectoryEvidenceSource, GovernanceConfig, JsonFileApprovalStore, JsonlJournal,
    StaticRegistry, SuspensionOrchestrator,
};
use std::sync::Arc;
use tracing::warn;

/// Everything a command needs, wired from the effective configuration.
pub struct Runtime {
    pub config: GovernanceConfig,
    pub registry: Arc<StaticRegistry>,
    pub orchestrator: SuspensionOrchestrator,
}

impl Runtime {
    pub async fn build(config: GovernanceConfig) -> CliResult<Self> {
        let registry = Arc::new(StaticRegistry::load(&config.registry_path)?);
        let mut orchestrator = SuspensionOrchestrator::new(
            registry.clone(),
            Arc::new(DirectoryEvidenceSource::new(&config.evidence_dir)),
            Arc::new(JsonFileApprovalStore::new(&config.store_path)),
        )
        .with_max_pattern_len(config.max_pattern_len);

        // An unusable journal never blocks a decision.
        if config.journal_enabled {
            match JsonlJournal::open(&config.journal_path).await {
                Ok(journal) => orchestrator = orchestrator.with_journal(Arc::new(journal)),
                Err(e) => warn!(
                    path = %config.journal_path.display(),
                    error = %e,
                    "operator journal unavailable, continuing without it"
                ),
            }
        }

        Ok(Self {
            config,
            registry,
            orchestrator,
        })
    }
}

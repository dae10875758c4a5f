//! Delegation status commands

use super::Runtime;
use crate::error::CliResult;
use crate::output::{dash, print_output, print_single, OutputFormat};
use serde::Serialize;
use sintra_governance::{ApprovalStatus, DelegationRegistry};
use tabled::Tabled;

#[derive(Serialize, Tabled)]
struct ClassRow {
    #[tabled(rename = "CLASS")]
    class_id: String,
    #[tabled(rename = "PATTERN")]
    pattern: String,
    #[tabled(rename = "STATUS")]
    status: ApprovalStatus,
    #[tabled(rename = "SUSPENDED AT")]
    suspended_at: String,
    #[tabled(rename = "EVIDENCE")]
    evidence: String,
}

pub async fn execute_status(runtime: &Runtime, class_id: &str, format: OutputFormat) -> CliResult<()> {
    let report = runtime.orchestrator.get_status(class_id).await?;
    print_single(&report, format)
}

/// List every registered delegation class with its current status.
pub async fn execute_classes(runtime: &Runtime, format: OutputFormat) -> CliResult<()> {
    let mut rows = Vec::new();
    for class in runtime.registry.classes() {
        let report = runtime.orchestrator.get_status(&class.class_id).await?;
        let suspension = report.suspension.as_ref();
        rows.push(ClassRow {
            class_id: class.class_id,
            pattern: class.pattern,
            status: report.status,
            suspended_at: dash(suspension.map(|s| s.suspended_at.to_rfc3339())),
            evidence: dash(suspension.map(|s| s.details.evidence_source.clone())),
        });
    }
    print_output(rows, format)
}

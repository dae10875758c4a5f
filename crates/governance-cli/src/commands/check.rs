//! Authorization check and evidence scan

use super::Runtime;
use crate::error::CliResult;
use crate::output::{print_output, print_single, print_warning, OutputFormat};
use serde::Serialize;
use sintra_governance::Decision;
use tabled::Tabled;
use tracing::debug;

/// Exit code when `--enforce` finds a suspended delegation.
pub const ENFORCEMENT_EXIT_CODE: u8 = 3;

#[derive(Serialize, Tabled)]
struct DecisionRow {
    #[tabled(rename = "CLASS")]
    class_id: String,
    #[tabled(rename = "SUSPENDED")]
    suspended: bool,
    #[tabled(rename = "REASON")]
    reason: String,
}

impl From<&Decision> for DecisionRow {
    fn from(decision: &Decision) -> Self {
        Self {
            class_id: decision.class_id.clone(),
            suspended: decision.suspended,
            reason: decision.reason.to_string(),
        }
    }
}

/// Run `auto_suspend` for one command. Returns the process exit code.
pub async fn execute_check(
    runtime: &Runtime,
    words: Vec<String>,
    enforce: bool,
    format: OutputFormat,
) -> CliResult<u8> {
    let command = words.join(" ");
    debug!(command = %command, "checking delegations");
    let decisions = runtime.orchestrator.auto_suspend(&command).await?;

    let blocked = decisions.iter().any(|d| d.suspended);
    match format {
        OutputFormat::Table => {
            print_output(decisions.iter().map(DecisionRow::from).collect(), format)?
        }
        // Wire shape for embedding gates.
        OutputFormat::Json | OutputFormat::Yaml => print_single(&decisions, format)?,
    }

    Ok(if enforce && blocked {
        ENFORCEMENT_EXIT_CODE
    } else {
        0
    })
}

/// Look up the first unacknowledged regression matching `pattern`.
///
/// Structured formats print `null` when nothing matches.
pub async fn execute_scan(runtime: &Runtime, pattern: &str, format: OutputFormat) -> CliResult<()> {
    let evidence = runtime.orchestrator.find_regression_evidence(pattern).await;
    match (evidence, format) {
        (None, OutputFormat::Table) => {
            print_warning(&format!("no regression evidence matches {:?}", pattern));
            Ok(())
        }
        (evidence, _) => print_single(&evidence, format),
    }
}

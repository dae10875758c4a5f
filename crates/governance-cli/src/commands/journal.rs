//! Operator journal commands

use super::Runtime;
use crate::error::CliResult;
use crate::output::{print_error, print_output, print_success, OutputFormat};
use clap::Subcommand;
use serde::Serialize;
use sintra_governance::{JournalEntry, JsonlJournal, OperatorJournal};
use tabled::Tabled;

/// Journal subcommands
#[derive(Subcommand)]
pub enum JournalCommands {
    /// Show the most recent suspensions
    Tail {
        /// Number of entries
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
    },

    /// Verify the hash chain
    Verify,
}

#[derive(Serialize, Tabled)]
struct EntryRow {
    #[tabled(rename = "SEQ")]
    sequence: u64,
    #[tabled(rename = "RECORDED AT")]
    recorded_at: String,
    #[tabled(rename = "CLASS")]
    class_id: String,
    #[tabled(rename = "REASON")]
    reason: String,
    #[tabled(rename = "COMMAND")]
    command: String,
    #[tabled(rename = "EVIDENCE")]
    evidence_source: String,
}

impl From<JournalEntry> for EntryRow {
    fn from(entry: JournalEntry) -> Self {
        Self {
            sequence: entry.sequence,
            recorded_at: entry.recorded_at.to_rfc3339(),
            class_id: entry.class_id,
            reason: entry.reason.to_string(),
            command: entry.command,
            evidence_source: entry.evidence_source,
        }
    }
}

/// Returns the process exit code.
pub async fn execute(command: JournalCommands, runtime: &Runtime, format: OutputFormat) -> CliResult<u8> {
    let journal = JsonlJournal::open(&runtime.config.journal_path).await?;

    match command {
        JournalCommands::Tail { lines } => {
            let entries = journal.tail(lines).await?;
            print_output(entries.into_iter().map(EntryRow::from).collect(), format)?;
            Ok(0)
        }
        JournalCommands::Verify => {
            let result = journal.verify().await?;
            if result.valid {
                print_success(&format!(
                    "journal intact ({} entries)",
                    result.verified_entries
                ));
                Ok(0)
            } else {
                print_error(&format!(
                    "journal broken at line {}: {}",
                    result.first_invalid_line.unwrap_or_default(),
                    result.message.unwrap_or_default()
                ));
                Ok(1)
            }
        }
    }
}

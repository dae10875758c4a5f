//! Core governance data types.
//!
//! Delegation classes come from an external registry, suspension records
//! live in the approval store, and decisions are handed back to the
//! command-execution gate without being persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A category of commands an agent may run without per-instance approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationClass {
    pub class_id: String,
    pub pattern: String,
}

impl DelegationClass {
    pub fn new(class_id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            pattern: pattern.into(),
        }
    }
}

/// Authorization state of a delegation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Active,
    Suspended,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Suspended => write!(f, "SUSPENDED"),
        }
    }
}

/// Result of an approval store status lookup.
///
/// `suspension` is present exactly when `status` is `Suspended`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub class_id: String,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspension: Option<SuspensionRecord>,
}

impl StatusReport {
    pub fn active(class_id: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            status: ApprovalStatus::Active,
            suspension: None,
        }
    }

    pub fn suspended(record: SuspensionRecord) -> Self {
        Self {
            class_id: record.class_id.clone(),
            status: ApprovalStatus::Suspended,
            suspension: Some(record),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.status == ApprovalStatus::Suspended
    }
}

/// Why a delegation class was suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspensionReason {
    ConfidenceRegression,
}

impl fmt::Display for SuspensionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfidenceRegression => write!(f, "CONFIDENCE_REGRESSION"),
        }
    }
}

/// Evidentiary basis of a suspension, stored verbatim for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspensionDetails {
    /// Identifier of the confidence-check record that triggered the suspension.
    pub evidence_source: String,
    /// The incoming command being authorized when the evidence was found.
    pub triggering_command: String,
    /// The command the confidence check was evaluated against.
    pub evidence_command: String,
    /// Full regression payload of the evidence record.
    pub regression: Value,
}

#[derive(Serialize)]
struct SuspensionDigestBody<'a> {
    suspension_id: &'a str,
    class_id: &'a str,
    suspended_at: &'a DateTime<Utc>,
    reason: SuspensionReason,
    details: &'a SuspensionDetails,
}

/// A durable suspension attached to a delegation class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspensionRecord {
    pub suspension_id: String,
    pub class_id: String,
    pub suspended_at: DateTime<Utc>,
    pub reason: SuspensionReason,
    pub details: SuspensionDetails,
    /// BLAKE3 over the canonical JSON body, hex encoded.
    pub digest: String,
}

impl SuspensionRecord {
    /// Build a confidence-regression suspension from scanner evidence.
    pub fn from_evidence(
        class_id: impl Into<String>,
        triggering_command: impl Into<String>,
        evidence: &Evidence,
        suspended_at: DateTime<Utc>,
    ) -> Self {
        let details = SuspensionDetails {
            evidence_source: evidence.source_id.clone(),
            triggering_command: triggering_command.into(),
            evidence_command: evidence.command.clone(),
            regression: evidence.regression.clone(),
        };
        Self::new(
            class_id,
            SuspensionReason::ConfidenceRegression,
            details,
            suspended_at,
        )
    }

    pub fn new(
        class_id: impl Into<String>,
        reason: SuspensionReason,
        details: SuspensionDetails,
        suspended_at: DateTime<Utc>,
    ) -> Self {
        let mut record = Self {
            suspension_id: uuid::Uuid::new_v4().to_string(),
            class_id: class_id.into(),
            suspended_at,
            reason,
            details,
            digest: String::new(),
        };
        record.digest = record.compute_digest();
        record
    }

    fn compute_digest(&self) -> String {
        let body = SuspensionDigestBody {
            suspension_id: &self.suspension_id,
            class_id: &self.class_id,
            suspended_at: &self.suspended_at,
            reason: self.reason,
            details: &self.details,
        };
        let bytes = serde_json::to_vec(&body).expect("serializable");
        blake3::hash(&bytes).to_hex().to_string()
    }

    /// Does the stored digest still match the record body?
    pub fn verify_digest(&self) -> bool {
        self.digest == self.compute_digest()
    }
}

/// Kind of regression evidence produced by the ledger scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceKind {
    ConfidenceRegression,
}

/// Unacknowledged regression evidence matching a delegation pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub kind: EvidenceKind,
    pub source_id: String,
    pub command: String,
    pub regression: Value,
}

/// Reason attached to an orchestrator decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionReason {
    /// The class was already suspended before this call.
    Suspended,
    /// The class was suspended by this call on fresh regression evidence.
    ConfidenceRegression,
    None,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspended => write!(f, "SUSPENDED"),
            Self::ConfidenceRegression => write!(f, "CONFIDENCE_REGRESSION"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// Per-class authorization decision returned to the execution gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub class_id: String,
    pub suspended: bool,
    pub reason: DecisionReason,
}

impl Decision {
    pub fn active(class_id: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            suspended: false,
            reason: DecisionReason::None,
        }
    }

    pub fn already_suspended(class_id: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            suspended: true,
            reason: DecisionReason::Suspended,
        }
    }

    pub fn newly_suspended(class_id: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            suspended: true,
            reason: DecisionReason::ConfidenceRegression,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_evidence() -> Evidence {
        Evidence {
            kind: EvidenceKind::ConfidenceRegression,
            source_id: "run-7.json".into(),
            command: "deploy prod".into(),
            regression: json!({"regressed": true, "acknowledged": false, "delta": -0.12}),
        }
    }

    #[test]
    fn decision_wire_shape() {
        let value = serde_json::to_value(Decision::newly_suspended("c1")).unwrap();
        assert_eq!(
            value,
            json!({"class_id": "c1", "suspended": true, "reason": "CONFIDENCE_REGRESSION"})
        );
        let value = serde_json::to_value(Decision::active("c1")).unwrap();
        assert_eq!(value["reason"], "NONE");
        let value = serde_json::to_value(Decision::already_suspended("c1")).unwrap();
        assert_eq!(value["reason"], "SUSPENDED");
    }

    #[test]
    fn suspension_record_carries_evidence_verbatim() {
        let evidence = sample_evidence();
        let record = SuspensionRecord::from_evidence("c1", "deploy prod --force", &evidence, Utc::now());
        assert_eq!(record.reason, SuspensionReason::ConfidenceRegression);
        assert_eq!(record.details.evidence_source, "run-7.json");
        assert_eq!(record.details.triggering_command, "deploy prod --force");
        assert_eq!(record.details.evidence_command, "deploy prod");
        assert_eq!(record.details.regression["delta"], json!(-0.12));
        assert!(record.verify_digest());
    }

    #[test]
    fn tampered_record_fails_digest() {
        let mut record = SuspensionRecord::from_evidence("c1", "deploy prod", &sample_evidence(), Utc::now());
        record.details.evidence_command = "deploy staging".into();
        assert!(!record.verify_digest());
    }

    #[test]
    fn status_report_constructors() {
        let active = StatusReport::active("c1");
        assert!(!active.is_suspended());
        assert!(active.suspension.is_none());

        let record = SuspensionRecord::from_evidence("c1", "deploy prod", &sample_evidence(), Utc::now());
        let suspended = StatusReport::suspended(record);
        assert!(suspended.is_suspended());
        assert_eq!(suspended.class_id, "c1");
    }
}

//! Compliance history entries.
//!
//! The history is the audit trail of an account: entries are only ever
//! appended, never edited, truncated or reordered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceAction {
    AccountOpened,
    AccountLocked,
    KycApproved,
    KycRejected,
    AccountSuspended,
    AccountReactivated,
    AccountClosed,
}

impl ComplianceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceAction::AccountOpened => "account_opened",
            ComplianceAction::AccountLocked => "account_locked",
            ComplianceAction::KycApproved => "kyc_approved",
            ComplianceAction::KycRejected => "kyc_rejected",
            ComplianceAction::AccountSuspended => "account_suspended",
            ComplianceAction::AccountReactivated => "account_reactivated",
            ComplianceAction::AccountClosed => "account_closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "account_opened" => Some(ComplianceAction::AccountOpened),
            "account_locked" => Some(ComplianceAction::AccountLocked),
            "kyc_approved" => Some(ComplianceAction::KycApproved),
            "kyc_rejected" => Some(ComplianceAction::KycRejected),
            "account_suspended" => Some(ComplianceAction::AccountSuspended),
            "account_reactivated" => Some(ComplianceAction::AccountReactivated),
            "account_closed" => Some(ComplianceAction::AccountClosed),
            _ => None,
        }
    }
}

impl fmt::Display for ComplianceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Actor recorded for transitions the system performs on its own
pub const SYSTEM_ACTOR: &str = "system";

/// One immutable audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceEntry {
    pub action: ComplianceAction,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Reference to supporting evidence (document id, review ticket)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl ComplianceEntry {
    pub fn new(action: ComplianceAction, actor: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            action,
            timestamp,
            actor: actor.to_string(),
            reason: None,
            evidence: None,
        }
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    pub fn with_evidence(mut self, evidence: Option<&str>) -> Self {
        self.evidence = evidence.map(|e| e.to_string());
        self
    }
}

impl fmt::Display for ComplianceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} by {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.action,
            self.actor
        )?;
        if let Some(reason) = &self.reason {
            write!(f, " ({})", reason)?;
        }
        Ok(())
    }
}

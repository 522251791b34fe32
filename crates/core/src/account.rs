//! # Account Module
//!
//! Account security and compliance state machine.
//!
//! An `Account` is a plain record. Every mutating operation borrows the
//! current state and returns an [`AccountChange`]: the next state plus the
//! compliance entries the transition produced. Nothing is modified in place,
//! so a rejected transition leaves the caller's value untouched.
//!
//! ```text
//!              suspend                 close
//!   active ─────────────▶ suspended ─────────▶ closed (terminal)
//!     ▲  │◀──────────────     │
//!     │  │   reactivate       │
//!     │  └────────────────────┼──────────────▶ closed
//!     │                       │      close
//!   locked = active ∧ now < locked_until   (derived, never persisted as status)
//! ```

use crate::compliance::{ComplianceAction, ComplianceEntry, SYSTEM_ACTOR};
use crate::error::{CoreError, CoreResult};
use crate::policy::{LimitSchedule, SecurityPolicy};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    /// Terminal
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(AccountStatus::Active),
            "suspended" => Some(AccountStatus::Suspended),
            "closed" => Some(AccountStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Know-Your-Customer status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Pending,
    Approved,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Pending => "pending",
            KycStatus::Approved => "approved",
            KycStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(KycStatus::Pending),
            "approved" => Some(KycStatus::Approved),
            "rejected" => Some(KycStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Registration input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub phone_number: String,
    pub full_name: String,
    pub email: Option<String>,
    pub date_of_birth: NaiveDate,
    pub is_pep: bool,
    pub source_of_funds: Option<String>,
}

/// Supporting material for a KYC decision
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KycEvidence {
    pub reason: Option<String>,
    /// Document or review reference
    pub reference: Option<String>,
}

impl KycEvidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    pub fn with_reference(mut self, reference: &str) -> Self {
        self.reference = Some(reference.to_string());
        self
    }
}

/// Result of a transition: next state plus the history delta
#[derive(Debug, Clone)]
pub struct AccountChange {
    pub account: Account,
    pub recorded: Vec<ComplianceEntry>,
}

/// One account per human user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    /// Normalized phone number, unique; used to address transfers
    pub phone_number: String,
    pub full_name: String,
    pub email: Option<String>,
    pub date_of_birth: NaiveDate,
    /// Politically exposed person
    pub is_pep: bool,
    pub source_of_funds: Option<String>,

    pub kyc_status: KycStatus,
    pub identity_verified: bool,
    /// Last assessed risk, refreshed whenever the account is saved
    pub risk_level: RiskLevel,
    pub status: AccountStatus,

    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_device: Option<String>,

    /// Append-only audit trail, oldest first
    pub compliance_history: Vec<ComplianceEntry>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Strip formatting characters from a phone number.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '(' && *c != ')')
        .collect()
}

impl Account {
    /// Open a new account.
    ///
    /// Validates the identity fields and records an `account_opened` entry.
    pub fn open(id: &str, new: NewAccount, actor: &str, now: DateTime<Utc>) -> CoreResult<AccountChange> {
        let phone_number = normalize_phone(&new.phone_number);
        let digits = phone_number.strip_prefix('+').unwrap_or(&phone_number);
        if digits.len() < 9 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::ValidationError(format!(
                "invalid phone number: {}",
                new.phone_number
            )));
        }

        let full_name = new.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(CoreError::ValidationError("full name is required".to_string()));
        }

        if new.date_of_birth > now.date_naive() {
            return Err(CoreError::ValidationError(
                "date of birth is in the future".to_string(),
            ));
        }

        let source_of_funds = new
            .source_of_funds
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let entry = ComplianceEntry::new(ComplianceAction::AccountOpened, actor, now);
        let account = Account {
            id: id.to_string(),
            phone_number,
            full_name,
            email: new.email,
            date_of_birth: new.date_of_birth,
            is_pep: new.is_pep,
            source_of_funds,
            kyc_status: KycStatus::Pending,
            identity_verified: false,
            risk_level: RiskLevel::Low,
            status: AccountStatus::Active,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            last_login_device: None,
            compliance_history: vec![entry.clone()],
            created_at: now,
            updated_at: now,
        };

        Ok(AccountChange {
            account,
            recorded: vec![entry],
        })
    }

    // === Queries ===

    /// Temporarily locked after repeated failed logins
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.map_or(false, |until| now < until)
    }

    /// Whether the account may originate operations right now
    pub fn is_operable(&self, now: DateTime<Utc>) -> bool {
        self.status == AccountStatus::Active && !self.is_locked(now)
    }

    pub fn is_closed(&self) -> bool {
        self.status == AccountStatus::Closed
    }

    /// Age in whole years at `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> u32 {
        use chrono::Datelike;
        let today = now.date_naive();
        let dob = self.date_of_birth;
        let mut years = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            years -= 1;
        }
        years.max(0) as u32
    }

    /// KYC level the wallet is entitled to under `limits`
    pub fn entitled_kyc_level(&self, limits: &LimitSchedule) -> u8 {
        match self.kyc_status {
            KycStatus::Approved => limits.approved_kyc_level,
            KycStatus::Pending | KycStatus::Rejected => limits.base_kyc_level,
        }
    }

    // === Transitions ===

    fn ensure_not_closed(&self) -> CoreResult<()> {
        if self.is_closed() {
            return Err(CoreError::AccountClosed(self.id.clone()));
        }
        Ok(())
    }

    fn successor(&self, now: DateTime<Utc>) -> Account {
        let mut next = self.clone();
        next.updated_at = now;
        next
    }

    fn commit(mut next: Account, recorded: Vec<ComplianceEntry>) -> AccountChange {
        next.compliance_history.extend(recorded.iter().cloned());
        AccountChange {
            account: next,
            recorded,
        }
    }

    /// Count a failed login; locks the account once the threshold is hit.
    ///
    /// A failure after an expired lock starts a fresh count at 1.
    pub fn record_failed_login(
        &self,
        policy: &SecurityPolicy,
        now: DateTime<Utc>,
    ) -> CoreResult<AccountChange> {
        self.ensure_not_closed()?;
        let mut next = self.successor(now);

        if matches!(next.locked_until, Some(until) if until <= now) {
            next.locked_until = None;
            next.failed_login_attempts = 0;
        }

        next.failed_login_attempts += 1;

        let mut recorded = Vec::new();
        if next.failed_login_attempts >= policy.max_failed_logins && next.locked_until.is_none() {
            next.locked_until = Some(now + policy.lockout_duration());
            recorded.push(
                ComplianceEntry::new(ComplianceAction::AccountLocked, SYSTEM_ACTOR, now).with_reason(
                    &format!("{} consecutive failed logins", next.failed_login_attempts),
                ),
            );
        }

        Ok(Self::commit(next, recorded))
    }

    /// Reset the failure counter and record the device used.
    pub fn record_successful_login(
        &self,
        device: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<AccountChange> {
        self.ensure_not_closed()?;
        let mut next = self.successor(now);
        next.failed_login_attempts = 0;
        next.locked_until = None;
        next.last_login_at = Some(now);
        next.last_login_device = device.map(|d| d.to_string());
        Ok(Self::commit(next, Vec::new()))
    }

    /// Decide a pending KYC review.
    ///
    /// Only `pending -> approved` and `pending -> rejected` are legal.
    /// A rejection must carry a reason.
    pub fn update_kyc_status(
        &self,
        new_status: KycStatus,
        actor: &str,
        evidence: &KycEvidence,
        now: DateTime<Utc>,
    ) -> CoreResult<AccountChange> {
        self.ensure_not_closed()?;
        if self.kyc_status != KycStatus::Pending || new_status == KycStatus::Pending {
            return Err(CoreError::InvalidKycTransition {
                from: self.kyc_status,
                to: new_status,
            });
        }

        let reason = evidence
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());

        let mut next = self.successor(now);
        next.kyc_status = new_status;

        let action = if new_status == KycStatus::Approved {
            next.identity_verified = true;
            ComplianceAction::KycApproved
        } else {
            if reason.is_none() {
                return Err(CoreError::ReasonRequired("reject KYC"));
            }
            ComplianceAction::KycRejected
        };

        let mut entry =
            ComplianceEntry::new(action, actor, now).with_evidence(evidence.reference.as_deref());
        if let Some(reason) = reason {
            entry = entry.with_reason(reason);
        }

        Ok(Self::commit(next, vec![entry]))
    }

    /// `active -> suspended`
    pub fn suspend(&self, reason: &str, actor: &str, now: DateTime<Utc>) -> CoreResult<AccountChange> {
        self.ensure_not_closed()?;
        if self.status != AccountStatus::Active {
            return Err(CoreError::InvalidTransition {
                action: "suspend",
                status: self.status,
            });
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::ReasonRequired("suspend"));
        }

        let mut next = self.successor(now);
        next.status = AccountStatus::Suspended;
        let entry =
            ComplianceEntry::new(ComplianceAction::AccountSuspended, actor, now).with_reason(reason);
        Ok(Self::commit(next, vec![entry]))
    }

    /// `suspended -> active`
    pub fn reactivate(&self, actor: &str, now: DateTime<Utc>) -> CoreResult<AccountChange> {
        self.ensure_not_closed()?;
        if self.status != AccountStatus::Suspended {
            return Err(CoreError::InvalidTransition {
                action: "reactivate",
                status: self.status,
            });
        }

        let mut next = self.successor(now);
        next.status = AccountStatus::Active;
        let entry = ComplianceEntry::new(ComplianceAction::AccountReactivated, actor, now);
        Ok(Self::commit(next, vec![entry]))
    }

    /// Terminal close
    pub fn close(&self, reason: &str, actor: &str, now: DateTime<Utc>) -> CoreResult<AccountChange> {
        self.ensure_not_closed()?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::ReasonRequired("close"));
        }

        let mut next = self.successor(now);
        next.status = AccountStatus::Closed;
        let entry =
            ComplianceEntry::new(ComplianceAction::AccountClosed, actor, now).with_reason(reason);
        Ok(Self::commit(next, vec![entry]))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {}, kyc {})",
            self.full_name, self.phone_number, self.status, self.kyc_status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()
    }

    fn open_account() -> Account {
        let new = NewAccount {
            phone_number: "+250 788 123 456".to_string(),
            full_name: "Aline Uwase".to_string(),
            email: None,
            date_of_birth: NaiveDate::from_ymd_opt(1994, 3, 12).unwrap(),
            is_pep: false,
            source_of_funds: Some("salary".to_string()),
        };
        Account::open("acc-1", new, "registration", t0()).unwrap().account
    }

    #[test]
    fn test_open_normalizes_and_records() {
        let account = open_account();
        assert_eq!(account.phone_number, "+250788123456");
        assert_eq!(account.kyc_status, KycStatus::Pending);
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.compliance_history.len(), 1);
        assert_eq!(
            account.compliance_history[0].action,
            ComplianceAction::AccountOpened
        );
        assert!(account.is_operable(t0()));
    }

    #[test]
    fn test_open_rejects_bad_identity() {
        let mut new = NewAccount {
            phone_number: "12ab".to_string(),
            full_name: "X".to_string(),
            email: None,
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            is_pep: false,
            source_of_funds: None,
        };
        assert!(Account::open("a", new.clone(), "r", t0()).is_err());

        new.phone_number = "0788123456".to_string();
        new.full_name = "   ".to_string();
        assert!(Account::open("a", new.clone(), "r", t0()).is_err());

        new.full_name = "Jean".to_string();
        new.date_of_birth = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        assert!(Account::open("a", new, "r", t0()).is_err());
    }

    #[test]
    fn test_lockout_after_five_failures() {
        let policy = SecurityPolicy::default();
        let mut account = open_account();

        for i in 1..=4 {
            let change = account.record_failed_login(&policy, t0()).unwrap();
            assert!(change.recorded.is_empty());
            account = change.account;
            assert_eq!(account.failed_login_attempts, i);
            assert!(account.is_operable(t0()));
        }

        let fifth_at = t0() + Duration::seconds(40);
        let change = account.record_failed_login(&policy, fifth_at).unwrap();
        assert_eq!(change.recorded.len(), 1);
        assert_eq!(change.recorded[0].action, ComplianceAction::AccountLocked);
        let account = change.account;

        assert_eq!(account.locked_until, Some(fifth_at + Duration::minutes(30)));
        assert!(!account.is_operable(fifth_at));
        assert!(!account.is_operable(fifth_at + Duration::minutes(29)));
        assert!(account.is_operable(fifth_at + Duration::minutes(30)));
    }

    #[test]
    fn test_success_before_threshold_resets_counter() {
        let policy = SecurityPolicy::default();
        let mut account = open_account();
        for _ in 0..3 {
            account = account.record_failed_login(&policy, t0()).unwrap().account;
        }

        let account = account
            .record_successful_login(Some("pixel-8"), t0())
            .unwrap()
            .account;
        assert_eq!(account.failed_login_attempts, 0);
        assert_eq!(account.locked_until, None);
        assert_eq!(account.last_login_device.as_deref(), Some("pixel-8"));
        assert_eq!(account.last_login_at, Some(t0()));
    }

    #[test]
    fn test_failure_after_expired_lock_restarts_count() {
        let policy = SecurityPolicy::default();
        let mut account = open_account();
        for _ in 0..5 {
            account = account.record_failed_login(&policy, t0()).unwrap().account;
        }
        assert!(account.is_locked(t0()));

        let later = t0() + Duration::minutes(45);
        let account = account.record_failed_login(&policy, later).unwrap().account;
        assert_eq!(account.failed_login_attempts, 1);
        assert_eq!(account.locked_until, None);
    }

    #[test]
    fn test_transitions_do_not_mutate_source() {
        let policy = SecurityPolicy::default();
        let account = open_account();
        let _ = account.record_failed_login(&policy, t0()).unwrap();
        assert_eq!(account.failed_login_attempts, 0);
    }

    #[test]
    fn test_kyc_approval() {
        let limits = LimitSchedule::default();
        let account = open_account();
        assert_eq!(account.entitled_kyc_level(&limits), 1);

        let evidence = KycEvidence::new().with_reference("NID-1199");
        let change = account
            .update_kyc_status(KycStatus::Approved, "officer-2", &evidence, t0())
            .unwrap();
        let account = change.account;

        assert_eq!(account.kyc_status, KycStatus::Approved);
        assert!(account.identity_verified);
        assert_eq!(account.entitled_kyc_level(&limits), 2);
        assert_eq!(change.recorded[0].evidence.as_deref(), Some("NID-1199"));
        assert_eq!(account.compliance_history.len(), 2);
    }

    #[test]
    fn test_kyc_rejection_requires_reason() {
        let account = open_account();
        let err = account
            .update_kyc_status(KycStatus::Rejected, "officer-2", &KycEvidence::new(), t0())
            .unwrap_err();
        assert!(matches!(err, CoreError::ReasonRequired(_)));

        let change = account
            .update_kyc_status(
                KycStatus::Rejected,
                "officer-2",
                &KycEvidence::new().with_reason("document expired"),
                t0(),
            )
            .unwrap();
        assert_eq!(change.account.kyc_status, KycStatus::Rejected);
        assert!(!change.account.identity_verified);
        assert_eq!(
            change.account.entitled_kyc_level(&LimitSchedule::default()),
            1
        );
    }

    #[test]
    fn test_kyc_only_from_pending() {
        let account = open_account()
            .update_kyc_status(KycStatus::Approved, "officer", &KycEvidence::new(), t0())
            .unwrap()
            .account;

        let err = account
            .update_kyc_status(
                KycStatus::Rejected,
                "officer",
                &KycEvidence::new().with_reason("late"),
                t0(),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidKycTransition { .. }));

        let err = open_account()
            .update_kyc_status(KycStatus::Pending, "officer", &KycEvidence::new(), t0())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidKycTransition { .. }));
    }

    #[test]
    fn test_suspend_reactivate_close() {
        let account = open_account();
        let suspended = account.suspend("fraud review", "ops", t0()).unwrap().account;
        assert_eq!(suspended.status, AccountStatus::Suspended);
        assert!(!suspended.is_operable(t0()));
        assert!(suspended.suspend("again", "ops", t0()).is_err());

        let active = suspended.reactivate("ops", t0()).unwrap().account;
        assert!(active.is_operable(t0()));
        assert!(active.reactivate("ops", t0()).is_err());

        let closed = active.close("customer request", "ops", t0()).unwrap().account;
        assert!(closed.is_closed());
        assert_eq!(closed.compliance_history.len(), 4);
    }

    #[test]
    fn test_closed_is_terminal() {
        let policy = SecurityPolicy::default();
        let closed = open_account()
            .close("deceased", "ops", t0())
            .unwrap()
            .account;

        let is_closed = |r: CoreResult<AccountChange>| matches!(r, Err(CoreError::AccountClosed(_)));
        assert!(is_closed(closed.record_failed_login(&policy, t0())));
        assert!(is_closed(closed.record_successful_login(None, t0())));
        assert!(is_closed(closed.update_kyc_status(
            KycStatus::Approved,
            "officer",
            &KycEvidence::new(),
            t0()
        )));
        assert!(is_closed(closed.suspend("x", "ops", t0())));
        assert!(is_closed(closed.reactivate("ops", t0())));
        assert!(is_closed(closed.close("x", "ops", t0())));
    }

    #[test]
    fn test_reason_required_for_suspend_and_close() {
        let account = open_account();
        assert!(matches!(
            account.suspend("  ", "ops", t0()),
            Err(CoreError::ReasonRequired("suspend"))
        ));
        assert!(matches!(
            account.close("", "ops", t0()),
            Err(CoreError::ReasonRequired("close"))
        ));
    }

    #[test]
    fn test_age_at() {
        let account = open_account();
        let before_birthday = Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap();
        let on_birthday = Utc.with_ymd_and_hms(2026, 3, 12, 0, 0, 0).unwrap();
        assert_eq!(account.age_at(before_birthday), 31);
        assert_eq!(account.age_at(on_birthday), 32);
    }
}

//! Advisory risk scoring.
//!
//! A pure function of the account's current state. The result feeds limit
//! enforcement as context only; it never blocks an operation by itself and
//! is recomputed on every request instead of being cached.

use crate::account::{Account, RiskLevel};
use crate::policy::RiskPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A contributing factor and its weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    PoliticallyExposed,
    UndeclaredSourceOfFunds,
    AgeBracket,
    NewAccount,
}

impl RiskFactor {
    pub fn weight(&self) -> u32 {
        match self {
            RiskFactor::PoliticallyExposed => 3,
            RiskFactor::UndeclaredSourceOfFunds => 1,
            RiskFactor::AgeBracket => 1,
            RiskFactor::NewAccount => 1,
        }
    }
}

/// Score with the factors that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: u32,
    pub factors: Vec<RiskFactor>,
}

/// Score an account: 0-1 low, 2 medium, 3+ high.
pub fn assess_risk(account: &Account, policy: &RiskPolicy, now: DateTime<Utc>) -> RiskAssessment {
    let mut factors = Vec::new();

    if account.is_pep {
        factors.push(RiskFactor::PoliticallyExposed);
    }
    if account.source_of_funds.is_none() {
        factors.push(RiskFactor::UndeclaredSourceOfFunds);
    }

    let age = account.age_at(now);
    if age < policy.minimum_age || age >= policy.senior_age {
        factors.push(RiskFactor::AgeBracket);
    }

    if (now - account.created_at).num_days() < policy.new_account_days {
        factors.push(RiskFactor::NewAccount);
    }

    let score: u32 = factors.iter().map(RiskFactor::weight).sum();
    let level = match score {
        0..=1 => RiskLevel::Low,
        2 => RiskLevel::Medium,
        _ => RiskLevel::High,
    };

    RiskAssessment {
        level,
        score,
        factors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::NewAccount;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn opened_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap()
    }

    fn account(dob: (i32, u32, u32), pep: bool, funds: Option<&str>) -> Account {
        let new = NewAccount {
            phone_number: "+250788000111".to_string(),
            full_name: "Test Person".to_string(),
            email: None,
            date_of_birth: NaiveDate::from_ymd_opt(dob.0, dob.1, dob.2).unwrap(),
            is_pep: pep,
            source_of_funds: funds.map(|s| s.to_string()),
        };
        Account::open("acc", new, "registration", opened_at())
            .unwrap()
            .account
    }

    #[test]
    fn test_established_customer_is_low() {
        let a = account((1985, 6, 1), false, Some("salary"));
        let now = opened_at() + Duration::days(90);
        let assessment = assess_risk(&a, &RiskPolicy::default(), now);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.score, 0);
    }

    #[test]
    fn test_new_account_without_funds_declaration_is_medium() {
        let a = account((1985, 6, 1), false, None);
        let assessment = assess_risk(&a, &RiskPolicy::default(), opened_at());
        assert_eq!(assessment.level, RiskLevel::Medium);
        assert_eq!(
            assessment.factors,
            vec![RiskFactor::UndeclaredSourceOfFunds, RiskFactor::NewAccount]
        );
    }

    #[test]
    fn test_pep_is_high() {
        let a = account((1970, 2, 2), true, Some("business"));
        let now = opened_at() + Duration::days(400);
        assert_eq!(assess_risk(&a, &RiskPolicy::default(), now).level, RiskLevel::High);
    }

    #[test]
    fn test_age_brackets() {
        let now = opened_at() + Duration::days(90);
        let young = account((2007, 1, 1), false, Some("allowance"));
        let senior = account((1950, 1, 1), false, Some("pension"));

        for a in [young, senior] {
            let assessment = assess_risk(&a, &RiskPolicy::default(), now);
            assert_eq!(assessment.factors, vec![RiskFactor::AgeBracket]);
            assert_eq!(assessment.level, RiskLevel::Low);
        }
    }

    #[test]
    fn test_recomputed_from_current_state() {
        let a = account((1985, 6, 1), false, None);
        let policy = RiskPolicy::default();
        assert_eq!(assess_risk(&a, &policy, opened_at()).level, RiskLevel::Medium);
        // Same account a year later: only the missing declaration remains
        let later = opened_at() + Duration::days(365);
        assert_eq!(assess_risk(&a, &policy, later).level, RiskLevel::Low);
    }
}

//! Account security service - registration, logins, KYC, lifecycle
//!
//! Every mutation is a read-modify-write inside one storage transaction:
//! lock the account row, load it with its history, apply the domain
//! transition, then persist the new state, the compliance delta and any
//! wallet side effect together.

use crate::error::{SecurityError, SecurityResult};
use crate::services::ServiceContext;
use chrono::{DateTime, Utc};
use mobiwallet_core::{
    assess_risk, normalize_phone, Account, AccountChange, ComplianceEntry, KycEvidence, KycStatus,
    Money, NewAccount, Reference, RiskAssessment, RiskLevel, Transaction, TransactionDraft, Wallet,
};
use mobiwallet_persistence::{AccountRepo, ComplianceRepo, PersistenceError, WalletRepo};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Result of a credential check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoginOutcome {
    Success,
    Rejected { remaining_attempts: u32 },
    Locked { until: DateTime<Utc> },
}

/// Account creation result
#[derive(Debug, Clone)]
pub struct Registration {
    pub account: Account,
    pub wallet: Wallet,
    /// Opening credit, when one is configured
    pub opening_credit: Option<Transaction>,
}

/// Account Security Service
pub struct AccountSecurityService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AccountSecurityService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Open an account and its wallet
    pub async fn register(&self, new: NewAccount, actor: &str) -> SecurityResult<Registration> {
        let config = self.ctx.config();
        let now = self.ctx.now();
        let currency = config.currency()?;

        let AccountChange {
            account: mut account,
            recorded,
        } = Account::open(&Uuid::new_v4().to_string(), new, actor, now)?;
        account.risk_level = assess_risk(&account, &config.risk, now).level;

        let wallet = Wallet::new(
            &Uuid::new_v4().to_string(),
            &account.id,
            currency.clone(),
            account.entitled_kyc_level(&config.limits),
            now,
        );

        let mut tx = self.ctx.pool().begin().await?;
        AccountRepo::insert(&mut *tx, &account)
            .await
            .map_err(|e| match e {
                PersistenceError::AlreadyExists { .. } => {
                    SecurityError::PhoneAlreadyRegistered(account.phone_number.clone())
                }
                other => other.into(),
            })?;
        ComplianceRepo::append_all(&mut *tx, &account.id, &recorded).await?;
        WalletRepo::insert(&mut *tx, &wallet).await?;
        tx.commit().await?;

        tracing::info!(
            account_id = %account.id,
            wallet_id = %wallet.id,
            risk_level = %account.risk_level,
            "Account registered"
        );

        let opening_credit = if config.opening_balance > Decimal::ZERO {
            let amount = Money::new(config.opening_balance, currency);
            let draft = TransactionDraft::opening_credit(&wallet.id, amount, &Reference::generate(now), now)?;
            Some(self.ctx.ledger().append_opening_credit(&draft).await?)
        } else {
            None
        };

        let wallet = WalletRepo::get_by_id(self.ctx.pool(), &wallet.id).await?;
        Ok(Registration {
            account,
            wallet,
            opening_credit,
        })
    }

    /// Feed the credential store's verdict into the lockout state machine.
    ///
    /// A currently locked account is refused without looking at the verdict.
    pub async fn login(
        &self,
        account_id: &str,
        credentials_valid: bool,
        device: Option<&str>,
    ) -> SecurityResult<LoginOutcome> {
        let policy = &self.ctx.config().security;

        let (account, outcome) = self
            .transition(account_id, |account, now| {
                if let Some(until) = account.locked_until.filter(|until| now < *until) {
                    return Ok((None, LoginOutcome::Locked { until }));
                }
                if credentials_valid {
                    let change = account.record_successful_login(device, now)?;
                    return Ok((Some(change), LoginOutcome::Success));
                }

                let change = account.record_failed_login(policy, now)?;
                let outcome = match change.account.locked_until {
                    Some(until) if now < until => LoginOutcome::Locked { until },
                    _ => LoginOutcome::Rejected {
                        remaining_attempts: policy
                            .max_failed_logins
                            .saturating_sub(change.account.failed_login_attempts),
                    },
                };
                Ok((Some(change), outcome))
            })
            .await?;

        match outcome {
            LoginOutcome::Success => {
                tracing::info!(account_id = %account_id, device = ?device, "Login succeeded")
            }
            LoginOutcome::Rejected { remaining_attempts } => tracing::warn!(
                account_id = %account_id,
                failed_attempts = account.failed_login_attempts,
                remaining_attempts,
                "Login failed"
            ),
            LoginOutcome::Locked { until } => {
                tracing::warn!(account_id = %account_id, locked_until = %until, "Account locked")
            }
        }
        Ok(outcome)
    }

    /// Decide a pending KYC review; approval raises the wallet's KYC level
    pub async fn update_kyc(
        &self,
        account_id: &str,
        status: KycStatus,
        actor: &str,
        evidence: &KycEvidence,
    ) -> SecurityResult<Account> {
        let (account, _) = self
            .transition(account_id, |account, now| {
                Ok((Some(account.update_kyc_status(status, actor, evidence, now)?), ()))
            })
            .await?;
        tracing::info!(account_id = %account_id, kyc_status = %status, actor = %actor, "KYC decided");
        Ok(account)
    }

    pub async fn suspend(&self, account_id: &str, reason: &str, actor: &str) -> SecurityResult<Account> {
        let (account, _) = self
            .transition(account_id, |account, now| {
                Ok((Some(account.suspend(reason, actor, now)?), ()))
            })
            .await?;
        tracing::warn!(account_id = %account_id, actor = %actor, reason = %reason, "Account suspended");
        Ok(account)
    }

    pub async fn reactivate(&self, account_id: &str, actor: &str) -> SecurityResult<Account> {
        let (account, _) = self
            .transition(account_id, |account, now| Ok((Some(account.reactivate(actor, now)?), ())))
            .await?;
        tracing::info!(account_id = %account_id, actor = %actor, "Account reactivated");
        Ok(account)
    }

    /// Terminal; the wallet is deactivated in the same storage transaction
    pub async fn close(&self, account_id: &str, reason: &str, actor: &str) -> SecurityResult<Account> {
        let (account, _) = self
            .transition(account_id, |account, now| {
                Ok((Some(account.close(reason, actor, now)?), ()))
            })
            .await?;
        tracing::warn!(account_id = %account_id, actor = %actor, reason = %reason, "Account closed");
        Ok(account)
    }

    /// Fresh risk assessment; advisory, nothing is written
    pub async fn assess_risk(&self, account_id: &str) -> SecurityResult<RiskAssessment> {
        let account = self.account(account_id).await?;
        let assessment = assess_risk(&account, &self.ctx.config().risk, self.ctx.now());
        if assessment.level == RiskLevel::High {
            tracing::warn!(account_id = %account_id, score = assessment.score, "High risk account");
        }
        Ok(assessment)
    }

    pub async fn account(&self, account_id: &str) -> SecurityResult<Account> {
        AccountRepo::load(self.ctx.pool(), account_id)
            .await
            .map_err(|e| SecurityError::from_lookup(account_id, e))
    }

    /// Account registered under a phone number
    pub async fn find_by_phone(&self, phone: &str) -> SecurityResult<Account> {
        let phone = normalize_phone(phone);
        let id = AccountRepo::find_id_by_phone(self.ctx.pool(), &phone)
            .await?
            .ok_or_else(|| SecurityError::AccountNotFound(phone.clone()))?;
        self.account(&id).await
    }

    pub async fn compliance_history(&self, account_id: &str) -> SecurityResult<Vec<ComplianceEntry>> {
        Ok(self.account(account_id).await?.compliance_history)
    }

    /// Locked read-modify-write of one account.
    ///
    /// `decide` returns the change to persist (or `None` to leave the account
    /// untouched) together with the caller's outcome.
    async fn transition<T, F>(&self, account_id: &str, decide: F) -> SecurityResult<(Account, T)>
    where
        F: FnOnce(&Account, DateTime<Utc>) -> SecurityResult<(Option<AccountChange>, T)>,
    {
        let config = self.ctx.config();
        let now = self.ctx.now();

        let mut tx = self.ctx.pool().begin().await?;
        AccountRepo::lock_for_update(&mut *tx, account_id)
            .await
            .map_err(|e| SecurityError::from_lookup(account_id, e))?;
        let current = AccountRepo::load(&mut *tx, account_id).await?;

        let (change, outcome) = decide(&current, now)?;
        let Some(AccountChange {
            account: mut account,
            recorded,
        }) = change
        else {
            tx.rollback().await?;
            return Ok((current, outcome));
        };

        account.risk_level = assess_risk(&account, &config.risk, now).level;
        AccountRepo::update(&mut *tx, &account).await?;
        ComplianceRepo::append_all(&mut *tx, &account.id, &recorded).await?;

        let wallet = WalletRepo::get_by_owner(&mut *tx, &account.id).await?;
        let entitled = account.entitled_kyc_level(&config.limits);
        if wallet.kyc_level != entitled {
            WalletRepo::set_kyc_level(&mut *tx, &wallet.id, entitled).await?;
        }
        if account.is_closed() && wallet.is_active {
            WalletRepo::deactivate(&mut *tx, &wallet.id).await?;
        }

        tx.commit().await?;
        Ok((account, outcome))
    }
}

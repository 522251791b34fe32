//! Transfer engine - peer-to-peer wallet transfers
//!
//! Validation happens up front against authoritative reads; the ledger
//! store's atomic pair commit is the only place balances change and
//! re-checks funds and cumulative limits under the write lock.
//!
//! Idempotency: a caller-supplied reference that already committed for the
//! sender returns the original receipt instead of moving money again, also
//! when the earlier call commits while this one is still in flight.

use crate::error::{NotOperableReason, TransferError, TransferResult};
use crate::services::ServiceContext;
use chrono::{DateTime, Utc};
use mobiwallet_core::{
    assess_risk, normalize_phone, Account, AccountStatus, CoreError, Money, Recipient, Reference,
    RiskLevel, TransactionDraft, TransactionType, TransferReceipt, Wallet,
};
use mobiwallet_persistence::{
    day_start, month_start, AccountRepo, DebitGuard, PersistenceError, WalletRepo,
};
use rust_decimal::Decimal;

/// Transfer Engine
pub struct TransferEngine<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> TransferEngine<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Move `amount` (in the sender wallet's currency) to `recipient`.
    ///
    /// Runs to a terminal outcome once the commit starts. After a
    /// `TransferFailed` the caller retries with the same reference.
    pub async fn transfer(
        &self,
        sender_wallet_id: &str,
        recipient: &Recipient,
        amount: Decimal,
        description: &str,
        reference: Option<&str>,
    ) -> TransferResult<TransferReceipt> {
        let now = self.ctx.now();

        let reference = reference
            .map(|raw| {
                Reference::parse(raw).map_err(|e| TransferError::InvalidReference {
                    reference: raw.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        if let Some(reference) = &reference {
            if let Some(prior) = self.replay(sender_wallet_id, reference, amount).await? {
                return Ok(prior);
            }
        }

        let caller_reference = reference.clone();
        match self
            .execute(sender_wallet_id, recipient, amount, description, reference, now)
            .await
        {
            // A concurrent call with the same reference may have committed
            // after the replay lookup and spent the funds or the allowance.
            Err(e @ (TransferError::InsufficientFunds { .. } | TransferError::LimitExceeded { .. })) => {
                match caller_reference {
                    Some(reference) => match self.replay(sender_wallet_id, &reference, amount).await {
                        Ok(Some(prior)) => Ok(prior),
                        _ => Err(e),
                    },
                    None => Err(e),
                }
            }
            outcome => outcome,
        }
    }

    async fn execute(
        &self,
        sender_wallet_id: &str,
        recipient: &Recipient,
        amount: Decimal,
        description: &str,
        reference: Option<Reference>,
        now: DateTime<Utc>,
    ) -> TransferResult<TransferReceipt> {
        // 1. Recipient
        let recipient_wallet = self.resolve_recipient(recipient).await?;
        if recipient_wallet.id == sender_wallet_id {
            return Err(TransferError::SelfTransferNotAllowed);
        }

        // 2. Sender
        let sender_wallet = WalletRepo::find_by_id(self.ctx.pool(), sender_wallet_id)
            .await
            .map_err(|e| TransferError::failed(sender_wallet_id, e))?
            .ok_or_else(|| TransferError::WalletNotFound(sender_wallet_id.to_string()))?;
        let account = AccountRepo::load(self.ctx.pool(), &sender_wallet.owner_account_id)
            .await
            .map_err(|e| TransferError::failed(sender_wallet_id, e))?;
        ensure_operable(&account, &sender_wallet, now)?;

        // 3. Amount
        let amount = Money::new(amount, sender_wallet.currency().clone());
        if !amount.is_positive() {
            return Err(TransferError::InvalidAmount(format!(
                "transfer amount must be positive: {}",
                amount.amount
            )));
        }
        amount
            .to_minor_units()
            .map_err(|e| TransferError::InvalidAmount(e.to_string()))?;
        if recipient_wallet.currency().code != amount.currency.code {
            return Err(TransferError::InvalidAmount(format!(
                "{} cannot be credited to a {} wallet",
                amount,
                recipient_wallet.currency().code
            )));
        }

        // 4. Funds and limits
        self.check_limits(&sender_wallet, &amount, now).await?;

        let risk = assess_risk(&account, &self.ctx.config().risk, now);
        if risk.level == RiskLevel::High {
            tracing::warn!(
                account_id = %account.id,
                wallet_id = %sender_wallet.id,
                score = risk.score,
                amount = %amount,
                "Transfer from high risk account"
            );
        }

        // 5. Reference
        let reference = reference.unwrap_or_else(|| Reference::generate(now));

        // 6-7. Atomic commit
        let (debit, credit) = TransactionDraft::transfer_pair(
            &sender_wallet.id,
            &recipient_wallet.id,
            amount,
            description,
            &reference,
            now,
        )?;
        self.commit(&debit, &credit).await
    }

    /// Receipt of an already committed transfer with this reference
    async fn replay(
        &self,
        sender_wallet_id: &str,
        reference: &Reference,
        amount: Decimal,
    ) -> TransferResult<Option<TransferReceipt>> {
        let prior = self
            .ctx
            .ledger()
            .find_transfer(sender_wallet_id, reference)
            .await
            .map_err(|e| TransferError::failed(reference.as_str(), e))?;

        if let Some(receipt) = &prior {
            if receipt.amount.amount != amount {
                tracing::warn!(
                    reference = %reference,
                    wallet_id = %sender_wallet_id,
                    committed = %receipt.amount,
                    requested = %amount,
                    "Reference reused with a different amount; returning the committed transfer"
                );
            } else {
                tracing::info!(reference = %reference, wallet_id = %sender_wallet_id, "Idempotent replay");
            }
        }
        Ok(prior)
    }

    async fn resolve_recipient(&self, recipient: &Recipient) -> TransferResult<Wallet> {
        let found = match recipient {
            Recipient::Phone(phone) => {
                WalletRepo::find_by_phone(self.ctx.pool(), &normalize_phone(phone)).await
            }
            Recipient::WalletId(id) => WalletRepo::find_by_id(self.ctx.pool(), id).await,
        }
        .map_err(|e| TransferError::failed(&recipient.to_string(), e))?;

        match found {
            Some(wallet) if wallet.is_active => Ok(wallet),
            _ => Err(TransferError::RecipientNotFound(recipient.to_string())),
        }
    }

    async fn check_limits(
        &self,
        wallet: &Wallet,
        amount: &Money,
        now: DateTime<Utc>,
    ) -> TransferResult<()> {
        let limits = &self.ctx.config().limits;
        wallet
            .check_debit(amount, limits)
            .map_err(|e| rejected(wallet, e))?;

        let ledger = self.ctx.ledger();
        let spent_today = ledger
            .sum_completed(&wallet.id, TransactionType::Debit, day_start(now))
            .await
            .map_err(|e| TransferError::failed(&wallet.id, e))?;
        let spent_this_month = ledger
            .sum_completed(&wallet.id, TransactionType::Debit, month_start(now))
            .await
            .map_err(|e| TransferError::failed(&wallet.id, e))?;

        wallet
            .check_cumulative(amount, &spent_today, &spent_this_month, limits)
            .map_err(|e| rejected(wallet, e))
    }

    async fn commit(
        &self,
        debit: &TransactionDraft,
        credit: &TransactionDraft,
    ) -> TransferResult<TransferReceipt> {
        let ledger = self.ctx.ledger();
        let reference = &debit.reference;

        match ledger
            .append_pair(debit, credit, DebitGuard::Limits(&self.ctx.config().limits))
            .await
        {
            Ok(committed) => {
                self.ctx.health().record_success();
                tracing::info!(
                    reference = %reference,
                    wallet_id = %debit.wallet_id,
                    recipient_wallet_id = %credit.wallet_id,
                    amount = %debit.amount,
                    "Transfer completed"
                );
                // Rebuilt from stored rows so a replay returns the same receipt
                match ledger.find_transfer(&debit.wallet_id, reference).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => tracing::warn!(
                        reference = %reference,
                        wallet_id = %debit.wallet_id,
                        "Committed transfer not found on read back; using commit rows"
                    ),
                    Err(e) => tracing::warn!(
                        reference = %reference,
                        wallet_id = %debit.wallet_id,
                        error = %e,
                        "Could not read back committed transfer; using commit rows"
                    ),
                }
                committed
                    .receipt()
                    .map_err(|e| TransferError::failed(reference.as_str(), e))
            }
            Err(PersistenceError::DuplicateReference { wallet_id, .. }) => {
                if wallet_id != debit.wallet_id {
                    return Err(TransferError::InvalidReference {
                        reference: reference.to_string(),
                        reason: "already used for another transfer to this recipient".to_string(),
                    });
                }
                // A concurrent call with the same reference won the commit
                ledger
                    .find_transfer(&debit.wallet_id, reference)
                    .await
                    .map_err(|e| TransferError::failed(reference.as_str(), e))?
                    .ok_or_else(|| {
                        TransferError::failed(
                            reference.as_str(),
                            PersistenceError::DuplicateReference {
                                wallet_id,
                                reference: reference.to_string(),
                            },
                        )
                    })
            }
            Err(PersistenceError::InsufficientFunds {
                needed, available, ..
            }) => Err(TransferError::InsufficientFunds {
                needed: Money::new(needed, debit.amount.currency.clone()),
                available: Money::new(available, debit.amount.currency.clone()),
            }),
            Err(PersistenceError::LimitExceeded {
                limit,
                limit_amount,
                attempted,
                ..
            }) => Err(TransferError::LimitExceeded {
                limit,
                limit_amount,
                attempted,
            }),
            Err(PersistenceError::WalletInactive(wallet_id)) => {
                if wallet_id == debit.wallet_id {
                    Err(TransferError::not_operable(
                        &wallet_id,
                        NotOperableReason::WalletInactive,
                    ))
                } else {
                    Err(TransferError::RecipientNotFound(wallet_id))
                }
            }
            Err(PersistenceError::AccountNotOperable {
                account_id,
                status,
                locked_until,
            }) => {
                let reason = match status {
                    AccountStatus::Closed => NotOperableReason::Closed,
                    AccountStatus::Suspended => NotOperableReason::Suspended,
                    AccountStatus::Active => NotOperableReason::Locked {
                        until: locked_until.unwrap_or(debit.created_at),
                    },
                };
                Err(TransferError::not_operable(&account_id, reason))
            }
            Err(PersistenceError::NotFound { id, .. }) => Err(TransferError::WalletNotFound(id)),
            Err(PersistenceError::Core(e)) => Err(TransferError::Rejected(e)),
            Err(e @ PersistenceError::InvalidPair(_)) => Err(TransferError::failed(reference.as_str(), e)),
            Err(cause) => {
                self.ctx.health().record_failure(reference.as_str(), &cause);
                if let Err(audit) = ledger.record_failed_pair(debit, credit).await {
                    tracing::error!(
                        reference = %reference,
                        error = %audit,
                        "Could not record failed transfer rows"
                    );
                }
                Err(TransferError::failed(reference.as_str(), cause))
            }
        }
    }
}

fn ensure_operable(account: &Account, wallet: &Wallet, now: DateTime<Utc>) -> TransferResult<()> {
    let reason = match account.status {
        AccountStatus::Closed => Some(NotOperableReason::Closed),
        AccountStatus::Suspended => Some(NotOperableReason::Suspended),
        AccountStatus::Active => match account.locked_until {
            Some(until) if now < until => Some(NotOperableReason::Locked { until }),
            _ if !wallet.is_active => Some(NotOperableReason::WalletInactive),
            _ => None,
        },
    };

    match reason {
        Some(reason) => Err(TransferError::not_operable(&account.id, reason)),
        None => Ok(()),
    }
}

/// Map a domain rejection onto the transfer taxonomy
fn rejected(wallet: &Wallet, err: CoreError) -> TransferError {
    match err {
        CoreError::InsufficientFunds { needed, available } => TransferError::InsufficientFunds {
            needed: Money::new(needed, wallet.currency().clone()),
            available: Money::new(available, wallet.currency().clone()),
        },
        CoreError::LimitExceeded {
            limit,
            limit_amount,
            attempted,
        } => TransferError::LimitExceeded {
            limit,
            limit_amount,
            attempted,
        },
        CoreError::InvalidAmount(msg) => TransferError::InvalidAmount(msg),
        CoreError::CurrencyMismatch { .. } => TransferError::InvalidAmount(err.to_string()),
        CoreError::WalletInactive(_) => {
            TransferError::not_operable(&wallet.owner_account_id, NotOperableReason::WalletInactive)
        }
        other => TransferError::Rejected(other),
    }
}

//! Mobiwallet CLI - Wallet ledger operations from command line
//!
//! Usage:
//! ```bash
//! mobiwallet init
//! mobiwallet register +250788000001 "Alice Mukamana" --dob 1990-05-17 --source-of-funds salary
//! mobiwallet login ACCOUNT_ID --failed
//! mobiwallet kyc ACCOUNT_ID approve --evidence NID-1198870012345678
//! mobiwallet transfer WALLET_ID 500 --to-phone +250788000002 --description rent
//! mobiwallet history WALLET_ID --limit 20
//! ```

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod db;

use commands::{account, wallet};

/// Mobiwallet - custodial wallet ledger
#[derive(Parser)]
#[command(name = "mobiwallet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file path (overrides the configured database)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and apply migrations
    Init {
        /// Delete an existing database file first
        #[arg(long)]
        force: bool,
    },

    /// Register an account and open its wallet
    Register {
        /// Phone number (recipient identifier)
        phone: String,
        /// Full name
        name: String,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: NaiveDate,
        #[arg(long)]
        email: Option<String>,
        /// Politically exposed person
        #[arg(long)]
        pep: bool,
        #[arg(long)]
        source_of_funds: Option<String>,
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Feed a credential check result into the lockout policy
    Login {
        account_id: String,
        /// The credentials did not match
        #[arg(long)]
        failed: bool,
        #[arg(long)]
        device: Option<String>,
    },

    /// Decide a pending KYC review
    Kyc {
        account_id: String,
        decision: KycDecisionArg,
        /// Required when rejecting
        #[arg(long)]
        reason: Option<String>,
        /// Document or review reference
        #[arg(long)]
        evidence: Option<String>,
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Suspend an active account
    Suspend {
        account_id: String,
        #[arg(long)]
        reason: String,
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Reactivate a suspended account
    Reactivate {
        account_id: String,
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Close an account (terminal)
    Close {
        account_id: String,
        #[arg(long)]
        reason: String,
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Show the current risk assessment of an account
    Risk { account_id: String },

    /// Send money to another wallet
    Transfer {
        /// Sender wallet ID
        wallet_id: String,
        /// Amount in the sender wallet's currency
        amount: Decimal,
        /// Recipient phone number
        #[arg(long, conflicts_with = "to_wallet", required_unless_present = "to_wallet")]
        to_phone: Option<String>,
        /// Recipient wallet ID
        #[arg(long)]
        to_wallet: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        /// Idempotency reference; reuse it when retrying
        #[arg(long)]
        reference: Option<String>,
    },

    /// Show a wallet's balance
    Balance { wallet_id: String },

    /// Show a wallet's transactions, newest first
    History {
        wallet_id: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        /// Include pending and failed rows
        #[arg(long)]
        all: bool,
    },

    /// Show database status and reconcile balances
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KycDecisionArg {
    Approve,
    Reject,
}

impl KycDecisionArg {
    pub fn to_core_status(&self) -> mobiwallet_core::KycStatus {
        match self {
            KycDecisionArg::Approve => mobiwallet_core::KycStatus::Approved,
            KycDecisionArg::Reject => mobiwallet_core::KycStatus::Rejected,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = db::load_config(cli.config.as_deref(), cli.db.as_deref())?;
    tracing::debug!(database_url = %config.storage.database_url, "Configuration loaded");

    if let Commands::Init { force } = cli.command {
        return db::init_database(config, force).await;
    }

    let ctx = db::connect(config).await?;
    let json = cli.json;

    let result = match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Status => db::show_status(&ctx).await,

        Commands::Register {
            phone,
            name,
            dob,
            email,
            pep,
            source_of_funds,
            actor,
        } => {
            let new = mobiwallet_core::NewAccount {
                phone_number: phone,
                full_name: name,
                email,
                date_of_birth: dob,
                is_pep: pep,
                source_of_funds,
            };
            account::register(&ctx, new, &actor, json).await
        }
        Commands::Login {
            account_id,
            failed,
            device,
        } => account::login(&ctx, &account_id, !failed, device.as_deref(), json).await,
        Commands::Kyc {
            account_id,
            decision,
            reason,
            evidence,
            actor,
        } => {
            account::kyc(
                &ctx,
                &account_id,
                decision.to_core_status(),
                reason.as_deref(),
                evidence.as_deref(),
                &actor,
                json,
            )
            .await
        }
        Commands::Suspend {
            account_id,
            reason,
            actor,
        } => account::suspend(&ctx, &account_id, &reason, &actor, json).await,
        Commands::Reactivate { account_id, actor } => {
            account::reactivate(&ctx, &account_id, &actor, json).await
        }
        Commands::Close {
            account_id,
            reason,
            actor,
        } => account::close(&ctx, &account_id, &reason, &actor, json).await,
        Commands::Risk { account_id } => account::risk(&ctx, &account_id, json).await,

        Commands::Transfer {
            wallet_id,
            amount,
            to_phone,
            to_wallet,
            description,
            reference,
        } => {
            let recipient = match (to_phone, to_wallet) {
                (Some(phone), _) => mobiwallet_core::Recipient::Phone(phone),
                (None, Some(id)) => mobiwallet_core::Recipient::WalletId(id),
                (None, None) => anyhow::bail!("either --to-phone or --to-wallet is required"),
            };
            wallet::transfer(
                &ctx,
                &wallet_id,
                &recipient,
                amount,
                &description,
                reference.as_deref(),
                json,
            )
            .await
        }
        Commands::Balance { wallet_id } => wallet::balance(&ctx, &wallet_id, json).await,
        Commands::History {
            wallet_id,
            limit,
            all,
        } => wallet::history(&ctx, &wallet_id, limit, all, json).await,
    };

    ctx.database().close().await;
    result
}

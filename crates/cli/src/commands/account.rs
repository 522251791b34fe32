//! Account commands: registration, logins, KYC and lifecycle

use anyhow::{Context, Result};
use mobiwallet_business::{AccountSecurityService, LoginOutcome, ServiceContext};
use mobiwallet_core::{Account, KycEvidence, KycStatus, NewAccount};

pub async fn register(ctx: &ServiceContext, new: NewAccount, actor: &str, json: bool) -> Result<()> {
    let reg = AccountSecurityService::new(ctx)
        .register(new, actor)
        .await
        .context("Failed to register account")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "account": reg.account,
                "wallet": reg.wallet,
                "opening_credit": reg.opening_credit,
            }))?
        );
        return Ok(());
    }

    println!("✅ Registered account:");
    println!("   Account ID: {}", reg.account.id);
    println!("   Phone:      {}", reg.account.phone_number);
    println!("   Name:       {}", reg.account.full_name);
    println!("   Risk:       {}", reg.account.risk_level);
    println!("   Wallet ID:  {}", reg.wallet.id);
    println!("   KYC level:  {}", reg.wallet.kyc_level);
    println!("   Balance:    {}", reg.wallet.balance);
    Ok(())
}

pub async fn login(
    ctx: &ServiceContext,
    account_id: &str,
    credentials_valid: bool,
    device: Option<&str>,
    json: bool,
) -> Result<()> {
    let outcome = AccountSecurityService::new(ctx)
        .login(account_id, credentials_valid, device)
        .await
        .with_context(|| format!("Login failed for {}", account_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        LoginOutcome::Success => println!("✅ Login accepted"),
        LoginOutcome::Rejected { remaining_attempts } => {
            println!("❌ Login rejected ({} attempts left before lockout)", remaining_attempts)
        }
        LoginOutcome::Locked { until } => {
            println!("🔒 Account locked until {}", until.format("%Y-%m-%d %H:%M:%S UTC"))
        }
    }
    Ok(())
}

pub async fn kyc(
    ctx: &ServiceContext,
    account_id: &str,
    status: KycStatus,
    reason: Option<&str>,
    evidence: Option<&str>,
    actor: &str,
    json: bool,
) -> Result<()> {
    let mut kyc_evidence = KycEvidence::new();
    if let Some(reason) = reason {
        kyc_evidence = kyc_evidence.with_reason(reason);
    }
    if let Some(evidence) = evidence {
        kyc_evidence = kyc_evidence.with_reference(evidence);
    }

    let account = AccountSecurityService::new(ctx)
        .update_kyc(account_id, status, actor, &kyc_evidence)
        .await
        .with_context(|| format!("Failed to update KYC for {}", account_id))?;
    print_account(&account, json)
}

pub async fn suspend(ctx: &ServiceContext, account_id: &str, reason: &str, actor: &str, json: bool) -> Result<()> {
    let account = AccountSecurityService::new(ctx)
        .suspend(account_id, reason, actor)
        .await
        .with_context(|| format!("Failed to suspend {}", account_id))?;
    print_account(&account, json)
}

pub async fn reactivate(ctx: &ServiceContext, account_id: &str, actor: &str, json: bool) -> Result<()> {
    let account = AccountSecurityService::new(ctx)
        .reactivate(account_id, actor)
        .await
        .with_context(|| format!("Failed to reactivate {}", account_id))?;
    print_account(&account, json)
}

pub async fn close(ctx: &ServiceContext, account_id: &str, reason: &str, actor: &str, json: bool) -> Result<()> {
    let account = AccountSecurityService::new(ctx)
        .close(account_id, reason, actor)
        .await
        .with_context(|| format!("Failed to close {}", account_id))?;
    print_account(&account, json)
}

pub async fn risk(ctx: &ServiceContext, account_id: &str, json: bool) -> Result<()> {
    let assessment = AccountSecurityService::new(ctx)
        .assess_risk(account_id)
        .await
        .with_context(|| format!("Failed to assess {}", account_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
        return Ok(());
    }

    println!("📋 Risk assessment for {}", account_id);
    println!("   Level:   {}", assessment.level);
    println!("   Score:   {}", assessment.score);
    for factor in &assessment.factors {
        println!("   - {:?} (+{})", factor, factor.weight());
    }
    Ok(())
}

fn print_account(account: &Account, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(account)?);
        return Ok(());
    }

    println!("✅ {}", account);
    println!("   Status:     {}", account.status);
    println!("   KYC:        {}", account.kyc_status);
    println!("   Risk:       {}", account.risk_level);
    println!("   History:");
    for entry in &account.compliance_history {
        println!("     {}", entry);
    }
    Ok(())
}

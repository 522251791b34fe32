//! Wallet commands: transfer, balance, history

use anyhow::{Context, Result};
use mobiwallet_business::{HistoryFeed, ServiceContext, TransferEngine};
use mobiwallet_core::Recipient;
use mobiwallet_persistence::WalletRepo;
use rust_decimal::Decimal;

pub async fn transfer(
    ctx: &ServiceContext,
    wallet_id: &str,
    recipient: &Recipient,
    amount: Decimal,
    description: &str,
    reference: Option<&str>,
    json: bool,
) -> Result<()> {
    let receipt = TransferEngine::new(ctx)
        .transfer(wallet_id, recipient, amount, description, reference)
        .await
        .with_context(|| format!("Transfer from {} to {} failed", wallet_id, recipient))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
        return Ok(());
    }

    println!("✅ Transfer {}", receipt.status);
    println!("   Reference:  {}", receipt.reference);
    println!("   Amount:     {}", receipt.amount);
    println!("   From:       {}", receipt.sender_wallet_id);
    println!("   To:         {}", receipt.recipient_wallet_id);
    if !receipt.description.is_empty() {
        println!("   For:        {}", receipt.description);
    }
    Ok(())
}

pub async fn balance(ctx: &ServiceContext, wallet_id: &str, json: bool) -> Result<()> {
    let wallet = WalletRepo::get_by_id(ctx.pool(), wallet_id)
        .await
        .with_context(|| format!("Wallet {} not found", wallet_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&wallet)?);
        return Ok(());
    }

    println!("💰 {}", wallet);
    println!("   Balance:    {}", wallet.balance);
    println!("   KYC level:  {}", wallet.kyc_level);
    println!("   Active:     {}", wallet.is_active);
    Ok(())
}

/// Completed rows by default; `all` includes pending and failed rows
pub async fn history(ctx: &ServiceContext, wallet_id: &str, limit: i64, all: bool, json: bool) -> Result<()> {
    let rows = if all {
        ctx.ledger().history(wallet_id, limit).await
    } else {
        HistoryFeed::new(ctx).recent(wallet_id, limit).await
    }
    .with_context(|| format!("Failed to read history of {}", wallet_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No transactions for {}", wallet_id);
        return Ok(());
    }
    println!("📜 Transactions for {} (newest first)", wallet_id);
    for row in &rows {
        println!("   {}", row);
    }
    Ok(())
}

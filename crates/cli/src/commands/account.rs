//! Account management commands

use anyhow::Result;
use cardbank_core::Profile;
use cardbank_engine::{
    AccountService, IdentityVerifier, LedgerError, OpenAccountRequest, TransactionEngine,
};
use rust_decimal::Decimal;
use serde_json::json;

use crate::app::App;

pub async fn open(
    app: &App,
    card_number: &str,
    profile: Profile,
    password: &str,
    deposit: Decimal,
) -> Result<()> {
    let request = OpenAccountRequest {
        profile,
        card_number: card_number.to_string(),
        password: password.to_string(),
        initial_deposit: deposit,
    };
    let opened = TransactionEngine::new(app.ctx())
        .open_account(&request)
        .await?;

    app.emit(&opened, |o| {
        println!("✅ Opened card {}", o.card_number);
        println!("   User ID:    {}", o.user_id);
        println!("   Card ID:    {}", o.card_id);
        println!("   Balance:    {}", o.balance);
    })
}

pub async fn login(app: &App, card_number: &str, password: &str) -> Result<()> {
    let ok = IdentityVerifier::new(app.ctx())
        .verify_login(card_number, password)
        .await?;
    if !ok {
        return Err(LedgerError::Unauthorized.into());
    }
    app.print_line(&format!("Login ok for {}", card_number));
    Ok(())
}

pub async fn balance(app: &App, card_number: &str) -> Result<()> {
    let balance = AccountService::new(app.ctx()).balance(card_number).await?;

    app.emit(&json!({ "card_number": card_number, "balance": balance }), |_| {
        println!("💰 {}: {}", card_number, balance);
    })
}

pub async fn history(app: &App, card_number: &str, limit: Option<u32>) -> Result<()> {
    let entries = AccountService::new(app.ctx())
        .history(card_number, limit)
        .await?;

    app.emit(&entries, |entries| {
        if entries.is_empty() {
            println!("No transactions for '{}'.", card_number);
            return;
        }
        println!(
            "{:<6} {:<20} {:<10} {:>12} {:>12}  {}",
            "ID", "TIME", "TYPE", "AMOUNT", "BALANCE", "DESCRIPTION"
        );
        println!("{}", "-".repeat(90));
        for e in entries {
            println!(
                "{:<6} {:<20} {:<10} {:>12} {:>12}  {}",
                e.id,
                e.created_at.format("%Y-%m-%d %H:%M:%S"),
                e.tx_type,
                e.amount,
                e.balance_after,
                e.description
            );
        }
    })
}

pub async fn audit(app: &App, card_number: &str) -> Result<()> {
    let audit = AccountService::new(app.ctx()).audit(card_number).await?;

    app.emit(&audit, |a| {
        println!("🔍 Ledger audit for {}", a.card_number);
        println!("   Entries:   {}", a.entries);
        println!("   Stored:    {}", a.stored);
        match a.replayed {
            Some(replayed) => println!("   Replayed:  {}", replayed),
            None => println!("   Replayed:  -"),
        }
        if a.consistent {
            println!("   ✅ consistent");
        } else {
            println!("   ❌ {}", a.issue.as_deref().unwrap_or("inconsistent"));
        }
    })
}

pub async fn profile(app: &App, card_number: &str) -> Result<()> {
    let profile = AccountService::new(app.ctx()).profile(card_number).await?;

    app.emit(&profile, |p| {
        println!("📋 Card {}", p.card_number);
        println!("   Name:     {}", p.profile.name);
        println!("   ID card:  {}", p.profile.id_card);
        println!("   Phone:    {}", p.profile.phone);
        println!("   Address:  {}", p.profile.address);
        println!("   Balance:  {}", p.balance);
        println!("   Status:   {}", p.status);
        println!("   Opened:   {}", p.created_at.format("%Y-%m-%d"));
    })
}

pub async fn update_profile(app: &App, card_number: &str, profile: Profile) -> Result<()> {
    IdentityVerifier::new(app.ctx())
        .update_profile(card_number, &profile)
        .await?;
    app.print_line(&format!("Profile updated for {}", card_number));
    Ok(())
}

pub async fn reset_password(
    app: &App,
    card_number: &str,
    name: &str,
    phone: &str,
    new_password: &str,
) -> Result<()> {
    IdentityVerifier::new(app.ctx())
        .reset_password(card_number, name, phone, new_password)
        .await?;
    app.print_line(&format!("Password reset for {}", card_number));
    Ok(())
}

pub async fn close(app: &App, card_number: &str, name: &str, phone: &str, check: bool) -> Result<()> {
    let identity = IdentityVerifier::new(app.ctx());
    let remaining = if check {
        identity.closure_check(card_number, name, phone).await?
    } else {
        identity.close_account(card_number, name, phone).await?
    };

    let closed = !check;
    app.emit(
        &json!({ "card_number": card_number, "closed": closed, "balance": remaining }),
        |_| {
            if closed {
                println!("✅ Card {} closed; {} left to pay out", card_number, remaining);
            } else {
                println!("Card {} can be closed; balance {}", card_number, remaining);
            }
        },
    )
}

pub async fn check_card(app: &App, card_number: &str) -> Result<()> {
    let taken = AccountService::new(app.ctx()).exists(card_number).await?;

    app.emit(&json!({ "card_number": card_number, "exists": taken }), |_| {
        if taken {
            println!("Card {} is taken", card_number);
        } else {
            println!("Card {} is available", card_number);
        }
    })
}

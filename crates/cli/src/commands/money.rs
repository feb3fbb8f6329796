//! Deposit, withdraw and transfer commands

use anyhow::Result;
use cardbank_engine::{TransactionEngine, TransferRequest};
use rust_decimal::Decimal;

use crate::app::App;

pub async fn deposit(app: &App, card_number: &str, amount: Decimal) -> Result<()> {
    let receipt = TransactionEngine::new(app.ctx())
        .deposit(card_number, amount)
        .await?;

    app.emit(&receipt, |r| {
        println!("✅ Deposit successful!");
        println!("   Card:        {}", r.card_number);
        println!("   Amount:      {}", r.amount);
        println!("   Balance:     {}", r.balance);
        println!("   Entry:       #{}", r.entry_id);
    })
}

pub async fn withdraw(app: &App, card_number: &str, amount: Decimal) -> Result<()> {
    let receipt = TransactionEngine::new(app.ctx())
        .withdraw(card_number, amount)
        .await?;

    app.emit(&receipt, |r| {
        println!("✅ Withdrawal successful!");
        println!("   Card:        {}", r.card_number);
        println!("   Amount:      {}", r.amount);
        println!("   Balance:     {}", r.balance);
        println!("   Entry:       #{}", r.entry_id);
    })
}

pub async fn transfer(
    app: &App,
    source: String,
    destination: String,
    amount: Decimal,
    note: String,
    anonymous: bool,
) -> Result<()> {
    let request = TransferRequest {
        source,
        destination,
        amount,
        note,
        anonymous,
    };
    let receipt = TransactionEngine::new(app.ctx()).transfer(&request).await?;

    app.emit(&receipt, |r| {
        println!("✅ Transfer successful!");
        println!("   From:        {} (balance {})", r.source_card, r.source_balance);
        println!("   To:          {} (balance {})", r.destination_card, r.destination_balance);
        println!("   Amount:      {}", r.amount);
        println!("   Entries:     #{} / #{}", r.debit_entry_id, r.credit_entry_id);
        println!("   Message:     #{}", r.message_id);
    })
}

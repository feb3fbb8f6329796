//! Inbox commands

use anyhow::Result;
use cardbank_engine::MessagingService;
use serde_json::json;

use crate::app::App;

pub async fn list(app: &App, card_number: &str) -> Result<()> {
    let messages = MessagingService::new(app.ctx());
    let inbox = messages.inbox(card_number).await?;
    let unread = messages.unread_count(card_number).await?;

    app.emit(&inbox, |inbox| {
        if inbox.is_empty() {
            println!("No messages for '{}'.", card_number);
            return;
        }
        println!("📬 Inbox for {} ({} unread)", card_number, unread);
        println!(
            "{:<6} {:<4} {:<16} {:<8} {:>12}  {}",
            "ID", "NEW", "FROM", "TYPE", "AMOUNT", "CONTENT"
        );
        println!("{}", "-".repeat(80));
        for m in inbox {
            println!(
                "{:<6} {:<4} {:<16} {:<8} {:>12}  {}",
                m.id,
                if m.is_read { "" } else { "*" },
                m.sender_name,
                m.message_type,
                m.amount,
                m.content
            );
        }
    })
}

pub async fn read(app: &App, message_id: i64) -> Result<()> {
    let messages = MessagingService::new(app.ctx());
    messages.mark_read(message_id).await?;
    let message = messages.get(message_id).await?;

    app.emit(&message, |m| {
        println!("✉️  Message #{}", m.id);
        println!("   From:    {}", m.sender_name);
        println!("   Type:    {}", m.message_type);
        if !m.amount.is_zero() {
            println!("   Amount:  {}", m.amount);
        }
        println!("   Sent:    {}", m.created_at.format("%Y-%m-%d %H:%M:%S"));
        println!("   {}", m.content);
    })
}

pub async fn notify(app: &App, card_number: &str, title: &str, content: &str) -> Result<()> {
    let id = MessagingService::new(app.ctx())
        .send_system_message(card_number, title, content)
        .await?;

    app.emit(&json!({ "message_id": id, "recipient": card_number }), |_| {
        println!("✅ Notice #{} sent to {}", id, card_number);
    })
}

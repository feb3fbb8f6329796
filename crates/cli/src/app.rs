//! Process-wide handles: database, service context, output mode

use crate::settings::Settings;
use anyhow::{Context, Result};
use cardbank_engine::{LedgerError, ServiceContext};
use cardbank_persistence::Database;
use serde::Serialize;
use std::path::Path;

pub struct App {
    ctx: ServiceContext,
    json: bool,
}

impl App {
    /// Open the database (creating it and applying migrations if needed)
    pub async fn open(settings: &Settings, json: bool) -> Result<Self> {
        if let Some(parent) = sqlite_parent(&settings.database.url) {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        let db = Database::init(&settings.database)
            .await
            .context("Failed to open database")?;
        let ctx = ServiceContext::new(&db, &settings.security)?;
        Ok(Self { ctx, json })
    }

    pub fn ctx(&self) -> &ServiceContext {
        &self.ctx
    }

    pub async fn close(&self) {
        self.ctx.close().await;
    }

    /// Print `value` as JSON, or run `human` for plain output
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }

    pub fn print_line(&self, text: &str) {
        if self.json {
            println!("{}", serde_json::json!({ "message": text }));
        } else {
            println!("{}", text);
        }
    }
}

/// Directory holding a `sqlite:` file URL, if any
fn sqlite_parent(url: &str) -> Option<&Path> {
    let path = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next()?;
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Path::new(path).parent().filter(|p| !p.as_os_str().is_empty())
}

/// Print a failure with its stable code; store details stay in the log
pub fn report(err: &anyhow::Error) {
    match err.downcast_ref::<LedgerError>() {
        Some(ledger) => {
            let kind = ledger.kind();
            tracing::debug!(error = ?ledger, "command failed");
            eprintln!("Error [{} {}]: {}", kind.status(), kind.code(), ledger);
        }
        None => eprintln!("Error: {:#}", err),
    }
}

//! Cardbank CLI - card operations from the command line
//!
//! Usage:
//! ```bash
//! cardbank init
//! cardbank open CARD001 --name Alice --id-card ID1 --phone 555-0100 --password pw1 --deposit 100
//! cardbank deposit CARD001 50
//! cardbank transfer CARD001 CARD002 50 --note lunch
//! cardbank history CARD001 --limit 10
//! cardbank --json inbox CARD002
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod app;
mod commands;
mod settings;

use app::App;
use commands::{account, inbox, money};
use settings::Settings;

/// Cardbank - card accounts, ledger and inbox on SQLite
#[derive(Parser)]
#[command(name = "cardbank")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file
    #[arg(long, default_value = "cardbank.toml", global = true)]
    pub config: PathBuf,

    /// Database file path (overrides `database.url`)
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
    Init,

    /// Open a new card with an initial deposit
    Open {
        card_number: String,
        #[command(flatten)]
        owner: OwnerArgs,
        #[arg(long)]
        password: String,
        /// Initial deposit
        #[arg(long, default_value = "0")]
        deposit: Decimal,
    },

    /// Check a card password
    Login { card_number: String, password: String },

    /// Show the balance of a card
    Balance { card_number: String },

    /// Deposit money to a card
    Deposit { card_number: String, amount: Decimal },

    /// Withdraw money from a card
    Withdraw { card_number: String, amount: Decimal },

    /// Transfer money between two cards
    Transfer {
        source: String,
        destination: String,
        amount: Decimal,
        /// Note delivered to the recipient
        #[arg(long, default_value = "")]
        note: String,
        /// Hide the sender's name from the recipient
        #[arg(long)]
        anonymous: bool,
    },

    /// Recent transactions, newest first
    History {
        card_number: String,
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Replay the ledger of a card and compare with its balance
    Audit { card_number: String },

    /// List the inbox of a card
    Inbox { card_number: String },

    /// Mark a message as read
    Read { message_id: i64 },

    /// Send a system notice to a card
    Notify {
        card_number: String,
        content: String,
        #[arg(long, default_value = "")]
        title: String,
    },

    /// Show the owner profile of a card
    Profile { card_number: String },

    /// Replace the owner profile of a card
    UpdateProfile {
        card_number: String,
        #[command(flatten)]
        owner: OwnerArgs,
    },

    /// Reset a password after checking name and phone
    ResetPassword {
        card_number: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        new_password: String,
    },

    /// Close a card after checking name and phone
    Close {
        card_number: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        /// Only check eligibility and show the remaining balance
        #[arg(long)]
        check: bool,
    },

    /// Check whether a card number is taken
    CheckCard { card_number: String },
}

/// Owner identity fields
#[derive(clap::Args)]
pub struct OwnerArgs {
    #[arg(long)]
    pub name: String,
    /// National ID number
    #[arg(long)]
    pub id_card: String,
    #[arg(long)]
    pub phone: String,
    #[arg(long, default_value = "")]
    pub address: String,
}

impl OwnerArgs {
    pub fn to_profile(&self) -> cardbank_core::Profile {
        cardbank_core::Profile::new(&self.name, &self.id_card, &self.phone, &self.address)
    }
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.config)?;
    if let Some(db) = &cli.db {
        settings.database.url = cardbank_persistence::StoreConfig::for_path(db).url;
    }
    init_logging(&settings.log.filter);

    let app = App::open(&settings, cli.json).await?;
    let result = run(&app, cli.command).await;
    app.close().await;

    if let Err(err) = result {
        app::report(&err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            app.print_line("Database ready");
        }

        Commands::Open {
            card_number,
            owner,
            password,
            deposit,
        } => {
            account::open(app, &card_number, owner.to_profile(), &password, deposit).await?;
        }

        Commands::Login {
            card_number,
            password,
        } => {
            account::login(app, &card_number, &password).await?;
        }

        Commands::Balance { card_number } => {
            account::balance(app, &card_number).await?;
        }

        Commands::Deposit {
            card_number,
            amount,
        } => {
            money::deposit(app, &card_number, amount).await?;
        }

        Commands::Withdraw {
            card_number,
            amount,
        } => {
            money::withdraw(app, &card_number, amount).await?;
        }

        Commands::Transfer {
            source,
            destination,
            amount,
            note,
            anonymous,
        } => {
            money::transfer(app, source, destination, amount, note, anonymous).await?;
        }

        Commands::History { card_number, limit } => {
            account::history(app, &card_number, limit).await?;
        }

        Commands::Audit { card_number } => {
            account::audit(app, &card_number).await?;
        }

        Commands::Inbox { card_number } => {
            inbox::list(app, &card_number).await?;
        }

        Commands::Read { message_id } => {
            inbox::read(app, message_id).await?;
        }

        Commands::Notify {
            card_number,
            content,
            title,
        } => {
            inbox::notify(app, &card_number, &title, &content).await?;
        }

        Commands::Profile { card_number } => {
            account::profile(app, &card_number).await?;
        }

        Commands::UpdateProfile { card_number, owner } => {
            account::update_profile(app, &card_number, owner.to_profile()).await?;
        }

        Commands::ResetPassword {
            card_number,
            name,
            phone,
            new_password,
        } => {
            account::reset_password(app, &card_number, &name, &phone, &new_password).await?;
        }

        Commands::Close {
            card_number,
            name,
            phone,
            check,
        } => {
            account::close(app, &card_number, &name, &phone, check).await?;
        }

        Commands::CheckCard { card_number } => {
            account::check_card(app, &card_number).await?;
        }
    }

    Ok(())
}

//! Subcommand handlers

pub mod account;
pub mod inbox;
pub mod money;

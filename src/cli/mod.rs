//! CLI module - Command-line interface for SchoolDesk
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// SchoolDesk - admissions intake service
/// Two-factor login and application review for school leaders
#[derive(Parser)]
#[command(name = "schooldesk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API and background jobs (default)
    #[command(alias = "daemon")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Create an account directly, including admin accounts
    CreateAccount {
        /// Login email
        #[arg(long)]
        email: String,
        /// Initial password
        #[arg(long)]
        password: String,
        /// One of: student, leader, admin
        #[arg(long, default_value = "admin")]
        role: String,
    },

    /// Create a school owned by an existing leader account
    CreateSchool {
        /// Display name
        #[arg(long)]
        name: String,
        /// Email of the owning leader
        #[arg(long)]
        leader_email: String,
    },
}

pub use commands::*;

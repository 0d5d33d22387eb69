//! Create account command handler

use anyhow::bail;
use chrono::Utc;

use crate::api::validation::is_valid_email;
use crate::config::Config;
use crate::db::{InsertOutcome, Store};
use crate::domain::{Role, normalize_email};

pub async fn cmd_create_account(
    config: &Config,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<()> {
    let role: Role = role.parse().map_err(anyhow::Error::msg)?;
    let email = normalize_email(email);

    if !is_valid_email(&email) {
        bail!("Invalid email: {email}");
    }
    if password.chars().count() < config.security.min_password_length {
        bail!(
            "Password must be at least {} characters",
            config.security.min_password_length
        );
    }

    let store = Store::from_config(config).await?;

    match store
        .create_account(&email, password, role, &config.security, Utc::now())
        .await?
    {
        InsertOutcome::Inserted(account) => {
            println!(
                "✓ Created {} account: {} (ID: {})",
                account.role, account.email, account.id
            );
        }
        InsertOutcome::Duplicate => {
            println!("An account for {email} already exists.");
        }
    }

    Ok(())
}

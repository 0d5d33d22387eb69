//! Create school command handler

use anyhow::bail;

use crate::config::Config;
use crate::db::Store;
use crate::domain::{Role, normalize_email};

pub async fn cmd_create_school(
    config: &Config,
    name: &str,
    leader_email: &str,
) -> anyhow::Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("School name cannot be empty");
    }

    let store = Store::from_config(config).await?;

    let leader_email = normalize_email(leader_email);
    let Some(leader) = store.get_account_by_email(&leader_email).await? else {
        bail!("No account found for {leader_email}");
    };
    if leader.role != Role::Leader {
        bail!("{leader_email} is a {} account, not a leader", leader.role);
    }

    let school = store.create_school(name, leader.id).await?;

    println!("✓ Created school: {} (ID: {})", school.name, school.id);
    println!("  Leader: {}", leader.email);

    Ok(())
}

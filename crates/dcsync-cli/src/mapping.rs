//! Read-only lookups against the identity map and the profile store.

use clap::Subcommand;

use dcsync_core::{EntityType, ProfileRecord, RemoteModel};

/// Sub-commands available under `mapping`.
#[derive(Debug, Subcommand)]
pub enum MappingCommands {
    /// Show the remote record a local entity is linked to
    Lookup {
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
    },
    /// Show the local entity linked to a remote record
    Reverse { remote_model: RemoteModel, remote_id: i64 },
}

/// Sub-commands available under `profiles`.
#[derive(Debug, Subcommand)]
pub enum ProfilesCommands {
    /// List active profiles equivalent to the given one
    Find { profile_id: i64 },
}

pub(crate) async fn run_mapping(
    pool: &sqlx::PgPool,
    command: MappingCommands,
) -> anyhow::Result<()> {
    match command {
        MappingCommands::Lookup {
            entity_type,
            entity_id,
            remote_model,
        } => {
            let Some(row) =
                dcsync_db::get_mapping(pool, entity_type, entity_id, remote_model).await?
            else {
                println!("{entity_type} {entity_id} has no {remote_model} mapping");
                return Ok(());
            };
            let remote = row
                .remote_id
                .map_or_else(|| "\u{2014}".to_string(), |id| id.to_string());
            println!(
                "{entity_type} {entity_id} -> {remote_model} {remote} ({})",
                row.sync_status
            );
            if let Some(error) = row.last_error {
                println!("last error: {error}");
            }
        }
        MappingCommands::Reverse {
            remote_model,
            remote_id,
        } => match dcsync_db::lookup_local_id(pool, remote_model, remote_id).await? {
            Some(entity_id) => println!("{remote_model} {remote_id} -> {entity_id}"),
            None => println!("{remote_model} {remote_id} is not linked to a local entity"),
        },
    }
    Ok(())
}

pub(crate) async fn run_profiles(
    pool: &sqlx::PgPool,
    command: ProfilesCommands,
) -> anyhow::Result<()> {
    let ProfilesCommands::Find { profile_id } = command;
    let profile = dcsync_db::get_profile(pool, profile_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("profile {profile_id} not found"))?;

    let equivalents = dcsync_db::find_equivalent_profiles(pool, &profile, true).await?;
    if equivalents.is_empty() {
        println!("profile {profile_id} has no equivalent profiles");
        return Ok(());
    }
    println!("{:<10}{:<10}{:<8}NAME", "PROFILE", "OWNER", "ACTIVE");
    for other in &equivalents {
        println!("{}", profile_line(other));
    }
    Ok(())
}

fn profile_line(profile: &ProfileRecord) -> String {
    let id = profile
        .id
        .map_or_else(|| "\u{2014}".to_string(), |id| id.to_string());
    let name = format!(
        "{} {}",
        profile.address.given_name, profile.address.family_name
    );
    format!(
        "{:<10}{:<10}{:<8}{}",
        id,
        profile.owner.uid(),
        if profile.is_active { "yes" } else { "no" },
        name.trim()
    )
}

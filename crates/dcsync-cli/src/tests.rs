use dcsync_core::{EntityType, RemoteModel, SyncJobKind};

use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["dcsync-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["dcsync-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["dcsync-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn sync_run_defaults_to_one_invocation_with_configured_batch_size() {
    let cli = Cli::try_parse_from(["dcsync-cli", "sync", "run", "order_export"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            command: SyncCommands::Run {
                job: SyncJobKind::OrderExport,
                batch_size: None,
                max_invocations: 1,
                reset: false,
            }
        })
    ));
}

#[test]
fn sync_run_accepts_batch_size_invocations_and_reset() {
    let cli = Cli::try_parse_from([
        "dcsync-cli",
        "sync",
        "run",
        "partner_import",
        "--batch-size",
        "25",
        "--max-invocations",
        "40",
        "--reset",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            command: SyncCommands::Run {
                job: SyncJobKind::PartnerImport,
                batch_size: Some(25),
                max_invocations: 40,
                reset: true,
            }
        })
    ));
}

#[test]
fn sync_run_rejects_unknown_jobs() {
    let result = Cli::try_parse_from(["dcsync-cli", "sync", "run", "product_export"]);
    assert!(result.is_err());
}

#[test]
fn sync_status_has_a_default_limit() {
    let cli = Cli::try_parse_from(["dcsync-cli", "sync", "status", "profile_dedupe"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            command: SyncCommands::Status {
                job: SyncJobKind::ProfileDedupe,
                limit: 10,
            }
        })
    ));
}

#[test]
fn mapping_lookup_parses_entity_type_and_model() {
    let cli = Cli::try_parse_from([
        "dcsync-cli",
        "mapping",
        "lookup",
        "commerce_order",
        "42",
        "sale.order",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Mapping {
            command: MappingCommands::Lookup {
                entity_type: EntityType::CommerceOrder,
                entity_id: 42,
                remote_model: RemoteModel::SaleOrder,
            }
        })
    ));
}

#[test]
fn mapping_reverse_parses_model_and_remote_id() {
    let cli =
        Cli::try_parse_from(["dcsync-cli", "mapping", "reverse", "res.partner", "31"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Mapping {
            command: MappingCommands::Reverse {
                remote_model: RemoteModel::ResPartner,
                remote_id: 31,
            }
        })
    ));
}

#[test]
fn mapping_lookup_rejects_unknown_models() {
    let result = Cli::try_parse_from([
        "dcsync-cli",
        "mapping",
        "lookup",
        "profile",
        "7",
        "stock.picking",
    ]);
    assert!(result.is_err());
}

#[test]
fn profiles_find_takes_a_profile_id() {
    let cli = Cli::try_parse_from(["dcsync-cli", "profiles", "find", "7"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Profiles {
            command: ProfilesCommands::Find { profile_id: 7 }
        })
    ));
}

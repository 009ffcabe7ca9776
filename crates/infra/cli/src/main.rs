//! `acl-inspect`: query the permissions described by a TOML fixture.

mod fixture;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tree_acl_adapter_memory::MemoryAdapter;
use tree_acl_core::{ROLES_MODEL, RoleReference, TreeNode};
use tree_acl_permissions::FormatOptions;

use crate::fixture::Fixture;

#[derive(Parser)]
#[command(name = "acl-inspect", about = "Inspect the permissions of a Tree ACL fixture")]
struct Cli {
    /// Fixture file with settings, trees, records and memberships.
    #[arg(long, short, default_value = "acl.toml")]
    fixture: PathBuf,

    /// Log filter; overrides RUST_LOG and the fixture's `log_level`.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Paths fully granted to a role.
    Role { role_id: i64 },

    /// Paths fully granted to a user.
    User { user_id: i64 },

    /// Check full access of one subject to one path.
    Check {
        foreign_key: i64,
        path: String,

        /// Owner model of the subject.
        #[arg(long, default_value = ROLES_MODEL)]
        model: String,
    },

    /// Print the permission matrix.
    Matrix {
        /// Owner model of the listed subjects.
        #[arg(long, default_value = ROLES_MODEL)]
        model: String,

        /// Only list resource metadata.
        #[arg(long)]
        no_perms: bool,

        /// Check the superadmin like any other subject.
        #[arg(long)]
        no_superadmin: bool,

        /// Restrict the matrix to these ACO ids.
        #[arg(long = "aco")]
        acos: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let fixture = Fixture::load(&cli.fixture)?;
    init_tracing(cli.log_level.as_deref(), &fixture.settings.log_level);

    let adapter = Arc::new(MemoryAdapter::new());
    fixture.seed(&adapter).await.context("failed to seed fixture")?;

    let acl = fixture.permissions(adapter)?;

    let output = match cli.command {
        Command::Role { role_id } => {
            serde_json::to_value(acl.allowed_actions_by_role_id(role_id).await?)?
        }
        Command::User { user_id } => {
            serde_json::to_value(acl.allowed_actions_by_user_id(user_id).await?)?
        }
        Command::Check {
            foreign_key,
            path,
            model,
        } => {
            let subject = RoleReference::new(model, foreign_key);
            let allowed = acl.check(&subject, &path).await?;
            json!({ "subject": subject.to_string(), "path": path, "allowed": allowed })
        }
        Command::Matrix {
            model,
            no_perms,
            no_superadmin,
            acos,
        } => {
            let nodes = select_acos(&fixture.acos, &acos)?;
            let aros = fixture.subjects(&model);

            let mut options = FormatOptions::new().model(model).include_perms(!no_perms);
            if no_superadmin {
                options = options.superadmin_key(None);
            }
            serde_json::to_value(acl.format(&nodes, &aros, &options).await?)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_tracing(cli_level: Option<&str>, fixture_level: &str) {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fixture_level)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn select_acos(all: &[TreeNode], ids: &[i64]) -> anyhow::Result<Vec<TreeNode>> {
    if ids.is_empty() {
        return Ok(all.to_vec());
    }

    ids.iter()
        .map(|id| match all.iter().find(|n| n.id == *id) {
            Some(node) => Ok(node.clone()),
            None => bail!("ACO {id} is not part of the fixture"),
        })
        .collect()
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use crate::config::{self, AppConfig};
use crate::migrate::enumerate::enumerate;
use crate::migrate::{Migration, MigrationReport};
use crate::model::work_item::fields;
use crate::providers::{self, WorkItemTracker};

#[derive(Parser, Debug)]
#[command(name = "ado-transfer")]
#[command(
    about = "Copy work items, pasted images, comments and parent links across Azure DevOps projects"
)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML config [default: ~/.ado-transfer/config.toml]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info", global = true)]
    pub verbosity: String,

    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Copy every matching item, then re-create parent links
    Run {
        /// Only list the items that would be copied
        #[arg(long)]
        dry_run: bool,

        /// Stop after creating items; run `link` later
        #[arg(long)]
        skip_links: bool,
    },

    /// List the source items that match the configured type
    List,

    /// Re-create parent links for items copied by an earlier run
    Link,
}

pub fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Run the selected command. Returns false when some items failed.
pub async fn execute(cli: Cli) -> Result<bool> {
    let config = config::load_config(cli.config.as_deref())?;
    let source = providers::create_tracker(&config.source);
    let dest = providers::create_tracker(&config.destination);

    match cli.command {
        Commands::List => {
            handle_list(&config, source.as_ref()).await?;
            Ok(true)
        }
        Commands::Run {
            dry_run: true, ..
        } => {
            handle_list(&config, source.as_ref()).await?;
            info!("Dry run: nothing was written to {}", dest.name());
            Ok(true)
        }
        Commands::Run { skip_links, .. } => {
            let ids = enumerate(source.as_ref(), &config.migration.work_item_type).await?;
            let report = Migration::new(source.as_ref(), dest.as_ref(), &config.migration)
                .run(&ids, !skip_links)
                .await
                .context("Transfer aborted")?;
            print_report(&report);
            Ok(report.is_clean())
        }
        Commands::Link => {
            let ids = enumerate(source.as_ref(), &config.migration.work_item_type).await?;
            let report = Migration::new(source.as_ref(), dest.as_ref(), &config.migration)
                .link_only(&ids)
                .await
                .context("Linking aborted")?;
            print_report(&report);
            Ok(report.is_clean())
        }
    }
}

async fn handle_list(config: &AppConfig, source: &dyn WorkItemTracker) -> Result<()> {
    let ids = enumerate(source, &config.migration.work_item_type).await?;
    for id in ids {
        let item = source.get_work_item(id, false).await?;
        println!("{id}  {}", item.field_str(fields::TITLE).unwrap_or_default());
    }
    Ok(())
}

fn print_report(report: &MigrationReport) {
    println!("\nTransfer summary:");
    println!("  Items created:      {}", report.created);
    println!("  Attachments copied: {}", report.attachments);
    println!("  Comments copied:    {}", report.comments);
    println!(
        "  Items linked:       {} ({} relations)",
        report.linked, report.relations
    );
    if report.failures.is_empty() {
        println!("  Failures:           none");
    } else {
        println!("  Failures:           {}", report.failures.len());
        for failure in &report.failures {
            println!(
                "    {} ({}): {}",
                failure.source_id, failure.phase, failure.error
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::try_parse_from(["ado-transfer", "run"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Run {
                dry_run: false,
                skip_links: false
            }
        );
        assert_eq!(cli.config, None);
        assert_eq!(cli.verbosity, "info");
        assert_eq!(cli.log_format, "text");
    }

    #[test]
    fn parse_run_flags() {
        let cli =
            Cli::try_parse_from(["ado-transfer", "run", "--dry-run", "--skip-links"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Run {
                dry_run: true,
                skip_links: true
            }
        );
    }

    #[test]
    fn parse_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ado-transfer",
            "link",
            "--config",
            "/tmp/transfer.toml",
            "--verbosity",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.command, Commands::Link);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/transfer.toml")));
        assert_eq!(cli.verbosity, "debug");
    }

    #[test]
    fn parse_requires_subcommand() {
        assert!(Cli::try_parse_from(["ado-transfer"]).is_err());
    }

    #[test]
    fn parse_rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["ado-transfer", "sync"]).is_err());
    }
}

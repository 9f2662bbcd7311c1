//! Rules command - inspect the effective rules per customer.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use drawx_core::{CustomerProfile, RuleResolver};

use super::load_config;

/// Arguments for the rules command.
#[derive(Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    command: RulesCommand,

    /// Rules directory (default from config)
    #[arg(long, global = true)]
    rules: Option<PathBuf>,
}

#[derive(Subcommand)]
enum RulesCommand {
    /// Print the merged rules for a customer as JSON
    Show {
        /// Customer profile: base, elten or rademaker
        #[arg(long, required = true)]
        customer: String,
    },

    /// Check that every profile's rule documents load
    Check,
}

pub async fn run(args: RulesArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let rules_dir = args.rules.unwrap_or(config.rules.rules_dir);
    let resolver = RuleResolver::new(rules_dir);

    match args.command {
        RulesCommand::Show { customer } => {
            let effective = resolver.resolve(&customer)?;
            println!("{}", serde_json::to_string_pretty(&effective)?);
        }
        RulesCommand::Check => {
            for profile in CustomerProfile::ALL {
                resolver.resolve_profile(profile)?;
                println!("{} {}", style("✓").green(), profile);
            }
            println!(
                "{} All rule documents in {} are valid",
                style("✓").green(),
                resolver.root().display()
            );
        }
    }

    Ok(())
}

//! Process command - extract data from a single drawing.

use std::path::PathBuf;

use clap::Args;
use console::style;

use super::load_config;
use super::order::{ExtractArgs, parse_customer, run_order};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    #[command(flatten)]
    extract: ExtractArgs,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let selection = parse_customer(&args.extract)?;
    let config = load_config(config_path)?;

    if !args.input.is_file() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let is_pdf = args
        .input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        anyhow::bail!("Unsupported file format: {} (expected a PDF)", args.input.display());
    }

    let batch_id = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("drawing")
        .to_string();
    let output_dir = args
        .input
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    println!(
        "{} Processing {}",
        style("ℹ").blue(),
        args.input.display()
    );

    run_order(
        batch_id,
        vec![args.input.clone()],
        &output_dir,
        selection,
        &args.extract,
        config,
    )
    .await
}

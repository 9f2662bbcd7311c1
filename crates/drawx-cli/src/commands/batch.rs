//! Batch command - every drawing in a folder as one order.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use glob::{MatchOptions, Pattern, glob_with};

use super::load_config;
use super::order::{ExtractArgs, parse_customer, run_order};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Folder containing the order's drawings; its name identifies the order
    #[arg(required = true)]
    folder: PathBuf,

    #[command(flatten)]
    extract: ExtractArgs,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let selection = parse_customer(&args.extract)?;
    let config = load_config(config_path)?;

    if !args.folder.is_dir() {
        anyhow::bail!("Input folder not found: {}", args.folder.display());
    }

    let files = discover_pdfs(&args.folder)?;
    if files.is_empty() {
        anyhow::bail!("No PDF files found in {}", args.folder.display());
    }

    println!(
        "{} Found {} drawings to process",
        style("ℹ").blue(),
        files.len()
    );

    run_order(
        batch_id(&args.folder),
        files,
        &args.folder,
        selection,
        &args.extract,
        config,
    )
    .await
}

/// PDFs directly inside `folder`, sorted by path.
pub(crate) fn discover_pdfs(folder: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.pdf", Pattern::escape(&folder.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut files: Vec<PathBuf> = glob_with(&pattern, options)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// The folder name; falls back to the full path for `.` and the like.
fn batch_id(folder: &Path) -> String {
    folder
        .canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(folder)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.display().to_string())
}

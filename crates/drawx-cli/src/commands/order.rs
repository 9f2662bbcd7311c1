//! Shared extraction flow for `process` and `batch`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use drawx_core::{
    BatchOrchestrator, BatchRequest, CustomerSelection, Document, DrawxConfig, ExtractionAdapter,
    GeminiClient, OrderResult, RuleResolver,
};

use crate::output::{self, OutputFormat};

/// Options shared by `process` and `batch`.
#[derive(Args)]
pub struct ExtractArgs {
    /// Customer profile: auto, base, elten or rademaker
    #[arg(long, required = true)]
    pub customer: String,

    /// Model identifier (default from config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Output directory (default: the input folder)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "xml")]
    pub format: OutputFormat,

    /// Rules directory containing base.json and customers/
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Maximum number of requests in flight
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Skip the BOM-only second pass over the assembly drawing
    #[arg(long)]
    pub no_reextract: bool,

    /// Also write a per-document summary CSV
    #[arg(long)]
    pub summary: bool,
}

/// Parse the customer selection before anything else is touched.
pub fn parse_customer(args: &ExtractArgs) -> anyhow::Result<CustomerSelection> {
    Ok(args.customer.parse::<CustomerSelection>()?)
}

/// Run one order end to end and write its output.
pub async fn run_order(
    batch_id: String,
    documents: Vec<PathBuf>,
    default_output_dir: &Path,
    selection: CustomerSelection,
    args: &ExtractArgs,
    mut config: DrawxConfig,
) -> anyhow::Result<()> {
    let start = Instant::now();

    if let Some(rules) = &args.rules {
        config.rules.rules_dir = rules.clone();
    }
    if let Some(jobs) = args.jobs {
        config.batch.concurrency = jobs;
    }
    if args.no_reextract {
        config.batch.reextract_assembly = false;
    }
    let model = args.model.clone().unwrap_or_else(|| config.extraction.model.clone());

    // Configuration problems abort before a client exists
    let resolver = RuleResolver::new(&config.rules.rules_dir);
    resolver.check(selection)?;
    let client = GeminiClient::from_env(&config.extraction)?;
    let adapter = ExtractionAdapter::new(Arc::new(client), config.extraction.request_timeout());

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} drawings {msg}")
            .map_err(|e| anyhow::anyhow!("Invalid progress template: {}", e))?
            .progress_chars("=>-"),
    );

    let progress = pb.clone();
    let orchestrator = BatchOrchestrator::from_config(adapter, resolver, &config).on_document(move |result| {
        progress.inc(1);
        progress.set_message(result.source.clone());
    });

    let request = BatchRequest {
        batch_id,
        documents: documents.into_iter().map(Document::from_path).collect(),
        customer: selection,
        model,
    };

    info!("Processing {} drawing(s)", request.documents.len());
    let order = orchestrator.run(request, interrupt()).await?;
    pb.finish_with_message("Complete");

    let output_dir = args.output.clone().unwrap_or_else(|| default_output_dir.to_path_buf());
    fs::create_dir_all(&output_dir)?;

    let output_path = output_dir.join(config.output_file_name(&order.order_id, args.format.extension()));
    fs::write(&output_path, output::render(&order, args.format)?)?;
    debug!("Wrote output to {}", output_path.display());
    println!(
        "{} Output written to {}",
        style("✓").green(),
        output_path.display()
    );

    if args.summary {
        let summary_path = output_dir.join("summary.csv");
        output::summary::write_summary(&summary_path, &order)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    print_report(&order, start);
    Ok(())
}

/// Resolves on Ctrl-C. If the signal handler cannot be installed, never resolves.
async fn interrupt() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn print_report(order: &OrderResult, start: Instant) {
    println!();
    println!(
        "{} Order {} ({}) processed {} drawing(s) in {:?}",
        style("✓").green(),
        style(&order.order_id).bold(),
        order.customer,
        order.documents.len(),
        start.elapsed()
    );
    if let Some(guess) = &order.customer_guess {
        println!(
            "{} Customer detected as {} ({} confidence): {}",
            style("ℹ").blue(),
            guess.profile,
            guess.confidence,
            guess.rationale
        );
    }
    match &order.assembly {
        Some(assembly) => println!("{} Assembly drawing: {}", style("ℹ").blue(), assembly),
        None => println!("{} No assembly drawing identified", style("ℹ").blue()),
    }
    println!(
        "   {} successful, {} failed",
        style(order.succeeded()).green(),
        style(order.failed()).red()
    );

    let failed: Vec<_> = order.documents.iter().filter(|d| !d.is_success()).collect();
    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed drawings:").red());
        for document in failed {
            if let Some(reason) = document.failure() {
                println!("  - {}: {}", document.source, reason);
            }
        }
    }
}

//! Order serializers.

pub mod summary;
mod xml;

use clap::ValueEnum;

use drawx_core::OrderResult;

/// Output format for the order file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// XML order document
    Xml,
    /// Pretty-printed JSON
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xml => "xml",
            OutputFormat::Json => "json",
        }
    }
}

/// Render the order in the requested format.
pub fn render(order: &OrderResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Xml => xml::render_order(order),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(order)?),
    }
}

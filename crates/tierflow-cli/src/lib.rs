//! CLI logic for the Tierflow layout tool.
//!
//! Reads a JSON graph document, lays it out with the Tierflow engine and
//! writes the resulting report as pretty-printed JSON.

pub mod error_adapter;

mod args;
mod config;
mod document;
mod error;

pub use args::Args;
pub use document::GraphDocument;
pub use error::{CliError, ConfigError};

use std::fs;

use log::{info, warn};

use tierflow::{engine::LayoutEngine, validate::detect_cycles};

/// Run the Tierflow CLI application
///
/// The report is written to the output file even when the layout failed, so
/// the caller can inspect what went wrong.
///
/// # Arguments
///
/// * `args` - Command-line arguments
///
/// # Errors
///
/// Returns `CliError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Malformed graph documents
/// - A layout run that reported a failure
pub fn run(args: &Args) -> Result<(), CliError> {
    info!(
        input_path = args.input,
        output_path = args.output;
        "Processing graph"
    );

    let app_config = config::load_config(args.config.as_ref())?;

    let source = fs::read_to_string(&args.input)?;
    let document: GraphDocument = serde_json::from_str(&source)?;

    let cycles = detect_cycles(&document.nodes, &document.edges);
    for cycle in &cycles.cycles {
        warn!(
            path = cycle.path.join(" -> "),
            severity:? = cycle.severity;
            "Graph contains a cycle, layout may be degraded"
        );
    }

    let mut engine = LayoutEngine::new(app_config.layout().clone(), document.canvas());
    match document.preview() {
        Some(registry) => engine.update_preview(registry),
        None => info!("No branches declared, using generic endpoints"),
    }

    let report = engine.execute_layout();
    engine.dispose();

    fs::write(&args.output, serde_json::to_string_pretty(&report)?)?;
    info!(output_file = args.output; "Layout report written");

    if !report.success && !report.skipped {
        return Err(CliError::Layout(report.error.unwrap_or(report.message)));
    }
    Ok(())
}

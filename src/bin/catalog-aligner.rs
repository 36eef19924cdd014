//! Catalog Aligner CLI Tool
//!
//! Command-line interface for normalizing product photos onto aligned
//! catalog canvases.

#[cfg(feature = "cli")]
use catalog_aligner::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}

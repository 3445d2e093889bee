//! Text-behind CLI tool
//!
//! Renders text behind the subject of a photo using a local segmentation
//! model through the text-behind library.

#[cfg(feature = "cli")]
use text_behind::cli;

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}

//! Text-behind CLI tool
//!
//! One-shot command: read a photo, segment it with a local model, render the
//! text behind the subject and write the result to an image file.

use super::config::{available_providers, CliConfigBuilder};
use crate::{
    processor::TextBehindProcessor,
    segmentation::ModelSegmenter,
    services::ImageIOService,
    text::DirectoryFontStore,
    tracing_config::init_cli_tracing,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Render text behind the subject of a photo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "text-behind")]
pub struct Cli {
    /// Input image file
    #[arg(value_name = "INPUT", required_unless_present = "list_providers")]
    pub input: Option<PathBuf>,

    /// First line of text
    #[arg(long, required_unless_present_any = ["request", "list_providers"])]
    pub text: Option<String>,

    /// Optional second line of text
    #[arg(long)]
    pub text2: Option<String>,

    /// Font family or font file name [default: Arial]
    #[arg(long)]
    pub font: Option<String>,

    /// Font size in pixels [default: 48]
    #[arg(long)]
    pub size: Option<u32>,

    /// X of the first line's top-left corner [default: 50]
    #[arg(long, allow_negative_numbers = true)]
    pub x: Option<i32>,

    /// Y of the first line's top-left corner [default: 50]
    #[arg(long, allow_negative_numbers = true)]
    pub y: Option<i32>,

    /// JSON request payload (textLine1, textLine2, fontFamily, fontSize, textX, textY)
    #[arg(long, value_name = "FILE")]
    pub request: Option<PathBuf>,

    /// Segmentation model file (ONNX)
    #[arg(short, long, required_unless_present_any = ["model_config", "list_providers"])]
    pub model: Option<PathBuf>,

    /// JSON model configuration file
    #[arg(long, value_name = "FILE")]
    pub model_config: Option<PathBuf>,

    /// Square model input size [default: 1024]
    #[arg(long)]
    pub target_size: Option<u32>,

    /// Inference backend
    #[arg(short, long, value_enum, default_value_t = CliBackend::Onnx)]
    pub backend: CliBackend,

    /// Execution provider (auto, cpu, cuda, coreml)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Number of inference threads (0 = runtime default)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Extra font directory, searched before the system ones
    #[arg(long, value_name = "DIR")]
    pub fonts_dir: Option<PathBuf>,

    /// Output file [default: text_behind_image_<id>.png]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Output format [default: from the output extension, else png]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// JPEG quality (1-100)
    #[arg(long, default_value_t = crate::services::DEFAULT_JPEG_QUALITY)]
    pub jpeg_quality: u8,

    /// Show execution providers of the compiled-in backends and exit
    #[arg(long)]
    pub list_providers: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliOutputFormat {
    Png,
    #[value(alias = "jpg")]
    Jpeg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliBackend {
    /// ONNX Runtime
    Onnx,
    /// Pure Rust Tract
    Tract,
}

/// Main entry point for CLI
pub fn main() -> Result<()> {
    let cli = Cli::parse();
    let request_id = short_request_id();

    init_cli_tracing(cli.verbose, &request_id).context("Failed to initialize logging")?;

    if cli.list_providers {
        show_providers();
        return Ok(());
    }

    let output_path = run(&cli, &request_id)?;
    println!("{}", output_path.display());
    Ok(())
}

/// Process one request and return the path written
fn run(cli: &Cli, request_id: &str) -> Result<PathBuf> {
    let start = Instant::now();

    let spec = CliConfigBuilder::text_spec(cli)?;
    let model_config = CliConfigBuilder::model_config(cli)?;
    debug!(?spec, "Text request");

    let backend = CliConfigBuilder::create_backend(cli.backend)?;
    let segmenter = ModelSegmenter::with_initialized_backend(backend, model_config)
        .context("Failed to load segmentation model")?;

    let processor = TextBehindProcessor::new(Arc::new(segmenter), Arc::new(font_store(cli)));

    let input = cli.input.as_deref().context("No input image given")?;
    let image_bytes = read_input(input)?;
    let result = processor
        .process_bytes_with_details(&image_bytes, &spec)
        .with_context(|| format!("Failed to process {}", input.display()))?;

    let output_format = CliConfigBuilder::output_format(cli);
    let output_path = CliConfigBuilder::output_path(cli, request_id);
    ImageIOService::save_image(&result.image, &output_path, output_format, cli.jpeg_quality)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    info!(
        input = %input.display(),
        output = %output_path.display(),
        foreground_ratio = result.mask_statistics.foreground_ratio,
        "{}",
        result.timings.summary()
    );
    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Request complete");

    Ok(output_path)
}

fn show_providers() {
    println!("Execution providers:");
    for (backend, name, available, description) in available_providers() {
        let status = if available { "available" } else { "unavailable" };
        println!("  {backend}:{name:<8} {status:<12} {description}");
    }
}

fn font_store(cli: &Cli) -> DirectoryFontStore {
    let store = DirectoryFontStore::with_default_dirs();
    match &cli.fonts_dir {
        Some(dir) => store.with_priority_dir(dir.clone()),
        None => store,
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read input image {}", path.display()))
}

/// First 8 hex characters of a random UUID
fn short_request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("text-behind").chain(args.iter().copied()))
    }

    #[test]
    fn test_minimal_arguments() {
        let cli = parse(&["photo.jpg", "--text", "HELLO", "--model", "isnet.onnx"]).unwrap();
        assert_eq!(cli.input, Some(PathBuf::from("photo.jpg")));
        assert!(!cli.list_providers);
        assert_eq!(cli.text.as_deref(), Some("HELLO"));
        assert_eq!(cli.backend, CliBackend::Onnx);
        assert_eq!(cli.jpeg_quality, 90);
        assert!(cli.output.is_none());
        assert!(cli.format.is_none());
    }

    #[test]
    fn test_text_or_request_required() {
        assert!(parse(&["photo.jpg", "--model", "isnet.onnx"]).is_err());
        assert!(parse(&["photo.jpg", "--request", "req.json", "--model", "isnet.onnx"]).is_ok());
    }

    #[test]
    fn test_model_or_model_config_required() {
        assert!(parse(&["photo.jpg", "--text", "HI"]).is_err());
        assert!(parse(&["photo.jpg", "--text", "HI", "--model-config", "m.json"]).is_ok());
    }

    #[test]
    fn test_list_providers_needs_no_request() {
        let cli = parse(&["--list-providers"]).unwrap();
        assert!(cli.list_providers);
        assert!(cli.input.is_none());
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn test_negative_anchor() {
        let cli = parse(&["photo.jpg", "--text", "HI", "--model", "m.onnx", "--x", "-20"]).unwrap();
        assert_eq!(cli.x, Some(-20));
    }

    #[test]
    fn test_backend_and_format_values() {
        let cli = parse(&[
            "photo.jpg", "--text", "HI", "--model", "m.onnx", "--backend", "tract", "--format",
            "jpg", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.backend, CliBackend::Tract);
        assert_eq!(cli.format, Some(CliOutputFormat::Jpeg));
        assert_eq!(cli.verbose, 2);

        assert!(parse(&["photo.jpg", "--text", "HI", "--model", "m.onnx", "--backend", "x"]).is_err());
    }

    #[test]
    fn test_short_request_id() {
        let id = short_request_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_font_store_priority_dir() {
        let cli = parse(&[
            "photo.jpg", "--text", "HI", "--model", "m.onnx", "--fonts-dir", "/opt/fonts",
        ])
        .unwrap();
        let store = font_store(&cli);
        assert_eq!(store.search_dirs().first(), Some(&PathBuf::from("/opt/fonts")));
    }

    #[test]
    fn test_missing_input_is_reported() {
        let err = read_input(Path::new("/no/such/photo.jpg")).unwrap_err();
        assert!(err.to_string().contains("/no/such/photo.jpg"));
    }
}

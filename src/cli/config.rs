//! Conversion of CLI arguments into library configuration

use crate::cli::main_impl::{Cli, CliBackend, CliOutputFormat};
use crate::{
    config::{ExecutionProvider, ModelConfig, OutputFormat},
    inference::InferenceBackend,
    services::ImageIOService,
    types::TextSpec,
};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Builds library configuration from parsed CLI arguments
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Text request: the `--request` payload if given, with explicit flags on top
    pub(crate) fn text_spec(cli: &Cli) -> Result<TextSpec> {
        let mut spec = match &cli.request {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read request file {}", path.display()))?;
                TextSpec::from_json(&json)
                    .with_context(|| format!("Invalid request file {}", path.display()))?
            },
            None => TextSpec::default(),
        };

        if let Some(text) = &cli.text {
            spec.line1.clone_from(text);
        }
        if let Some(text2) = &cli.text2 {
            spec.line2 = Some(text2.clone());
        }
        if let Some(font) = &cli.font {
            spec.font_family.clone_from(font);
        }
        if let Some(size) = cli.size {
            spec.font_size = size;
        }
        if let Some(x) = cli.x {
            spec.anchor_x = x;
        }
        if let Some(y) = cli.y {
            spec.anchor_y = y;
        }

        spec.validate().context("Invalid text options")?;
        Ok(spec)
    }

    /// Segmentation model configuration from `--model-config` and/or flags
    pub(crate) fn model_config(cli: &Cli) -> Result<ModelConfig> {
        let mut config = match &cli.model_config {
            Some(path) => ModelConfig::from_json_file(path)
                .with_context(|| format!("Failed to load model config {}", path.display()))?,
            None => ModelConfig::default(),
        };

        if let Some(model) = &cli.model {
            config.model_path.clone_from(model);
        }
        if let Some(target_size) = cli.target_size {
            config.target_size = target_size;
        }
        if let Some(provider) = &cli.provider {
            config.execution_provider = provider
                .parse::<ExecutionProvider>()
                .with_context(|| format!("Invalid execution provider '{provider}'"))?;
        }
        if cli.threads > 0 {
            config.set_num_threads(cli.threads);
        }

        config.validate().context("Invalid model configuration")?;
        Ok(config)
    }

    /// Requested output format: `--format`, else the `-o` extension, else PNG
    pub(crate) fn output_format(cli: &Cli) -> OutputFormat {
        if let Some(format) = cli.format {
            return format.into();
        }
        cli.output
            .as_ref()
            .and_then(OutputFormat::from_path)
            .unwrap_or(OutputFormat::Png)
    }

    /// Output path: `-o`, else a generated name in the current directory
    pub(crate) fn output_path(cli: &Cli, request_id: &str) -> PathBuf {
        match &cli.output {
            Some(path) => path.clone(),
            None => PathBuf::from(ImageIOService::output_file_name(
                request_id,
                Self::output_format(cli),
            )),
        }
    }

    /// Inference backend selected with `--backend`
    pub(crate) fn create_backend(backend: CliBackend) -> Result<Box<dyn InferenceBackend>> {
        match backend {
            CliBackend::Onnx => {
                #[cfg(feature = "onnx")]
                return Ok(Box::new(crate::backends::OnnxBackend::new()));
                #[cfg(not(feature = "onnx"))]
                anyhow::bail!("ONNX backend not compiled in. Rebuild with --features onnx");
            },
            CliBackend::Tract => {
                #[cfg(feature = "tract")]
                return Ok(Box::new(crate::backends::TractBackend::new()));
                #[cfg(not(feature = "tract"))]
                anyhow::bail!("Tract backend not compiled in. Rebuild with --features tract");
            },
        }
    }
}

/// Execution providers per compiled-in backend: `(backend, provider, available, description)`
pub(crate) fn available_providers() -> Vec<(&'static str, String, bool, String)> {
    let mut providers = Vec::new();
    #[cfg(feature = "onnx")]
    providers.extend(
        crate::backends::OnnxBackend::list_providers()
            .into_iter()
            .map(|(name, available, description)| ("onnx", name, available, description)),
    );
    #[cfg(feature = "tract")]
    providers.extend(
        crate::backends::TractBackend::list_providers()
            .into_iter()
            .map(|(name, available, description)| ("tract", name, available, description)),
    );
    providers
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Jpeg => OutputFormat::Jpeg,
        }
    }
}

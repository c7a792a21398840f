#![warn(clippy::all, clippy::pedantic)]

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bestshot::model::AspectRatio;
use bestshot::providers::factory::BUILTIN_PROVIDERS;
use bestshot::{Config, GenerationRequest, ImageRef, PipelineOrchestrator};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    name = "bestshot",
    about = "Fan a creative brief out to several image providers, score every candidate, keep the best."
)]
struct Cli {
    /// Path to config.toml (defaults to ~/.config/bestshot/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the generation pipeline for one prompt
    Generate {
        /// The creative brief
        prompt: String,

        /// Provider to fan out to; repeat for several
        #[arg(long = "provider")]
        providers: Vec<String>,

        /// Candidates requested per provider
        #[arg(long)]
        count: Option<usize>,

        /// Target aspect ratio: 1:1, 3:4, 4:3, 9:16 or 16:9
        #[arg(long, default_value = "1:1")]
        ratio: String,

        /// Reference image (URL, data URI or local file); repeat for
        /// several. Providing any switches to the reference-bound pipeline.
        #[arg(long = "reference")]
        references: Vec<String>,
    },

    /// List the providers this build knows about
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install default crypto provider for Rustls TLS before any client is
    // built; with both aws-lc-rs and ring in the dependency graph neither is
    // selected automatically.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Generate {
            prompt,
            providers,
            count,
            ratio,
            references,
        } => {
            let providers = if providers.is_empty() {
                config.default_providers.clone()
            } else {
                providers
            };
            let ratio = AspectRatio::parse(&ratio)
                .with_context(|| format!("unsupported ratio '{ratio}'"))?;
            let references = references
                .iter()
                .map(|raw| load_reference(raw))
                .collect::<Result<Vec<_>>>()?;

            let request = GenerationRequest::new(prompt, providers)
                .with_candidate_count(count.unwrap_or(config.candidate_count))
                .with_ratio(ratio)
                .with_references(references);

            let orchestrator = PipelineOrchestrator::from_config(&config);
            let result = if request.reference_images.is_empty() {
                orchestrator.run_open(request).await
            } else {
                orchestrator.run_with_reference(request).await
            };

            match result {
                Ok(run) => println!("{}", serde_json::to_string_pretty(&run)?),
                Err(error) => anyhow::bail!("pipeline failed: {error}"),
            }
        }
        Command::Providers => {
            for name in BUILTIN_PROVIDERS {
                println!("{name}");
            }
        }
    }

    Ok(())
}

/// Accept a reference as a URL, a data URI, or a local file to inline.
fn load_reference(raw: &str) -> Result<ImageRef> {
    if let Some(inline) = ImageRef::from_data_uri(raw) {
        return Ok(inline);
    }
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Ok(ImageRef::url(raw));
    }

    let path = Path::new(raw);
    let bytes =
        std::fs::read(path).with_context(|| format!("reading reference image '{raw}'"))?;
    let media_type = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    };
    Ok(ImageRef::inline(media_type, BASE64.encode(&bytes)))
}

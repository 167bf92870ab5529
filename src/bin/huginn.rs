//! huginn — inspection CLI
//!
//! Shows the effective configuration and runs the offline pieces of the
//! pipeline (effort selection, content signatures) against ad-hoc input.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use huginn::effort::{EffortContext, EffortSelector};
use huginn::{AnalysisType, DetailLevel, HuginnConfig, ImageRef, PerceptualSigner};

/// Huginn CLI
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version)]
#[command(about = "Inspect huginn configuration, effort decisions and image signatures")]
struct Args {
    /// Config file (default: ~/.huginn/config.toml, then /etc/huginn/config.toml)
    #[arg(short, long, env = "HUGINN_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the effective configuration as TOML
    Config,

    /// Show the effort tier chosen for a request
    Effort {
        /// Query text
        #[arg(short, long, default_value = "")]
        query: String,
        /// Analysis type (general, ocr, document, chart, technical, medical, comprehensive)
        #[arg(short = 't', long, default_value = "general")]
        analysis_type: String,
        /// Detail level (basic, standard, detailed, comprehensive)
        #[arg(short = 'd', long, default_value = "standard")]
        detail_level: String,
        /// Specific question (repeatable)
        #[arg(long = "question")]
        questions: Vec<String>,
        /// Size of an inline image payload in bytes
        #[arg(long)]
        image_bytes: Option<usize>,
    },

    /// Compute the content signature of an image URL or data URL
    Signature {
        /// Image URL, data URL, or bare base64
        source: String,
        /// Treat the source as inline data even without a data: prefix
        #[arg(long)]
        inline: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = HuginnConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }

        Command::Effort {
            query,
            analysis_type,
            detail_level,
            questions,
            image_bytes,
        } => {
            let selector = EffortSelector::new(&config.effort);
            let decision = selector.choose_effort(&EffortContext {
                query_text: query,
                analysis_type: AnalysisType::from(analysis_type),
                detail_level: DetailLevel::from(detail_level),
                specific_questions: questions,
                image_size_hint: image_bytes,
            });
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }

        Command::Signature { source, inline } => {
            let image = if inline {
                ImageRef::inline(source)
            } else {
                ImageRef::parse(source)
            };
            let signer = PerceptualSigner::new(config.signature.clone());
            let signature = signer.content_signature(&image).await;
            println!("{}", serde_json::to_string_pretty(&signature)?);
        }
    }

    Ok(())
}

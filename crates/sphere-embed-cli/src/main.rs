//! Gallery embedding extraction CLI.
//!
//! Loads a checkpoint, walks a gallery directory, and writes the embedding
//! matrix plus the index → filename table into the output directory:
//!
//! ```text
//! sphere-embed --model-dir /models/gallery --gallery /data/gallery --out-dir .
//! ```
//!
//! Exit code 0 on success, 1 on any failure; errors abort the whole batch.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use sphere_embed::{
    extract_gallery, persist_gallery, select_device, EmbedResult, ModelExtractor, SphereModel,
};

/// Extract angular-margin embeddings for a directory of gallery images.
#[derive(Parser)]
#[command(name = "sphere-embed")]
#[command(version)]
#[command(about = "Extract gallery image embeddings with an angular-margin model")]
struct Cli {
    /// Directory containing config.json and model.safetensors
    #[arg(long)]
    model_dir: PathBuf,

    /// Directory of gallery images to embed
    #[arg(long)]
    gallery: PathBuf,

    /// Directory the artifacts are written into
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Force CPU even when CUDA is available
    #[arg(long)]
    cpu: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "gallery extraction failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> EmbedResult<()> {
    let device = select_device(!cli.cpu);
    let model = SphereModel::load(&cli.model_dir, device)?;
    let extractor = ModelExtractor::new(model, device);

    let extraction = extract_gallery(&extractor, &cli.gallery)?;
    let (feats_path, index_path) = persist_gallery(&cli.out_dir, &extraction)?;

    tracing::info!(
        images = extraction.index.len(),
        feats = %feats_path.display(),
        index = %index_path.display(),
        "done"
    );
    Ok(())
}

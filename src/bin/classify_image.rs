//! classify_image - classify a single still image for a category

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use roadscan::{classify_image_file, AnalyzerConfig, ClassifierRegistry};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image file (JPEG or PNG).
    #[arg(long, value_name = "PATH")]
    image: PathBuf,
    /// Category to classify (defaults to the configured default category).
    #[arg(long)]
    category: Option<String>,
    /// Configuration file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "ROADSCAN_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = AnalyzerConfig::load_from(args.config.as_deref())?;
    let category = args.category.unwrap_or(config.default_category.clone());
    let registry = ClassifierRegistry::from_config(&config)?;

    let label = classify_image_file(&registry, &args.image, &category)?;
    log::info!("{} classified as '{}' ({})", args.image.display(), label, category);

    println!(
        "{}",
        serde_json::json!({
            "class": label,
            "category": category,
        })
    );
    Ok(())
}

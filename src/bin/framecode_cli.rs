//! FrameCode CLI - JSON bridge to the compositor
//!
//! Commands: templates, advise, compose
//! Outputs JSON to stdout, logs to stderr (`RUST_LOG`)
//! Returns 1 on setup and input errors, 2 on composition failure

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use framecode_core::{
    ArtworkLoader, CachingLoader, ComposeRequest, FramePipeline, FsArtworkLoader,
    HttpArtworkLoader, SizingProfile, TemplateCatalog,
};

#[derive(Parser)]
#[command(name = "framecode-cli", version)]
#[command(about = "FrameCode CLI - framed QR code compositor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the template catalog JSON
    #[arg(short, long, env = "FRAMECODE_CATALOG", default_value = "templates/catalog.json")]
    catalog: PathBuf,

    /// Directory that catalog asset references resolve against
    #[arg(long, env = "FRAMECODE_ARTWORK_DIR", default_value = "templates")]
    artwork_dir: PathBuf,

    /// Fetch artwork from this base URL instead of the artwork directory
    #[arg(long, env = "FRAMECODE_ARTWORK_URL")]
    artwork_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available templates
    Templates {
        /// Only templates in this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Print the advised barcode resolution for a template
    Advise {
        /// Template ID
        #[arg(short, long)]
        template: String,

        #[arg(long, value_enum, default_value_t = Profile::Client)]
        profile: Profile,
    },

    /// Compose a barcode into a template's artwork
    Compose {
        /// Template ID
        #[arg(short, long)]
        template: String,

        /// Barcode SVG to compose
        #[arg(short, long, conflicts_with = "data", required_unless_present = "data")]
        source: Option<PathBuf>,

        /// Text to encode as a QR code at the advised resolution
        #[arg(short, long)]
        data: Option<String>,

        /// Write the composed SVG here instead of embedding it in the JSON
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Profile::Client)]
        profile: Profile,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Profile {
    Client,
    Preview,
}

impl From<Profile> for SizingProfile {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Client => SizingProfile::Client,
            Profile::Preview => SizingProfile::Preview,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let pipeline = match build_pipeline(&cli) {
        Ok(p) => p,
        Err(e) => {
            emit(&json!({"success": false, "error": format!("{:#}", e)}));
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Templates { category } => {
            let templates: Vec<_> = match category.as_deref() {
                Some(category) => pipeline.templates_in_category(category),
                None => pipeline.list_templates().iter().collect(),
            };
            let listing: Vec<_> = templates
                .iter()
                .map(|t| json!({
                    "id": t.id,
                    "name": t.name,
                    "category": t.category,
                    "tags": t.tags,
                }))
                .collect();
            emit(&json!(listing));
            ExitCode::SUCCESS
        }

        Commands::Advise { template, profile } => match pipeline.advise(&template, profile.into()) {
            Ok(size) => {
                emit(&json!({"template": template, "size": size}));
                ExitCode::SUCCESS
            }
            Err(e) => {
                emit(&json!({"success": false, "error": e.to_string()}));
                ExitCode::FAILURE
            }
        },

        Commands::Compose { template, source, data, out, profile } => {
            // Input errors exit 1, like setup errors.
            let source_svg = match source.as_deref().map(read_source).transpose() {
                Ok(svg) => svg,
                Err(e) => {
                    emit(&json!({"success": false, "error": format!("{:#}", e)}));
                    return ExitCode::FAILURE;
                }
            };

            let result = match (source_svg, data) {
                (Some(source_svg), _) => {
                    pipeline.compose(&ComposeRequest { template_id: template, source_svg })
                }
                (None, Some(data)) => pipeline.compose_qr(&template, &data, profile.into()),
                (None, None) => {
                    emit(&json!({"success": false, "error": "either --source or --data is required"}));
                    return ExitCode::FAILURE;
                }
            };

            let mut asset = match result {
                Ok(asset) => asset,
                Err(e) => {
                    emit(&json!({"success": false, "error": format!("{:#}", e)}));
                    return ExitCode::from(2);
                }
            };

            if let Some(out) = out {
                if let Err(e) = write_output(&out, &asset.markup) {
                    emit(&json!({"success": false, "error": format!("{:#}", e)}));
                    return ExitCode::FAILURE;
                }
                asset.markup = String::new();
                emit(&json!({"success": true, "asset": asset, "written_to": out}));
            } else {
                emit(&json!({"success": true, "asset": asset}));
            }
            ExitCode::SUCCESS
        }
    }
}

fn build_pipeline(cli: &Cli) -> anyhow::Result<FramePipeline> {
    let catalog = TemplateCatalog::load(&cli.catalog)
        .with_context(|| format!("loading template catalog {}", cli.catalog.display()))?;

    let loader: Box<dyn ArtworkLoader> = match &cli.artwork_url {
        Some(url) => Box::new(CachingLoader::new(
            HttpArtworkLoader::new(url).context("configuring artwork URL")?,
        )),
        None => Box::new(FsArtworkLoader::new(&cli.artwork_dir)),
    };

    Ok(FramePipeline::new(Arc::new(catalog), loader))
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn write_output(path: &Path, markup: &str) -> anyhow::Result<()> {
    fs::write(path, markup).with_context(|| format!("writing {}", path.display()))
}

fn emit(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("failed to encode output: {}", e),
    }
}

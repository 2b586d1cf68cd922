//! formfill command line
//!
//! Fills PDF forms from a JSON schema and JSON answers, and exposes the
//! search and preview operations used by interactive clients.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use formfill_core::{EngineConfig, FieldMatcher, FillEngine};
use shared_pdf::{FormDocument, LopdfBackend, PdfBackend};
use shared_types::{FormData, Schema, SourceFormat};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "formfill")]
#[command(version, about = "Fill PDF forms from structured answers")]
struct Args {
    /// TOML engine configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill a document and write the result
    Fill {
        /// Source PDF or image
        input: PathBuf,
        /// Schema JSON ({"fields": [{"id", "label", "type"}]})
        #[arg(long)]
        schema: PathBuf,
        /// Answers JSON ({"<field id>": value})
        #[arg(long)]
        data: PathBuf,
        /// Where to write the filled PDF
        #[arg(short, long)]
        output: PathBuf,
        /// MIME type of the input; guessed from the extension when omitted
        #[arg(long)]
        content_type: Option<String>,
        /// Also write the per-field report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Find text and print normalized match rectangles as JSON
    Search {
        input: PathBuf,
        query: String,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Render a page preview as PNG
    Render {
        input: PathBuf,
        /// 1-based page number
        #[arg(short, long, default_value = "1")]
        page: usize,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Show which native fields the schema would fill
    Match {
        input: PathBuf,
        #[arg(long)]
        schema: PathBuf,
    },
}

fn source_format(path: &Path, content_type: Option<&str>) -> SourceFormat {
    if let Some(ct) = content_type {
        return SourceFormat::from_content_type(ct);
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => SourceFormat::from_content_type("image/png"),
        Some("jpg") | Some("jpeg") => SourceFormat::from_content_type("image/jpeg"),
        _ => SourceFormat::Pdf,
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read(path)?;
    serde_json::from_slice(&bytes).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let engine = FillEngine::new(config);

    match args.command {
        Command::Fill {
            input,
            schema,
            data,
            output,
            content_type,
            report,
        } => {
            let bytes = read(&input)?;
            let schema: Schema = read_json(&schema)?;
            let data: FormData = read_json(&data)?;
            let format = source_format(&input, content_type.as_deref());

            let result = engine.fill::<LopdfBackend>(&bytes, format, &schema, &data)?;
            write(&output, &result.pdf)?;
            if let Some(path) = report {
                write(&path, &serde_json::to_vec_pretty(&result.report)?)?;
            }

            println!("{}", serde_json::to_string_pretty(&result.metrics)?);
            tracing::info!("Wrote {}", output.display());
        }
        Command::Search {
            input,
            query,
            content_type,
        } => {
            let bytes = read(&input)?;
            let format = source_format(&input, content_type.as_deref());
            let results = engine.search::<LopdfBackend>(&bytes, format, &query)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "results": results }))?
            );
        }
        Command::Render {
            input,
            page,
            output,
            content_type,
        } => {
            if page == 0 {
                bail!("Page numbers start at 1");
            }
            let bytes = read(&input)?;
            let format = source_format(&input, content_type.as_deref());
            let png = engine.render::<LopdfBackend>(&bytes, format, page - 1)?;
            write(&output, &png)?;
            tracing::info!("Rendered page {} to {}", page, output.display());
        }
        Command::Match { input, schema } => {
            let bytes = read(&input)?;
            let schema: Schema = read_json(&schema)?;
            let doc = LopdfBackend::open(&bytes, source_format(&input, None))
                .context("Failed to open document")?;
            let names: Vec<String> = doc.native_fields()?.into_iter().map(|f| f.name).collect();
            let matcher = FieldMatcher::new(&engine.config().matcher);
            let assignments = matcher.match_fields(&schema, &names);
            println!("{}", serde_json::to_string_pretty(&assignments)?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries results, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(args)
}

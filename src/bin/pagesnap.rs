//! CLI binary for pagesnap.
//!
//! A thin shim over the library crate: each subcommand drives a
//! `PageSession` (or the relay server) and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pagesnap::{PageSession, RelayConfig, SnapshotConfig, UploadResponse};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Count pages without rendering
  pagesnap inspect document.pdf

  # Render page 3 to a PNG file
  pagesnap snapshot document.pdf --page 3 --out page3.png

  # Render from a URL
  pagesnap snapshot https://example.com/report.pdf --out cover.png

  # Render and send to the upload relay
  pagesnap upload document.pdf --page 2 --relay http://localhost:8080/api/upload

  # Run the upload relay
  PAGESNAP__STORAGE__ENDPOINT=https://api.media.example.com/v1 \
  PAGESNAP__STORAGE__SERVICE_NAME=demo \
  PAGESNAP__STORAGE__API_KEY=key \
  PAGESNAP__STORAGE__API_SECRET=secret \
  pagesnap serve

ENVIRONMENT VARIABLES:
  PAGESNAP__SERVER__HOST         Relay bind address (default 0.0.0.0)
  PAGESNAP__SERVER__PORT         Relay port (default 8080)
  PAGESNAP__LIMITS__MAX_BODY_BYTES  Upload body cap (default 200 MB)
  PAGESNAP__STORAGE__*           Storage service endpoint and credentials
  PDFIUM_LIB_PATH                Path to an existing libpdfium build
"#;

/// Render PDF pages to images and publish them to a media-storage service.
#[derive(Parser, Debug)]
#[command(
    name = "pagesnap",
    version,
    about = "Render PDF pages to images and publish them to a media-storage service",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAGESNAP_VERBOSE")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the page count of a PDF without rendering anything.
    Inspect {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// PDF user password for encrypted documents.
        #[arg(long, env = "PAGESNAP_PASSWORD")]
        password: Option<String>,
    },

    /// Render one page and write it to a PNG file.
    Snapshot {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Page to render (1-indexed).
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Output PNG path.
        #[arg(short, long)]
        out: PathBuf,

        /// Render scale relative to the page's natural size (0.1-4.0).
        #[arg(long, default_value_t = 1.0)]
        scale: f32,

        /// PDF user password for encrypted documents.
        #[arg(long, env = "PAGESNAP_PASSWORD")]
        password: Option<String>,
    },

    /// Render one page and send it to the upload relay.
    Upload {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Page to render (1-indexed).
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Upload relay endpoint.
        #[arg(long, env = "PAGESNAP_RELAY_URL")]
        relay: Option<String>,

        /// PDF user password for encrypted documents.
        #[arg(long, env = "PAGESNAP_PASSWORD")]
        password: Option<String>,
    },

    /// Run the upload relay server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Inspect { input, password } => inspect(&input, password).await,
        Command::Snapshot {
            input,
            page,
            out,
            scale,
            password,
        } => snapshot(&input, page, &out, scale, password).await,
        Command::Upload {
            input,
            page,
            relay,
            password,
        } => upload(&input, page, relay, password).await,
        Command::Serve => serve().await,
    }
}

async fn inspect(input: &str, password: Option<String>) -> Result<()> {
    let session = session_with(password, None, 1.0)?;
    session
        .select_file(input)
        .await
        .context("Failed to open input")?;
    let pages = session.convert().await.context("Failed to parse PDF")?;

    println!("File:   {}", session.file_name().unwrap_or_default());
    println!("Pages:  {}", pages);
    Ok(())
}

async fn snapshot(
    input: &str,
    page: usize,
    out: &PathBuf,
    scale: f32,
    password: Option<String>,
) -> Result<()> {
    let session = session_with(password, None, scale)?;
    session
        .select_file(input)
        .await
        .context("Failed to open input")?;
    let pages = session.convert().await.context("Failed to parse PDF")?;

    session.set_page(page);
    session.settled().await;

    if let Some(fault) = session.fault() {
        anyhow::bail!("Failed to render page {page}/{pages}: {fault}");
    }
    let image = session
        .rendered()
        .context("No rendered page available")?;

    let bytes = image.png_bytes().context("Failed to decode capture")?;
    let mut file = std::fs::File::create(out)
        .with_context(|| format!("Failed to create {}", out.display()))?;
    file.write_all(&bytes)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    eprintln!(
        "Page {page}/{pages} ({}x{}) -> {}",
        image.width,
        image.height,
        out.display()
    );
    Ok(())
}

async fn upload(
    input: &str,
    page: usize,
    relay: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let session = session_with(password, relay, 1.0)?;
    session
        .select_file(input)
        .await
        .context("Failed to open input")?;
    let pages = session.convert().await.context("Failed to parse PDF")?;

    session.set_page(page);
    session.settled().await;

    if let Some(fault) = session.fault() {
        anyhow::bail!("Failed to render page {page}/{pages}: {fault}");
    }

    match session.upload().await.context("Upload failed")? {
        UploadResponse::Accepted(receipt) => {
            println!("{}", receipt.url);
            Ok(())
        }
        UploadResponse::Rejected { status, message } => {
            anyhow::bail!("Relay rejected upload (HTTP {status}): {message}")
        }
    }
}

async fn serve() -> Result<()> {
    let config = RelayConfig::load().context("Invalid relay configuration")?;
    pagesnap::relay::serve(config)
        .await
        .context("Relay server failed")
}

fn session_with(
    password: Option<String>,
    relay: Option<String>,
    scale: f32,
) -> Result<PageSession> {
    let mut builder = SnapshotConfig::builder().scale(scale);
    if let Some(password) = password {
        builder = builder.password(password);
    }
    if let Some(relay) = relay {
        builder = builder.relay_url(relay);
    }
    let config = builder.build().context("Invalid configuration")?;
    PageSession::new(config).context("Failed to start session")
}

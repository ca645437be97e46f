//! # fsassets CLI
//!
//! Operator entry point for the asset store: run the background service,
//! store and export single assets, inspect the store, force a mover pass.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fsa_catalog::AssetMetadata;
use fsa_config::{init_logging, log_cli_info, Config};
use fsa_service::{AssetRecord, AssetService};
use tokio::signal;

/// fsassets - content-addressed asset store
#[derive(Parser)]
#[command(name = "fsassets")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.fsassets/config.toml then .fsassets/config.toml)
    #[arg(long, global = true, env = "FSASSETS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mover and stats loops until Ctrl-C
    Serve,

    /// Store a file and print its asset id
    Store {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Asset id (a new UUID is generated if omitted)
        #[arg(long)]
        id: Option<String>,

        /// Asset name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Asset type code
        #[arg(long = "type", default_value_t = -1, allow_negative_numbers = true)]
        asset_type: i8,
    },

    /// Write an asset's bytes to a file
    Export {
        id: String,

        #[arg(value_name = "OUT")]
        output: PathBuf,
    },

    /// Show catalog and storage statistics
    Show {
        #[arg(long)]
        json: bool,
    },

    /// Move all spooled content into the sharded tree now
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    init_logging(config.logging.level);

    let service = AssetService::from_config(&config).context("Failed to open asset store")?;

    match cli.command {
        Commands::Serve => cmd_serve(&service).await?,
        Commands::Store {
            file,
            id,
            name,
            asset_type,
        } => cmd_store(&service, &file, id, name, asset_type)?,
        Commands::Export { id, output } => cmd_export(&service, &id, &output)?,
        Commands::Show { json } => cmd_show(&service, json)?,
        Commands::Sweep => cmd_sweep(&service)?,
    }

    Ok(())
}

async fn cmd_serve(service: &AssetService) -> Result<()> {
    let tasks = service.spawn_background()?;
    log_cli_info!(
        "Serving",
        assets = service.catalog_count()?,
        fallback = service.has_fallback()
    );

    signal::ctrl_c().await?;
    println!("fsassets: Shutdown signal received");

    tasks.shutdown();
    println!("fsassets: Stopped");
    Ok(())
}

fn cmd_store(
    service: &AssetService,
    file: &Path,
    id: Option<String>,
    name: Option<String>,
    asset_type: i8,
) -> Result<()> {
    let data = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let name = name.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let metadata = AssetMetadata::new(id.unwrap_or_default(), asset_type).with_name(name);
    let id = service.store(&AssetRecord::new(metadata, data))?;
    println!("{}", id);
    Ok(())
}

fn cmd_export(service: &AssetService, id: &str, output: &Path) -> Result<()> {
    let Some(data) = service.get_data(id)? else {
        bail!("Asset not found: {}", id);
    };
    fs::write(output, &data).with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Exported {} ({} bytes) to {}", id, data.len(), output.display());
    Ok(())
}

fn cmd_show(service: &AssetService, json: bool) -> Result<()> {
    let content = service.content_store();
    let assets = service.catalog_count()?;
    let shards = content.shards().stats()?;
    let backlog = content.spool().backlog()?;

    if json {
        let value = serde_json::json!({
            "assets": assets,
            "hash": content.algorithm().name(),
            "blobs": shards.blob_count(),
            "compressed_blobs": shards.compressed_blobs,
            "legacy_blobs": shards.legacy_blobs,
            "stored_bytes": shards.total_bytes,
            "spool_backlog": backlog,
            "fallback": service.has_fallback(),
            "reads": service.stats(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Catalog:  {} assets", assets);
    println!(
        "Shards:   {} blobs ({} compressed, {} legacy), {} bytes, avg {} bytes",
        shards.blob_count(),
        shards.compressed_blobs,
        shards.legacy_blobs,
        shards.total_bytes,
        shards.avg_blob_size()
    );
    println!("Spool:    {} pending", backlog);
    println!("Hash:     {}", content.algorithm().name());
    println!(
        "Fallback: {}",
        if service.has_fallback() { "enabled" } else { "disabled" }
    );
    Ok(())
}

fn cmd_sweep(service: &AssetService) -> Result<()> {
    let report = service.content_store().sweep();
    println!(
        "Sweep: {} moved, {} already present, {} deferred, {} skipped",
        report.moved, report.already_present, report.deferred, report.skipped
    );
    Ok(())
}

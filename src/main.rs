//! wsi-tiler - Deep Zoom tiles and test data for whole-slide images.
//!
//! This binary parses the command line and runs one subcommand.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use wsi_tiler::{
    config::{
        Cli, Command, FetchConfig, GenerateConfig, IndexConfig, SyncConfig, TileConfig,
        UploadConfig,
    },
    create_s3_client,
    demo::{self, PublishUrls, SyncStamp},
    tile_slide, tile_tree, JpegTileEncoder, S3Store, TilePool,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Tile(config) => run_tile(config).await,
        Command::Generate(config) => run_generate(config).await,
        Command::Sync(config) => run_sync(config, false).await,
        Command::SyncInfo(config) => run_sync(config, true).await,
        Command::Fetch(config) => run_fetch(config).await,
        Command::Index(config) => run_index(config).await,
        Command::Upload(config) => run_upload(config).await,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_tiler=debug"
    } else {
        "wsi_tiler=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Log a configuration error and fail.
fn invalid(e: String) -> ExitCode {
    error!("Configuration error: {}", e);
    ExitCode::FAILURE
}

/// Log a run error and fail.
fn failed(e: impl std::fmt::Display) -> ExitCode {
    error!("{}", e);
    ExitCode::FAILURE
}

// =============================================================================
// Tiling Commands
// =============================================================================

async fn run_tile(config: TileConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        return invalid(e);
    }
    let pool = TilePool::new(
        config.render.jobs,
        JpegTileEncoder::new(config.render.jpeg_quality),
    );
    let settings = config.render.tile_settings();

    if config.input.is_dir() {
        if let Err(e) = tile_tree(&config.input, &config.output, &pool, settings).await {
            return failed(e);
        }
    } else {
        match tile_slide(&pool, settings, &config.input, &config.output, "").await {
            Ok(tiled) => info!(images = tiled.images.len(), "Tiled {}", config.input.display()),
            Err(e) => return failed(e),
        }
    }
    ExitCode::SUCCESS
}

async fn run_generate(config: GenerateConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        return invalid(e);
    }
    let (base_url, download_base_url) = match config.urls() {
        Ok(urls) => urls,
        Err(e) => return invalid(e),
    };
    let urls = PublishUrls {
        base_url,
        download_base_url,
    };
    let pool = TilePool::new(
        config.render.jobs,
        JpegTileEncoder::new(config.render.jpeg_quality),
    );
    let settings = config.render.tile_settings();
    let stamp = SyncStamp::new(settings, config.render.jpeg_quality);

    match demo::generate(&config.input, &config.output, &pool, settings, &stamp, &urls).await {
        Ok(data) => {
            let slides: usize = data.groups.iter().map(|g| g.slides.len()).sum();
            info!(
                groups = data.groups.len(),
                slides,
                stamp = %data.stamp,
                "Generated {}",
                config.output.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => failed(e),
    }
}

// =============================================================================
// Publishing Commands
// =============================================================================

async fn run_sync(config: SyncConfig, info_only: bool) -> ExitCode {
    if let Err(e) = config.validate() {
        return invalid(e);
    }
    let client = create_s3_client(config.s3.s3_endpoint.as_deref(), &config.s3.s3_region).await;
    let store = S3Store::new(client, config.s3_bucket.clone());

    let result = if info_only {
        demo::sync_info(&config.input, &store).await
    } else {
        demo::sync_tiles(&config.input, &store).await.map(|_| ())
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => failed(e),
    }
}

/// Ask on the terminal; only `y` confirms.
fn confirm(prompt: &str) -> bool {
    print!("{prompt}");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match std::io::stdin().read_line(&mut answer) {
        Ok(_) => answer.trim_end_matches(['\r', '\n']) == "y",
        Err(_) => false,
    }
}

async fn run_upload(config: UploadConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        return invalid(e);
    }
    let client = create_s3_client(config.s3.s3_endpoint.as_deref(), &config.s3.s3_region).await;
    let store = S3Store::new(client, config.s3_bucket.clone());

    let plan = match wsi_tiler::plan_upload(&store, &config.paths).await {
        Ok(plan) => plan,
        Err(e) => return failed(e),
    };
    for file in &plan.files {
        println!("{file}");
    }
    if plan.is_empty() {
        return ExitCode::SUCCESS;
    }
    if !config.yes && !confirm("\nOK (y/n)? ") {
        return ExitCode::SUCCESS;
    }

    match wsi_tiler::execute_upload(&store, &plan).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => failed(e),
    }
}

// =============================================================================
// Test Data Commands
// =============================================================================

async fn run_fetch(config: FetchConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        return invalid(e);
    }
    let base_url = match Url::parse(&config.base_url) {
        Ok(url) => url,
        Err(e) => return invalid(e.to_string()),
    };
    match wsi_tiler::fetch_repo(&config.path, &base_url, config.check_hashes).await {
        Ok(report) if report.unexpected.is_empty() => ExitCode::SUCCESS,
        Ok(report) => {
            info!(
                "{} unexpected file(s) in {}",
                report.unexpected.len(),
                config.path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => failed(e),
    }
}

async fn run_index(config: IndexConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        return invalid(e);
    }
    let path = config.path.clone();
    let check_hashes = config.check_hashes;
    let result =
        tokio::task::spawn_blocking(move || wsi_tiler::process_repo(&path, check_hashes)).await;
    match result {
        Ok(Ok(_)) => ExitCode::SUCCESS,
        Ok(Err(e)) => failed(e),
        Err(e) => failed(e),
    }
}

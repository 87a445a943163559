// ABOUTME: CLI entry point: migrate a file of content items to Nostr
// ABOUTME: Local nsec or NIP-46 remote signer; env-driven relay and media host configuration

use anyhow::{bail, Context, Result};
use clap::Parser;
use exodus_core::{
    create_channel, CheckpointStore, EventPublisher, EventSigner, Item, LocalSigner, MediaRef,
    MediaResolver, MigrationConfig, ProfileUpdate,
};
use exodus_publisher::{
    Handshake, MediaUploader, MediaUploaderConfig, MigrationRun, Orchestrator, RelayPublisher,
    SigningGate,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

mod store;

#[derive(Parser)]
#[command(name = "exodus")]
#[command(about = "Migrate social-media content to the Nostr network")]
#[command(version)]
struct Cli {
    /// Path to the items file produced by the ingestion pipeline
    #[arg(short, long, default_value = "./migration-items.json")]
    items: PathBuf,

    /// Secret key (hex or nsec) for local signing
    #[arg(long, env = "EXODUS_NSEC")]
    nsec: Option<String>,

    /// Pair with a remote signer over NIP-46 instead of using a local key
    #[arg(long)]
    remote: bool,

    /// Resume token of a previously interrupted run
    #[arg(long)]
    run_id: Option<String>,

    /// Checkpoint state file
    #[arg(long, default_value = "./exodus-checkpoints.json")]
    state: PathBuf,

    /// Warm the media byte cache before processing starts
    #[arg(long)]
    prefetch: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// On-disk input format: the ingestion pipeline's output.
#[derive(Deserialize)]
struct ItemsFile {
    #[serde(default)]
    profile: Option<ProfileUpdate>,
    items: Vec<Item>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = MigrationConfig::from_env();

    let contents = std::fs::read_to_string(&cli.items)
        .with_context(|| format!("could not read items file {:?}", cli.items))?;
    let items_file: ItemsFile =
        serde_json::from_str(&contents).context("items file is not valid JSON")?;
    if items_file.items.is_empty() {
        bail!("No items found in {:?}", cli.items);
    }

    // Build the signing identity: exactly one governs the whole run
    let mut remote_session = None;
    let signer: Arc<dyn EventSigner> = if cli.remote {
        let relay = config
            .relays
            .first()
            .context("no relay configured for the NIP-46 handshake")?;
        let pending = Handshake::establish(relay, "exodus").await?;

        println!("\nScan or paste this connection string in your signer app:\n");
        println!("  {}\n", pending.descriptor());
        println!("Waiting for the remote signer to approve (ctrl-c to abort)...\n");

        let session = Arc::new(pending.await_remote().await?);
        tracing::info!("Paired with remote signer {}", session.signer_pubkey().to_hex());
        remote_session = Some(session.clone());
        Arc::new(SigningGate::new(session))
    } else {
        let Some(nsec) = &cli.nsec else {
            bail!("Either --nsec (or EXODUS_NSEC) or --remote is required");
        };
        Arc::new(LocalSigner::parse(nsec)?)
    };
    tracing::info!("Publishing as {}", signer.public_key().to_hex());

    let media = Arc::new(MediaUploader::new(MediaUploaderConfig {
        host: config.media_host.clone(),
        proxy: config.media_proxy.clone(),
    }));
    if cli.prefetch {
        let refs: Vec<MediaRef> = items_file
            .items
            .iter()
            .flat_map(|item| item.media_refs().into_iter().cloned())
            .collect();
        tracing::info!("Prefetching {} media object(s)", refs.len());
        media.prefetch(&refs).await;
    }

    let publisher = Arc::new(
        RelayPublisher::connect(&config.relays, config.cache_import_url.clone()).await?,
    );
    let checkpoints = Arc::new(store::FileCheckpointStore::load(cli.state.clone())?);

    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| hex::encode(rand::random::<[u8; 8]>()));

    // Relay task transitions to the log; a real frontend would subscribe here
    let (progress_tx, mut progress_rx) = create_channel();
    let progress_handle = tokio::spawn(async move {
        while let Some(transition) = progress_rx.recv().await {
            tracing::info!("item {}: {} -> {}", transition.item_id, transition.from, transition.to);
        }
    });

    let run = Arc::new(MigrationRun {
        run_id: run_id.clone(),
        signer,
        media: media as Arc<dyn MediaResolver>,
        publisher: publisher.clone() as Arc<dyn EventPublisher>,
        checkpoints: checkpoints as Arc<dyn CheckpointStore>,
        publish_quorum: config.publish_quorum,
        workers: config.workers,
        progress: Some(progress_tx),
    });

    let orchestrator = Orchestrator::new(run, items_file.items, items_file.profile).await?;

    let report = tokio::select! {
        report = orchestrator.run() => report?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(
                "Interrupted; completed items are checkpointed, resume with --run-id {}",
                run_id
            );
            std::process::exit(130);
        }
    };
    progress_handle.abort();

    println!("\n=== Migration Report ({run_id}) ===");
    println!("Completed: {}", report.completed);
    println!("Errored:   {}", report.errored);
    println!("Skipped:   {}", report.skipped);
    for (item_id, message) in &report.failures {
        println!("  {item_id}: {message}");
    }

    if let Some(session) = remote_session {
        session.close().await;
    }
    publisher.shutdown().await;

    Ok(())
}

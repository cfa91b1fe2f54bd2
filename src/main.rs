//! Binary entrypoint for the image wall.
//!
//! Wires feeders, the decode worker and the render tick loop together; all
//! cache logic lives in the library crate.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rust_image_wall::cache::{CpuMirror, WallContext};
use rust_image_wall::config::Configuration;
use rust_image_wall::gpu::{HeadlessGpu, TextureArrayUploader, TileLayerBuffers};
use rust_image_wall::tasks::{decoder::IngestPipeline, sources};

const STATS_EVERY: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "image-wall", version, about = "streaming image wall cache")]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Back the ring stores with GPU texture arrays on a headless device
    #[arg(long)]
    gpu: bool,
    /// Exit after this many render ticks
    #[arg(long, value_name = "COUNT")]
    ticks: Option<u64>,
    /// Deterministic RNG seed for tile switching (overrides tile-shuffle-seed)
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // init tracing (RUST_LOG controls level, default = info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let Args {
        config,
        gpu,
        ticks,
        seed,
    } = Args::parse();

    let mut cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    if seed.is_some() {
        cfg.tile_shuffle_seed = seed;
    }
    tracing::info!(
        "Loaded configuration from {}:\n{:#?}",
        config.display(),
        cfg
    );

    let gpu = if gpu {
        Some(HeadlessGpu::acquire()?)
    } else {
        None
    };
    let settings = cfg.wall_settings(gpu.as_ref().map(HeadlessGpu::max_array_layers));
    let wall = WallContext::new(&settings).context("failed to build image cache")?;
    let ingest = IngestPipeline::spawn(
        (cfg.image_size.width, cfg.image_size.height),
        wall.image_queue(),
    )?;

    let cancel = CancellationToken::new();

    // Ctrl-D/Ctrl-C cancel the pipeline
    if io::stdin().is_terminal() {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let mut sink = Vec::new();
            match io::stdin().read_to_end(&mut sink) {
                Ok(_) => tracing::info!("stdin closed; initiating shutdown"),
                Err(err) => tracing::warn!("stdin watcher failed: {err}"),
            }
            cancel.cancel();
        });
    }
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut feeders = JoinSet::new();
    for source in cfg.sources.clone() {
        feeders.spawn(sources::run(
            source,
            cfg.image_size,
            ingest.raw_queue(),
            cancel.clone(),
        ));
    }

    let render = tokio::task::spawn_blocking({
        let cfg = cfg.clone();
        let cancel = cancel.clone();
        move || render_loop(wall, gpu, &cfg, ticks, &cancel)
    });
    let outcome = render.await.context("render loop panicked")?;

    cancel.cancel();
    while let Some(joined) = feeders.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!("feeder failed: {err:#}"),
            Err(err) => tracing::warn!("feeder task aborted: {err}"),
        }
    }
    tracing::info!(
        decoded = ingest.decoded(),
        rejected = ingest.rejected(),
        "stopping decoder"
    );
    ingest.shutdown();
    outcome
}

enum Backend {
    Host(CpuMirror),
    Device {
        gpu: HeadlessGpu,
        uploader: TextureArrayUploader,
        tiles: TileLayerBuffers,
    },
}

#[derive(Default)]
struct Totals {
    ticks: u64,
    uploaded: u64,
    failed: u64,
    dropped: u64,
    replay_failed: u64,
    switched: u64,
}

fn render_loop(
    mut wall: WallContext,
    gpu: Option<HeadlessGpu>,
    cfg: &Configuration,
    max_ticks: Option<u64>,
    cancel: &CancellationToken,
) -> Result<()> {
    let (width, height) = (cfg.image_size.width, cfg.image_size.height);
    let mut backend = match gpu {
        Some(gpu) => {
            let uploader = TextureArrayUploader::new(
                &gpu.device,
                &gpu.queue,
                wall.buffers().front_store(),
                width,
                height,
            );
            let tiles = TileLayerBuffers::new(&gpu.device, wall.tiles().len());
            tracing::debug!(
                shards = wall.buffers().front_store().shard_count(),
                tile_buffers = tiles.capacity(),
                "gpu backing allocated"
            );
            Backend::Device {
                gpu,
                uploader,
                tiles,
            }
        }
        None => Backend::Host(CpuMirror::with_size(width, height)),
    };

    let started = Instant::now();
    let mut last_tick = started;
    let mut last_stats = started;
    let mut totals = Totals::default();
    tracing::info!(
        capacity = wall.capacity(),
        tiles = wall.tiles().len(),
        switch_interval = %humantime::format_duration(wall.tiles().switch_interval()),
        gpu = matches!(backend, Backend::Device { .. }),
        "render loop started"
    );

    while !cancel.is_cancelled() {
        let now = Instant::now();
        let dt = now.duration_since(last_tick);
        last_tick = now;

        let report = match &mut backend {
            Backend::Host(mirror) => wall.tick(dt, mirror),
            Backend::Device {
                gpu,
                uploader,
                tiles,
            } => {
                let report = wall.tick(dt, uploader);
                if report.upload.swapped || !report.switched.is_empty() {
                    tiles.update(&gpu.queue, &wall.presentation());
                }
                gpu.queue.submit(std::iter::empty::<wgpu::CommandBuffer>());
                report
            }
        };

        totals.ticks += 1;
        totals.uploaded += report.upload.uploaded as u64;
        totals.failed += report.upload.failed as u64;
        totals.dropped += report.upload.dropped as u64;
        totals.replay_failed += report.upload.replay_failed as u64;
        totals.switched += report.switched.len() as u64;

        if now.duration_since(last_stats) >= STATS_EVERY {
            last_stats = now;
            let uptime = Duration::from_secs(started.elapsed().as_secs());
            tracing::info!(
                occupancy = wall.occupancy(),
                capacity = wall.capacity(),
                generation = wall.generation(),
                pending = wall.pending_images(),
                uploaded = totals.uploaded,
                failed = totals.failed,
                dropped = totals.dropped,
                replay_failed = totals.replay_failed,
                switched = totals.switched,
                uptime = %humantime::format_duration(uptime),
                "wall stats"
            );
        }

        if max_ticks.is_some_and(|limit| totals.ticks >= limit) {
            tracing::info!(ticks = totals.ticks, "tick limit reached");
            break;
        }

        let spent = now.elapsed();
        if spent < cfg.tick_interval {
            std::thread::sleep(cfg.tick_interval - spent);
        }
    }

    tracing::info!(
        ticks = totals.ticks,
        occupancy = wall.occupancy(),
        generation = wall.generation(),
        "render loop finished"
    );
    Ok(())
}

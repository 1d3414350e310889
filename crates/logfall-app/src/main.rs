use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use logfall_app::{
    SharedWorld, command, ingest,
    renderer::{Renderer, RendererContext},
    terminal::TerminalRenderer,
};
use logfall_core::VisualizerConfig;
use logfall_sim::FunnelWorld;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "logfall",
    version,
    about = "Animated funnel visualization of web-server access logs"
)]
struct Cli {
    /// Generate synthetic traffic instead of tailing stdin.
    #[arg(long)]
    test: bool,

    /// Seed for reproducible spawn jitter and synthetic traffic.
    #[arg(long, env = "LOGFALL_SEED")]
    seed: Option<u64>,

    /// Cap on simultaneously live entities.
    #[arg(long)]
    max_entities: Option<usize>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = build_config(&cli);

    let world = FunnelWorld::new(config.clone()).context("invalid visualizer configuration")?;
    let world: SharedWorld = Arc::new(Mutex::new(world));

    let (event_tx, event_rx) = command::create_event_queue();
    let (command_tx, command_rx) = command::create_command_bus(16);

    let stop = Arc::new(AtomicBool::new(false));
    let source = if cli.test {
        info!("generating synthetic traffic");
        ingest::spawn_synthetic_generator(&config, event_tx, Arc::clone(&stop))
    } else {
        info!("tailing stdin for access-log lines");
        ingest::spawn_stdin_tail(event_tx)
    };

    let ctx = RendererContext {
        world,
        events: event_rx,
        command_drain: command::make_command_drain(command_rx),
        command_submit: command::make_command_submit(command_tx),
    };
    let renderer = TerminalRenderer::default();
    info!(renderer = renderer.name(), "starting visualizer");
    let result = renderer.run(ctx);

    stop.store(true, Ordering::Relaxed);
    if cli.test {
        // The generator wakes from its next sleep and observes the flag; the
        // stdin tail may block on a read forever, so it is simply detached.
        let _ = source.join();
    }

    result
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_config(cli: &Cli) -> VisualizerConfig {
    let mut config = VisualizerConfig {
        rng_seed: cli.seed,
        ..VisualizerConfig::default()
    };
    if let Some(max_entities) = cli.max_entities {
        config.max_entities = max_entities;
    }
    config
}

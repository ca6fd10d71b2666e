use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use homestead::{
    engine::{EngineBuilder, EngineSettings},
    scenario::ScenarioLoader,
    settlement::ResourceKind,
    snapshot::load_snapshot,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Settlement, ecosystem and technology simulation")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/frontier.yaml")]
    scenario: PathBuf,

    /// Override tick count (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Override the days simulated per tick
    #[arg(long)]
    day_fraction: Option<f64>,

    /// Override snapshot interval in ticks
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Resume from a snapshot JSON file instead of the scenario's start state
    #[arg(long)]
    restore: Option<PathBuf>,

    /// Run in real time and serve the state over HTTP
    #[arg(long)]
    serve: bool,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_target(true)
        .init();

    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;
    let mut world = match &cli.restore {
        Some(path) => {
            let snapshot = load_snapshot(path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
            tracing::info!(tick = snapshot.tick, path = %path.display(), "restoring snapshot");
            snapshot.restore(scenario.load_catalog()?)?
        }
        None => scenario.build_world()?,
    };
    if let Some(day_fraction) = cli.day_fraction {
        world.set_day_fraction(day_fraction);
    }

    let ticks = scenario.ticks(cli.ticks);
    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
        snapshot_interval_ticks: cli
            .snapshot_interval
            .unwrap_or(scenario.snapshot_interval_ticks),
        snapshot_dir: cli
            .snapshot_dir
            .unwrap_or_else(|| PathBuf::from("snapshots")),
    };
    let mut engine = EngineBuilder::new(settings)
        .with_standard_systems()
        .build();

    if cli.serve {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;
        return runtime.block_on(web::run(WebServerConfig {
            engine,
            world,
            ticks,
            speed: scenario.speed,
            host: cli.host,
            port: cli.port,
        }));
    }

    engine.run(&mut world, ticks)?;
    let settlement = &world.settlement;
    println!(
        "Scenario '{}' completed {} ticks ({:.1} days). Population: {}, food: {:.0}, water: {:.0}, technologies discovered: {}",
        scenario.name,
        ticks,
        world.environment.days_passed,
        settlement.population.total,
        settlement.resources.get(ResourceKind::Food),
        settlement.resources.get(ResourceKind::Water),
        settlement.research.discovered_count(),
    );
    Ok(())
}

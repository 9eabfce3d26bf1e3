//! locsrv - real-time location server binary

mod cli;

use cli::CliArgs;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(threads) = args.threads {
        runtime.worker_threads(threads);
    }
    runtime.build()?.block_on(start(args))
}

async fn start(args: CliArgs) -> anyhow::Result<()> {
    // Initialize logging; an explicit level beats RUST_LOG.
    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("locsrv v{}", env!("CARGO_PKG_VERSION"));
    if let Some(threads) = args.threads {
        info!("  Worker threads: {}", threads);
    }

    let mut config = server::Config::load(&args.config_path)?;
    args.apply(&mut config);
    let config = config.validated()?;
    info!("Loaded configuration from {}", args.config_path.display());
    info!("  Port: {}", config.server.port);
    info!(
        "  Extent: lat {}..{}, lng {}..{}",
        config.tree.min_lat, config.tree.max_lat, config.tree.min_lng, config.tree.max_lng
    );
    info!("  Nearby radius: {} m", config.nearby.radius_m);
    info!("  Track movement: {}", config.nearby.track_movement);

    server::run(config).await?;

    Ok(())
}

use anyhow::Context;
use clap::Parser;
use ledger_ingress::{Gateway, GatewayConfig, http};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "ledger-ingress", about = "Transaction ingress gateway")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "conf.toml")]
    config: PathBuf,

    /// Overrides `listen` from the configuration.
    #[arg(long)]
    listen: Option<std::net::SocketAddr>,

    /// Overrides `async` from the configuration.
    #[arg(long = "async")]
    async_mode: Option<bool>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = GatewayConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(async_mode) = args.async_mode {
        config.async_mode = async_mode;
    }

    info!("limiter: {}", config.limiter);
    info!(
        "endpoints: {} rpc, {} json",
        config.rpc.len(),
        config.json_rpc.len()
    );

    let gateway = Arc::new(Gateway::from_config(&config).context("starting gateway")?);
    let app = http::router(gateway.clone());

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    info!("listening on {}", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    info!("shutting down");
    gateway.close().await;

    let snapshot = gateway.stats().snapshot();
    snapshot.print_report();
    if let Some(path) = &config.stats_csv {
        match snapshot.save_to_csv(path) {
            Ok(()) => info!("stats saved to {}", path.display()),
            Err(e) => error!("saving stats to {}: {}", path.display(), e),
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("installing ctrl-c handler: {}", e);
        std::future::pending::<()>().await;
    }
}

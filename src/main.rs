use clap::Parser;
use ring_balancer::api;
use ring_balancer::config::Settings;
use ring_balancer::detector::{FailureDetector, HttpProber};
use ring_balancer::membership::service::MembershipManager;
use ring_balancer::membership::types::NodeId;
use ring_balancer::provisioner::CommandProvisioner;
use ring_balancer::ring::HashRing;
use ring_balancer::router::{HttpBackend, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "ring-balancer")]
#[command(about = "Consistent-hashing load balancer with automatic backend replacement")]
struct Cli {
    /// Path to a configuration file (any format the `config` crate understands)
    #[arg(short, long)]
    config: Option<String>,

    /// Overrides `http_addr` from the configuration
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        settings.http_addr = bind;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting load balancer on {}", settings.http_addr);
    tracing::debug!("Settings: {:?}", settings);

    // 1. Ring + membership:
    let ring = HashRing::new(settings.ring.slots, settings.ring.virtual_nodes)?;
    let provisioner = Arc::new(CommandProvisioner::new(&settings.provisioner));
    let membership = MembershipManager::new(
        ring,
        provisioner.clone(),
        settings.removal_policy.build(),
        settings.provisioner.timeout(),
    );

    for name in &settings.initial_nodes {
        let name = NodeId(name.clone());
        let address = provisioner.address_for(&name);
        if let Err(e) = membership.adopt(name, address).await {
            tracing::warn!("Skipping initial node: {}", e);
        }
    }
    tracing::info!(
        "Initial membership: {} node(s)",
        membership.list_members().await.len()
    );

    // 2. Router:
    let router = Router::new(
        membership.clone(),
        Arc::new(HttpBackend::new()),
        settings.forward_timeout(),
    );

    // 3. Failure detector:
    let detector = FailureDetector::new(
        membership.clone(),
        Arc::new(HttpProber::new()),
        settings.detector.interval(),
        settings.detector.probe_timeout(),
        settings.detector.failure_threshold,
    )
    .start();

    // 4. HTTP server:
    let addr: SocketAddr = settings.http_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on {}", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, api::app(router))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    detector.stop().await;
    tracing::info!("Load balancer stopped");

    Ok(())
}

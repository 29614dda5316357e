//! Binary entry point: loads configuration, wires the ring, rate limiter,
//! connection pool and metrics registry together, and runs the
//! maintenance loops until shutdown (spec §4.3 membership lifecycle,
//! §6 HTTP/RPC framing explicitly out of scope — this binary only stands
//! the pipeline up, it does not terminate HTTP/gRPC itself).

use std::env;
use std::sync::Arc;

use distributor_ring::{DefaultIngesterRingClient, MembershipHealthyInstanceCounter, RingMembership};
use distributor_service::{ConfigLimitsProvider, Distributor, DistributorConfig, PrometheusMetricsSink, TcpConnectionPool, TokenBucketRateLimiter};
use prometheus::Registry;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config_path = env::args().nth(1).unwrap_or_else(|| "distributor.toml".to_string());
    let config = DistributorConfig::load(&config_path).unwrap_or_else(|err| {
        tracing::warn!(%err, %config_path, "failed to load config file, falling back to defaults");
        DistributorConfig::default()
    });

    let registry = Registry::new();
    let metrics = Arc::new(PrometheusMetricsSink::new(&registry)?);

    let mut membership = RingMembership::new(config.ring.heartbeat_timeout(), config.ring.auto_forget_unhealthy_periods);
    membership.register_self(
        config.ring.instance_id.clone(),
        config.ring.instance_addr.clone(),
        config.ring.zone.clone(),
        config.ring.num_tokens,
    );
    let membership = Arc::new(membership);

    distributor_ring::spawn_maintenance_loop(
        membership.clone(),
        config.ring.instance_id.clone(),
        config.ring.heartbeat_period(),
        metrics.clone(),
    );

    let healthy_counter = Arc::new(MembershipHealthyInstanceCounter::new(membership.clone()));
    let ring_client = Arc::new(DefaultIngesterRingClient::new(membership.clone(), config.replication_factor));
    let limits = Arc::new(ConfigLimitsProvider::new(config.limits.clone()));
    let rate_limiter = Arc::new(TokenBucketRateLimiter::new(limits.clone(), healthy_counter.clone()));
    let pool = Arc::new(TcpConnectionPool::new(config.push.timeout(), config.ring.heartbeat_timeout()));

    {
        use distributor_core::observability::MetricsSink;
        metrics.set_replication_factor(config.replication_factor);
    }

    // Held by whatever embeds this binary as a library in a real
    // deployment; this standalone binary only demonstrates the wiring
    // (spec §1: HTTP/RPC server framing is an external collaborator).
    let _distributor = Arc::new(Distributor::new(limits, rate_limiter, ring_client, pool, metrics, config.push.timeout()));

    tracing::info!(instance_id = %config.ring.instance_id, addr = %config.ring.instance_addr, "distributor started");

    // This binary intentionally never terminates HTTP/gRPC framing (spec
    // §1: out of scope); an embedding process wires `Distributor::push`
    // to whatever transport it serves. Here we simply idle until asked to
    // leave the ring, the behavior a bare library-mode deployment needs.
    shutdown_signal().await;
    tracing::info!("shutdown requested, leaving ring");
    membership.leave_self();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };
    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

//! Tencent Cloud controller manager.
//!
//! Runs the node lifecycle and route controllers against the cluster the
//! process has credentials for, backed by the `tencentcloud` provider.
//!
//! # HTTP Endpoints
//!
//! - `GET /healthz` - Health check
//! - `GET /readyz` - Readiness check

mod health;
mod node;
mod route;

use std::future::IntoFuture;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use txcloud_ccm_provider::{CloudConfig, TencentCloud};

use crate::node::NodeController;
use crate::route::RouteController;

/// Cloud controller manager for Kubernetes on Tencent Cloud.
#[derive(Parser, Debug)]
#[command(name = "txcloud-cloud-controller-manager")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON cloud configuration file.
    #[arg(long, env = "TXCLOUD_CCM_CLOUD_CONFIG")]
    cloud_config: Option<PathBuf>,

    /// Name of the cluster, passed to route operations.
    #[arg(long, env = "TXCLOUD_CCM_CLUSTER_NAME", default_value = "kubernetes")]
    cluster_name: String,

    /// Address of the health endpoint server.
    #[arg(long, env = "TXCLOUD_CCM_LISTEN_ADDR", default_value = "0.0.0.0:10258")]
    listen_addr: String,

    /// Seconds between node lifecycle passes.
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    node_monitor_period: u64,

    /// Seconds between route reconcile passes.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    route_reconcile_period: u64,

    /// Whether to manage pod CIDR routes.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    configure_cloud_routes: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,txcloud_ccm=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    tracing::info!(
        cluster_name = %args.cluster_name,
        cloud_config = ?args.cloud_config,
        "Starting Tencent Cloud controller manager"
    );

    let config = CloudConfig::load(args.cloud_config.as_deref())
        .context("failed to load cloud config")?;
    let cloud = TencentCloud::from_config(config).context("failed to initialize provider")?;
    tracing::info!(
        provider = cloud.provider_name(),
        capabilities = ?cloud.capabilities().supported(),
        "Cloud provider ready"
    );

    let client = kube::Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;
    tracing::info!("Connected to Kubernetes cluster");

    let mut controllers = JoinSet::new();

    if let Some(instances) = cloud.capabilities().instances() {
        let controller = NodeController::new(
            client.clone(),
            instances,
            Duration::from_secs(args.node_monitor_period),
        );
        controllers.spawn(async move { controller.run().await });
    }

    if args.configure_cloud_routes {
        match cloud.capabilities().routes() {
            Some(routes) => {
                let controller = RouteController::new(
                    client,
                    routes,
                    args.cluster_name.clone(),
                    Duration::from_secs(args.route_reconcile_period),
                );
                controllers.spawn(async move { controller.run().await });
            }
            None => tracing::warn!("Provider does not support routes; route controller disabled"),
        }
    }

    tracing::info!(listen_addr = %args.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&args.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", args.listen_addr))?;
    let server = axum::serve(listener, health::router())
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    let result = tokio::select! {
        served = server => served.map_err(anyhow::Error::from),
        failure = supervise(&mut controllers) => Err(failure),
    };

    controllers.abort_all();
    tracing::info!("Shut down");

    result
}

/// Wait for the first controller task to stop and describe why.
///
/// Controllers loop forever, so any exit is a failure. Pends forever when no
/// controller is running.
async fn supervise(controllers: &mut JoinSet<()>) -> anyhow::Error {
    let failure = match controllers.join_next().await {
        Some(Ok(())) => anyhow::anyhow!("controller task exited"),
        Some(Err(e)) if e.is_panic() => anyhow::anyhow!("controller task panicked: {e}"),
        Some(Err(e)) => anyhow::anyhow!("controller task failed: {e}"),
        None => std::future::pending().await,
    };
    tracing::error!(error = %failure, "Controller stopped, shutting down");
    failure
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["txcloud-cloud-controller-manager"]).unwrap();
        assert!(args.cloud_config.is_none());
        assert_eq!(args.cluster_name, "kubernetes");
        assert_eq!(args.listen_addr, "0.0.0.0:10258");
        assert_eq!(args.node_monitor_period, 30);
        assert_eq!(args.route_reconcile_period, 10);
        assert!(args.configure_cloud_routes);
    }

    #[test]
    fn routes_can_be_disabled() {
        let args = Args::try_parse_from([
            "txcloud-cloud-controller-manager",
            "--cloud-config",
            "/etc/kubernetes/cloud.json",
            "--configure-cloud-routes",
            "false",
        ])
        .unwrap();
        assert_eq!(
            args.cloud_config.as_deref(),
            Some(std::path::Path::new("/etc/kubernetes/cloud.json"))
        );
        assert!(!args.configure_cloud_routes);
    }

    #[tokio::test]
    async fn panicking_controller_is_reported() {
        let mut controllers = JoinSet::new();
        controllers.spawn(std::future::pending::<()>());
        controllers.spawn(async { panic!("reconcile blew up") });

        let failure = supervise(&mut controllers).await;
        assert!(failure.to_string().contains("panicked"), "{failure}");
        controllers.abort_all();
    }

    #[tokio::test]
    async fn returning_controller_is_reported() {
        let mut controllers = JoinSet::new();
        controllers.spawn(async {});

        let failure = supervise(&mut controllers).await;
        assert_eq!(failure.to_string(), "controller task exited");
    }

    #[tokio::test]
    async fn no_controllers_never_fails() {
        let mut controllers = JoinSet::new();
        let waited = tokio::time::timeout(
            Duration::from_millis(50),
            supervise(&mut controllers),
        )
        .await;
        assert!(waited.is_err());
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(Args::try_parse_from([
            "txcloud-cloud-controller-manager",
            "--node-monitor-period",
            "0"
        ])
        .is_err());
    }
}

//! sitectl - per-tenant static site controller

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};

use sitectl_common::retry::RetryConfig;
use sitectl_common::telemetry::{init_telemetry, TelemetryConfig};
use sitectl_common::{DeploymentMode, Error, SiteConfig, StorageBackend};
use sitectl_controller::{
    infer_kube_client, serve_deliveries, DeletePolicy, EventDispatcher, KubeClusterClient,
    SiteReconciler,
};

/// sitectl - provisions and tears down per-site static servers
#[derive(Parser, Debug)]
#[command(name = "sitectl", version, about, long_about = None)]
struct Cli {
    /// Deployment mode: dev or production
    #[arg(long, env = "SITECTL_MODE", default_value = "dev")]
    mode: DeploymentMode,

    /// Namespace for site Deployments and Services
    #[arg(long, env = "SITECTL_NAMESPACE")]
    namespace: Option<String>,

    /// Static server image
    #[arg(long, env = "SITECTL_IMAGE")]
    image: Option<String>,

    /// Node directory holding `<site>/public` for every site (dev)
    #[arg(long, env = "SITECTL_HOST_PATH_ROOT")]
    host_path_root: Option<String>,

    /// Shared content claim (production)
    #[arg(long, env = "SITECTL_CLAIM_NAME")]
    claim_name: Option<String>,

    /// Namespace of the shared ingress (production)
    #[arg(long, env = "SITECTL_INGRESS_NAMESPACE")]
    ingress_namespace: Option<String>,

    /// Name of the shared ingress (production)
    #[arg(long, env = "SITECTL_INGRESS_NAME")]
    ingress_name: Option<String>,

    /// Expose production sites through their own load balancer instead of
    /// the shared ingress
    #[arg(long, env = "SITECTL_DISABLE_INGRESS")]
    disable_ingress: bool,

    /// What deletion does when a step fails: fail-fast or best-effort
    #[arg(long, env = "SITECTL_DELETE_POLICY", default_value = "fail-fast")]
    delete_policy: DeletePolicy,

    /// Attempts per ingress edit before a lost race is reported
    #[arg(long, env = "SITECTL_INGRESS_MAX_ATTEMPTS", default_value_t = 5)]
    ingress_max_attempts: u32,

    /// Address of the delivery bridge
    #[arg(long, env = "SITECTL_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: SocketAddr,

    /// Deliveries buffered ahead of the dispatcher
    #[arg(long, env = "SITECTL_QUEUE_DEPTH", default_value_t = 64)]
    queue_depth: usize,

    /// Emit JSON logs
    #[arg(long, env = "SITECTL_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    /// Mode preset with the flag overrides applied
    fn site_config(&self) -> Result<SiteConfig, Error> {
        let mut config = SiteConfig::for_mode(self.mode);

        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(image) = &self.image {
            config.image = image.clone();
        }
        match &mut config.storage {
            StorageBackend::HostPath { root } => {
                if let Some(r) = &self.host_path_root {
                    *root = r.clone();
                }
            }
            StorageBackend::SharedClaim { claim_name } => {
                if let Some(c) = &self.claim_name {
                    *claim_name = c.clone();
                }
            }
        }
        if let Some(target) = config.ingress.as_mut() {
            if let Some(ns) = &self.ingress_namespace {
                target.namespace = ns.clone();
            }
            if let Some(name) = &self.ingress_name {
                target.name = name.clone();
            }
        }
        if self.disable_ingress {
            config = config.without_ingress();
        }
        config.validate()?;
        Ok(config)
    }

    fn ingress_retry(&self) -> Result<RetryConfig, Error> {
        if self.ingress_max_attempts == 0 {
            return Err(Error::config("ingress max attempts must be at least 1"));
        }
        Ok(RetryConfig::with_max_attempts(self.ingress_max_attempts))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig { json: cli.log_json })?;

    let config = Arc::new(cli.site_config()?);
    let ingress_retry = cli.ingress_retry()?;
    if cli.queue_depth == 0 {
        anyhow::bail!("queue depth must be at least 1");
    }

    info!(
        mode = %config.mode,
        namespace = %config.namespace,
        image = %config.image,
        ingress = ?config.ingress,
        delete_policy = %cli.delete_policy,
        "Starting sitectl"
    );

    let client = infer_kube_client().await?;
    let reconciler = SiteReconciler::new(Arc::new(KubeClusterClient::new(client)), config)
        .with_delete_policy(cli.delete_policy)
        .with_ingress_retry(ingress_retry);

    let (queue, deliveries) = mpsc::channel(cli.queue_depth);
    let dispatcher = tokio::spawn(EventDispatcher::new(Arc::new(reconciler)).run(deliveries));

    let listener = tokio::net::TcpListener::bind(cli.listen_addr).await?;
    serve_deliveries(listener, queue, shutdown_signal()).await?;

    // The bridge owned the only sender; the dispatcher drains what is queued.
    let summary = dispatcher.await?;
    info!(
        reconciled = summary.reconciled,
        failed = summary.failed,
        dropped = summary.dropped,
        "sitectl stopped"
    );
    Ok(())
}

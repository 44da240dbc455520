//! Site reconciler
//!
//! Turns one site event into cluster writes. Each event is a one-shot
//! convergence attempt: the desired objects are recomputed from the site id
//! and the process configuration, then applied in a fixed order.
//!
//! Creation: Deployment, then Service, then (production) the shared ingress
//! entry. The first failure ends the attempt.
//!
//! Deletion: Deployment, then Service, then the ingress entry. Under
//! [`DeletePolicy::FailFast`] the first failure ends the attempt; under
//! [`DeletePolicy::BestEffort`] every step runs and the failures are
//! reported together.
//!
//! # Partial state
//!
//! Nothing is rolled back. A Service failure after the Deployment was created
//! leaves the Deployment in place, and a failed deletion leaves whatever was
//! not yet removed. Recovery needs a later event or an operator.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use sitectl_common::retry::RetryConfig;
use sitectl_common::{Error, SiteConfig, SiteEvent, SiteId};
use sitectl_workload::desired_site;

use crate::cluster::ClusterClient;
use crate::ingress::{add_site_path, remove_site_path};

/// How deletion treats a failing step
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Stop at the first failing step
    #[default]
    FailFast,
    /// Run every step and report all failures as [`Error::Incomplete`]
    BestEffort,
}

impl FromStr for DeletePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail-fast" | "failfast" => Ok(DeletePolicy::FailFast),
            "best-effort" | "besteffort" => Ok(DeletePolicy::BestEffort),
            other => Err(Error::config(format!(
                "unknown delete policy '{}', expected fail-fast or best-effort",
                other
            ))),
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletePolicy::FailFast => write!(f, "fail-fast"),
            DeletePolicy::BestEffort => write!(f, "best-effort"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum DeleteStep {
    Deployment,
    Service,
    IngressPath,
}

/// Applies site events to the cluster
pub struct SiteReconciler {
    client: Arc<dyn ClusterClient>,
    config: Arc<SiteConfig>,
    delete_policy: DeletePolicy,
    ingress_retry: RetryConfig,
    ingress_lock: Mutex<()>,
}

impl SiteReconciler {
    /// Create a reconciler with the default delete policy and ingress retry
    pub fn new(client: Arc<dyn ClusterClient>, config: Arc<SiteConfig>) -> Self {
        Self {
            client,
            config,
            delete_policy: DeletePolicy::default(),
            ingress_retry: RetryConfig::default(),
            ingress_lock: Mutex::new(()),
        }
    }

    /// Set the delete policy
    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// Set the backoff used when an ingress write loses a race
    pub fn with_ingress_retry(mut self, retry: RetryConfig) -> Self {
        self.ingress_retry = retry;
        self
    }

    /// Configuration every site is built from
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Delete policy in effect
    pub fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    /// Apply one decoded event
    pub async fn reconcile(&self, event: &SiteEvent) -> Result<(), Error> {
        match event {
            SiteEvent::Created(e) => self.create_site(e.site_id).await,
            SiteEvent::Deleted(e) => self.delete_site(e.site_id).await,
        }
    }

    /// Create the Deployment, Service and ingress entry of a site
    #[instrument(skip(self), fields(mode = %self.config.mode))]
    pub async fn create_site(&self, site: SiteId) -> Result<(), Error> {
        let desired = desired_site(site, &self.config);

        self.client.create_deployment(&desired.deployment).await?;
        info!(
            site = %site,
            kind = "Deployment",
            namespace = %desired.namespace,
            name = %desired.name,
            "created"
        );

        // A failure here leaves the Deployment behind.
        self.client.create_service(&desired.service).await?;
        info!(
            site = %site,
            kind = "Service",
            namespace = %desired.namespace,
            name = %desired.name,
            "created"
        );

        if let (Some(target), Some(entry)) =
            (self.config.ingress.as_ref(), desired.ingress_path.as_ref())
        {
            let _guard = self.ingress_lock.lock().await;
            add_site_path(self.client.as_ref(), target, entry, &self.ingress_retry).await?;
        }

        info!(site = %site, "site created");
        Ok(())
    }

    /// Remove the Deployment, Service and ingress entry of a site
    #[instrument(skip(self), fields(mode = %self.config.mode, policy = %self.delete_policy))]
    pub async fn delete_site(&self, site: SiteId) -> Result<(), Error> {
        let desired = desired_site(site, &self.config);
        let mut errors = Vec::new();

        for step in [
            DeleteStep::Deployment,
            DeleteStep::Service,
            DeleteStep::IngressPath,
        ] {
            if let Err(e) = self.delete_step(step, &desired.namespace, &desired.name).await {
                if self.delete_policy == DeletePolicy::FailFast {
                    return Err(e);
                }
                warn!(site = %site, step = ?step, error = %e, "delete step failed, continuing");
                errors.push(e);
            }
        }

        if !errors.is_empty() {
            return Err(Error::Incomplete { site, errors });
        }

        info!(site = %site, "site deleted");
        Ok(())
    }

    async fn delete_step(&self, step: DeleteStep, namespace: &str, name: &str) -> Result<(), Error> {
        match step {
            DeleteStep::Deployment => {
                if self.client.get_deployment(namespace, name).await?.is_none() {
                    warn!(kind = "Deployment", namespace = %namespace, name = %name, "not found");
                    return Err(Error::not_found("Deployment", namespace, name));
                }
                self.client.delete_deployment(namespace, name).await?;
                info!(kind = "Deployment", namespace = %namespace, name = %name, "deleted");
            }
            DeleteStep::Service => {
                if self.client.get_service(namespace, name).await?.is_none() {
                    warn!(kind = "Service", namespace = %namespace, name = %name, "not found");
                    return Err(Error::not_found("Service", namespace, name));
                }
                self.client.delete_service(namespace, name).await?;
                info!(kind = "Service", namespace = %namespace, name = %name, "deleted");
            }
            DeleteStep::IngressPath => {
                if let Some(target) = self.config.ingress.as_ref() {
                    let _guard = self.ingress_lock.lock().await;
                    remove_site_path(self.client.as_ref(), target, name, &self.ingress_retry)
                        .await?;
                }
            }
        }
        Ok(())
    }
}

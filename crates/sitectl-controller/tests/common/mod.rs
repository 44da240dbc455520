//! In-memory cluster shared by the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tokio::sync::Barrier;

use sitectl_common::retry::RetryConfig;
use sitectl_common::{Error, SiteConfig};
use sitectl_controller::{ClusterClient, SiteReconciler};

type Key = (String, String);

/// One call made against the fake
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub kind: &'static str,
    pub name: String,
}

#[derive(Default)]
struct State {
    deployments: BTreeMap<Key, Deployment>,
    services: BTreeMap<Key, Service>,
    ingresses: BTreeMap<Key, Ingress>,
    calls: Vec<Call>,
}

/// Stateful stand-in for the API server
///
/// Replaces are rejected with a conflict when the submitted resourceVersion is
/// stale, unless version checks are turned off to model an unconditional
/// writer.
pub struct FakeCluster {
    state: Mutex<State>,
    enforce_versions: bool,
    ingress_gate: Option<Barrier>,
    gated_reads: usize,
    ingress_reads: AtomicUsize,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            enforce_versions: true,
            ingress_gate: None,
            gated_reads: 0,
            ingress_reads: AtomicUsize::new(0),
        }
    }

    /// Seed the shared ingress with an empty path list
    pub fn with_ingress(self, namespace: &str, name: &str) -> Self {
        let ingress = Ingress {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                resource_version: Some("1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        self.lock()
            .ingresses
            .insert((namespace.to_string(), name.to_string()), ingress);
        self
    }

    /// Accept stale ingress writes
    pub fn without_version_checks(mut self) -> Self {
        self.enforce_versions = false;
        self
    }

    /// Hold the first `readers` ingress reads until all of them have read
    pub fn gate_ingress_reads(mut self, readers: usize) -> Self {
        self.ingress_gate = Some(Barrier::new(readers));
        self.gated_reads = readers;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn record(&self, op: &'static str, kind: &'static str, name: &str) {
        self.lock().calls.push(Call {
            op,
            kind,
            name: name.to_string(),
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: &str, kind: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.op == op && c.kind == kind)
            .count()
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.lock()
            .deployments
            .get(&key(namespace, name))
            .cloned()
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.lock().services.get(&key(namespace, name)).cloned()
    }

    pub fn ingress(&self, namespace: &str, name: &str) -> Option<Ingress> {
        self.lock().ingresses.get(&key(namespace, name)).cloned()
    }
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn object_key(meta: &ObjectMeta) -> Key {
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

fn next_version(current: Option<&str>) -> String {
    let n: u64 = current.and_then(|v| v.parse().ok()).unwrap_or(0);
    (n + 1).to_string()
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, Error> {
        self.record("get", "Deployment", name);
        Ok(self.deployment(namespace, name))
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        let (namespace, name) = object_key(&deployment.metadata);
        self.record("create", "Deployment", &name);
        let mut state = self.lock();
        if state.deployments.contains_key(&key(&namespace, &name)) {
            return Err(Error::already_exists("Deployment", namespace, name));
        }
        state
            .deployments
            .insert(key(&namespace, &name), deployment.clone());
        Ok(())
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), Error> {
        self.record("delete", "Deployment", name);
        self.lock()
            .deployments
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| Error::not_found("Deployment", namespace, name))
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error> {
        self.record("get", "Service", name);
        Ok(self.service(namespace, name))
    }

    async fn create_service(&self, service: &Service) -> Result<(), Error> {
        let (namespace, name) = object_key(&service.metadata);
        self.record("create", "Service", &name);
        let mut state = self.lock();
        if state.services.contains_key(&key(&namespace, &name)) {
            return Err(Error::already_exists("Service", namespace, name));
        }
        state.services.insert(key(&namespace, &name), service.clone());
        Ok(())
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), Error> {
        self.record("delete", "Service", name);
        self.lock()
            .services
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| Error::not_found("Service", namespace, name))
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, Error> {
        self.record("get", "Ingress", name);
        let snapshot = self.ingress(namespace, name);

        let read = self.ingress_reads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.ingress_gate {
            if read < self.gated_reads {
                gate.wait().await;
            }
        }
        Ok(snapshot)
    }

    async fn replace_ingress(&self, ingress: &Ingress) -> Result<Ingress, Error> {
        let (namespace, name) = object_key(&ingress.metadata);
        self.record("replace", "Ingress", &name);
        let mut state = self.lock();
        let stored = state
            .ingresses
            .get(&key(&namespace, &name))
            .ok_or_else(|| Error::not_found("Ingress", &namespace, &name))?;

        let current = stored.metadata.resource_version.clone();
        if self.enforce_versions && ingress.metadata.resource_version != current {
            return Err(Error::conflict("Ingress", namespace, name));
        }

        let mut written = ingress.clone();
        written.metadata.resource_version = Some(next_version(current.as_deref()));
        state
            .ingresses
            .insert(key(&namespace, &name), written.clone());
        Ok(written)
    }
}

/// Backoff short enough for tests
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 5,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
    }
}

/// Reconciler over a shared fake
pub fn reconciler(cluster: &Arc<FakeCluster>, config: SiteConfig) -> SiteReconciler {
    let client: Arc<dyn ClusterClient> = cluster.clone();
    SiteReconciler::new(client, Arc::new(config)).with_ingress_retry(fast_retry())
}

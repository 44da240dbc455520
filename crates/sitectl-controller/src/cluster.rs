//! Cluster access
//!
//! [`ClusterClient`] is the only way the reconciler touches the cluster. The
//! production implementation wraps a `kube::Client`; tests substitute a mock
//! or an in-memory cluster.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use sitectl_common::{Error, Operation};

/// Trait abstracting the cluster operations the reconciler needs
///
/// Gets return `Ok(None)` for a missing object. Writes report
/// [`Error::AlreadyExists`] on a create collision, [`Error::Conflict`] when a
/// replace carried a stale resourceVersion and [`Error::NotFound`] when the
/// target is gone.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Get a Deployment by namespace and name
    async fn get_deployment(&self, namespace: &str, name: &str)
        -> Result<Option<Deployment>, Error>;

    /// Create a Deployment
    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), Error>;

    /// Delete a Deployment
    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Get a Service by namespace and name
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error>;

    /// Create a Service
    async fn create_service(&self, service: &Service) -> Result<(), Error>;

    /// Delete a Service
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Get an Ingress by namespace and name
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, Error>;

    /// Replace an Ingress, conditional on the resourceVersion it carries
    async fn replace_ingress(&self, ingress: &Ingress) -> Result<Ingress, Error>;
}

/// Connection timeout for the API server
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout for API requests
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from the inferred config (in-cluster or kubeconfig)
pub async fn infer_kube_client() -> Result<Client, kube::Error> {
    let mut config = kube::Config::infer()
        .await
        .map_err(kube::Error::InferConfig)?;
    config.connect_timeout = Some(CONNECT_TIMEOUT);
    config.read_timeout = Some(READ_TIMEOUT);
    Client::try_from(config)
}

/// Map a kube error onto the reconciler's error kinds
pub fn classify_kube_error(
    kind: &str,
    namespace: &str,
    name: &str,
    operation: Operation,
    err: kube::Error,
) -> Error {
    match &err {
        kube::Error::Api(ae) if ae.code == 404 => Error::not_found(kind, namespace, name),
        kube::Error::Api(ae) if ae.code == 409 && operation == Operation::Create => {
            Error::already_exists(kind, namespace, name)
        }
        kube::Error::Api(ae) if ae.code == 409 => Error::conflict(kind, namespace, name),
        _ if operation == Operation::Get => Error::cluster_read(kind, name, err.to_string()),
        _ => Error::cluster_write(kind, name, operation, err.to_string()),
    }
}

/// Real Kubernetes client implementation
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| classify_kube_error(&K::kind(&()), namespace, name, Operation::Get, e))
    }

    async fn create<K>(&self, obj: &K) -> Result<K, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
    {
        let kind = K::kind(&());
        let name = obj.name_any();
        let namespace = obj.namespace().ok_or_else(|| {
            Error::cluster_write(kind.to_string(), &name, Operation::Create, "object has no namespace")
        })?;

        debug!(kind = %kind, namespace = %namespace, name = %name, "creating");
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        api.create(&PostParams::default(), obj)
            .await
            .map_err(|e| classify_kube_error(&kind, &namespace, &name, Operation::Create, e))
    }

    async fn replace<K>(&self, obj: &K) -> Result<K, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
    {
        let kind = K::kind(&());
        let name = obj.name_any();
        let namespace = obj.namespace().ok_or_else(|| {
            Error::cluster_write(kind.to_string(), &name, Operation::Replace, "object has no namespace")
        })?;

        debug!(
            kind = %kind,
            namespace = %namespace,
            name = %name,
            resource_version = ?obj.resource_version(),
            "replacing"
        );
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &PostParams::default(), obj)
            .await
            .map_err(|e| classify_kube_error(&kind, &namespace, &name, Operation::Replace, e))
    }

    async fn delete<K>(&self, namespace: &str, name: &str) -> Result<(), Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let kind = K::kind(&());
        debug!(kind = %kind, namespace = %namespace, name = %name, "deleting");
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| classify_kube_error(&kind, namespace, name, Operation::Delete, e))
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, Error> {
        self.get(namespace, name).await
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        self.create(deployment).await.map(|_| ())
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), Error> {
        self.delete::<Deployment>(namespace, name).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error> {
        self.get(namespace, name).await
    }

    async fn create_service(&self, service: &Service) -> Result<(), Error> {
        self.create(service).await.map(|_| ())
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), Error> {
        self.delete::<Service>(namespace, name).await
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, Error> {
        self.get(namespace, name).await
    }

    async fn replace_ingress(&self, ingress: &Ingress) -> Result<Ingress, Error> {
        self.replace(ingress).await
    }
}

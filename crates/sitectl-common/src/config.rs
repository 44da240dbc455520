//! Deployment-mode configuration
//!
//! Read once at startup and shared as `Arc<SiteConfig>`. Nothing in the
//! builder or reconciler consults the environment directly.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::Error;

/// Default namespace for site objects
pub const DEFAULT_NAMESPACE: &str = "default";
/// Default static server image
pub const DEFAULT_IMAGE: &str = "seagullbird/headr-caddy:2.0.0";
/// Default image pull policy
pub const DEFAULT_IMAGE_PULL_POLICY: &str = "IfNotPresent";
/// Where the content volume is mounted inside the container
pub const DEFAULT_MOUNT_PATH: &str = "/www";
/// Host directory holding one subdirectory per site (dev)
pub const DEFAULT_HOST_PATH_ROOT: &str = "/home/docker/data/sites";
/// Shared network-backed claim holding all sites (production)
pub const DEFAULT_CLAIM_NAME: &str = "nfs";
/// Name of the shared ingress (production)
pub const DEFAULT_INGRESS_NAME: &str = "usersites-ingress";

/// Environment the controller runs in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentMode {
    /// Single-node development cluster with host-path storage
    Dev,
    /// Shared storage and ingress-fronted routing
    Production,
}

impl FromStr for DeploymentMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(DeploymentMode::Dev),
            "prod" | "production" => Ok(DeploymentMode::Production),
            other => Err(Error::config(format!(
                "unknown deployment mode '{}' (expected dev or production)",
                other
            ))),
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Dev => f.write_str("dev"),
            DeploymentMode::Production => f.write_str("production"),
        }
    }
}

/// Volume backing a site's content
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    /// Per-site subdirectory of a node-local directory
    HostPath {
        /// Directory containing `<site>/public` for every site
        root: String,
    },
    /// Persistent volume claim shared by every site
    SharedClaim {
        /// Claim name
        claim_name: String,
    },
}

/// How the site's Service is exposed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceExposure {
    /// NodePort, either directly or behind the shared ingress
    NodePort,
    /// Cloud load balancer per site
    LoadBalancer,
}

impl ServiceExposure {
    /// Kubernetes `spec.type` value
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceExposure::NodePort => "NodePort",
            ServiceExposure::LoadBalancer => "LoadBalancer",
        }
    }
}

/// Location of the shared ingress
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngressTarget {
    /// Ingress namespace
    pub namespace: String,
    /// Ingress name
    pub name: String,
}

impl IngressTarget {
    /// Create a new target
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

/// Process-wide configuration for building and reconciling sites
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteConfig {
    /// Environment
    pub mode: DeploymentMode,
    /// Namespace of every site Deployment and Service
    pub namespace: String,
    /// Static server image
    pub image: String,
    /// Image pull policy
    pub image_pull_policy: String,
    /// Container mount point of the content volume
    pub mount_path: String,
    /// Content volume
    pub storage: StorageBackend,
    /// Service type
    pub exposure: ServiceExposure,
    /// Shared ingress maintained per site, if any
    pub ingress: Option<IngressTarget>,
}

impl SiteConfig {
    /// Preset for a deployment mode
    pub fn for_mode(mode: DeploymentMode) -> Self {
        match mode {
            DeploymentMode::Dev => Self {
                mode,
                namespace: DEFAULT_NAMESPACE.to_string(),
                image: DEFAULT_IMAGE.to_string(),
                image_pull_policy: DEFAULT_IMAGE_PULL_POLICY.to_string(),
                mount_path: DEFAULT_MOUNT_PATH.to_string(),
                storage: StorageBackend::HostPath {
                    root: DEFAULT_HOST_PATH_ROOT.to_string(),
                },
                exposure: ServiceExposure::NodePort,
                ingress: None,
            },
            DeploymentMode::Production => Self {
                mode,
                namespace: DEFAULT_NAMESPACE.to_string(),
                image: DEFAULT_IMAGE.to_string(),
                image_pull_policy: DEFAULT_IMAGE_PULL_POLICY.to_string(),
                mount_path: DEFAULT_MOUNT_PATH.to_string(),
                storage: StorageBackend::SharedClaim {
                    claim_name: DEFAULT_CLAIM_NAME.to_string(),
                },
                exposure: ServiceExposure::NodePort,
                ingress: Some(IngressTarget::new(DEFAULT_NAMESPACE, DEFAULT_INGRESS_NAME)),
            },
        }
    }

    /// Dev preset
    pub fn dev() -> Self {
        Self::for_mode(DeploymentMode::Dev)
    }

    /// Production preset
    pub fn production() -> Self {
        Self::for_mode(DeploymentMode::Production)
    }

    /// Disable the shared ingress
    ///
    /// Production sites are then reachable only through their own load balancer.
    pub fn without_ingress(mut self) -> Self {
        self.ingress = None;
        if self.mode == DeploymentMode::Production {
            self.exposure = ServiceExposure::LoadBalancer;
        }
        self
    }

    /// Whether a per-site ingress path is maintained
    pub fn ingress_enabled(&self) -> bool {
        self.ingress.is_some()
    }

    /// Reject configurations that would produce unusable or overlapping objects
    pub fn validate(&self) -> Result<(), Error> {
        if self.namespace.is_empty() {
            return Err(Error::config("namespace must not be empty"));
        }
        if self.image.is_empty() {
            return Err(Error::config("image must not be empty"));
        }
        if !Path::new(&self.mount_path).is_absolute() {
            return Err(Error::config(format!(
                "mount path '{}' must be absolute",
                self.mount_path
            )));
        }
        match &self.storage {
            StorageBackend::HostPath { root } => {
                if !Path::new(root).is_absolute() {
                    return Err(Error::config(format!(
                        "host path root '{}' must be absolute",
                        root
                    )));
                }
            }
            StorageBackend::SharedClaim { claim_name } => {
                if claim_name.is_empty() {
                    return Err(Error::config("claim name must not be empty"));
                }
            }
        }
        if let Some(ingress) = &self.ingress {
            if ingress.name.is_empty() || ingress.namespace.is_empty() {
                return Err(Error::config("ingress name and namespace must not be empty"));
            }
        }
        Ok(())
    }
}

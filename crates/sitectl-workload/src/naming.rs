//! Names, labels and content locations derived from a site id
//!
//! Everything here is a pure function of the site id (and, for content
//! roots, the storage configuration). Create, delete and lookup all key on
//! these values, so they must never change for a given input.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sitectl_common::{SiteConfig, SiteId, StorageBackend, MANAGED_BY};

/// Label selecting a site's pods
pub const APP_LABEL: &str = "app";
/// Standard managed-by label
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
/// Label carrying the raw site id
pub const SITE_ID_LABEL: &str = "sitectl.io/site-id";

/// Name shared by a site's Deployment, Service and container
pub fn site_resource_name(site: SiteId) -> String {
    format!("siteid-{}-service", site)
}

/// Labels stamped on every object of a site
pub fn site_labels(site: SiteId) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP_LABEL.to_string(), site_resource_name(site)),
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
        (SITE_ID_LABEL.to_string(), site.to_string()),
    ])
}

/// URL path routed to a site through the shared ingress
pub fn site_url_path(site: SiteId) -> String {
    format!("/{}", site)
}

/// Where a site's content lives and how the server reaches it
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentRoot {
    /// A directory on the node, already private to the site, mounted whole
    HostPath {
        /// Host directory
        host_path: PathBuf,
        /// Server root inside the container (the mount point itself)
        server_root: PathBuf,
    },
    /// A claim shared by all sites, with the site isolated below the mount
    SharedClaim {
        /// Claim name
        claim_name: String,
        /// Site directory relative to the claim root
        sub_path: PathBuf,
        /// Server root inside the container
        server_root: PathBuf,
    },
}

impl ContentRoot {
    /// Directory the static server serves from
    pub fn server_root(&self) -> &Path {
        match self {
            ContentRoot::HostPath { server_root, .. } => server_root,
            ContentRoot::SharedClaim { server_root, .. } => server_root,
        }
    }

    /// Site directory on the backing storage
    ///
    /// Two sites on the same storage must never resolve to the same
    /// directory or one nested inside the other.
    pub fn effective_path(&self) -> PathBuf {
        match self {
            ContentRoot::HostPath { host_path, .. } => host_path.clone(),
            ContentRoot::SharedClaim {
                claim_name,
                sub_path,
                ..
            } => Path::new("pvc").join(claim_name).join(sub_path),
        }
    }

    /// Whether this root and `other` share any directory
    pub fn overlaps(&self, other: &ContentRoot) -> bool {
        let a = self.effective_path();
        let b = other.effective_path();
        a.starts_with(&b) || b.starts_with(&a)
    }
}

/// Resolve a site's content root under the configured storage
///
/// Host paths give each site its own mount, so the server serves the mount
/// point. A shared claim is mounted whole, so the server root descends into
/// `sites/<id>/public` below the mount point.
pub fn content_root(site: SiteId, config: &SiteConfig) -> ContentRoot {
    let site_dir = PathBuf::from(site.to_string()).join("public");
    match &config.storage {
        StorageBackend::HostPath { root } => ContentRoot::HostPath {
            host_path: Path::new(root).join(&site_dir),
            server_root: PathBuf::from(&config.mount_path),
        },
        StorageBackend::SharedClaim { claim_name } => {
            let sub_path = Path::new("sites").join(&site_dir);
            ContentRoot::SharedClaim {
                claim_name: claim_name.clone(),
                server_root: Path::new(&config.mount_path).join(&sub_path),
                sub_path,
            }
        }
    }
}

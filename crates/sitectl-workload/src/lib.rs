//! Desired cluster objects for a site
//!
//! Compiles a site id plus the process [`SiteConfig`] into the Deployment,
//! Service and optional ingress path that serve the site. Compilation is
//! pure: the same inputs always give equal outputs, which is what lets a
//! redelivered event re-apply the same objects.
//!
//! # Storage
//!
//! - **HostPath** (dev): `<root>/<id>/public` on the node is mounted at the
//!   container's web root; the mount is already private to the site.
//! - **SharedClaim** (production): one claim holds every site and is mounted
//!   whole; the server root is `<mount>/sites/<id>/public`.

#![deny(missing_docs)]

pub mod deployment;
pub mod ingress;
pub mod naming;
pub mod service;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use sitectl_common::{SiteConfig, SiteId};

pub use deployment::build_deployment;
pub use ingress::{backend_service_name, build_ingress_path_entry, IngressPathEntry};
pub use naming::{content_root, site_labels, site_resource_name, ContentRoot};
pub use service::build_service;

/// Every object a site needs, recomputed per event
#[derive(Clone, Debug, PartialEq)]
pub struct DesiredSite {
    /// Site these objects serve
    pub site: SiteId,
    /// Shared name of the Deployment and Service
    pub name: String,
    /// Namespace of the Deployment and Service
    pub namespace: String,
    /// Static server Deployment
    pub deployment: Deployment,
    /// Service in front of the Deployment
    pub service: Service,
    /// Route in the shared ingress, when the integration is active
    pub ingress_path: Option<IngressPathEntry>,
}

/// Compile a site's desired objects
pub fn desired_site(site: SiteId, config: &SiteConfig) -> DesiredSite {
    DesiredSite {
        site,
        name: site_resource_name(site),
        namespace: config.namespace.clone(),
        deployment: build_deployment(site, config),
        service: build_service(site, config),
        ingress_path: build_ingress_path_entry(site, config),
    }
}

//! Per-site routing entry in the shared ingress

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, IngressBackend, IngressServiceBackend, ServiceBackendPort,
};

use sitectl_common::{SiteConfig, SiteId, SITE_SERVICE_PORT};

use crate::naming::{site_resource_name, site_url_path};

/// Path type used for every site entry
pub const SITE_PATH_TYPE: &str = "Prefix";

/// One site's route: URL path to backend Service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngressPathEntry {
    /// URL path, `/<id>`
    pub path: String,
    /// Backend Service name; identifies the entry inside the shared list
    pub service_name: String,
    /// Backend Service port
    pub service_port: i32,
}

impl IngressPathEntry {
    /// Render as an ingress HTTP path
    pub fn to_http_path(&self) -> HTTPIngressPath {
        HTTPIngressPath {
            path: Some(self.path.clone()),
            path_type: SITE_PATH_TYPE.to_string(),
            backend: IngressBackend {
                service: Some(IngressServiceBackend {
                    name: self.service_name.clone(),
                    port: Some(ServiceBackendPort {
                        number: Some(self.service_port),
                        name: None,
                    }),
                }),
                resource: None,
            },
        }
    }
}

/// Backend Service name of an ingress HTTP path, if it routes to a Service
pub fn backend_service_name(path: &HTTPIngressPath) -> Option<&str> {
    path.backend.service.as_ref().map(|s| s.name.as_str())
}

/// Build a site's ingress entry, or `None` when the ingress integration is off
pub fn build_ingress_path_entry(site: SiteId, config: &SiteConfig) -> Option<IngressPathEntry> {
    config.ingress.as_ref()?;
    Some(IngressPathEntry {
        path: site_url_path(site),
        service_name: site_resource_name(site),
        service_port: SITE_SERVICE_PORT,
    })
}

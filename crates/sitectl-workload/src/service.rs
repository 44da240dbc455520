//! Service compilation

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use sitectl_common::{SiteConfig, SiteId, SITE_CONTAINER_PORT, SITE_SERVICE_PORT};

use crate::naming::{site_labels, site_resource_name};

/// Build the desired Service for a site
///
/// Selects exactly the pods of the site's Deployment and forwards the fixed
/// service port to the server's container port.
pub fn build_service(site: SiteId, config: &SiteConfig) -> Service {
    let labels = site_labels(site);

    Service {
        metadata: ObjectMeta {
            name: Some(site_resource_name(site)),
            namespace: Some(config.namespace.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(labels),
            type_: Some(config.exposure.as_str().to_string()),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                protocol: Some("TCP".to_string()),
                port: SITE_SERVICE_PORT,
                target_port: Some(IntOrString::Int(SITE_CONTAINER_PORT)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

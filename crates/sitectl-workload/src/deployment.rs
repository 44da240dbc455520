//! Deployment compilation
//!
//! One replica, one volume, one container running the static server.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, HostPathVolumeSource, PersistentVolumeClaimVolumeSource,
    PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use sitectl_common::{SiteConfig, SiteId, SITE_CONTAINER_PORT};

use crate::naming::{content_root, site_labels, site_resource_name, site_url_path, ContentRoot};

/// Name of the content volume and its mount
pub const CONTENT_VOLUME: &str = "data";

/// Environment variable telling the server which URL prefix it serves
pub const SITE_NAME_ENV: &str = "SITENAME";

/// Static server command line serving `server_root`
pub fn server_command(server_root: &str) -> Vec<String> {
    [
        "/bin/parent",
        "caddy",
        "--conf",
        "/etc/Caddyfile",
        "-root",
        server_root,
        "--log",
        "stdout",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn content_volume(root: &ContentRoot) -> Volume {
    match root {
        ContentRoot::HostPath { host_path, .. } => Volume {
            name: CONTENT_VOLUME.to_string(),
            host_path: Some(HostPathVolumeSource {
                path: host_path.to_string_lossy().into_owned(),
                type_: None,
            }),
            ..Default::default()
        },
        ContentRoot::SharedClaim { claim_name, .. } => Volume {
            name: CONTENT_VOLUME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim_name.clone(),
                read_only: None,
            }),
            ..Default::default()
        },
    }
}

/// Build the desired Deployment for a site
pub fn build_deployment(site: SiteId, config: &SiteConfig) -> Deployment {
    let name = site_resource_name(site);
    let labels = site_labels(site);
    let root = content_root(site, config);
    let server_root = root.server_root().to_string_lossy().into_owned();

    let container = Container {
        name: name.clone(),
        image: Some(config.image.clone()),
        image_pull_policy: Some(config.image_pull_policy.clone()),
        command: Some(server_command(&server_root)),
        env: Some(vec![EnvVar {
            name: SITE_NAME_ENV.to_string(),
            value: Some(site_url_path(site)),
            ..Default::default()
        }]),
        ports: Some(vec![ContainerPort {
            name: Some("http".to_string()),
            container_port: SITE_CONTAINER_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        volume_mounts: Some(vec![VolumeMount {
            name: CONTENT_VOLUME.to_string(),
            mount_path: config.mount_path.clone(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(config.namespace.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    volumes: Some(vec![content_volume(&root)]),
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_spec(d: &Deployment) -> &PodSpec {
        d.spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .expect("pod spec")
    }

    #[test]
    fn dev_deployment_mounts_site_host_path_at_web_root() {
        let d = build_deployment(SiteId::new(42), &SiteConfig::dev());

        assert_eq!(d.metadata.name.as_deref(), Some("siteid-42-service"));
        assert_eq!(d.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(d.spec.as_ref().unwrap().replicas, Some(1));

        let pod = pod_spec(&d);
        assert_eq!(pod.volumes.as_ref().unwrap().len(), 1);
        let volume = &pod.volumes.as_ref().unwrap()[0];
        assert_eq!(volume.name, "data");
        assert_eq!(
            volume.host_path.as_ref().unwrap().path,
            "/home/docker/data/sites/42/public"
        );
        assert!(volume.persistent_volume_claim.is_none());

        assert_eq!(pod.containers.len(), 1);
        let c = &pod.containers[0];
        assert_eq!(c.name, "siteid-42-service");
        assert_eq!(c.image.as_deref(), Some("seagullbird/headr-caddy:2.0.0"));
        assert_eq!(c.image_pull_policy.as_deref(), Some("IfNotPresent"));
        assert_eq!(c.volume_mounts.as_ref().unwrap()[0].mount_path, "/www");
        assert_eq!(
            c.command.as_ref().unwrap(),
            &server_command("/www"),
        );
        assert_eq!(c.ports.as_ref().unwrap()[0].container_port, 2015);

        let env = &c.env.as_ref().unwrap()[0];
        assert_eq!(env.name, "SITENAME");
        assert_eq!(env.value.as_deref(), Some("/42"));
    }

    #[test]
    fn production_deployment_serves_site_subdirectory_of_shared_claim() {
        let d = build_deployment(SiteId::new(42), &SiteConfig::production());
        let pod = pod_spec(&d);

        let volume = &pod.volumes.as_ref().unwrap()[0];
        assert_eq!(
            volume.persistent_volume_claim.as_ref().unwrap().claim_name,
            "nfs"
        );
        assert!(volume.host_path.is_none());

        let c = &pod.containers[0];
        assert_eq!(c.volume_mounts.as_ref().unwrap()[0].mount_path, "/www");
        let command = c.command.as_ref().unwrap();
        let root_flag = command.iter().position(|a| a == "-root").unwrap();
        assert_eq!(command[root_flag + 1], "/www/sites/42/public");
    }

    #[test]
    fn selector_matches_pod_labels() {
        let d = build_deployment(SiteId::new(3), &SiteConfig::dev());
        let spec = d.spec.as_ref().unwrap();
        let selector = spec.selector.match_labels.as_ref().unwrap();
        let pod_labels = spec
            .template
            .metadata
            .as_ref()
            .and_then(|m| m.labels.as_ref())
            .unwrap();
        for (k, v) in selector {
            assert_eq!(pod_labels.get(k), Some(v));
        }
    }

    #[test]
    fn builds_are_deterministic() {
        for config in [SiteConfig::dev(), SiteConfig::production()] {
            let a = build_deployment(SiteId::new(11), &config);
            let b = build_deployment(SiteId::new(11), &config);
            assert_eq!(a, b);
        }
    }
}

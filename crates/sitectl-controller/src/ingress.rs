//! Shared ingress mutation
//!
//! Every site in production mode owns one entry in the path list of the
//! shared Ingress's first rule. The list is the only state mutated across
//! tenants, so writes go through a read-modify-write that is conditional on
//! the resourceVersion read: a writer that lost the race gets a
//! [`Error::Conflict`], re-reads and re-applies its change.

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressRule, IngressSpec,
};
use tracing::{debug, info};

use sitectl_common::retry::{retry_with_backoff, RetryConfig};
use sitectl_common::{Error, IngressTarget};
use sitectl_workload::{backend_service_name, IngressPathEntry};

use crate::cluster::ClusterClient;

const INGRESS_KIND: &str = "Ingress";

/// Path entries of the first rule, empty if the ingress has none
pub fn site_paths(ingress: &Ingress) -> &[HTTPIngressPath] {
    ingress
        .spec
        .as_ref()
        .and_then(|s| s.rules.as_ref())
        .and_then(|rules| rules.first())
        .and_then(|rule| rule.http.as_ref())
        .map(|http| http.paths.as_slice())
        .unwrap_or(&[])
}

fn first_rule_paths_mut(ingress: &mut Ingress) -> &mut Vec<HTTPIngressPath> {
    let spec = ingress.spec.get_or_insert_with(IngressSpec::default);
    let rules = spec.rules.get_or_insert_with(Vec::new);
    if rules.is_empty() {
        rules.push(IngressRule::default());
    }
    &mut rules[0]
        .http
        .get_or_insert_with(HTTPIngressRuleValue::default)
        .paths
}

/// Append a site's entry to the first rule
///
/// Creates `spec`, a hostless first rule and its path list when missing.
/// Returns `false` without touching the list when an entry for the same
/// backend service is already present.
pub fn append_path(ingress: &mut Ingress, entry: &IngressPathEntry) -> bool {
    let paths = first_rule_paths_mut(ingress);
    if paths
        .iter()
        .any(|p| backend_service_name(p) == Some(entry.service_name.as_str()))
    {
        return false;
    }
    paths.push(entry.to_http_path());
    true
}

/// Remove every entry routing to `service_name` from the first rule
///
/// The last entry takes each removed entry's slot. Returns `false` when no
/// entry matched.
pub fn remove_path(ingress: &mut Ingress, service_name: &str) -> bool {
    let Some(paths) = ingress
        .spec
        .as_mut()
        .and_then(|s| s.rules.as_mut())
        .and_then(|rules| rules.first_mut())
        .and_then(|rule| rule.http.as_mut())
        .map(|http| &mut http.paths)
    else {
        return false;
    };

    let mut removed = false;
    while let Some(index) = paths
        .iter()
        .position(|p| backend_service_name(p) == Some(service_name))
    {
        paths.swap_remove(index);
        removed = true;
    }
    removed
}

/// Fetch the ingress, apply `mutate` and write it back if it changed
///
/// Returns whether a write happened. Retries the whole cycle on conflict.
async fn mutate_ingress<F>(
    client: &dyn ClusterClient,
    target: &IngressTarget,
    retry: &RetryConfig,
    operation_name: &str,
    mutate: F,
) -> Result<bool, Error>
where
    F: Fn(&mut Ingress) -> bool,
{
    let mutate = &mutate;
    retry_with_backoff(retry, operation_name, Error::is_conflict, move || async move {
        let mut ingress = client
            .get_ingress(&target.namespace, &target.name)
            .await?
            .ok_or_else(|| Error::not_found(INGRESS_KIND, &target.namespace, &target.name))?;

        if !mutate(&mut ingress) {
            return Ok(false);
        }

        client.replace_ingress(&ingress).await?;
        Ok(true)
    })
    .await
}

/// Route a site through the shared ingress
pub async fn add_site_path(
    client: &dyn ClusterClient,
    target: &IngressTarget,
    entry: &IngressPathEntry,
    retry: &RetryConfig,
) -> Result<(), Error> {
    let written = mutate_ingress(client, target, retry, "add_ingress_path", |ingress| {
        append_path(ingress, entry)
    })
    .await?;

    if written {
        info!(
            ingress = %target.name,
            path = %entry.path,
            service = %entry.service_name,
            "added ingress path"
        );
    } else {
        debug!(ingress = %target.name, service = %entry.service_name, "ingress path already present");
    }
    Ok(())
}

/// Stop routing a site through the shared ingress
///
/// A missing entry is success; a missing ingress is [`Error::NotFound`].
pub async fn remove_site_path(
    client: &dyn ClusterClient,
    target: &IngressTarget,
    service_name: &str,
    retry: &RetryConfig,
) -> Result<(), Error> {
    let written = mutate_ingress(client, target, retry, "remove_ingress_path", |ingress| {
        remove_path(ingress, service_name)
    })
    .await?;

    if written {
        info!(ingress = %target.name, service = %service_name, "removed ingress path");
    } else {
        debug!(ingress = %target.name, service = %service_name, "no ingress path to remove");
    }
    Ok(())
}

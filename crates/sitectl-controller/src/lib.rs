//! sitectl controller
//!
//! Receives site events from the bus bridge and converges the cluster:
//!
//! - [`delivery`]: HTTP endpoint the bus consumer pushes deliveries into
//! - [`dispatcher`]: single task decoding and routing deliveries
//! - [`reconciler`]: create and delete paths for one site
//! - [`ingress`]: conditional edits of the shared ingress
//! - [`cluster`]: the cluster access trait and its kube implementation

#![deny(missing_docs)]

pub mod cluster;
pub mod delivery;
pub mod dispatcher;
pub mod ingress;
pub mod reconciler;

pub use cluster::{infer_kube_client, ClusterClient, KubeClusterClient};
pub use delivery::{delivery_routes, serve_deliveries};
pub use dispatcher::{Delivery, DispatchSummary, EventDispatcher};
pub use reconciler::{DeletePolicy, SiteReconciler};

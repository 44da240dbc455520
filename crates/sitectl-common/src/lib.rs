//! Common types for sitectl: errors, configuration, events and utilities

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod events;
pub mod retry;
pub mod telemetry;

pub use config::{DeploymentMode, IngressTarget, ServiceExposure, SiteConfig, StorageBackend};
pub use error::{Error, Operation};
pub use events::{
    DeleteSiteEvent, NewSiteEvent, SiteEvent, SiteId, DELETE_SITE_TOPIC, NEW_SITE_TOPIC,
};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Port the static file server listens on inside the container
pub const SITE_CONTAINER_PORT: i32 = 2015;

/// Port each site Service exposes
pub const SITE_SERVICE_PORT: i32 = 2018;

/// Value of the managed-by label on every site object
pub const MANAGED_BY: &str = "sitectl";

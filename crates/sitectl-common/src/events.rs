//! Site lifecycle events delivered by the message bus
//!
//! The bus hands over raw `(topic, body)` pairs. This module owns the topic
//! names and turns a body into a typed event; everything about connections,
//! acknowledgement and redelivery stays with the bus.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Topic carrying site-created events
pub const NEW_SITE_TOPIC: &str = "new_site_server";

/// Topic carrying site-deleted events
pub const DELETE_SITE_TOPIC: &str = "del_site_server";

/// Identifier of one tenant's site
///
/// Every cluster object name and content path is derived from this value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(u64);

impl SiteId {
    /// Wrap a raw site id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw numeric id
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SiteId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A user created a site
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSiteEvent {
    /// Site to provision
    #[serde(alias = "siteID", alias = "SiteID")]
    pub site_id: SiteId,
}

/// A user deleted a site
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSiteEvent {
    /// Site to tear down
    #[serde(alias = "siteID", alias = "SiteID")]
    pub site_id: SiteId,
}

/// A decoded bus event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SiteEvent {
    /// Provision the site's objects
    Created(NewSiteEvent),
    /// Remove the site's objects
    Deleted(DeleteSiteEvent),
}

impl SiteEvent {
    /// Decode a delivery body according to the topic it arrived on
    ///
    /// Unknown topics and malformed bodies are both decode errors; the caller
    /// logs and drops them.
    pub fn decode(topic: &str, body: &[u8]) -> Result<Self, Error> {
        match topic {
            NEW_SITE_TOPIC => serde_json::from_slice::<NewSiteEvent>(body)
                .map(SiteEvent::Created)
                .map_err(|e| Error::decode(topic, e.to_string())),
            DELETE_SITE_TOPIC => serde_json::from_slice::<DeleteSiteEvent>(body)
                .map(SiteEvent::Deleted)
                .map_err(|e| Error::decode(topic, e.to_string())),
            other => Err(Error::decode(other, "unknown topic")),
        }
    }

    /// Site this event concerns
    pub fn site_id(&self) -> SiteId {
        match self {
            SiteEvent::Created(e) => e.site_id,
            SiteEvent::Deleted(e) => e.site_id,
        }
    }

    /// Short name for logging
    pub fn action(&self) -> &'static str {
        match self {
            SiteEvent::Created(_) => "create",
            SiteEvent::Deleted(_) => "delete",
        }
    }
}

//! Error types for sitectl
//!
//! Errors carry the object kind, namespace and name they concern so that a
//! failed reconcile can be diagnosed from a single log line.

use std::fmt;

use thiserror::Error;

use crate::events::SiteId;

/// Cluster API operation that produced an error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Read a single object
    Get,
    /// Create a new object
    Create,
    /// Replace an existing object (conditional on its resourceVersion)
    Replace,
    /// Delete an object
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Replace => "replace",
            Operation::Delete => "delete",
        };
        f.write_str(op)
    }
}

/// Main error type for sitectl operations
#[derive(Debug, Error)]
pub enum Error {
    /// Inbound event body or topic could not be decoded
    #[error("decode error on topic {topic}: {message}")]
    Decode {
        /// Topic the delivery arrived on
        topic: String,
        /// What was wrong with the delivery
        message: String,
    },

    /// Startup configuration is invalid
    #[error("configuration error: {message}")]
    Config {
        /// What is invalid
        message: String,
    },

    /// An object expected to exist is missing
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Object kind (Deployment, Service, Ingress)
        kind: String,
        /// Object namespace
        namespace: String,
        /// Object name
        name: String,
    },

    /// A create collided with an existing object
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        /// Object kind
        kind: String,
        /// Object namespace
        namespace: String,
        /// Object name
        name: String,
    },

    /// A conditional write lost against a concurrent writer
    #[error("{kind} {namespace}/{name} was modified concurrently")]
    Conflict {
        /// Object kind
        kind: String,
        /// Object namespace
        namespace: String,
        /// Object name
        name: String,
    },

    /// Reading from the cluster API failed
    #[error("cluster read failed for {kind} {name}: {message}")]
    ClusterRead {
        /// Object kind
        kind: String,
        /// Object name
        name: String,
        /// Underlying failure
        message: String,
    },

    /// Writing to the cluster API failed
    #[error("cluster {operation} failed for {kind} {name}: {message}")]
    ClusterWrite {
        /// Object kind
        kind: String,
        /// Object name
        name: String,
        /// The write that failed
        operation: Operation,
        /// Underlying failure
        message: String,
    },

    /// Best-effort reconciliation finished with one or more failed steps
    #[error("site {site}: {} step(s) failed: {}", .errors.len(), join_errors(.errors))]
    Incomplete {
        /// Site being reconciled
        site: SiteId,
        /// Every step failure, in step order
        errors: Vec<Error>,
    },
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a decode error for a delivery on `topic`
    pub fn decode(topic: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            topic: topic.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create an already-exists error
    pub fn already_exists(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a cluster read error
    pub fn cluster_read(
        kind: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::ClusterRead {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a cluster write error
    pub fn cluster_write(
        kind: impl Into<String>,
        name: impl Into<String>,
        operation: Operation,
        msg: impl Into<String>,
    ) -> Self {
        Self::ClusterWrite {
            kind: kind.into(),
            name: name.into(),
            operation,
            message: msg.into(),
        }
    }

    /// Check if this error is transient
    ///
    /// Transport failures and lost conditional writes may succeed on a later
    /// attempt. Everything else needs a different event or an operator.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ClusterRead { .. } | Error::ClusterWrite { .. } | Error::Conflict { .. } => {
                true
            }
            Error::Decode { .. }
            | Error::Config { .. }
            | Error::NotFound { .. }
            | Error::AlreadyExists { .. } => false,
            Error::Incomplete { errors, .. } => errors.iter().any(Error::is_retryable),
        }
    }

    /// Check if this error is a lost optimistic-concurrency write
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Check if this error reports a missing object
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Get the object kind if this error concerns a specific object
    pub fn kind(&self) -> Option<&str> {
        match self {
            Error::NotFound { kind, .. }
            | Error::AlreadyExists { kind, .. }
            | Error::Conflict { kind, .. }
            | Error::ClusterRead { kind, .. }
            | Error::ClusterWrite { kind, .. } => Some(kind),
            Error::Decode { .. } | Error::Config { .. } | Error::Incomplete { .. } => None,
        }
    }
}

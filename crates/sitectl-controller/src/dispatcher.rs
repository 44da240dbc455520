//! Event dispatcher
//!
//! A single task drains the delivery queue and reconciles one event at a
//! time to completion. Failures are logged and the loop moves on; a bad
//! event never stops the dispatcher.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use sitectl_common::{Error, SiteEvent};

use crate::reconciler::SiteReconciler;

/// A raw message handed over by the bus bridge
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Topic the message arrived on
    pub topic: String,
    /// JSON body
    pub body: Vec<u8>,
}

impl Delivery {
    /// Create a delivery
    pub fn new(topic: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            body: body.into(),
        }
    }
}

/// Outcome counts of a dispatcher run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Events reconciled successfully
    pub reconciled: u64,
    /// Events whose reconciliation failed
    pub failed: u64,
    /// Deliveries that did not decode
    pub dropped: u64,
}

/// Routes decoded events to the reconciler
pub struct EventDispatcher {
    reconciler: Arc<SiteReconciler>,
}

impl EventDispatcher {
    /// Create a dispatcher over a reconciler
    pub fn new(reconciler: Arc<SiteReconciler>) -> Self {
        Self { reconciler }
    }

    /// Decode and reconcile one delivery
    pub async fn dispatch(&self, delivery: &Delivery) -> Result<(), Error> {
        let event = SiteEvent::decode(&delivery.topic, &delivery.body)?;
        info!(
            site = %event.site_id(),
            action = event.action(),
            topic = %delivery.topic,
            "received site event"
        );
        self.reconciler.reconcile(&event).await
    }

    /// Process deliveries until every sender is dropped
    pub async fn run(self, mut deliveries: mpsc::Receiver<Delivery>) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        while let Some(delivery) = deliveries.recv().await {
            match self.dispatch(&delivery).await {
                Ok(()) => summary.reconciled += 1,
                Err(e @ Error::Decode { .. }) => {
                    warn!(topic = %delivery.topic, error = %e, "dropping undecodable delivery");
                    summary.dropped += 1;
                }
                Err(e) => {
                    error!(
                        topic = %delivery.topic,
                        error = %e,
                        retryable = e.is_retryable(),
                        "site reconciliation failed"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            reconciled = summary.reconciled,
            failed = summary.failed,
            dropped = summary.dropped,
            "delivery queue closed, dispatcher stopping"
        );
        summary
    }
}

//! HTTP delivery bridge
//!
//! The message bus is an external collaborator: a consumer subscribed to the
//! site topics forwards each message here.
//!
//! - `POST /deliveries/{topic}` with the raw JSON body → `202 Accepted` once
//!   queued, `503` if the dispatcher has stopped
//! - `GET /healthz` → `ok`
//!
//! Acceptance only means the delivery was queued. Decoding and
//! reconciliation happen later on the dispatcher task.

use std::future::Future;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatcher::Delivery;

/// Build the bridge router feeding `queue`
pub fn delivery_routes(queue: mpsc::Sender<Delivery>) -> Router {
    Router::new()
        .route("/deliveries/{topic}", post(accept_delivery))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(queue)
}

async fn accept_delivery(
    State(queue): State<mpsc::Sender<Delivery>>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Result<StatusCode, (StatusCode, String)> {
    debug!(topic = %topic, bytes = body.len(), "delivery received");

    queue
        .send(Delivery::new(topic.clone(), body.to_vec()))
        .await
        .map_err(|_| {
            warn!(topic = %topic, "dispatcher is gone, refusing delivery");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "dispatcher is not running".to_string(),
            )
        })?;

    Ok(StatusCode::ACCEPTED)
}

/// Serve the bridge on `listener` until `shutdown` resolves
pub async fn serve_deliveries<S>(
    listener: TcpListener,
    queue: mpsc::Sender<Delivery>,
    shutdown: S,
) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "delivery bridge listening");
    }
    axum::serve(listener, delivery_routes(queue))
        .with_graceful_shutdown(shutdown)
        .await
}

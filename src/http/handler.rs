//! Request handling.
//!
//! Routing and business logic are not part of this host; every request gets
//! the placeholder body. The router is built once per server instance and
//! wrapped with per-connection timeouts by the accept loop.

use axum::extract::Request;
use axum::http::{Method, Uri};
use axum::middleware::Next;
use axum::response::Response;
use axum::Router;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::http::request::MakeRequestUuidV4;
use crate::observability::metrics;

/// Body returned for every request.
pub const PLACEHOLDER_BODY: &str = "Hello from WaitR";

/// Build the Axum router with all middleware layers.
pub fn router() -> Router {
    Router::new()
        .fallback(placeholder)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
}

async fn placeholder(method: Method, uri: Uri) -> &'static str {
    tracing::info!(method = %method, url = %uri, "Received request");
    PLACEHOLDER_BODY
}

/// Count every request by method and the status actually sent.
pub(crate) async fn count_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let response = next.run(request).await;
    metrics::record_request(method.as_str(), response.status().as_u16());
    response
}

//! Credential middleware.
//!
//! Verifies the bearer credential of every protected request through the
//! gateway before the handler runs. The verified identity travels in the
//! request extensions.

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::time::Instant;

use crate::context::CallContext;
use crate::http::response::{unauthorized, GatewayRejection};
use crate::http::server::AppState;
use crate::net::Transport;
use crate::observability::trace_context::TRACEPARENT;
use crate::observability::TraceContext;
use crate::resilience::DEADLINE_HINT_HEADER;

const X_REQUEST_ID: &str = "x-request-id";

pub async fn require_credential<T>(
    State(state): State<AppState<T>>,
    mut req: Request<Body>,
    next: Next,
) -> Response
where
    T: Transport + 'static,
{
    let Some(token) = bearer_token(req.headers()) else {
        return unauthorized("missing bearer credential");
    };

    let ctx = call_context(req.headers(), state.request_timeout);
    match state.verifier.verify_credential(&ctx, token).await {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(err) => {
            tracing::warn!(
                request_id = %ctx.request_id(),
                kind = err.kind(),
                error = %err,
                "Credential verification failed"
            );
            let retry_after = state.verifier.cool_down();
            GatewayRejection::new(err, retry_after).into_response()
        }
    }
}

/// The token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}

/// Deadline, request id and trace parent for the outbound call.
///
/// The deadline is the service's own request timeout, shortened by an
/// inbound deadline hint when our caller sent one.
pub fn call_context(headers: &HeaderMap, request_timeout: Duration) -> CallContext {
    let hinted = headers
        .get(DEADLINE_HINT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis);
    let budget = hinted.map_or(request_timeout, |hint| hint.min(request_timeout));

    let mut ctx = CallContext::with_deadline(Instant::now() + budget);
    if let Some(id) = headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok()) {
        ctx = ctx.with_request_id(id);
    }
    if let Some(parent) = headers
        .get(TRACEPARENT)
        .and_then(|v| v.to_str().ok())
        .and_then(TraceContext::parse)
    {
        ctx = ctx.with_trace_parent(parent);
    }
    ctx
}

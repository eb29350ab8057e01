//! Middleware for modifying requests and responses.

use crate::{
    feature::greet::greet_service::GreetingService,
    infra::error::{ApiError, ClientError},
};
use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use tower_http::trace::MakeSpan;

static X_REQUEST_ID: &str = "x-request-id";

#[derive(Clone)]
pub(crate) struct MakeRequestIdSpan;

impl<B> MakeSpan<B> for MakeRequestIdSpan {
    fn make_span(&mut self, request: &http::Request<B>) -> tracing::Span {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|id| id.to_str().ok())
            .unwrap_or("unknown");
        tracing::info_span!(
            "request",
            request_id = request_id,
            method = %request.method(),
            uri = %request.uri(),
            version = ?request.version(),
        )
    }
}

/// Counts every request before passing it on untouched.
pub(crate) async fn count_requests(
    State(service): State<GreetingService>,
    req: Request,
    next: Next,
) -> Response {
    let count = service.record_request();
    tracing::trace!(count, "Request counted");
    next.run(req).await
}

/// The maximum size of the request body to log.
const MAX_BODY_SIZE: u64 = 8192;

/// Print the request and response bodies when they are small enough.
pub(crate) async fn log_request_response(
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    // Print request
    let (parts, body) = req.into_parts();
    let req = if fits_in_log(&body) {
        let bytes = buffer_and_print("Request", body).await?;
        Request::from_parts(parts, Body::from(bytes))
    } else {
        Request::from_parts(parts, body)
    };

    // Perform request
    let res = next.run(req).await;

    // Print response
    let (parts, body) = res.into_parts();
    let res = if fits_in_log(&body) {
        let bytes = buffer_and_print("Response", body).await?;
        Response::from_parts(parts, Body::from(bytes))
    } else {
        Response::from_parts(parts, body)
    };

    Ok(res)
}

fn fits_in_log(body: &Body) -> bool {
    match body.size_hint().upper() {
        Some(n) => n <= MAX_BODY_SIZE,
        _ => false,
    }
}

/// Read the entire body stream and store it in memory.
async fn buffer_and_print(direction: &str, body: Body) -> Result<Bytes, ApiError> {
    let bytes = body
        .collect()
        .await
        .map_err(|e| ClientError::BadRequest(format!("failed to read {direction} body: {e}")))?
        .to_bytes();

    // Log if valid text
    if let Ok(body) = std::str::from_utf8(&bytes) {
        tracing::trace!("{} body = {:?}", direction, body);
    }

    Ok(bytes)
}

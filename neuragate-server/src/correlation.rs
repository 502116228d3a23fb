//! Correlation Filter (C9): reuse the inbound `X-Correlation-ID` if
//! present, else mint a UUIDv4. Stashed in request extensions so the
//! gateway handler can thread it into the `FilterContext` and every
//! log record and telemetry event for the request; echoed back on the
//! response unconditionally.

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct CorrelationId(pub String);

pub async fn correlation_middleware(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    req.extensions_mut().insert(CorrelationId(id.clone()));
    if let (Ok(name), Ok(value)) = (
        HeaderName::try_from(CORRELATION_HEADER),
        HeaderValue::from_str(&id),
    ) {
        req.headers_mut().insert(name, value);
    }

    let mut response = next.run(req).await;
    if let (Ok(name), Ok(value)) = (
        HeaderName::try_from(CORRELATION_HEADER),
        HeaderValue::from_str(&id),
    ) {
        response.headers_mut().insert(name, value);
    }
    response
}

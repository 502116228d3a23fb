//! Translates a `FilterOutcome` (the resilience chain's result type)
//! into an axum `Response`, so every handler speaks one vocabulary on
//! the way out.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use neuragate_core::error::GatewayError;
use neuragate_resilience::filter::{FilterOutcome, FilterResponse};

pub fn outcome_to_response(outcome: FilterOutcome) -> Response {
    match outcome {
        Ok(resp) => filter_response_to_response(resp),
        Err(e) => error_to_response(&e),
    }
}

pub fn filter_response_to_response(resp: FilterResponse) -> Response {
    let mut builder = Response::builder().status(resp.status);
    for (name, value) in resp.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::from_str(&value),
        ) {
            builder = builder.header(name, value);
        }
    }
    builder
        .body(Body::from(resp.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

pub fn error_to_response(e: &GatewayError) -> Response {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        e.to_json_body(),
    )
        .into_response()
}

pub fn not_found() -> Response {
    error_to_response(&GatewayError::RouteNotFound("no route matched this request".into()))
}

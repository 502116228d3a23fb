use thiserror::Error;

/// Unified error type for NeuraGate.
///
/// Every surfaced failure — from the route store, the compiler, a
/// filter, or an admin handler — renders through `status_code()` /
/// `to_json_body()` so clients and log readers see one error shape.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("route not found: {0}")]
    RouteNotFound(String),

    #[error("invalid route definition: {0}")]
    Config(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("rate limited")]
    RateLimited,

    #[error("circuit breaker open: {0}")]
    BreakerOpen(String),

    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    RetryExhausted { attempts: usize, last: String },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream returned {status}")]
    UpstreamStatus { status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Map to the HTTP status code a client should see for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::RouteNotFound(_) => 404,
            GatewayError::Config(_) => 400,
            GatewayError::StoreUnavailable(_) => 503,
            GatewayError::RateLimited => 429,
            GatewayError::BreakerOpen(_) => 503,
            GatewayError::RetryExhausted { .. } => 502,
            GatewayError::UpstreamUnavailable(_) => 502,
            GatewayError::UpstreamStatus { status } => *status,
            GatewayError::Io(_) => 500,
            GatewayError::Serde(_) => 500,
            GatewayError::Internal(_) => 500,
        }
    }

    /// A forward-compatible `{error, status}` JSON body.
    pub fn to_json_body(&self) -> Vec<u8> {
        let status = self.status_code();
        let msg = self.to_string();
        serde_json::json!({ "error": msg, "status": status })
            .to_string()
            .into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(GatewayError::RouteNotFound("x".into()).status_code(), 404);
        assert_eq!(GatewayError::RateLimited.status_code(), 429);
        assert_eq!(GatewayError::BreakerOpen("b".into()).status_code(), 503);
        assert_eq!(
            GatewayError::RetryExhausted {
                attempts: 3,
                last: "boom".into()
            }
            .status_code(),
            502
        );
        assert_eq!(GatewayError::UpstreamStatus { status: 418 }.status_code(), 418);
    }

    #[test]
    fn json_body_is_valid_and_forward_compatible() {
        let err = GatewayError::RateLimited;
        let body = err.to_json_body();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], 429);
        assert!(parsed["error"].as_str().unwrap().contains("rate limited"));
    }
}

//! Proxy engine (C8): the terminal `ProxySink` of every filter chain.
//! Builds the upstream URL by joining the route's `uri` with the
//! request path, strips hop-by-hop headers, and applies a connect
//! timeout and a read timeout over a pooled `reqwest::Client`.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, StatusCode};
use neuragate_core::error::GatewayError;
use neuragate_resilience::filter::{FilterContext, FilterOutcome, FilterResponse, ProxySink};
use std::time::Duration;

/// Headers that must never be forwarded verbatim to the upstream —
/// either because they describe this hop specifically (`Host`,
/// `Connection`) or because RFC 7230 §6.1 marks them hop-by-hop.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

pub struct HttpProxySink {
    client: reqwest::Client,
    read_timeout: Duration,
}

impl HttpProxySink {
    pub fn new(connect_timeout: Duration, read_timeout: Duration, pool_idle_per_host: usize) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(pool_idle_per_host)
            .build()
            .expect("reqwest client config is always valid");
        Self {
            client,
            read_timeout,
        }
    }

    fn upstream_url(&self, base: &str, path: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    fn forwardable_headers(&self, headers: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers.iter() {
            if HOP_BY_HOP.contains(&name.as_str()) {
                continue;
            }
            out.append(name.clone(), value.clone());
        }
        out
    }
}

#[async_trait]
impl ProxySink for HttpProxySink {
    async fn call(&self, ctx: &mut FilterContext) -> FilterOutcome {
        let url = self.upstream_url(&ctx.route.definition.uri, &ctx.path);
        let method = reqwest::Method::from_bytes(ctx.method.as_str().as_bytes())
            .map_err(|e| GatewayError::Internal(format!("invalid method: {e}")))?;
        let headers = self.forwardable_headers(&ctx.headers);

        let request = self
            .client
            .request(method, &url)
            .headers(headers)
            .timeout(self.read_timeout)
            .body(ctx.body.clone());

        match request.send().await {
            Ok(resp) => {
                let status = StatusCode::from_u16(resp.status().as_u16())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                let mut out_headers = Vec::new();
                for (name, value) in resp.headers().iter() {
                    if HOP_BY_HOP.contains(&name.as_str()) {
                        continue;
                    }
                    if let Ok(v) = value.to_str() {
                        out_headers.push((name.as_str().to_string(), v.to_string()));
                    }
                }
                let body = resp
                    .bytes()
                    .await
                    .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;
                Ok(FilterResponse {
                    status,
                    headers: out_headers,
                    body: Bytes::from(body),
                })
            }
            Err(e) => Err(GatewayError::UpstreamUnavailable(e.to_string())),
        }
    }
}

/// Header name helper used by the correlation filter (server crate) to
/// avoid re-deriving the hop-by-hop set there.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_base_and_path_without_double_slash() {
        let sink = HttpProxySink::new(Duration::from_secs(1), Duration::from_secs(1), 8);
        assert_eq!(
            sink.upstream_url("http://u:9001", "/inventory/1"),
            "http://u:9001/inventory/1"
        );
        assert_eq!(
            sink.upstream_url("http://u:9001/", "/inventory/1"),
            "http://u:9001/inventory/1"
        );
    }

    #[test]
    fn strips_hop_by_hop_headers() {
        let sink = HttpProxySink::new(Duration::from_secs(1), Duration::from_secs(1), 8);
        let mut headers = HeaderMap::new();
        headers.insert("connection", "keep-alive".parse().unwrap());
        headers.insert("host", "client.example".parse().unwrap());
        headers.insert("x-correlation-id", "abc".parse().unwrap());
        let filtered = sink.forwardable_headers(&headers);
        assert!(!filtered.contains_key("connection"));
        assert!(!filtered.contains_key("host"));
        assert!(filtered.contains_key("x-correlation-id"));
    }
}

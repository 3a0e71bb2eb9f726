// ===============================
// src/gateway.rs (CoinDCX REST)
// ===============================
use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;
use tracing::{error, info};

use crate::error::ApiError;
use crate::metrics::UPSTREAM_LATENCY;

pub const BALANCES_PATH: &str = "/exchange/v1/users/balances";
pub const TICKER_PATH: &str = "/exchange/ticker";
pub const ORDER_CREATE_PATH: &str = "/exchange/v1/orders/create";

pub const HDR_API_KEY: &str = "X-AUTH-APIKEY";
pub const HDR_SIGNATURE: &str = "X-AUTH-SIGNATURE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub api_key: String,
    pub signature: String,
}

/// One outbound call. `body` is sent byte-for-byte as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path: &'static str,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<String>,
    pub auth: Option<AuthHeaders>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    /// Non-2xx -> `ApiError::Upstream` carrying the body; 2xx must be JSON.
    pub fn into_json(self) -> Result<Value, ApiError> {
        if !(200..300).contains(&self.status) {
            return Err(ApiError::Upstream {
                status: self.status,
                body: self.body,
            });
        }
        serde_json::from_str(&self.body).map_err(|e| ApiError::Malformed(e.to_string()))
    }
}

/// The only place that does network I/O. No retries.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn call(&self, req: UpstreamRequest) -> Result<UpstreamResponse, ApiError>;
}

pub struct HttpUpstream {
    http: reqwest::Client,
    rest_base: String,
}

impl HttpUpstream {
    pub fn new(rest_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            rest_base: rest_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn call(&self, req: UpstreamRequest) -> Result<UpstreamResponse, ApiError> {
        let url = format!("{}{}", self.rest_base, req.path);
        let mut builder = match req.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        };
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(auth) = &req.auth {
            builder = builder
                .header(HDR_API_KEY, &auth.api_key)
                .header(HDR_SIGNATURE, &auth.signature);
        }
        if let Some(body) = req.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let started = Instant::now();
        let rsp = builder.send().await.map_err(|e| {
            error!(?e, method = req.method.as_str(), path = req.path, "upstream send err");
            ApiError::Network(e.to_string())
        })?;
        let status = rsp.status().as_u16();
        let body = rsp.text().await.map_err(|e| {
            error!(?e, path = req.path, "upstream body read err");
            ApiError::Network(e.to_string())
        })?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        UPSTREAM_LATENCY.observe(elapsed_ms);
        info!(method = req.method.as_str(), path = req.path, status, elapsed_ms, "upstream call");
        Ok(UpstreamResponse { status, body })
    }
}

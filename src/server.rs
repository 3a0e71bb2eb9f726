// ===============================
// src/server.rs
// ===============================
//
// Caller-facing HTTP surface (hyper 0.14):
//   GET  /api/balance   -> BTC balance record
//   GET  /api/price     -> BTCINR ticker record
//   POST <order route>  -> upstream order result
//   GET  /health, GET /metrics, OPTIONS * (CORS preflight)
//
// Known path + wrong method -> 405, unknown path -> 404, both as envelopes.
//
use hyper::body::HttpBody;
use hyper::header::{HeaderValue, ALLOW, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::net::TcpListener;
use std::sync::Arc;

use crate::error::{translate, ApiError, ErrorEnvelope, Operation};
use crate::gateway::Upstream;
use crate::metrics::{encode_metrics, REQUESTS};
use crate::payload::OrderRequest;
use crate::proxy::Proxy;

/// Order bodies are tiny; anything past this is refused before parsing.
pub const MAX_ORDER_BODY: usize = 64 * 1024;

const GET_ROUTES: [&str; 4] = ["/health", "/metrics", "/api/balance", "/api/price"];

pub struct AppState<U> {
    pub proxy: Proxy<U>,
    pub order_route: String,
}

fn json_text_response(status: StatusCode, body: String) -> Response<Body> {
    let mut rsp = Response::new(Body::from(body));
    *rsp.status_mut() = status;
    rsp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    rsp
}

fn json_response(status: StatusCode, body: &Value) -> Response<Body> {
    json_text_response(status, body.to_string())
}

fn envelope_response(status: StatusCode, env: &ErrorEnvelope) -> Response<Body> {
    json_text_response(status, env.to_body())
}

/// Methods served on `path`, or None when nothing is routed there.
fn allowed_methods(path: &str, order_route: &str) -> Option<&'static str> {
    let get = GET_ROUTES.contains(&path);
    let post = path == order_route;
    match (get, post) {
        (true, true) => Some("GET, POST, OPTIONS"),
        (true, false) => Some("GET, OPTIONS"),
        (false, true) => Some("POST, OPTIONS"),
        (false, false) => None,
    }
}

fn unrouted(method: &Method, path: &str, order_route: &str) -> Response<Body> {
    match allowed_methods(path, order_route) {
        Some(allow) => {
            let env = ErrorEnvelope::text("Method not allowed", &format!("{method} {path}"));
            let mut rsp = envelope_response(StatusCode::METHOD_NOT_ALLOWED, &env);
            rsp.headers_mut().insert(ALLOW, HeaderValue::from_static(allow));
            rsp
        }
        None => envelope_response(StatusCode::NOT_FOUND, &ErrorEnvelope::text("Not found", path)),
    }
}

fn respond(op: Operation, result: Result<Value, ApiError>) -> Response<Body> {
    match result {
        Ok(record) => json_response(StatusCode::OK, &record),
        Err(e) => {
            let (status, env) = translate(op, &e);
            envelope_response(status, &env)
        }
    }
}

fn with_cors(mut rsp: Response<Body>) -> Response<Body> {
    let h = rsp.headers_mut();
    h.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    h.insert("Access-Control-Allow-Methods", HeaderValue::from_static("GET, POST, OPTIONS"));
    h.insert("Access-Control-Allow-Headers", HeaderValue::from_static("Content-Type"));
    rsp
}

fn metrics_response() -> Response<Body> {
    let mut rsp = Response::new(Body::from(encode_metrics()));
    rsp.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    rsp
}

async fn read_order(req: Request<Body>) -> Result<OrderRequest, ApiError> {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.map_or(false, |n| n > MAX_ORDER_BODY as u64) {
        return Err(ApiError::BodyTooLarge { limit: MAX_ORDER_BODY });
    }

    // jangan percaya Content-Length saja: chunked body tetap dibatasi di sini
    let mut body = req.into_body();
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| ApiError::Validation(format!("unreadable request body: {e}")))?;
        if bytes.len() + chunk.len() > MAX_ORDER_BODY {
            return Err(ApiError::BodyTooLarge { limit: MAX_ORDER_BODY });
        }
        bytes.extend_from_slice(&chunk);
    }

    // body kosong -> semua field hilang, biar validasi yang melapor
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(OrderRequest::default());
    }
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Validation(format!("invalid JSON body: {e}")))
}

pub async fn handle<U: Upstream>(state: Arc<AppState<U>>, req: Request<Body>) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let (route, rsp) = match (&method, path.as_str()) {
        (&Method::OPTIONS, _) => {
            let mut rsp = Response::new(Body::empty());
            *rsp.status_mut() = StatusCode::NO_CONTENT;
            ("preflight", rsp)
        }
        (&Method::GET, "/health") => ("/health", json_response(StatusCode::OK, &json!({ "status": "ok" }))),
        (&Method::GET, "/metrics") => ("/metrics", metrics_response()),
        (&Method::GET, "/api/balance") => ("/api/balance", respond(Operation::Balance, state.proxy.balance().await)),
        (&Method::GET, "/api/price") => ("/api/price", respond(Operation::Price, state.proxy.price().await)),
        (&Method::POST, p) if p == state.order_route => {
            let result = match read_order(req).await {
                Ok(order) => state.proxy.place_order(order).await,
                Err(e) => Err(e),
            };
            ("order", respond(Operation::Order, result))
        }
        (m, p) => {
            let rsp = unrouted(m, p, &state.order_route);
            let route = if rsp.status() == StatusCode::METHOD_NOT_ALLOWED { "bad_method" } else { "other" };
            (route, rsp)
        }
    };

    REQUESTS
        .with_label_values(&[route, rsp.status().as_str()])
        .inc();
    tracing::debug!(%method, %path, status = rsp.status().as_u16(), "request done");
    with_cors(rsp)
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve<U, F>(listener: TcpListener, state: Arc<AppState<U>>, shutdown: F) -> Result<(), hyper::Error>
where
    U: Upstream + 'static,
    F: Future<Output = ()>,
{
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(handle(state, req).await) }
            }))
        }
    });

    Server::from_tcp(listener)?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown)
        .await
}

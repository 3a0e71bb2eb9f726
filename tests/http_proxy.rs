// End-to-end: hyper proxy -> reqwest -> fake CoinDCX that checks signatures.
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::TcpListener;
use std::sync::Arc;

use coindcx_proxy::config::Credentials;
use coindcx_proxy::gateway::HttpUpstream;
use coindcx_proxy::proxy::Proxy;
use coindcx_proxy::server::{self, AppState};
use coindcx_proxy::signer::Signer;

const API_KEY: &str = "test-api-key";
const SECRET: &str = "test-secret";
const BAD_SIG: &str = r#"{"code":401,"message":"Invalid signature","status":"error"}"#;

fn reply(status: StatusCode, body: &str) -> Response<Body> {
    let mut rsp = Response::new(Body::from(body.to_string()));
    *rsp.status_mut() = status;
    rsp
}

async fn fake_exchange(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let signer = Signer::new(SECRET).unwrap();
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let api_key = header("X-AUTH-APIKEY");
    let signature = header("X-AUTH-SIGNATURE");
    let content_type = header("content-type");
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or_default().to_string();

    let rsp = match (method, path.as_str()) {
        (Method::GET, "/exchange/ticker") => reply(
            StatusCode::OK,
            r#"[{"market":"ETHINR","last_price":"250000"},{"market":"BTCINR","last_price":"5800000.0","bid":"5799000"}]"#,
        ),
        (Method::GET, "/exchange/v1/users/balances") => {
            let ts = query.strip_prefix("timestamp=").unwrap_or_default();
            if api_key != API_KEY || signature != signer.sign(ts) {
                reply(StatusCode::UNAUTHORIZED, BAD_SIG)
            } else {
                reply(
                    StatusCode::OK,
                    r#"[{"currency":"INR","balance":"10.0"},{"currency":"BTC","balance":"0.5","locked_balance":"0"}]"#,
                )
            }
        }
        (Method::POST, "/exchange/v1/orders/create") => {
            let bytes = hyper::body::to_bytes(req.into_body()).await.unwrap_or_default();
            let body = String::from_utf8_lossy(&bytes).to_string();
            let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            if api_key != API_KEY || signature != signer.sign(&body) {
                reply(StatusCode::UNAUTHORIZED, BAD_SIG)
            } else if content_type != "application/json" || !parsed["total_quantity"].is_number() {
                reply(StatusCode::UNPROCESSABLE_ENTITY, r#"{"message":"bad payload"}"#)
            } else if parsed["total_quantity"] == json!(999.0) {
                reply(
                    StatusCode::BAD_REQUEST,
                    r#"{"code":400,"message":"Insufficient funds","status":"error"}"#,
                )
            } else {
                let echo = json!({ "orders": [{ "id": "ord-1", "status": "init", "sent": parsed }] });
                reply(StatusCode::OK, &echo.to_string())
            }
        }
        _ => reply(StatusCode::NOT_FOUND, "<html>not found</html>"),
    };
    Ok(rsp)
}

fn bind_local() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("http://{addr}"))
}

fn spawn_exchange() -> String {
    let (listener, base) = bind_local();
    let make_svc = make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(fake_exchange)) });
    let server = Server::from_tcp(listener).unwrap().serve(make_svc);
    tokio::spawn(async move {
        let _ = server.await;
    });
    base
}

/// Exchange that is down for maintenance: every path answers 503 with `body`.
fn spawn_failing_exchange(body: &'static str) -> String {
    let (listener, base) = bind_local();
    let make_svc = make_service_fn(move |_conn| async move {
        Ok::<_, Infallible>(service_fn(move |_req: Request<Body>| async move {
            Ok::<_, Infallible>(reply(StatusCode::SERVICE_UNAVAILABLE, body))
        }))
    });
    let server = Server::from_tcp(listener).unwrap().serve(make_svc);
    tokio::spawn(async move {
        let _ = server.await;
    });
    base
}

fn spawn_proxy(upstream_base: &str, secret: &str) -> String {
    let creds = Credentials { api_key: API_KEY.into(), secret_key: secret.into() };
    let proxy = Proxy::new(&creds, HttpUpstream::new(upstream_base)).unwrap();
    let state = Arc::new(AppState { proxy, order_route: "/place-order".into() });
    let (listener, base) = bind_local();
    tokio::spawn(server::serve(listener, state, std::future::pending::<()>()));
    base
}

async fn get(url: &str) -> (StatusCode, Value) {
    let rsp = reqwest::get(url).await.unwrap();
    let status = StatusCode::from_u16(rsp.status().as_u16()).unwrap();
    (status, rsp.json().await.unwrap())
}

async fn post(url: &str, body: &str) -> (StatusCode, Value) {
    let rsp = reqwest::Client::new()
        .post(url)
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap();
    let status = StatusCode::from_u16(rsp.status().as_u16()).unwrap();
    (status, rsp.json().await.unwrap())
}

#[tokio::test]
async fn balance_is_signed_and_normalized() {
    let proxy = spawn_proxy(&spawn_exchange(), SECRET);
    let (status, body) = get(&format!("{proxy}/api/balance")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "currency": "BTC", "balance": "0.5", "locked_balance": "0" }));
}

#[tokio::test]
async fn wrong_secret_surfaces_upstream_body_verbatim() {
    let proxy = spawn_proxy(&spawn_exchange(), "not-the-secret");
    let (status, body) = get(&format!("{proxy}/api/balance")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!("Failed to fetch BTC balance"));
    assert_eq!(body["details"], serde_json::from_str::<Value>(BAD_SIG).unwrap());
}

#[tokio::test]
async fn price_picks_btcinr() {
    let proxy = spawn_proxy(&spawn_exchange(), SECRET);
    let (status, body) = get(&format!("{proxy}/api/price")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "market": "BTCINR", "last_price": "5800000.0", "bid": "5799000" }));
}

#[tokio::test]
async fn price_ok_carries_cors_header() {
    let proxy = spawn_proxy(&spawn_exchange(), SECRET);
    let rsp = reqwest::get(format!("{proxy}/api/price")).await.unwrap();
    assert_eq!(rsp.status().as_u16(), 200);
    assert_eq!(rsp.headers()["access-control-allow-origin"], "*");
    assert_eq!(rsp.headers()["content-type"], "application/json");
}

#[tokio::test]
async fn ticker_outage_details_are_byte_identical() {
    let upstream = r#"{"code": 503, "big": 123456789012345678901234567890, "e": 1e2}"#;
    let proxy = spawn_proxy(&spawn_failing_exchange(upstream), SECRET);
    let rsp = reqwest::get(format!("{proxy}/api/price")).await.unwrap();
    assert_eq!(rsp.status().as_u16(), 500);
    assert_eq!(rsp.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        rsp.text().await.unwrap(),
        format!(r#"{{"error":"Failed to fetch price","details":{upstream}}}"#)
    );
}

#[tokio::test]
async fn ticker_outage_html_page_kept_as_string() {
    let proxy = spawn_proxy(&spawn_failing_exchange("<h1>maintenance</h1>"), SECRET);
    let (status, body) = get(&format!("{proxy}/api/price")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to fetch price", "details": "<h1>maintenance</h1>" }));
}

#[tokio::test]
async fn order_with_both_quantity_spellings() {
    let proxy = spawn_proxy(&spawn_exchange(), SECRET);
    let (status, body) = post(
        &format!("{proxy}/place-order"),
        r#"{"orderType":"market_order","order_type":"limit_order","side":"buy","qty":"0.5","quantity":"2"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let sent = &body["orders"][0]["sent"];
    assert_eq!(sent["order_type"], json!("market_order"));
    assert_eq!(sent["total_quantity"], json!(0.5));
}

#[tokio::test]
async fn limit_order_goes_through_configured_route() {
    let proxy = spawn_proxy(&spawn_exchange(), SECRET);
    let (status, body) = post(
        &format!("{proxy}/place-order"),
        r#"{"orderType":"limit_order","side":"buy","quantity":"0.01","price":"5000000"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let sent = &body["orders"][0]["sent"];
    assert_eq!(sent["market"], json!("BTCINR"));
    assert_eq!(sent["total_quantity"], json!(0.01));
    assert_eq!(sent["price_per_unit"], json!(5000000.0));
    assert!(sent["client_order_id"].as_str().unwrap().starts_with("CL-"));
}

#[tokio::test]
async fn market_order_rejected_upstream_keeps_details() {
    let proxy = spawn_proxy(&spawn_exchange(), SECRET);
    let (status, body) = post(
        &format!("{proxy}/place-order"),
        r#"{"orderType":"market_order","side":"sell","qty":999,"price":"1"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({
            "error": "Trade failed",
            "details": { "code": 400, "message": "Insufficient funds", "status": "error" }
        })
    );
}

#[tokio::test]
async fn invalid_orders_are_client_errors() {
    let proxy = spawn_proxy(&spawn_exchange(), SECRET);
    let (status, body) = post(&format!("{proxy}/place-order"), r#"{"orderType":"market_order"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Invalid order request"));
    assert_eq!(body["details"], json!("missing required field(s): side, quantity"));

    let (status, body) = post(&format!("{proxy}/place-order"), "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().starts_with("invalid JSON body"));
}

#[tokio::test]
async fn unreachable_upstream_is_server_error() {
    // nothing listens on the freshly dropped port
    let (listener, dead) = bind_local();
    drop(listener);
    let proxy = spawn_proxy(&dead, SECRET);
    let (status, body) = get(&format!("{proxy}/api/price")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!("Failed to fetch price"));
    assert!(body["details"].as_str().unwrap().starts_with("upstream request failed"));
}

#[tokio::test]
async fn cors_preflight_and_unknown_routes() {
    let proxy = spawn_proxy(&spawn_exchange(), SECRET);
    let client = reqwest::Client::new();
    let rsp = client
        .request(reqwest::Method::OPTIONS, format!("{proxy}/place-order"))
        .send()
        .await
        .unwrap();
    assert_eq!(rsp.status().as_u16(), 204);
    assert_eq!(rsp.headers()["access-control-allow-origin"], "*");

    // default route is not served when another one is configured
    let (status, body) = post(&format!("{proxy}/api/order"), "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Not found", "details": "/api/order" }));

    let (status, body) = get(&format!("{proxy}/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn wrong_method_on_known_route_is_405() {
    let proxy = spawn_proxy(&spawn_exchange(), SECRET);
    let rsp = reqwest::get(format!("{proxy}/place-order")).await.unwrap();
    assert_eq!(rsp.status().as_u16(), 405);
    assert_eq!(rsp.headers()["allow"], "POST, OPTIONS");
    let body: Value = rsp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Method not allowed", "details": "GET /place-order" }));

    let (status, body) = post(&format!("{proxy}/api/balance"), "{}").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({ "error": "Method not allowed", "details": "POST /api/balance" }));
}

// ===============================
// src/main.rs
// ===============================
/*
 # jalankan (API_KEY & SECRET_KEY wajib, boleh lewat .env)
 API_KEY=... SECRET_KEY=... cargo run --release

 curl -s localhost:5000/api/balance
 curl -s localhost:5000/api/price
 curl -s -XPOST localhost:5000/api/order -H 'content-type: application/json' \
      -d '{"orderType":"market_order","side":"buy","quantity":"0.0001"}'
 curl -s localhost:5000/metrics | grep '^upstream_calls_total'
*/
/*
=============================================================================
Project : coindcx_proxy — signing proxy for the CoinDCX REST API
Module  : main.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Keeps the CoinDCX secret server-side. Signs balance and order
          requests with HMAC-SHA256, forwards them upstream, and returns a
          single normalized record (BTC balance, BTCINR ticker) or a
          uniform {error, details} envelope.
=============================================================================
*/
use std::net::TcpListener;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use coindcx_proxy::config::{self, mask_key};
use coindcx_proxy::gateway::HttpUpstream;
use coindcx_proxy::metrics;
use coindcx_proxy::proxy::Proxy;
use coindcx_proxy::server::{self, AppState};

#[tokio::main]
async fn main() {
    // ---- Logging ----
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        error!(error = %e, "fatal");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // ---- Load config (missing credentials = refuse to start) ----
    let cfg = config::load()?;

    // ---- Metrics ----
    metrics::init();
    metrics::CONFIG_UPSTREAM.with_label_values(&[cfg.base_url.as_str()]).set(1);

    info!(
        listen = %cfg.listen,
        upstream = %cfg.base_url,
        order_route = %cfg.order_route,
        api_key = %mask_key(&cfg.credentials.api_key),
        "startup config"
    );

    let proxy = Proxy::new(&cfg.credentials, HttpUpstream::new(&cfg.base_url))?;
    let state = Arc::new(AppState { proxy, order_route: cfg.order_route.clone() });

    let listener = TcpListener::bind(cfg.listen)?;
    listener.set_nonblocking(true)?;
    info!("CoinDCX proxy listening on http://{}", cfg.listen);

    server::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    })
    .await?;
    Ok(())
}

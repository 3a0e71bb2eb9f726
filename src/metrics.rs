// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Caller-facing --------
pub static REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("proxy_requests_total", "caller requests (labels: route, status)"),
        &["route", "status"],
    )
    .unwrap()
});

pub static ORDERS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orders_rejected_total", "orders rejected before signing"),
        &["reason"],
    )
    .unwrap()
});

// -------- Upstream (CoinDCX) --------
pub static UPSTREAM_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("upstream_calls_total", "upstream calls by endpoint & outcome"),
        &["endpoint", "outcome"],
    )
    .unwrap()
});

pub static UPSTREAM_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("upstream_latency_ms", "Upstream round-trip latency (ms)")
            .buckets(vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]),
    )
    .unwrap()
});

// ---- Config visibility ----
pub static CONFIG_UPSTREAM: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_upstream", "configured upstream base url (label: base_url)"),
        &["base_url"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry; a second init() is a no-op
    for m in [
        REGISTRY.register(Box::new(REQUESTS.clone())),
        REGISTRY.register(Box::new(ORDERS_REJECTED.clone())),
        REGISTRY.register(Box::new(UPSTREAM_CALLS.clone())),
        REGISTRY.register(Box::new(UPSTREAM_LATENCY.clone())),
        REGISTRY.register(Box::new(CONFIG_UPSTREAM.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

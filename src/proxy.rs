// ===============================
// src/proxy.rs
// ===============================
//
// Core flow per caller request:
//   intent -> PayloadBuilder -> Signer -> Upstream -> normalize | ApiError
//
// The only shared state is the immutable key material; every call builds,
// signs and sends its own payload exactly once.
//
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::Credentials;
use crate::error::{ApiError, ConfigError};
use crate::gateway::{
    AuthHeaders, Method, Upstream, UpstreamRequest, BALANCES_PATH, ORDER_CREATE_PATH, TICKER_PATH,
};
use crate::metrics::{ORDERS_REJECTED, UPSTREAM_CALLS};
use crate::normalize;
use crate::payload::{build_order_payload, OrderIntent, OrderRequest, Payload};
use crate::signer::{timestamp_ms, Signer};

pub struct Proxy<U> {
    upstream: U,
    api_key: String,
    signer: Signer,
}

impl<U: Upstream> Proxy<U> {
    pub fn new(credentials: &Credentials, upstream: U) -> Result<Self, ConfigError> {
        if credentials.api_key.is_empty() {
            return Err(ConfigError::Missing("API_KEY"));
        }
        Ok(Self {
            upstream,
            api_key: credentials.api_key.clone(),
            signer: Signer::new(&credentials.secret_key)?,
        })
    }

    fn auth(&self, signature: String) -> AuthHeaders {
        AuthHeaders { api_key: self.api_key.clone(), signature }
    }

    /// BTC balance; `{currency:"BTC", balance:0}` when the account has none.
    pub async fn balance(&self) -> Result<Value, ApiError> {
        self.balance_at(timestamp_ms()).await
    }

    pub async fn balance_at(&self, timestamp: u64) -> Result<Value, ApiError> {
        let signed = self.signer.sign_payload(&Payload::Timestamp(timestamp));
        // query timestamp dan pesan yang ditandatangani harus string yang sama
        let req = UpstreamRequest {
            method: Method::Get,
            path: BALANCES_PATH,
            query: vec![("timestamp", signed.message)],
            body: None,
            auth: Some(self.auth(signed.signature)),
        };
        let balances = self.dispatch("balances", req).await?;
        normalize::btc_balance(balances)
    }

    /// BTCINR ticker; public endpoint, nothing to sign.
    pub async fn price(&self) -> Result<Value, ApiError> {
        let req = UpstreamRequest {
            method: Method::Get,
            path: TICKER_PATH,
            query: Vec::new(),
            body: None,
            auth: None,
        };
        let tickers = self.dispatch("ticker", req).await?;
        normalize::btcinr_ticker(tickers)
    }

    pub async fn place_order(&self, order: OrderRequest) -> Result<Value, ApiError> {
        self.place_order_at(order, timestamp_ms()).await
    }

    pub async fn place_order_at(&self, order: OrderRequest, timestamp: u64) -> Result<Value, ApiError> {
        let intent = OrderIntent::from_request(order).map_err(|e| {
            warn!(error = %e, "order rejected before signing");
            ORDERS_REJECTED.with_label_values(&["validation"]).inc();
            e
        })?;

        let payload = build_order_payload(&intent, timestamp);
        let signed = self.signer.sign_payload(&payload);
        info!(
            market = %intent.market,
            side = intent.side.as_str(),
            order_type = intent.order_type.as_str(),
            quantity = intent.quantity,
            price = ?intent.price,
            "order signed, sending"
        );

        let req = UpstreamRequest {
            method: Method::Post,
            path: ORDER_CREATE_PATH,
            query: Vec::new(),
            body: Some(signed.message),
            auth: Some(self.auth(signed.signature)),
        };
        let result = self.dispatch("orders_create", req).await?;
        Ok(normalize::order_result(result))
    }

    async fn dispatch(&self, endpoint: &'static str, req: UpstreamRequest) -> Result<Value, ApiError> {
        let result = match self.upstream.call(req).await {
            Ok(rsp) => rsp.into_json(),
            Err(e) => Err(e),
        };
        match &result {
            Ok(_) => UPSTREAM_CALLS.with_label_values(&[endpoint, "ok"]).inc(),
            Err(e) => {
                error!(endpoint, kind = e.kind(), error = %e, "upstream failure");
                UPSTREAM_CALLS.with_label_values(&[endpoint, e.kind()]).inc();
            }
        }
        result
    }
}

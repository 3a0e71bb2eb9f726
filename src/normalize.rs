// ===============================
// src/normalize.rs
// ===============================
use serde_json::{json, Value};

use crate::error::ApiError;

pub const TARGET_CURRENCY: &str = "BTC";
pub const TARGET_MARKET: &str = "BTCINR";

/// First record in `collection` whose `key` equals `target`, else `default`.
pub fn pick_record(collection: Value, key: &str, target: &str, default: Value) -> Result<Value, ApiError> {
    let Value::Array(records) = collection else {
        return Err(ApiError::Malformed(format!("expected an array of records keyed by {key:?}")));
    };
    Ok(records
        .into_iter()
        .find(|r| r.get(key).and_then(Value::as_str) == Some(target))
        .unwrap_or(default))
}

pub fn btc_balance(balances: Value) -> Result<Value, ApiError> {
    pick_record(
        balances,
        "currency",
        TARGET_CURRENCY,
        json!({ "currency": TARGET_CURRENCY, "balance": 0 }),
    )
}

pub fn btcinr_ticker(tickers: Value) -> Result<Value, ApiError> {
    pick_record(
        tickers,
        "market",
        TARGET_MARKET,
        json!({ "market": TARGET_MARKET, "last_price": 0 }),
    )
}

/// Order creation result is the exchange's to judge; pass it through.
pub fn order_result(result: Value) -> Value {
    result
}

// ===============================
// src/payload.rs
// ===============================
//
// PayloadBuilder: turns caller intent into the exact upstream body.
//
// Order payload is assembled in three phases, always in this order:
//   1) required fields
//   2) optional fields under their predicates (price only for limit_order)
//   3) strip anything left unset (null)
// Key order in the serialized JSON = insertion order (serde_json preserve_order).
//
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::ApiError;

pub const DEFAULT_MARKET: &str = "BTCINR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(Side::Buy),
            "sell" => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    MarketOrder,
    LimitOrder,
}

impl OrderType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market_order" => Some(OrderType::MarketOrder),
            "limit_order" => Some(OrderType::LimitOrder),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::MarketOrder => "market_order",
            OrderType::LimitOrder => "limit_order",
        }
    }
}

/// Raw order body as sent by the caller. Numbers may arrive as strings.
///
/// Both spellings of a field may be present in one body; `from_request`
/// picks `qty` over `quantity`, camelCase over snake_case.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default, rename = "orderType")]
    pub order_type_camel: Option<String>,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub qty: Option<Value>,
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default, rename = "clientOrderId")]
    pub client_order_id_camel: Option<String>,
    #[serde(default)]
    pub client_order_id: Option<String>,
}

/// Validated order. `price` is `Some` iff `order_type` is `LimitOrder`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub market: String,
    pub order_type: OrderType,
    pub side: Side,
    pub quantity: f64,
    pub price: Option<f64>,
    pub client_order_id: Option<String>,
}

/// What gets signed: either the bare timestamp (balance) or a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Timestamp(u64),
    Json(Map<String, Value>),
}

impl Payload {
    /// The exact byte sequence that is signed and transmitted.
    pub fn canonical(&self) -> String {
        match self {
            Payload::Timestamp(ts) => ts.to_string(),
            Payload::Json(map) => Value::Object(map.clone()).to_string(),
        }
    }
}

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Explicit, fallible numeric coercion. Never lets NaN/inf/<=0 through.
pub fn parse_amount(field: &str, raw: &Value) -> Result<f64, ApiError> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(x) if x.is_finite() && x > 0.0 => Ok(x),
        Some(_) => Err(ApiError::Validation(format!("{field} must be a positive number"))),
        None => Err(ApiError::Validation(format!("{field} must be numeric, got {raw}"))),
    }
}

impl OrderIntent {
    pub fn from_request(req: OrderRequest) -> Result<Self, ApiError> {
        let side = present(&req.side);
        let order_type = present(&req.order_type_camel).or_else(|| present(&req.order_type));
        let quantity = req
            .qty
            .as_ref()
            .filter(|v| !v.is_null())
            .or_else(|| req.quantity.as_ref().filter(|v| !v.is_null()));

        let mut missing = Vec::new();
        if side.is_none() {
            missing.push("side");
        }
        if order_type.is_none() {
            missing.push("orderType");
        }
        if quantity.is_none() {
            missing.push("quantity");
        }
        let (Some(side), Some(order_type), Some(quantity)) = (side, order_type, quantity) else {
            return Err(ApiError::Validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        };

        let side = Side::parse(side)
            .ok_or_else(|| ApiError::Validation(format!("side must be buy or sell, got {side:?}")))?;
        let order_type = OrderType::parse(order_type).ok_or_else(|| {
            ApiError::Validation(format!(
                "orderType must be market_order or limit_order, got {order_type:?}"
            ))
        })?;
        let quantity = parse_amount("quantity", quantity)?;

        // harga hanya relevan untuk limit_order; untuk market_order diabaikan
        let price = match order_type {
            OrderType::LimitOrder => match req.price.as_ref().filter(|v| !v.is_null()) {
                Some(raw) => Some(parse_amount("price", raw)?),
                None => {
                    return Err(ApiError::Validation("price is required for limit_order".into()))
                }
            },
            OrderType::MarketOrder => None,
        };

        Ok(Self {
            market: present(&req.market).unwrap_or(DEFAULT_MARKET).to_string(),
            order_type,
            side,
            quantity,
            price,
            client_order_id: present(&req.client_order_id_camel)
                .or_else(|| present(&req.client_order_id))
                .map(str::to_string),
        })
    }
}

/// Client order id derived from the request timestamp, random suffix keeps it
/// unique across concurrent requests in the same millisecond.
pub fn generate_client_order_id(timestamp: u64) -> String {
    format!("CL-{}-{:08x}", timestamp, rand::thread_rng().gen::<u32>())
}

pub fn build_order_payload(intent: &OrderIntent, timestamp: u64) -> Payload {
    // 1) field wajib
    let mut body = Map::new();
    body.insert("side".into(), json!(intent.side.as_str()));
    body.insert("order_type".into(), json!(intent.order_type.as_str()));
    body.insert("market".into(), json!(intent.market));
    body.insert("total_quantity".into(), json!(intent.quantity));

    // 2) field opsional
    if intent.order_type == OrderType::LimitOrder {
        body.insert("price_per_unit".into(), json!(intent.price));
    }
    body.insert("timestamp".into(), json!(timestamp));
    let client_order_id = intent
        .client_order_id
        .clone()
        .unwrap_or_else(|| generate_client_order_id(timestamp));
    body.insert("client_order_id".into(), json!(client_order_id));

    // 3) buang field yang tidak ter-set
    body.retain(|_, v| !v.is_null());
    Payload::Json(body)
}

// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : coindcx_proxy — signing proxy for the CoinDCX REST API
Module  : config.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Keeps the CoinDCX secret server-side. Signs balance and order
          requests with HMAC-SHA256, forwards them upstream, and returns a
          single normalized record (BTC balance, BTCINR ticker) or a
          uniform {error, details} envelope.
=============================================================================
*/
use clap::Parser;
use dotenvy::dotenv;
use std::fmt;
use std::net::SocketAddr;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://api.coindcx.com";

/// Semua setting bisa lewat flag atau ENV (.env ikut dibaca).
#[derive(Parser, Debug, Clone)]
#[command(name = "coindcx_proxy", version, about = "Signing proxy for the CoinDCX REST API")]
pub struct Cli {
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    #[arg(long, env = "COINDCX_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Route name is deployment detail, not contract (/api/order, /place-order, ...)
    #[arg(long, env = "ORDER_ROUTE", default_value = "/api/order")]
    pub order_route: String,
}

#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &mask_key(&self.api_key))
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Last four characters only, for logs.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

#[derive(Clone, Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub listen: SocketAddr,
    pub base_url: String,
    pub order_route: String,
}

fn required(v: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    v.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(ConfigError::Missing(name))
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let credentials = Credentials {
            api_key: required(cli.api_key, "API_KEY")?,
            secret_key: required(cli.secret_key, "SECRET_KEY")?,
        };

        let url = Url::parse(cli.base_url.trim()).map_err(|e| ConfigError::BaseUrl {
            url: cli.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::BaseUrl {
                url: cli.base_url.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        let base_url = url.as_str().trim_end_matches('/').to_string();

        let order_route = cli.order_route.trim().to_string();
        if !order_route.starts_with('/') {
            return Err(ConfigError::OrderRoute(order_route));
        }

        let addr = format!("{}:{}", cli.bind_addr.trim(), cli.port);
        let listen = addr.parse().map_err(|_| ConfigError::ListenAddr(addr.clone()))?;

        Ok(Self { credentials, listen, base_url, order_route })
    }
}

pub fn load() -> Result<Config, ConfigError> {
    // Pastikan .env dibaca sebelum clap membaca ENV
    let _ = dotenv();
    Config::from_cli(Cli::parse())
}

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::domain::{Symbol, TradingType};
use crate::error::VisionError;
use crate::vision::send_with_retries;

pub trait ExchangeClient: Send + Sync {
    fn symbols(&self, trading_type: TradingType) -> Result<Vec<Symbol>, VisionError>;
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Deserialize)]
struct ExchangeSymbol {
    symbol: String,
}

#[derive(Clone)]
pub struct ExchangeHttpClient {
    client: Client,
}

impl ExchangeHttpClient {
    pub fn new() -> Result<Self, VisionError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("vision-trades/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| VisionError::ExchangeHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| VisionError::ExchangeHttp(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn exchange_info_url(trading_type: TradingType) -> &'static str {
        match trading_type {
            TradingType::Spot => "https://api.binance.com/api/v3/exchangeInfo",
            TradingType::Um => "https://fapi.binance.com/fapi/v1/exchangeInfo",
            TradingType::Cm => "https://dapi.binance.com/dapi/v1/exchangeInfo",
        }
    }
}

impl ExchangeClient for ExchangeHttpClient {
    fn symbols(&self, trading_type: TradingType) -> Result<Vec<Symbol>, VisionError> {
        let url = Self::exchange_info_url(trading_type);
        let response = send_with_retries(|| self.client.get(url), VisionError::ExchangeHttp)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "exchange info request failed".to_string());
            return Err(VisionError::ExchangeStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| VisionError::ExchangeHttp(err.to_string()))?;
        parse_exchange_info(&body)
    }
}

pub fn parse_exchange_info(body: &str) -> Result<Vec<Symbol>, VisionError> {
    let info: ExchangeInfo =
        serde_json::from_str(body).map_err(|err| VisionError::ExchangeHttp(err.to_string()))?;
    info.symbols
        .into_iter()
        .map(|entry| entry.symbol.parse())
        .collect()
}

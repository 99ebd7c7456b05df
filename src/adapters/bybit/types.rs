//! Bybit v5 wire types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{OrderRequest, OrderType, Side};
use crate::ports::exchange::{Candle, CoinBalance, ExchangeError};

/// Envelope every v5 endpoint answers with.
///
/// `result` is kept untyped until `ret_code` says it is meaningful: error
/// responses carry an empty object there.
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    #[serde(rename = "retCode")]
    pub ret_code: i64,
    #[serde(rename = "retMsg")]
    pub ret_msg: String,
    #[serde(default)]
    pub result: serde_json::Value,
}

impl ApiResponse {
    /// Typed result, or the exchange's rejection
    pub fn into_result<T: for<'de> Deserialize<'de>>(self) -> Result<T, ExchangeError> {
        if self.ret_code != 0 {
            return Err(ExchangeError::Rejected {
                code: self.ret_code,
                message: self.ret_msg,
            });
        }
        Ok(serde_json::from_value(self.result)?)
    }
}

/// Body of `POST /v5/order/create`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub category: &'static str,
    pub symbol: String,
    pub side: &'static str,
    pub order_type: &'static str,
    pub qty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub time_in_force: &'static str,
    /// Unit of `qty` for spot market orders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_unit: Option<&'static str>,
}

impl CreateOrderBody {
    pub fn spot(request: &OrderRequest) -> Self {
        let market_unit = match (request.order_type, request.side) {
            (OrderType::Market, Side::Buy) => Some("quoteCoin"),
            (OrderType::Market, Side::Sell) => Some("baseCoin"),
            (OrderType::Limit, _) => None,
        };

        Self {
            category: "spot",
            symbol: request.instrument.symbol(),
            side: request.side.as_str(),
            order_type: request.order_type.as_str(),
            qty: request.quantity.to_string(),
            price: request.price.map(|p| p.to_string()),
            time_in_force: request.time_in_force.as_str(),
            market_unit,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderResult {
    #[serde(rename = "orderId")]
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WalletBalanceResult {
    pub list: Vec<WalletAccount>,
}

#[derive(Debug, Deserialize)]
pub struct WalletAccount {
    #[serde(default)]
    pub coin: Vec<WalletCoin>,
}

#[derive(Debug, Deserialize)]
pub struct WalletCoin {
    pub coin: String,
    #[serde(rename = "walletBalance", default)]
    pub wallet_balance: String,
}

impl WalletBalanceResult {
    /// Flatten accounts into coin balances; blank balances read as zero.
    pub fn into_balances(self) -> Result<Vec<CoinBalance>, ExchangeError> {
        self.list
            .into_iter()
            .flat_map(|account| account.coin)
            .map(|c| {
                let wallet_balance = if c.wallet_balance.trim().is_empty() {
                    Decimal::ZERO
                } else {
                    c.wallet_balance.trim().parse().map_err(|_| {
                        ExchangeError::Parse(format!(
                            "invalid walletBalance {:?} for {}",
                            c.wallet_balance, c.coin
                        ))
                    })?
                };
                Ok(CoinBalance {
                    coin: c.coin,
                    wallet_balance,
                })
            })
            .collect()
    }
}

/// `GET /v5/market/kline` result. Rows are
/// `[startTime, open, high, low, close, volume, turnover]`.
#[derive(Debug, Deserialize)]
pub struct KlineResult {
    #[serde(default)]
    pub list: Vec<Vec<String>>,
}

impl KlineResult {
    pub fn into_candles(self) -> Result<Vec<Candle>, ExchangeError> {
        self.list
            .into_iter()
            .map(|row| {
                if row.len() < 6 {
                    return Err(ExchangeError::Parse(format!("short kline row: {:?}", row)));
                }
                let start_ms = row[0]
                    .parse()
                    .map_err(|_| ExchangeError::Parse(format!("invalid kline start: {}", row[0])))?;
                let mut fields = row.into_iter().skip(1);
                let mut next = || fields.next().unwrap_or_default();
                Ok(Candle {
                    start_ms,
                    open: next(),
                    high: next(),
                    low: next(),
                    close: next(),
                    volume: next(),
                })
            })
            .collect()
    }
}

use serde::{Deserialize, Serialize};

/// # Stock Record
///
/// One tracked instrument. `symbol` is the stable key; `low`, `high` and
/// `current` satisfy `low <= current <= high` after every transform.
///
/// Serialized flat, so a pushed event carries
/// `{"symbol":..,"name":..,"low":..,"high":..,"current":..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    /// Ticker symbol, e.g. `"IBM"`.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Lowest price seen.
    pub low: f64,
    /// Highest price seen.
    pub high: f64,
    /// Latest price.
    pub current: f64,
}

impl StockRecord {
    /// Builds a record from its parts.
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, low: f64, high: f64, current: f64) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            low,
            high,
            current,
        }
    }

    /// `true` when `low <= current <= high`.
    pub fn is_bracketed(&self) -> bool {
        self.low <= self.current && self.current <= self.high
    }
}

/// # Price Model
///
/// The full price list, as served by the snapshot endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceModel {
    /// All tracked records, in seed order.
    pub pricelist: Vec<StockRecord>,
}

impl PriceModel {
    /// Position of the record with `symbol`, if any.
    pub fn find_stock_index(&self, symbol: &str) -> Option<usize> {
        self.pricelist.iter().position(|stock| stock.symbol == symbol)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EventId;

/// A position lifecycle, opened on entry and closed in place on exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: EventId,
    pub symbol: String,
    #[serde(with = "super::timestamp")]
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    #[serde(default, with = "super::timestamp::option", skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl_percentage: Option<f64>,
    #[serde(default)]
    pub success_flag: bool,
}

/// Payload of a `trade_update` frame. The same shape is used to open and to close
/// a trade; `trade_id` correlates the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeUpdate {
    pub trade_id: EventId,
    pub symbol: String,
    #[serde(with = "super::timestamp")]
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    #[serde(default, with = "super::timestamp::option", skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_flag: Option<bool>,
}

impl Trade {
    /// Any exit-side field marks the trade as closed, even if `exit_time` is missing.
    pub fn is_closed(&self) -> bool {
        self.exit_time.is_some()
            || self.exit_price.is_some()
            || self.pnl.is_some()
            || self.pnl_percentage.is_some()
    }

    /// Copies the exit side of `update` onto this trade. Entry fields are fixed at open.
    pub fn merge_exit(&mut self, update: &TradeUpdate) {
        if update.exit_time.is_some() {
            self.exit_time = update.exit_time;
        }
        if update.exit_price.is_some() {
            self.exit_price = update.exit_price;
        }
        if update.pnl.is_some() {
            self.pnl = update.pnl;
        }
        if update.pnl_percentage.is_some() {
            self.pnl_percentage = update.pnl_percentage;
        }
        if let Some(flag) = update.success_flag {
            self.success_flag = flag;
        }
    }
}

impl From<TradeUpdate> for Trade {
    fn from(update: TradeUpdate) -> Self {
        Self {
            trade_id: update.trade_id,
            symbol: update.symbol,
            entry_time: update.entry_time,
            entry_price: update.entry_price,
            exit_time: update.exit_time,
            exit_price: update.exit_price,
            pnl: update.pnl,
            pnl_percentage: update.pnl_percentage,
            success_flag: update.success_flag.unwrap_or(false),
        }
    }
}

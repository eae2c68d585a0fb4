use std::collections::HashMap;

use common::models::{EventId, Trade, TradeUpdate};

/// Trades keyed by `trade_id`, kept in the order they were opened. Trades are never removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeBook {
    trades: Vec<Trade>,
    index: HashMap<EventId, usize>,
}

impl TradeBook {
    /// Opens a trade for an unseen id, otherwise merges the exit fields into the
    /// existing one. Returns whether anything changed.
    pub fn upsert(&mut self, update: TradeUpdate) -> bool {
        match self.index.get(&update.trade_id) {
            Some(&pos) => {
                let trade = &mut self.trades[pos];
                let before = trade.clone();
                trade.merge_exit(&update);
                *trade != before
            }
            None => {
                self.index.insert(update.trade_id.clone(), self.trades.len());
                self.trades.push(Trade::from(update));
                true
            }
        }
    }

    pub fn get(&self, trade_id: &EventId) -> Option<&Trade> {
        self.index.get(trade_id).map(|&pos| &self.trades[pos])
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trade> {
        self.trades.iter()
    }

    pub fn open(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| !t.is_closed())
    }

    pub fn closed(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| t.is_closed())
    }
}

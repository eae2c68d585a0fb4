pub mod bounded_log;
pub mod snapshot;
pub mod state_store;
pub mod trade_book;
pub mod views;

pub use bounded_log::BoundedLog;
pub use snapshot::Snapshot;
pub use state_store::{Retention, StateStore};
pub use trade_book::TradeBook;
pub use views::{ALL_AGENTS, TradeBookView};

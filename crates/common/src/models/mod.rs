pub mod agent;
pub mod agent_log;
pub mod connection;
pub mod decision;
pub mod event;
pub mod macro_event;
pub mod signal;
pub mod timestamp;
pub mod trade;

pub use agent::{AgentName, AgentRole};
pub use agent_log::{AgentLogEntry, EventId};
pub use connection::ConnectionState;
pub use decision::Decision;
pub use event::DomainEvent;
pub use macro_event::{EventType, ForecastBias, MacroEvent};
pub use signal::{Signal, SignalType};
pub use trade::{Trade, TradeUpdate};

pub mod error;
pub mod gateway;
pub mod remote;
pub mod router;
pub mod services;

pub use error::{RequestError, RouteError};
pub use gateway::{ListenerId, SignalStream, StreamConfig, StreamStats};
pub use remote::{DashboardApi, DashboardClient};

pub mod reporter_service;

pub use reporter_service::{PanelSummary, ReporterService};

#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod export;
pub mod funnel;
pub mod identity;
pub mod tracking;
pub mod tracking_client;

pub use funnel_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ExportError, TrackingError};
pub use export::{ExportSummary, export_submissions, render_report, write_csv};
pub use funnel::{FunnelSession, FunnelStep};
pub use identity::{MemoryTabStorage, SessionIdentity, SessionMetadata, TabStorage};
pub use tracking::{TrackingService, TrackingSink};
pub use tracking_client::HttpTrackingClient;

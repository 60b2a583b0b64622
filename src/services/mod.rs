mod cleanup;
mod covers;
mod ingest;
mod notify;
mod preferences;
mod watermark;

pub use cleanup::CleanupService;
pub use covers::CoverService;
pub use ingest::IngestService;
pub use notify::{Notifier, StatusEvent};
pub use preferences::PreferenceService;

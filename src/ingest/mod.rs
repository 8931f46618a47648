pub mod scheduler;
pub mod service;
pub mod staleness;

pub use scheduler::AutoUpdater;
pub use service::IngestionService;

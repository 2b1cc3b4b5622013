mod service;
mod summary;

pub use service::DrainService;
pub use summary::DrainSummary;

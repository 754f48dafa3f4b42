pub mod builder;
pub mod handler;
pub mod listener;

pub use builder::ServerBuilder;
pub use handler::{HealthCheckHandler, ReportProvider, DEFAULT_HEALTHCHECK_PATH};

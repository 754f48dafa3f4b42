// src/health/mod.rs
mod metadata;
mod probe;
mod report;
mod status;

pub use metadata::Metadata;
pub use probe::{Blocking, Deferred, HealthProbe, Outcome, ProbeElement};
pub use report::{Report, ReportError};
pub use status::Status;

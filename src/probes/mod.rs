// src/probes/mod.rs
//
// Ready-made dependency probes. Anything implementing `HealthProbe` works the
// same way; these cover the common "is that HTTP service up" case.
mod http;

pub use http::HttpProbe;

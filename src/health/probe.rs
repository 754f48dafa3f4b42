// src/health/probe.rs
use super::metadata::Metadata;
use super::report::ReportError;
use super::status::Status;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;

/// Something that can be resolved into a [`Status`].
///
/// This is the carrier a [`ProbeElement`] is generic over: an already known
/// `Status`, a [`Deferred`] future, or a [`Blocking`] closure. Resolving may
/// fail; the report turns that failure into a failed status.
#[async_trait]
pub trait Outcome: Send + 'static {
    async fn resolve(self) -> Result<Status>;
}

#[async_trait]
impl Outcome for Status {
    async fn resolve(self) -> Result<Status> {
        Ok(self)
    }
}

/// A dependency check that can be run any number of times.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<Status>;

    fn name(&self) -> &str;
}

/// An async check that has not been polled yet.
pub struct Deferred(BoxFuture<'static, Result<Status>>);

impl Deferred {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<Status>> + Send + 'static,
    {
        Self(Box::pin(future))
    }

    /// Defers a future that cannot fail on its own.
    pub fn infallible<F>(future: F) -> Self
    where
        F: Future<Output = Status> + Send + 'static,
    {
        Self::new(async move { Ok(future.await) })
    }

    pub fn probe(probe: Arc<dyn HealthProbe>) -> Self {
        Self::new(async move { probe.check().await })
    }

    /// Bounds the check. Elapsing resolves to a failed status rather than an
    /// error so the reason reads the same on every report.
    pub fn with_timeout(self, duration: Duration) -> Self {
        Self::new(async move {
            match tokio::time::timeout(duration, self.0).await {
                Ok(result) => result,
                Err(_) => Ok(Status::failed(format!("timed out after {:?}", duration))),
            }
        })
    }
}

#[async_trait]
impl Outcome for Deferred {
    async fn resolve(self) -> Result<Status> {
        self.0.await
    }
}

impl From<Status> for Deferred {
    fn from(status: Status) -> Self {
        Self::new(futures::future::ready(Ok(status)))
    }
}

impl<P: HealthProbe + 'static> From<Arc<P>> for Deferred {
    fn from(probe: Arc<P>) -> Self {
        Self::probe(probe)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

/// A synchronous check, run on the blocking thread pool when resolved.
pub struct Blocking(Box<dyn FnOnce() -> Result<Status> + Send + 'static>);

impl Blocking {
    pub fn new<F>(check: F) -> Self
    where
        F: FnOnce() -> Result<Status> + Send + 'static,
    {
        Self(Box::new(check))
    }
}

#[async_trait]
impl Outcome for Blocking {
    async fn resolve(self) -> Result<Status> {
        match tokio::task::spawn_blocking(self.0).await {
            Ok(result) => result,
            Err(e) => Ok(Status::failed(join_failure(e))),
        }
    }
}

impl From<Blocking> for Deferred {
    fn from(blocking: Blocking) -> Self {
        Self::new(blocking.resolve())
    }
}

impl fmt::Debug for Blocking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Blocking(..)")
    }
}

/// Failure reason for a probe task that did not run to completion.
pub(crate) fn join_failure(err: JoinError) -> String {
    if err.is_cancelled() {
        return "probe task cancelled".to_string();
    }

    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("probe panicked: {}", message)
}

/// One named check inside a report.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeElement<O> {
    name: String,
    outcome: O,
    metadata: Metadata,
}

impl<O> ProbeElement<O> {
    pub fn new(
        name: impl Into<String>,
        outcome: O,
        metadata: Metadata,
    ) -> Result<Self, ReportError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ReportError::EmptyName);
        }

        Ok(Self {
            name,
            outcome,
            metadata,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn outcome(&self) -> &O {
        &self.outcome
    }

    /// Re-expresses the outcome in another carrier without running it.
    pub fn map_outcome<P, F>(self, f: F) -> ProbeElement<P>
    where
        F: FnOnce(O) -> P,
    {
        ProbeElement {
            name: self.name,
            outcome: f(self.outcome),
            metadata: self.metadata,
        }
    }

    pub(crate) fn into_parts(self) -> (String, O, Metadata) {
        (self.name, self.outcome, self.metadata)
    }

    // Names were validated when the element was first built.
    pub(crate) fn from_parts(name: String, outcome: O, metadata: Metadata) -> Self {
        Self {
            name,
            outcome,
            metadata,
        }
    }
}

impl ProbeElement<Status> {
    pub fn status(&self) -> &Status {
        &self.outcome
    }
}

impl Serialize for ProbeElement<Status> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut element = serializer.serialize_struct("ProbeElement", 3)?;
        element.serialize_field("name", &self.name)?;
        element.serialize_field("status", &self.outcome)?;
        element.serialize_field("metadata", &self.metadata)?;
        element.end()
    }
}

impl<'de> Deserialize<'de> for ProbeElement<Status> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Wire {
            name: String,
            status: Status,
            #[serde(default)]
            metadata: Metadata,
        }

        let wire = Wire::deserialize(deserializer)?;
        ProbeElement::new(wire.name, wire.status, wire.metadata).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_empty_name_rejected() {
        let err = ProbeElement::new("", Status::Healthy, Metadata::new()).unwrap_err();
        assert_eq!(err, ReportError::EmptyName);
    }

    #[tokio::test]
    async fn test_deferred_does_not_run_until_resolved() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        let deferred = Deferred::infallible(async move {
            flag.store(true, Ordering::SeqCst);
            Status::Healthy
        });
        assert!(!ran.load(Ordering::SeqCst));

        assert_eq!(deferred.resolve().await.unwrap(), Status::Healthy);
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_deferred_timeout_fails_probe() {
        let slow = Deferred::infallible(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Status::Healthy
        })
        .with_timeout(Duration::from_millis(10));

        let status = slow.resolve().await.unwrap();
        assert!(status.reason().unwrap().starts_with("timed out after"));
    }

    #[tokio::test]
    async fn test_blocking_panic_becomes_failure() {
        let blocking = Blocking::new(|| panic!("config file missing"));
        let status = blocking.resolve().await.unwrap();
        assert_eq!(status, Status::failed("probe panicked: config file missing"));
    }

    #[tokio::test]
    async fn test_blocking_lifts_into_deferred() {
        let deferred: Deferred = Blocking::new(|| Ok(Status::failed("read-only")))
            .into();
        assert_eq!(deferred.resolve().await.unwrap(), Status::failed("read-only"));
    }

    #[test]
    fn test_resolved_element_wire_format() {
        let element = ProbeElement::new(
            "broker",
            Status::Healthy,
            Metadata::from([("key", "value")]),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_string(&element).unwrap(),
            r#"{"name":"broker","status":{"Ok":{}},"metadata":{"key":"value"}}"#
        );
    }
}

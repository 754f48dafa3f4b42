// src/health/report.rs
use super::metadata::Metadata;
use super::probe::{join_failure, Outcome, ProbeElement};
use super::status::Status;
use futures::future::join_all;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error("a report needs at least one probe")]
    Empty,

    #[error("probe name must not be empty")]
    EmptyName,
}

/// An ordered, non-empty set of probes.
///
/// `Report<Deferred>` (or any other [`Outcome`] carrier) describes checks that
/// have not run yet; [`Report::evaluate`] runs them and yields a
/// `Report<Status>`. Order is the order probes were added in and is kept
/// through evaluation and serialization. Names may repeat.
#[derive(Debug, Clone, PartialEq)]
pub struct Report<O> {
    elements: Vec<ProbeElement<O>>,
}

impl<O> Report<O> {
    pub fn new(name: impl Into<String>, outcome: O) -> Result<Self, ReportError> {
        Self::with_metadata(name, outcome, Metadata::new())
    }

    pub fn with_metadata(
        name: impl Into<String>,
        outcome: O,
        metadata: Metadata,
    ) -> Result<Self, ReportError> {
        Ok(Self::from(ProbeElement::new(name, outcome, metadata)?))
    }

    pub fn from_elements(elements: Vec<ProbeElement<O>>) -> Result<Self, ReportError> {
        if elements.is_empty() {
            return Err(ReportError::Empty);
        }
        Ok(Self { elements })
    }

    pub fn append(self, name: impl Into<String>, outcome: impl Into<O>) -> Result<Self, ReportError> {
        self.append_with_metadata(name, outcome, Metadata::new())
    }

    pub fn append_with_metadata(
        mut self,
        name: impl Into<String>,
        outcome: impl Into<O>,
        metadata: Metadata,
    ) -> Result<Self, ReportError> {
        self.elements
            .push(ProbeElement::new(name, outcome.into(), metadata)?);
        Ok(self)
    }

    /// Appends several already-built elements, keeping their order.
    pub fn with_probes<I>(mut self, probes: I) -> Self
    where
        I: IntoIterator<Item = ProbeElement<O>>,
    {
        self.elements.extend(probes);
        self
    }

    /// Appends every element of `other` after this report's elements.
    pub fn combine<P>(self, other: Report<P>) -> Self
    where
        P: Into<O>,
    {
        let lifted = other.lift::<O>();
        self.with_probes(lifted.elements)
    }

    /// Re-expresses every outcome in another carrier. Nothing is evaluated.
    pub fn transform<P, F>(self, mut f: F) -> Report<P>
    where
        F: FnMut(O) -> P,
    {
        Report {
            elements: self
                .elements
                .into_iter()
                .map(|element| element.map_outcome(&mut f))
                .collect(),
        }
    }

    pub fn lift<P>(self) -> Report<P>
    where
        O: Into<P>,
    {
        self.transform(Into::into)
    }

    pub fn elements(&self) -> &[ProbeElement<O>] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|e| e.name())
    }
}

impl<O> From<ProbeElement<O>> for Report<O> {
    fn from(element: ProbeElement<O>) -> Self {
        Self {
            elements: vec![element],
        }
    }
}

/// Spawned probe that is aborted if dropped before it finishes, so an
/// abandoned evaluation does not leave its checks running.
struct ProbeTask(JoinHandle<anyhow::Result<Status>>);

impl Future for ProbeTask {
    type Output = Result<anyhow::Result<Status>, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl Drop for ProbeTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<O: Outcome> Report<O> {
    /// Runs every probe and collects the results in their original order.
    ///
    /// Each probe runs on its own task. An error, a panic or a cancelled task
    /// only fails that probe; siblings still report their own status. There is
    /// no timeout here, a probe that never finishes keeps this pending.
    /// Dropping the returned future aborts every probe still running.
    pub async fn evaluate(self) -> Report<Status> {
        let started = Instant::now();
        let mut pending = Vec::with_capacity(self.elements.len());
        let mut tasks = Vec::with_capacity(self.elements.len());

        for element in self.elements {
            let (name, outcome, metadata) = element.into_parts();
            tasks.push(ProbeTask(tokio::spawn(outcome.resolve())));
            pending.push((name, metadata));
        }

        let results = join_all(tasks).await;

        let elements: Vec<_> = pending
            .into_iter()
            .zip(results)
            .map(|((name, metadata), result)| {
                let status = match result {
                    Ok(Ok(status)) => status,
                    Ok(Err(e)) => {
                        let chain = format!("{:#}", e);
                        debug!(probe = %name, error = %chain, "probe returned an error");
                        Status::failed(e.to_string())
                    }
                    Err(e) => {
                        let reason = join_failure(e);
                        debug!(probe = %name, %reason, "probe task did not complete");
                        Status::failed(reason)
                    }
                };

                match &status {
                    Status::Healthy => debug!(probe = %name, "probe is healthy"),
                    Status::Failed { reason } => warn!(probe = %name, %reason, "probe failed"),
                }

                ProbeElement::from_parts(name, status, metadata)
            })
            .collect();

        let report = Report { elements };
        info!(
            probes = report.len(),
            failed = report.failures().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Health report evaluated"
        );
        report
    }

    /// Evaluates the report and hands it to exactly one branch: `on_all_healthy`
    /// when every probe is healthy, `on_any_failed` otherwise.
    pub async fn fold<R, H, F>(self, on_all_healthy: H, on_any_failed: F) -> R
    where
        H: FnOnce(Report<Status>) -> R,
        F: FnOnce(Report<Status>) -> R,
    {
        let resolved = self.evaluate().await;
        if resolved.is_healthy() {
            on_all_healthy(resolved)
        } else {
            on_any_failed(resolved)
        }
    }
}

impl Report<Status> {
    pub fn is_healthy(&self) -> bool {
        self.elements.iter().all(|e| e.status().is_healthy())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProbeElement<Status>> {
        self.elements.iter().filter(|e| !e.status().is_healthy())
    }
}

impl Serialize for Report<Status> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut report = serializer.serialize_struct("Report", 1)?;
        report.serialize_field("statuses", &self.elements)?;
        report.end()
    }
}

impl<'de> Deserialize<'de> for Report<Status> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Wire {
            statuses: Vec<ProbeElement<Status>>,
        }

        let wire = Wire::deserialize(deserializer)?;
        Report::from_elements(wire.statuses).map_err(serde::de::Error::custom)
    }
}

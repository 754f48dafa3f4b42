// src/health/status.rs
use serde::{Deserialize, Serialize};
use std::fmt;

const UNSPECIFIED_FAILURE: &str = "unspecified failure";

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireStatus", into = "WireStatus")]
pub enum Status {
    Healthy,
    Failed { reason: String },
}

impl Status {
    pub fn healthy() -> Self {
        Status::Healthy
    }

    /// A failed status. An empty reason is replaced so the wire `error` field
    /// is never blank.
    pub fn failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if reason.is_empty() {
            Status::Failed {
                reason: UNSPECIFIED_FAILURE.to_string(),
            }
        } else {
            Status::Failed { reason }
        }
    }

    /// `reason` is only called when `is_ok` is false.
    pub fn from_bool<F>(is_ok: bool, reason: F) -> Self
    where
        F: FnOnce() -> String,
    {
        if is_ok {
            Status::Healthy
        } else {
            Status::failed(reason())
        }
    }

    pub fn from_result<E, F>(result: Result<bool, E>, reason_if_false: F) -> Self
    where
        E: fmt::Display,
        F: FnOnce() -> String,
    {
        match result {
            Ok(is_ok) => Status::from_bool(is_ok, reason_if_false),
            Err(e) => Status::failed(e.to_string()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Status::Healthy)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Status::Healthy => None,
            Status::Failed { reason } => Some(reason.as_str()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Healthy => write!(f, "healthy"),
            Status::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

// Wire shape: {"Ok":{}} | {"Failure":{"error":"..."}}
#[derive(Serialize, Deserialize)]
enum WireStatus {
    #[serde(rename = "Ok")]
    Healthy {},
    #[serde(rename = "Failure")]
    Failure { error: String },
}

impl From<Status> for WireStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Healthy => WireStatus::Healthy {},
            Status::Failed { reason } => WireStatus::Failure { error: reason },
        }
    }
}

impl From<WireStatus> for Status {
    fn from(wire: WireStatus) -> Self {
        match wire {
            WireStatus::Healthy {} => Status::Healthy,
            WireStatus::Failure { error } => Status::failed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bool_only_builds_reason_on_failure() {
        let status = Status::from_bool(true, || panic!("reason must not be computed"));
        assert_eq!(status, Status::Healthy);

        let status = Status::from_bool(false, || "disk full".to_string());
        assert_eq!(status.reason(), Some("disk full"));
    }

    #[test]
    fn test_from_result() {
        let ok: Result<bool, String> = Ok(true);
        assert!(Status::from_result(ok, || "unused".into()).is_healthy());

        let no: Result<bool, String> = Ok(false);
        assert_eq!(
            Status::from_result(no, || "queue not bound".into()),
            Status::failed("queue not bound")
        );

        let err: Result<bool, String> = Err("connection refused".into());
        assert_eq!(
            Status::from_result(err, || "unused".into()),
            Status::failed("connection refused")
        );
    }

    #[test]
    fn test_empty_reason_is_replaced() {
        assert_eq!(Status::failed("").reason(), Some(UNSPECIFIED_FAILURE));
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(
            serde_json::to_string(&Status::Healthy).unwrap(),
            r#"{"Ok":{}}"#
        );
        assert_eq!(
            serde_json::to_string(&Status::failed("ERROR")).unwrap(),
            r#"{"Failure":{"error":"ERROR"}}"#
        );

        let parsed: Status = serde_json::from_str(r#"{"Failure":{"error":"boom"}}"#).unwrap();
        assert_eq!(parsed, Status::failed("boom"));
    }
}

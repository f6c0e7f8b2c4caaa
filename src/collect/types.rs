// src/collect/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque key/value bundle handed verbatim to the fetcher (FDSN query params).
pub type RequestParams = BTreeMap<String, String>;

/// One independent unit to fetch, e.g. a station or a catalog query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    #[serde(default)]
    pub params: RequestParams,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: RequestParams::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Shared request context: time window plus extra parameters passed unchanged
/// to every fetch of a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestContext {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub extra: RequestParams,
}

impl RequestContext {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            extra: RequestParams::new(),
        }
    }

    /// Window of `duration_secs` starting at `start`.
    pub fn window(start: DateTime<Utc>, duration_secs: i64) -> Self {
        Self::new(start, start + chrono::Duration::seconds(duration_secs))
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FetchStatus {
    Success,
    Failure,
}

/// Result of attempting one source. Payload is present iff `Success`,
/// error detail iff `Failure`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome<P> {
    source_name: String,
    status: FetchStatus,
    payload: Option<P>,
    error_detail: Option<String>,
}

impl<P> FetchOutcome<P> {
    pub fn success(source_name: impl Into<String>, payload: P) -> Self {
        Self {
            source_name: source_name.into(),
            status: FetchStatus::Success,
            payload: Some(payload),
            error_detail: None,
        }
    }

    pub fn failure(source_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            status: FetchStatus::Failure,
            payload: None,
            error_detail: Some(detail.into()),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn status(&self) -> FetchStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }
}

/// Aggregate of one collector run.
///
/// `outcomes` always has one entry per input source, in input order.
/// `merged_payload` holds the successful payloads in the same relative order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult<P> {
    pub merged_payload: Vec<P>,
    pub outcomes: Vec<FetchOutcome<P>>,
}

impl<P> BatchResult<P> {
    /// True when nothing succeeded. Callers must check this before rendering.
    pub fn is_empty(&self) -> bool {
        self.merged_payload.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// `(source_name, error_detail)` for every failed source, in input order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error_detail().map(|d| (o.source_name(), d)))
    }

    /// One-line human summary, e.g. `5/7 sources ok; failed: SSLB, YULB`.
    pub fn summary(&self) -> String {
        let failed: Vec<&str> = self.failures().map(|(name, _)| name).collect();
        if failed.is_empty() {
            format!("{}/{} sources ok", self.succeeded(), self.outcomes.len())
        } else {
            format!(
                "{}/{} sources ok; failed: {}",
                self.succeeded(),
                self.outcomes.len(),
                failed.join(", ")
            )
        }
    }
}

/// External data-provider collaborator. Any failure (network, not-found,
/// malformed body) must surface as `Err`, never as an empty success.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    type Payload: Clone + Send;

    async fn fetch(&self, params: &RequestParams, ctx: &RequestContext) -> Result<Self::Payload>;

    fn name(&self) -> &'static str;
}

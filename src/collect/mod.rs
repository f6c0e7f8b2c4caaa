// src/collect/mod.rs
pub mod providers;
pub mod types;

use crate::collect::types::{BatchResult, FetchOutcome, Fetcher, RequestContext, Source};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use std::time::{Duration, Instant};

/// One-time metrics registration (so series show up on the scrape).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "collect_sources_ok_total",
            "Sources fetched successfully."
        );
        describe_counter!(
            "collect_source_errors_total",
            "Source fetch errors (including timeouts)."
        );
        describe_histogram!("collect_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_gauge!(
            "collect_last_run_ts",
            "Unix ts when a collect batch last finished."
        );
    });
}

/// Programmer-contract violations. Runtime fetch failures never show up here.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CollectError {
    #[error("collect called with an empty source list")]
    EmptySources,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectOptions {
    /// Upper bound for a single fetch. `None` waits for the fetcher indefinitely.
    pub fetch_timeout: Option<Duration>,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl CollectOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            fetch_timeout: Some(timeout),
        }
    }
}

/// Fetch every source once, in list order, one at a time.
///
/// A failing source is recorded and the batch moves on; the returned
/// `outcomes` always line up one-to-one with `sources`.
pub async fn collect<F>(
    fetcher: &F,
    sources: &[Source],
    ctx: &RequestContext,
    opts: CollectOptions,
) -> Result<BatchResult<F::Payload>, CollectError>
where
    F: Fetcher + ?Sized,
{
    if sources.is_empty() {
        return Err(CollectError::EmptySources);
    }
    ensure_metrics_described();

    let mut outcomes = Vec::with_capacity(sources.len());
    for s in sources {
        outcomes.push(attempt(fetcher, s, ctx, opts).await);
    }
    Ok(finish(fetcher.name(), outcomes))
}

/// Same contract as [`collect`], but all fetches are in flight at once.
/// Results are slotted by input index, so completion order does not matter.
pub async fn collect_concurrent<F>(
    fetcher: &F,
    sources: &[Source],
    ctx: &RequestContext,
    opts: CollectOptions,
) -> Result<BatchResult<F::Payload>, CollectError>
where
    F: Fetcher + ?Sized,
{
    if sources.is_empty() {
        return Err(CollectError::EmptySources);
    }
    ensure_metrics_described();

    let outcomes =
        futures::future::join_all(sources.iter().map(|s| attempt(fetcher, s, ctx, opts))).await;
    Ok(finish(fetcher.name(), outcomes))
}

async fn attempt<F>(
    fetcher: &F,
    source: &Source,
    ctx: &RequestContext,
    opts: CollectOptions,
) -> FetchOutcome<F::Payload>
where
    F: Fetcher + ?Sized,
{
    let t0 = Instant::now();
    let fut = fetcher.fetch(&source.params, ctx);
    let res = match opts.fetch_timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(r) => r.map_err(|e| format!("{e:#}")),
            Err(_) => Err(format!("timed out after {limit:?}")),
        },
        None => fut.await.map_err(|e| format!("{e:#}")),
    };
    histogram!("collect_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    match res {
        Ok(payload) => {
            tracing::info!(source = %source.name, provider = fetcher.name(), "source fetched");
            counter!("collect_sources_ok_total").increment(1);
            FetchOutcome::success(source.name.clone(), payload)
        }
        Err(detail) => {
            tracing::warn!(
                source = %source.name,
                provider = fetcher.name(),
                error = %detail,
                "source fetch failed"
            );
            counter!("collect_source_errors_total").increment(1);
            FetchOutcome::failure(source.name.clone(), detail)
        }
    }
}

fn finish<P: Clone>(provider: &str, outcomes: Vec<FetchOutcome<P>>) -> BatchResult<P> {
    let merged_payload: Vec<P> = outcomes
        .iter()
        .filter_map(|o| o.payload().cloned())
        .collect();
    let batch = BatchResult {
        merged_payload,
        outcomes,
    };

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    gauge!("collect_last_run_ts").set(now as f64);
    if batch.is_empty() {
        tracing::warn!(provider, summary = %batch.summary(), "collect batch produced no data");
    } else {
        tracing::info!(provider, summary = %batch.summary(), "collect batch done");
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::types::{FetchStatus, RequestParams};
    use anyhow::{bail, Result};
    use chrono::TimeZone;

    struct EchoFetcher;

    #[async_trait::async_trait]
    impl Fetcher for EchoFetcher {
        type Payload = String;

        async fn fetch(&self, params: &RequestParams, _ctx: &RequestContext) -> Result<String> {
            match params.get("station").map(String::as_str) {
                Some("BAD") | None => bail!("no data for station"),
                Some(s) => Ok(s.to_string()),
            }
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::window(chrono::Utc.with_ymd_and_hms(2025, 10, 7, 23, 52, 12).unwrap(), 120)
    }

    fn station(name: &str) -> Source {
        Source::new(name).with_param("station", name)
    }

    #[tokio::test]
    async fn empty_source_list_is_a_contract_error() {
        let err = collect(&EchoFetcher, &[], &ctx(), CollectOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, CollectError::EmptySources);
    }

    #[tokio::test]
    async fn failure_detail_is_stringified_cause() {
        let sources = vec![station("BAD")];
        let batch = collect(&EchoFetcher, &sources, &ctx(), CollectOptions::default())
            .await
            .unwrap();
        assert_eq!(batch.outcomes[0].status(), FetchStatus::Failure);
        assert_eq!(batch.outcomes[0].error_detail(), Some("no data for station"));
    }

    #[tokio::test]
    async fn duplicate_names_are_kept_as_separate_outcomes() {
        let sources = vec![station("NACB"), station("NACB")];
        let batch = collect(&EchoFetcher, &sources, &ctx(), CollectOptions::default())
            .await
            .unwrap();
        assert_eq!(batch.outcomes.len(), 2);
        assert_eq!(batch.merged_payload, vec!["NACB", "NACB"]);
    }
}

// tests/collect_scenarios.rs
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use seismo_harvest::{
    collect, collect_concurrent, CollectError, CollectOptions, FetchStatus, Fetcher,
    RequestContext, RequestParams, Source,
};
use std::time::Duration;

/// Fails for stations listed in `failing`; sleeps `delay_ms` first when set.
struct ScriptedFetcher {
    failing: Vec<&'static str>,
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    type Payload = String;

    async fn fetch(&self, params: &RequestParams, ctx: &RequestContext) -> Result<String> {
        let sta = params.get("station").cloned().unwrap_or_default();
        if let Some(ms) = params.get("delay_ms").and_then(|v| v.parse::<u64>().ok()) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.failing.iter().any(|f| *f == sta) {
            bail!("FDSNNoDataException: no data for TW.{sta}");
        }
        Ok(format!("data({sta}@{})", ctx.start.format("%H:%M")))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn ctx() -> RequestContext {
    RequestContext::window(Utc.with_ymd_and_hms(2025, 10, 7, 23, 52, 12).unwrap(), 120)
}

fn sources(names: &[&str]) -> Vec<Source> {
    names
        .iter()
        .map(|n| Source::new(*n).with_param("station", *n))
        .collect()
}

#[tokio::test]
async fn scenario_a_middle_failure_is_isolated() {
    let f = ScriptedFetcher {
        failing: vec!["S2"],
    };
    let batch = collect(&f, &sources(&["S1", "S2", "S3"]), &ctx(), CollectOptions::default())
        .await
        .unwrap();

    let statuses: Vec<_> = batch.outcomes.iter().map(|o| o.status()).collect();
    assert_eq!(
        statuses,
        vec![FetchStatus::Success, FetchStatus::Failure, FetchStatus::Success]
    );
    let names: Vec<_> = batch.outcomes.iter().map(|o| o.source_name()).collect();
    assert_eq!(names, vec!["S1", "S2", "S3"]);
    assert!(batch.outcomes[1]
        .error_detail()
        .unwrap()
        .contains("no data for TW.S2"));
    assert_eq!(batch.merged_payload, vec!["data(S1@23:52)", "data(S3@23:52)"]);
}

#[tokio::test]
async fn scenario_b_all_fail_is_empty_not_error() {
    let f = ScriptedFetcher {
        failing: vec!["S1", "S2"],
    };
    let batch = collect(&f, &sources(&["S1", "S2"]), &ctx(), CollectOptions::default())
        .await
        .unwrap();
    assert!(batch.is_empty());
    assert_eq!(batch.outcomes.len(), 2);
    assert!(batch.outcomes.iter().all(|o| !o.is_success()));
    assert_eq!(batch.summary(), "0/2 sources ok; failed: S1, S2");
}

#[tokio::test]
async fn outcomes_match_input_length_for_every_failure_pattern() {
    let names = ["KMNB", "NACB", "SSLB", "TPUB"];
    // every subset of failing stations
    for mask in 0u32..16 {
        let failing: Vec<&'static str> = names
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << *i) != 0)
            .map(|(_, n)| *n)
            .collect();
        let f = ScriptedFetcher {
            failing: failing.clone(),
        };
        let batch = collect(&f, &sources(&names), &ctx(), CollectOptions::default())
            .await
            .unwrap();

        assert_eq!(batch.outcomes.len(), names.len());
        assert_eq!(batch.failed(), failing.len());
        let expected: Vec<String> = names
            .iter()
            .filter(|n| !failing.contains(*n))
            .map(|n| format!("data({n}@23:52)"))
            .collect();
        assert_eq!(batch.merged_payload, expected);
        for o in &batch.outcomes {
            assert_eq!(o.payload().is_some(), o.is_success());
            assert_eq!(o.error_detail().is_some(), !o.is_success());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_is_an_ordinary_failure() {
    let f = ScriptedFetcher { failing: vec![] };
    let srcs = vec![
        Source::new("SLOW")
            .with_param("station", "SLOW")
            .with_param("delay_ms", "60000"),
        Source::new("FAST").with_param("station", "FAST"),
    ];
    let batch = collect(&f, &srcs, &ctx(), CollectOptions::with_timeout(Duration::from_secs(1)))
        .await
        .unwrap();
    assert_eq!(batch.outcomes[0].status(), FetchStatus::Failure);
    assert!(batch.outcomes[0].error_detail().unwrap().contains("timed out"));
    assert_eq!(batch.merged_payload, vec!["data(FAST@23:52)"]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_collect_keeps_input_order() {
    let f = ScriptedFetcher {
        failing: vec!["B"],
    };
    // later sources finish first
    let srcs: Vec<Source> = [("A", "300"), ("B", "200"), ("C", "100"), ("D", "0")]
        .iter()
        .map(|(n, d)| {
            Source::new(*n)
                .with_param("station", *n)
                .with_param("delay_ms", *d)
        })
        .collect();
    let batch = collect_concurrent(&f, &srcs, &ctx(), CollectOptions::default())
        .await
        .unwrap();
    let names: Vec<_> = batch.outcomes.iter().map(|o| o.source_name()).collect();
    assert_eq!(names, vec!["A", "B", "C", "D"]);
    assert_eq!(
        batch.merged_payload,
        vec!["data(A@23:52)", "data(C@23:52)", "data(D@23:52)"]
    );
}

#[tokio::test]
async fn concurrent_collect_rejects_empty_list() {
    let f = ScriptedFetcher { failing: vec![] };
    let err = collect_concurrent(&f, &[], &ctx(), CollectOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, CollectError::EmptySources);
}

// tests/pipeline_e2e.rs
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use seismo_harvest::collect::providers::fdsn::{parse_event_text, QuakeEvent, WaveformChunk};
use seismo_harvest::orchestrate::{run_event_map, run_waveforms, RunOptions};
use seismo_harvest::render::{MemorySink, RenderCall};
use seismo_harvest::{Fetcher, RequestContext, RequestParams, Rgb, Source, Strategy, ValueMapper};

/// One catalog per region; region "down" always errors.
struct RegionCatalogs;

#[async_trait]
impl Fetcher for RegionCatalogs {
    type Payload = Vec<QuakeEvent>;

    async fn fetch(&self, params: &RequestParams, _ctx: &RequestContext) -> Result<Vec<QuakeEvent>> {
        match params.get("region").map(String::as_str) {
            Some("taiwan") => parse_event_text(include_str!("fixtures/events_taiwan.txt")),
            _ => bail!("503 Service Unavailable"),
        }
    }

    fn name(&self) -> &'static str {
        "region-catalogs"
    }
}

struct FlakyStations;

#[async_trait]
impl Fetcher for FlakyStations {
    type Payload = WaveformChunk;

    async fn fetch(&self, params: &RequestParams, _ctx: &RequestContext) -> Result<WaveformChunk> {
        let sta = params.get("station").cloned().unwrap_or_default();
        if sta.starts_with('Y') {
            bail!("No data available for request.");
        }
        Ok(WaveformChunk {
            source_id: format!("TW.{sta}..BHZ"),
            mseed: vec![0; 4096],
        })
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

fn ctx() -> RequestContext {
    RequestContext::window(Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap(), 30 * 86_400)
}

fn opts(demo: bool) -> RunOptions {
    RunOptions {
        demo_on_empty: demo,
        title: "Taiwan quakes".into(),
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn event_map_renders_successful_regions_only() {
    let sources = vec![
        Source::new("taiwan").with_param("region", "taiwan"),
        Source::new("ryukyu").with_param("region", "down"),
    ];
    let sink = MemorySink::new();
    let mapper = ValueMapper::builtin("turbo", Rgb::RED);

    let report = run_event_map(&RegionCatalogs, &sources, &ctx(), &opts(false), &mapper, &sink)
        .await
        .unwrap();

    assert_eq!(report.sources, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failures[0].0, "ryukyu");
    assert!(report.failures[0].1.contains("503"));
    assert!(report.rendered);
    assert_eq!(report.items, 4);
    assert_eq!(report.tiers.primary, 4);

    let calls = sink.calls.lock().unwrap();
    let RenderCall::Events(title, points) = &calls[0] else {
        panic!("expected an event render");
    };
    assert_eq!(title, "Taiwan quakes");
    assert_eq!(points.len(), 4);
    assert!(points.iter().all(|p| p.strategy == Strategy::Primary));
}

#[tokio::test]
async fn event_map_skips_render_when_everything_failed() {
    let sources = vec![Source::new("a").with_param("region", "down")];
    let sink = MemorySink::new();
    let mapper = ValueMapper::builtin("turbo", Rgb::RED);

    let report = run_event_map(&RegionCatalogs, &sources, &ctx(), &opts(false), &mapper, &sink)
        .await
        .unwrap();
    assert!(!report.rendered);
    assert_eq!(report.items, 0);
    assert!(sink.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn event_map_demo_fallback_when_enabled() {
    let sources = vec![Source::new("a").with_param("region", "down")];
    let sink = MemorySink::new();
    let mapper = ValueMapper::new(Rgb::RED);

    let report = run_event_map(&RegionCatalogs, &sources, &ctx(), &opts(true), &mapper, &sink)
        .await
        .unwrap();
    assert!(report.rendered);
    assert!(report.used_demo);
    assert_eq!(report.items, 3);
    // no encoders wired: every point gets the default color
    assert_eq!(report.tiers.default, 3);
}

#[tokio::test]
async fn waveforms_render_partial_station_set() {
    let sources: Vec<Source> = ["KMNB", "NACB", "YHNB", "YULB"]
        .iter()
        .map(|s| Source::new(*s).with_param("station", *s))
        .collect();
    let sink = MemorySink::new();

    let report = run_waveforms(&FlakyStations, &sources, &ctx(), &opts(false), &sink)
        .await
        .unwrap();
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failures.len(), 2);
    assert!(report.rendered);

    let calls = sink.calls.lock().unwrap();
    assert_eq!(
        calls[0],
        RenderCall::Waveforms(
            "Taiwan quakes".into(),
            vec!["TW.KMNB..BHZ".into(), "TW.NACB..BHZ".into()]
        )
    );
}

#[tokio::test]
async fn empty_source_list_is_rejected() {
    let sink = MemorySink::new();
    let err = run_waveforms(&FlakyStations, &[], &ctx(), &opts(false), &sink)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("empty source list"));
}

// tests/metrics_collect.rs
#![cfg(feature = "strict-metrics")]
use seismo_harvest::collect::providers::fdsn::{station_sources, FdsnWaveformProvider};
use seismo_harvest::mapper::{DomainBounds, MappingRequest};
use seismo_harvest::telemetry::Telemetry;
use seismo_harvest::{collect, CollectOptions, RequestContext, Rgb, Source, ValueMapper};

#[tokio::test]
async fn metrics_exposed_after_collect_and_map() {
    // Install a local recorder for the test
    let telemetry = Telemetry::install().expect("recorder");

    let provider = FdsnWaveformProvider::from_fixture(&[1, 2, 3]);
    let mut sources = station_sources("TW", &["NACB", "TWGB"], "", "BHZ");
    sources.push(Source::new("no-station").with_param("network", "TW"));
    let ctx = RequestContext::window(chrono::Utc::now(), 120);
    let batch = collect(&provider, &sources, &ctx, CollectOptions::default())
        .await
        .unwrap();
    assert_eq!(batch.succeeded(), 2);
    assert_eq!(batch.failed(), 1);

    let mapper = ValueMapper::new(Rgb::RED);
    let _ = mapper.map_value(&MappingRequest::new(1.0, DomainBounds::new(0.0, 2.0).unwrap()));

    // Scrape metrics text and check series presence by substring
    let out = telemetry.render();
    assert!(out.contains("collect_sources_ok_total"));
    assert!(out.contains("collect_source_errors_total"));
    assert!(out.contains("collect_fetch_ms"));
    assert!(out.contains("mapper_tier_total"));
    let sample = |name: &str| -> f64 {
        out.lines()
            .find(|l| l.starts_with(name) && !l.starts_with('#'))
            .and_then(|l| l.rsplit(' ').next())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    };
    assert_eq!(sample("collect_sources_ok_total"), 2.0);
    assert_eq!(sample("collect_source_errors_total"), 1.0);
}

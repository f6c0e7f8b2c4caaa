//! # Orchestration
//! Composes the collector and the value mapper into the two jobs the crate
//! ships: a multi-station waveform download and a depth-colored event map.
//!
//! Both jobs check for an empty merged batch before touching the renderer.

use anyhow::Result;
use chrono::{TimeZone, Utc};
use serde::Serialize;

use crate::collect::providers::fdsn::{QuakeEvent, WaveformChunk};
use crate::collect::types::{BatchResult, Fetcher, RequestContext, Source};
use crate::collect::{collect, collect_concurrent, CollectOptions};
use crate::config::PipelineConfig;
use crate::mapper::{DomainBounds, Strategy, ValueMapper};
use crate::render::{PlotPoint, RenderSink};

/// Symbol diameter per magnitude unit, in cm.
pub const SIZE_PER_MAGNITUDE_CM: f64 = 0.06;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub collect: CollectOptions,
    pub concurrent: bool,
    pub table_steps: usize,
    pub demo_on_empty: bool,
    pub title: String,
}

impl RunOptions {
    pub fn from_config(cfg: &PipelineConfig, title: impl Into<String>) -> Self {
        Self {
            collect: CollectOptions::with_timeout(cfg.fetch_timeout()),
            concurrent: cfg.concurrent,
            table_steps: cfg.table_steps,
            demo_on_empty: cfg.demo_on_empty,
            title: title.into(),
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            collect: CollectOptions::default(),
            concurrent: false,
            table_steps: 8,
            demo_on_empty: false,
            title: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub primary: usize,
    pub fallback: usize,
    pub default: usize,
}

impl TierCounts {
    fn record(&mut self, s: Strategy) {
        match s {
            Strategy::Primary => self.primary += 1,
            Strategy::Fallback => self.fallback += 1,
            Strategy::Default => self.default += 1,
        }
    }
}

/// What happened during one job run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub sources: usize,
    pub succeeded: usize,
    /// `(source, error)` per failed source, in input order.
    pub failures: Vec<(String, String)>,
    pub items: usize,
    pub rendered: bool,
    pub used_demo: bool,
    pub tiers: TierCounts,
}

impl RunReport {
    fn from_batch<P>(batch: &BatchResult<P>) -> Self {
        Self {
            sources: batch.outcomes.len(),
            succeeded: batch.succeeded(),
            failures: batch
                .failures()
                .map(|(s, e)| (s.to_string(), e.to_string()))
                .collect(),
            ..Self::default()
        }
    }
}

async fn gather<F>(
    fetcher: &F,
    sources: &[Source],
    ctx: &RequestContext,
    opts: &RunOptions,
) -> Result<BatchResult<F::Payload>>
where
    F: Fetcher + ?Sized,
{
    let batch = if opts.concurrent {
        collect_concurrent(fetcher, sources, ctx, opts.collect).await?
    } else {
        collect(fetcher, sources, ctx, opts.collect).await?
    };
    Ok(batch)
}

/// Color every event by depth. One table per call, shared by all events.
pub fn plot_points(events: &[QuakeEvent], mapper: &ValueMapper, table_steps: usize) -> Vec<PlotPoint> {
    if events.is_empty() {
        return Vec::new();
    }
    let bounds = DomainBounds::from_values(events.iter().map(|e| e.depth_km))
        .unwrap_or(DomainBounds::ZERO);
    let table = mapper.build_table(&bounds, table_steps);
    let depths: Vec<f64> = events.iter().map(|e| e.depth_km).collect();

    mapper
        .map_batch(&depths, bounds, table)
        .into_iter()
        .zip(events)
        .map(|(m, e)| PlotPoint {
            longitude: e.longitude,
            latitude: e.latitude,
            size_cm: SIZE_PER_MAGNITUDE_CM * e.magnitude,
            depth_km: e.depth_km,
            magnitude: e.magnitude,
            color: m.encoded,
            strategy: m.strategy,
        })
        .collect()
}

/// Synthetic events used when the catalog query yields nothing and the demo
/// fallback is enabled.
pub fn demo_events() -> Vec<QuakeEvent> {
    let t = Utc
        .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default();
    [
        (121.0, 23.5, 5.2, 20.0),
        (122.5, 24.0, 4.8, 35.0),
        (120.5, 22.0, 5.5, 10.0),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (lon, lat, mag, depth))| QuakeEvent {
        id: format!("demo-{}", i + 1),
        time: t,
        latitude: lat,
        longitude: lon,
        depth_km: depth,
        magnitude: mag,
        mag_type: "M".to_string(),
        location_name: "synthetic".to_string(),
    })
    .collect()
}

/// Fetch catalogs from every source, merge them, color by depth and render.
pub async fn run_event_map<F>(
    fetcher: &F,
    sources: &[Source],
    ctx: &RequestContext,
    opts: &RunOptions,
    mapper: &ValueMapper,
    sink: &dyn RenderSink,
) -> Result<RunReport>
where
    F: Fetcher<Payload = Vec<QuakeEvent>> + ?Sized,
{
    let batch = gather(fetcher, sources, ctx, opts).await?;
    let mut report = RunReport::from_batch(&batch);

    let mut events: Vec<QuakeEvent> = batch.merged_payload.into_iter().flatten().collect();
    if events.is_empty() {
        if !opts.demo_on_empty {
            tracing::warn!("no events downloaded; skipping render");
            return Ok(report);
        }
        tracing::warn!("no events downloaded; using synthetic demo events");
        events = demo_events();
        report.used_demo = true;
    }

    let points = plot_points(&events, mapper, opts.table_steps);
    for p in &points {
        report.tiers.record(p.strategy);
    }
    report.items = points.len();
    if report.tiers.primary < points.len() {
        tracing::info!(tiers = ?report.tiers, "depth colors degraded for some events");
    }

    sink.render_events(&opts.title, &points).await?;
    report.rendered = true;
    Ok(report)
}

/// Fetch waveforms station by station and hand whatever arrived to the sink.
pub async fn run_waveforms<F>(
    fetcher: &F,
    sources: &[Source],
    ctx: &RequestContext,
    opts: &RunOptions,
    sink: &dyn RenderSink,
) -> Result<RunReport>
where
    F: Fetcher<Payload = WaveformChunk> + ?Sized,
{
    let batch = gather(fetcher, sources, ctx, opts).await?;
    let mut report = RunReport::from_batch(&batch);

    if batch.is_empty() {
        tracing::warn!("no waveforms downloaded; skipping render");
        return Ok(report);
    }
    report.items = batch.merged_payload.len();
    sink.render_waveforms(&opts.title, &batch.merged_payload).await?;
    report.rendered = true;
    Ok(report)
}

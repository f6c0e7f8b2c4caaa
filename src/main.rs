//! seismo-harvest — Binary Entrypoint
//! Loads config, runs one collection job against an FDSN service and writes
//! the plot description for the external renderer.
//!
//! Job selection: `SEISMO_JOB=waveforms` (default) or `SEISMO_JOB=events`.

use anyhow::{bail, Result};
use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use seismo_harvest::collect::providers::fdsn::{FdsnEventProvider, FdsnWaveformProvider};
use seismo_harvest::config::load_config_default;
use seismo_harvest::orchestrate::{run_event_map, run_waveforms, RunOptions, RunReport};
use seismo_harvest::render::JsonFileSink;
use seismo_harvest::telemetry::Telemetry;
use seismo_harvest::ValueMapper;

/// Compact logs by default; `SEISMO_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("seismo_harvest=info,warn"));

    let json = std::env::var("SEISMO_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

fn print_report(job: &str, report: &RunReport) {
    for (source, err) in &report.failures {
        println!("{source}: download failed: {err}");
    }
    println!(
        "{job}: {}/{} sources ok, {} items",
        report.succeeded, report.sources, report.items
    );
    if report.used_demo {
        println!("{job}: no events downloaded, rendered synthetic demo data");
    }
    if !report.rendered {
        println!("{job}: nothing downloaded, no plot written");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let telemetry = match Telemetry::install() {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics recorder not installed");
            None
        }
    };

    let cfg = load_config_default()?;
    let job = std::env::var("SEISMO_JOB").unwrap_or_else(|_| "waveforms".to_string());
    let now = Utc::now();
    let sink = JsonFileSink::new(&cfg.output_path);

    let report = match job.as_str() {
        "events" => {
            let provider = FdsnEventProvider::new(&cfg.base_url, cfg.fetch_timeout())?;
            let mapper = ValueMapper::builtin(&cfg.colormap, cfg.default_color)
                .with_out_of_range(cfg.out_of_range);
            let opts = RunOptions::from_config(
                &cfg,
                format!("Earthquakes (M>={})", cfg.catalog.min_magnitude),
            );
            run_event_map(
                &provider,
                &cfg.catalog.sources(),
                &cfg.catalog.to_context(now)?,
                &opts,
                &mapper,
                &sink,
            )
            .await?
        }
        "waveforms" => {
            let provider = FdsnWaveformProvider::new(&cfg.base_url, cfg.fetch_timeout())?;
            let ctx = cfg.window.to_context(now)?;
            let opts = RunOptions::from_config(
                &cfg,
                format!("Seismic Waveforms - {} UTC", ctx.start.format("%Y/%m/%d %H:%M:%S")),
            );
            run_waveforms(&provider, &cfg.waveform_sources(), &ctx, &opts, &sink).await?
        }
        other => bail!("unknown SEISMO_JOB {other:?} (expected `waveforms` or `events`)"),
    };

    print_report(&job, &report);

    if let Some(t) = telemetry {
        tracing::debug!(scrape = %t.render(), "metrics");
    }
    Ok(())
}

// src/config/pipeline.rs
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::collect::providers::fdsn::{station_sources, DEFAULT_BASE_URL, TW_STATIONS};
use crate::collect::types::{RequestContext, Source};
use crate::mapper::{Colormap, OutOfRange, Rgb};

pub const ENV_CONFIG_PATH: &str = "SEISMO_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/pipeline.toml";
pub const DEFAULT_JSON_PATH: &str = "config/pipeline.json";

/// Longest waveform window accepted (30 days).
pub const MAX_WINDOW_SECS: i64 = 30 * 86_400;
/// Longest catalog lookback accepted (100 years).
pub const MAX_LOOKBACK_DAYS: i64 = 100 * 365;

/// Time window of a waveform job. Without `start` the window ends now.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub start: Option<DateTime<Utc>>,
    pub duration_secs: i64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2025, 10, 7, 23, 52, 12).single(),
            duration_secs: 120,
        }
    }
}

impl WindowConfig {
    pub fn to_context(&self, now: DateTime<Utc>) -> Result<RequestContext> {
        let span = TimeDelta::try_seconds(self.duration_secs)
            .ok_or_else(|| anyhow!("window.duration_secs {} out of range", self.duration_secs))?;
        let bounds = match self.start {
            Some(start) => start.checked_add_signed(span).map(|end| (start, end)),
            None => now.checked_sub_signed(span).map(|start| (start, now)),
        };
        let (start, end) = bounds
            .ok_or_else(|| anyhow!("window of {}s overflows the calendar", self.duration_secs))?;
        Ok(RequestContext::new(start, end))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RegionBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

/// Catalog (event map) job settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub region: RegionBox,
    pub min_magnitude: f64,
    pub lookback_days: i64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            region: RegionBox {
                min_latitude: 20.0,
                max_latitude: 28.0,
                min_longitude: 118.0,
                max_longitude: 124.0,
            },
            min_magnitude: 4.0,
            lookback_days: 5 * 365,
        }
    }
}

impl CatalogConfig {
    pub fn to_context(&self, now: DateTime<Utc>) -> Result<RequestContext> {
        let start = TimeDelta::try_days(self.lookback_days)
            .and_then(|back| now.checked_sub_signed(back))
            .ok_or_else(|| anyhow!("catalog.lookback_days {} out of range", self.lookback_days))?;
        Ok(RequestContext::new(start, now))
    }

    /// Single-source list querying the configured region.
    pub fn sources(&self) -> Vec<Source> {
        let r = &self.region;
        vec![Source::new("catalog")
            .with_param("minlatitude", r.min_latitude.to_string())
            .with_param("maxlatitude", r.max_latitude.to_string())
            .with_param("minlongitude", r.min_longitude.to_string())
            .with_param("maxlongitude", r.max_longitude.to_string())
            .with_param("minmagnitude", self.min_magnitude.to_string())]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub base_url: String,
    pub fetch_timeout_secs: u64,
    /// Fetch all sources at once instead of one after another.
    pub concurrent: bool,
    pub colormap: String,
    pub table_steps: usize,
    pub default_color: Rgb,
    pub out_of_range: OutOfRange,
    /// Use the built-in synthetic events when the catalog batch is empty.
    /// Off by default, so an all-failed catalog run renders nothing and says
    /// so in the report. Turn it on to always draw a map, falling back to
    /// three synthetic Taiwan events.
    pub demo_on_empty: bool,
    pub output_path: PathBuf,
    pub window: WindowConfig,
    pub catalog: CatalogConfig,
    /// Waveform sources; empty means the TW broadband station list.
    pub sources: Vec<Source>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fetch_timeout_secs: 30,
            concurrent: false,
            colormap: "turbo".to_string(),
            table_steps: 8,
            default_color: Rgb::RED,
            out_of_range: OutOfRange::Clamp,
            demo_on_empty: false,
            output_path: PathBuf::from("out/plot.json"),
            window: WindowConfig::default(),
            catalog: CatalogConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn waveform_sources(&self) -> Vec<Source> {
        if self.sources.is_empty() {
            station_sources("TW", &TW_STATIONS, "*", "BH?")
        } else {
            self.sources.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            bail!("base_url must not be empty");
        }
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be > 0");
        }
        if self.table_steps == 0 {
            bail!("table_steps must be >= 1");
        }
        if Colormap::by_name(&self.colormap).is_none() {
            let known: Vec<&str> = Colormap::names().collect();
            bail!(
                "unknown colormap {:?} (known: {})",
                self.colormap,
                known.join(", ")
            );
        }
        if !(1..=MAX_WINDOW_SECS).contains(&self.window.duration_secs) {
            bail!("window.duration_secs must be in 1..={MAX_WINDOW_SECS}");
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.catalog.lookback_days) {
            bail!("catalog.lookback_days must be in 1..={MAX_LOOKBACK_DAYS}");
        }
        let r = &self.catalog.region;
        if r.min_latitude > r.max_latitude || r.min_longitude > r.max_longitude {
            bail!("catalog.region is inverted");
        }
        if let Some(s) = self.sources.iter().find(|s| s.name.trim().is_empty()) {
            bail!("source with empty name (params: {:?})", s.params);
        }
        Ok(())
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading pipeline config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load config using env var + fallbacks:
/// 1) $SEISMO_CONFIG_PATH
/// 2) config/pipeline.toml
/// 3) config/pipeline.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<PipelineConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
    if toml_p.exists() {
        return load_config_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_JSON_PATH);
    if json_p.exists() {
        return load_config_from(&json_p);
    }
    Ok(PipelineConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    // JSON is tried first only when hinted or when the content looks like an object.
    let try_json_first = hint_ext == "json" || s.trim_start().starts_with('{');
    if try_json_first {
        return serde_json::from_str(s).context("pipeline config is not valid JSON");
    }
    match toml::from_str::<PipelineConfig>(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!(toml_err))
            .context("pipeline config is neither TOML nor JSON"),
    }
}

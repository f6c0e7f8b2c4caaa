// src/collect/providers/fdsn.rs
//! FDSN web-service fetchers (dataselect for waveforms, event for catalogs).
//!
//! Both providers run either against a live service over HTTP or against a
//! captured response body (fixture mode, used by tests and offline runs).

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::collect::types::{Fetcher, RequestContext, RequestParams, Source};

pub const DEFAULT_BASE_URL: &str = "https://service.iris.edu";

const DATASELECT_PATH: &str = "/fdsnws/dataselect/1/query";
const EVENT_PATH: &str = "/fdsnws/event/1/query";
const FDSN_TIME_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// Raw miniSEED bytes for one `NET.STA.LOC.CHA` request. Decoding is left to
/// downstream tooling. Not serde-serializable; sinks write `source_id` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformChunk {
    pub source_id: String,
    pub mseed: Vec<u8>,
}

/// One catalog row of the FDSN event text format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuakeEvent {
    pub id: String,
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
    pub mag_type: String,
    pub location_name: String,
}

enum Mode {
    Fixture(Vec<u8>),
    Http {
        base_url: String,
        client: reqwest::Client,
    },
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("seismo-harvest/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .context("building reqwest client")
}

fn fdsn_time(t: &DateTime<Utc>) -> String {
    t.format(FDSN_TIME_FMT).to_string()
}

/// GET an FDSN endpoint. HTTP 204 (no data) and empty bodies are errors, so
/// the collector never sees "success with nothing".
async fn get_body(
    client: &reqwest::Client,
    url: &str,
    query: &[(String, String)],
) -> Result<Vec<u8>> {
    let resp = client
        .get(url)
        .query(query)
        .send()
        .await
        .with_context(|| format!("fdsn GET {url}"))?;
    if resp.status() == reqwest::StatusCode::NO_CONTENT {
        bail!("no data (HTTP 204)");
    }
    let resp = resp.error_for_status().context("fdsn non-2xx")?;
    let body = resp.bytes().await.context("fdsn read body")?;
    if body.is_empty() {
        bail!("no data (empty body)");
    }
    Ok(body.to_vec())
}

// ------------------------------------------------------------
// Waveforms
// ------------------------------------------------------------

pub struct FdsnWaveformProvider {
    mode: Mode,
}

impl FdsnWaveformProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            mode: Mode::Http {
                base_url: base_url.trim_end_matches('/').to_string(),
                client: build_client(timeout)?,
            },
        })
    }

    /// Serve the same captured miniSEED body for every source.
    pub fn from_fixture(body: &[u8]) -> Self {
        Self {
            mode: Mode::Fixture(body.to_vec()),
        }
    }

    /// `NET.STA.LOC.CHA` identifier used to label the chunk.
    pub fn source_id(params: &RequestParams) -> Result<String> {
        let net = require(params, "network")?;
        let sta = require(params, "station")?;
        let loc = params.get("location").map(String::as_str).unwrap_or("");
        let cha = params.get("channel").map(String::as_str).unwrap_or("*");
        Ok(format!("{net}.{sta}.{loc}.{cha}"))
    }

    fn query(params: &RequestParams, ctx: &RequestContext) -> Result<Vec<(String, String)>> {
        require(params, "network")?;
        require(params, "station")?;
        let mut q: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| {
                // FDSN spells the blank location code as "--".
                if k == "location" && v.trim().is_empty() {
                    (k.clone(), "--".to_string())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();
        q.push(("starttime".into(), fdsn_time(&ctx.start)));
        q.push(("endtime".into(), fdsn_time(&ctx.end)));
        Ok(q)
    }
}

#[async_trait]
impl Fetcher for FdsnWaveformProvider {
    type Payload = WaveformChunk;

    async fn fetch(&self, params: &RequestParams, ctx: &RequestContext) -> Result<WaveformChunk> {
        let source_id = Self::source_id(params)?;
        let mseed = match &self.mode {
            Mode::Fixture(body) => {
                if body.is_empty() {
                    bail!("no data (empty fixture)");
                }
                body.clone()
            }
            Mode::Http { base_url, client } => {
                let url = format!("{base_url}{DATASELECT_PATH}");
                let query = Self::query(params, ctx)?;
                get_body(client, &url, &query)
                    .await
                    .with_context(|| format!("dataselect {source_id}"))?
            }
        };
        Ok(WaveformChunk { source_id, mseed })
    }

    fn name(&self) -> &'static str {
        "fdsn-dataselect"
    }
}

// ------------------------------------------------------------
// Event catalog
// ------------------------------------------------------------

pub struct FdsnEventProvider {
    mode: Mode,
}

impl FdsnEventProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            mode: Mode::Http {
                base_url: base_url.trim_end_matches('/').to_string(),
                client: build_client(timeout)?,
            },
        })
    }

    pub fn from_fixture(text: &str) -> Self {
        Self {
            mode: Mode::Fixture(text.as_bytes().to_vec()),
        }
    }

    fn query(params: &RequestParams, ctx: &RequestContext) -> Vec<(String, String)> {
        let mut q: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        q.push(("starttime".into(), fdsn_time(&ctx.start)));
        q.push(("endtime".into(), fdsn_time(&ctx.end)));
        q.push(("format".into(), "text".into()));
        if !params.contains_key("orderby") {
            q.push(("orderby".into(), "time".into()));
        }
        q
    }
}

#[async_trait]
impl Fetcher for FdsnEventProvider {
    type Payload = Vec<QuakeEvent>;

    async fn fetch(&self, params: &RequestParams, ctx: &RequestContext) -> Result<Vec<QuakeEvent>> {
        let body = match &self.mode {
            Mode::Fixture(body) => body.clone(),
            Mode::Http { base_url, client } => {
                let url = format!("{base_url}{EVENT_PATH}");
                get_body(client, &url, &Self::query(params, ctx)).await?
            }
        };
        let text = String::from_utf8(body).context("event body is not utf-8")?;
        let events = parse_event_text(&text)?;
        if events.is_empty() {
            bail!("no data (no events in response)");
        }
        Ok(events)
    }

    fn name(&self) -> &'static str {
        "fdsn-event"
    }
}

/// Parse the pipe-delimited FDSN event text format.
///
/// Columns: EventID | Time | Latitude | Longitude | Depth/km | Author |
/// Catalog | Contributor | ContributorID | MagType | Magnitude | MagAuthor |
/// EventLocationName. Lines starting with `#` and blank lines are skipped.
pub fn parse_event_text(text: &str) -> Result<Vec<QuakeEvent>> {
    let mut out = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = line.split('|').map(str::trim).collect();
        if cols.len() < 13 {
            bail!(
                "line {}: expected 13 columns, got {}",
                lineno + 1,
                cols.len()
            );
        }
        let num = |idx: usize, what: &str| -> Result<f64> {
            cols[idx]
                .parse::<f64>()
                .with_context(|| format!("line {}: bad {what} {:?}", lineno + 1, cols[idx]))
        };
        out.push(QuakeEvent {
            id: cols[0].to_string(),
            time: parse_fdsn_time(cols[1])
                .with_context(|| format!("line {}: bad time", lineno + 1))?,
            latitude: num(2, "latitude")?,
            longitude: num(3, "longitude")?,
            depth_km: num(4, "depth")?,
            mag_type: cols[9].to_string(),
            magnitude: num(10, "magnitude")?,
            location_name: cols[12].to_string(),
        });
    }
    Ok(out)
}

fn parse_fdsn_time(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|n| n.and_utc())
        .map_err(|e| anyhow!("{s:?}: {e}"))
}

fn require<'a>(params: &'a RequestParams, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("missing request parameter `{key}`"))
}

/// Build the ordered per-station source list used by multi-station downloads.
pub fn station_sources(network: &str, stations: &[&str], location: &str, channel: &str) -> Vec<Source> {
    stations
        .iter()
        .map(|sta| {
            Source::new(*sta)
                .with_param("network", network)
                .with_param("station", *sta)
                .with_param("location", location)
                .with_param("channel", channel)
        })
        .collect()
}

/// TW broadband stations queried by the multi-station waveform job.
pub const TW_STATIONS: [&str; 7] = ["KMNB", "NACB", "SSLB", "TPUB", "TWGB", "YHNB", "YULB"];

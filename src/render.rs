// src/render.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::collect::providers::fdsn::WaveformChunk;
use crate::mapper::{Rgb, Strategy};

/// One event symbol ready for a map renderer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlotPoint {
    pub longitude: f64,
    pub latitude: f64,
    /// Symbol diameter in cm.
    pub size_cm: f64,
    pub depth_km: f64,
    pub magnitude: f64,
    pub color: Rgb,
    pub strategy: Strategy,
}

/// Renderer/saver collaborator. Image drawing lives outside this crate; a
/// sink only has to accept the shapes the pipeline produces.
#[async_trait::async_trait]
pub trait RenderSink: Send + Sync {
    async fn render_events(&self, title: &str, points: &[PlotPoint]) -> Result<()>;
    async fn render_waveforms(&self, title: &str, chunks: &[WaveformChunk]) -> Result<()>;
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum PlotDoc<'a> {
    EventMap {
        title: &'a str,
        points: &'a [PlotPoint],
    },
    Waveforms {
        title: &'a str,
        traces: Vec<TraceDoc<'a>>,
    },
}

#[derive(Serialize)]
struct TraceDoc<'a> {
    source_id: &'a str,
    bytes: usize,
}

/// Writes a JSON plot description for an external plotting step.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn write(&self, doc: &PlotDoc<'_>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(doc).context("serializing plot doc")?;
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("writing {}", self.path.display()))?;
        tracing::info!(path = %self.path.display(), "plot description saved");
        Ok(())
    }
}

#[async_trait::async_trait]
impl RenderSink for JsonFileSink {
    async fn render_events(&self, title: &str, points: &[PlotPoint]) -> Result<()> {
        self.write(&PlotDoc::EventMap { title, points }).await
    }

    async fn render_waveforms(&self, title: &str, chunks: &[WaveformChunk]) -> Result<()> {
        let traces = chunks
            .iter()
            .map(|c| TraceDoc {
                source_id: &c.source_id,
                bytes: c.mseed.len(),
            })
            .collect();
        self.write(&PlotDoc::Waveforms { title, traces }).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    Events(String, Vec<PlotPoint>),
    Waveforms(String, Vec<String>),
}

// --- Test helper ---
pub struct MemorySink {
    pub calls: std::sync::Mutex<Vec<RenderCall>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(vec![]),
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RenderSink for MemorySink {
    async fn render_events(&self, title: &str, points: &[PlotPoint]) -> Result<()> {
        self.calls
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink poisoned"))?
            .push(RenderCall::Events(title.to_string(), points.to_vec()));
        Ok(())
    }

    async fn render_waveforms(&self, title: &str, chunks: &[WaveformChunk]) -> Result<()> {
        let ids = chunks.iter().map(|c| c.source_id.clone()).collect();
        self.calls
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink poisoned"))?
            .push(RenderCall::Waveforms(title.to_string(), ids));
        Ok(())
    }
}

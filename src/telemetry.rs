use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Telemetry {
    pub handle: PrometheusHandle,
}

impl Telemetry {
    /// Install the Prometheus recorder as the global `metrics` recorder.
    /// Fails if another recorder is already installed.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self { handle })
    }

    /// Current scrape in the Prometheus exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

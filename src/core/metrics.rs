use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    tracing::info!("prometheus recorder installed");
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_test_created(backend: &'static str) {
    metrics::counter!("tests_created_total", "backend" => backend).increment(1);
}

pub(crate) fn record_lookup(found: bool) {
    let outcome = if found { "found" } else { "absent" };
    metrics::counter!("test_lookups_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_submission(succeeded: bool, files: usize) {
    let outcome = if succeeded { "recorded" } else { "failed" };
    metrics::counter!("submissions_recorded_total", "outcome" => outcome).increment(1);
    if succeeded {
        metrics::counter!("answer_files_recorded_total").increment(files as u64);
    }
}

use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    install(settings, false)
}

/// Same filter and format, but on stderr so stdout stays free for the session prompt.
pub(crate) fn init_console_tracing(settings: &Settings) -> anyhow::Result<()> {
    install(settings, true)
}

fn install(settings: &Settings, to_stderr: bool) -> anyhow::Result<()> {
    let telemetry = settings.telemetry();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(telemetry.log_level.clone()));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(fmt::format::FmtSpan::CLOSE);

    let installed = match (telemetry.json, to_stderr) {
        (true, false) => builder.json().try_init(),
        (false, false) => builder.try_init(),
        (true, true) => builder.json().with_writer(std::io::stderr).try_init(),
        (false, true) => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))?;

    tracing::debug!(
        level = %telemetry.log_level,
        json = telemetry.json,
        "tracing initialised"
    );
    Ok(())
}

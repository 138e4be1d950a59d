//! Tracing subscriber bootstrap.

use bookshelf_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Calling this twice
/// is harmless; the second install is ignored.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = build_filter(settings)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match settings.log_format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };

    if installed.is_ok() {
        tracing::info!(
            target: "bookshelf-telemetry",
            format = ?settings.log_format,
            "telemetry initialized"
        );
    }

    Ok(())
}

fn build_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.filter)
            .map_err(|err| anyhow::anyhow!("invalid log filter '{}': {}", settings.filter, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_filter() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let settings = TelemetrySettings {
            filter: "bookshelf=loud".to_string(),
            ..TelemetrySettings::default()
        };
        assert!(build_filter(&settings).is_err());
    }

    #[test]
    fn default_filter_parses() {
        assert!(build_filter(&TelemetrySettings::default()).is_ok());
    }
}

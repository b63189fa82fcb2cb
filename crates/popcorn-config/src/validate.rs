//! Validation helpers for settings documents.

use crate::error::{ConfigError, ConfigResult};
use crate::model::{BackendSettings, LoaderSettings, LogSettings, Settings, TorrentSettings};

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Validate a complete settings document.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for the first field that fails.
pub fn validate(settings: &Settings) -> ConfigResult<()> {
    validate_torrent(&settings.torrent)?;
    validate_loader(&settings.loader)?;
    validate_backend(&settings.backend)?;
    validate_logging(&settings.logging)
}

fn validate_torrent(torrent: &TorrentSettings) -> ConfigResult<()> {
    if torrent.directory.as_os_str().is_empty() {
        return Err(invalid("torrent", "directory", None, "must not be empty"));
    }
    Ok(())
}

fn validate_loader(loader: &LoaderSettings) -> ConfigResult<()> {
    let timeouts = [
        (
            "retrieve_subtitles_timeout_secs",
            loader.retrieve_subtitles_timeout_secs,
        ),
        (
            "download_subtitle_timeout_secs",
            loader.download_subtitle_timeout_secs,
        ),
        ("session_init_timeout_secs", loader.session_init_timeout_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            return Err(invalid("loader", field, Some("0".into()), "must be positive"));
        }
    }
    Ok(())
}

fn validate_backend(backend: &BackendSettings) -> ConfigResult<()> {
    let valid_address = backend
        .address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.trim().is_empty() && port.parse::<u16>().is_ok());
    if !valid_address {
        return Err(invalid(
            "backend",
            "address",
            Some(backend.address.clone()),
            "must be host:port",
        ));
    }
    if backend.request_timeout_ms == 0 {
        return Err(invalid(
            "backend",
            "request_timeout_ms",
            Some("0".into()),
            "must be positive",
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LogSettings) -> ConfigResult<()> {
    let level = logging.level.trim();
    let known = LOG_LEVELS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(level));
    // full filter directives such as `popcorn_loader=debug` are accepted as-is
    if level.is_empty() || !(known || level.contains('=')) {
        return Err(invalid(
            "logging",
            "level",
            Some(logging.level.clone()),
            "must be a log level or filter directive",
        ));
    }
    Ok(())
}

fn invalid(
    section: &'static str,
    field: &'static str,
    value: Option<String>,
    reason: &'static str,
) -> ConfigError {
    ConfigError::InvalidField {
        section,
        field,
        value,
        reason,
    }
}

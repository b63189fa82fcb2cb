use std::fs;
use std::path::PathBuf;

use popcorn_config::{ConfigError, ConfigLoader, LogFormatSetting, Settings};

#[test]
fn file_and_env_layers_override_defaults() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("popcorn.yaml");
    fs::write(
        &path,
        "torrent:\n  directory: /data/torrents\nloader:\n  retrieve_subtitles_timeout_secs: 5\nlogging:\n  format: json\n",
    )?;

    let settings = ConfigLoader::default()
        .with_path(&path)
        .with_env([
            ("POPCORN_LOADER__MAX_PREPARE_RETRIES", "5"),
            ("POPCORN_BACKEND__ADDRESS", "10.0.0.2:7000"),
            ("POPCORN_CONFIG", "ignored.yaml"),
            ("HOME", "/root"),
        ])
        .load()?;

    assert_eq!(settings.torrent.directory, PathBuf::from("/data/torrents"));
    assert_eq!(settings.loader.retrieve_subtitles_timeout_secs, 5);
    assert_eq!(settings.loader.download_subtitle_timeout_secs, 30);
    assert_eq!(settings.loader.max_prepare_retries, 5);
    assert_eq!(settings.backend.address, "10.0.0.2:7000");
    assert_eq!(settings.logging.format, Some(LogFormatSetting::Json));
    Ok(())
}

#[test]
fn missing_file_layer_yields_defaults() -> anyhow::Result<()> {
    let settings = ConfigLoader::default().load()?;
    assert_eq!(settings, Settings::default());
    Ok(())
}

#[test]
fn unknown_override_is_rejected() {
    let err = ConfigLoader::default()
        .with_env([("POPCORN_LOADER__WARP_SPEED", "9")])
        .load()
        .expect_err("unknown field");
    assert!(matches!(err, ConfigError::UnknownField { key } if key == "POPCORN_LOADER__WARP_SPEED"));
}

#[test]
fn unreadable_or_invalid_documents_fail() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    let missing = ConfigLoader::default()
        .with_path(dir.path().join("absent.yaml"))
        .load()
        .expect_err("missing file");
    assert!(matches!(missing, ConfigError::Io { operation: "config.read", .. }));

    let path = dir.path().join("bad.yaml");
    fs::write(&path, "loader:\n  session_init_timeout_secs: 0\n")?;
    let invalid = ConfigLoader::default()
        .with_path(&path)
        .load()
        .expect_err("zero timeout");
    assert!(matches!(invalid, ConfigError::InvalidField { section: "loader", .. }));

    fs::write(&path, "loader:\n  unknown: true\n")?;
    let malformed = ConfigLoader::default()
        .with_path(&path)
        .load()
        .expect_err("unknown key");
    assert!(matches!(malformed, ConfigError::Malformed { path: Some(_), .. }));
    Ok(())
}

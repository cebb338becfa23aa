use anyhow::Result;
use clap::Parser;
use std::{fs, time::Duration};
use tempfile::TempDir;
use yakker_stream::settings::{AppArgs, Settings};

#[test]
fn test_file_environment_and_flags_layer() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("yakker.toml");
    fs::write(
        &config_path,
        r#"
ws_url = "wss://feed.example.com/live"
auth_header = "Authorization: Basic c2VjcmV0"
port = 8100
stale_timeout = 8.0
event_grace_ms = 750
"#,
    )?;

    // Environment overrides the file; flags override both.
    unsafe {
        std::env::set_var("YAKKER_PORT", "8200");
        std::env::set_var("YAKKER_MIN_EXIT_VELOCITY_ENABLED", "true");
    }

    let args = AppArgs::parse_from([
        "yakker-stream",
        "--config",
        config_path.to_str().unwrap(),
        "--stale-timeout",
        "12",
    ]);
    let settings = Settings::load(&args);

    unsafe {
        std::env::remove_var("YAKKER_PORT");
        std::env::remove_var("YAKKER_MIN_EXIT_VELOCITY_ENABLED");
    }

    let settings = settings?;
    assert_eq!(settings.port, 8200);
    assert_eq!(settings.stale_timeout(), Duration::from_secs(12));
    assert_eq!(settings.event_grace(), Duration::from_millis(750));
    assert_eq!(settings.auth_value().as_deref(), Some("Basic c2VjcmV0"));
    assert_eq!(settings.feed_url()?.as_str(), "wss://feed.example.com/live");
    assert_eq!(settings.aggregator_policy().min_exit_velocity_mph, Some(65.0));
    Ok(())
}

#[test]
fn test_missing_credentials_rejected_at_startup() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("yakker.toml");
    fs::write(&config_path, "ws_url = \"wss://feed.example.com/live\"\n")?;

    let args = AppArgs::parse_from([
        "yakker-stream",
        "--config",
        config_path.to_str().unwrap(),
    ]);
    let err = Settings::load(&args).unwrap_err();
    assert!(err.to_string().contains("auth_header"));

    let args = AppArgs::parse_from([
        "yakker-stream",
        "--config",
        config_path.to_str().unwrap(),
        "--demo",
    ]);
    assert!(Settings::load(&args)?.demo);
    Ok(())
}

#[test]
fn test_missing_config_file_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("yakker-typo.toml");

    let args = AppArgs::parse_from([
        "yakker-stream",
        "--config",
        config_path.to_str().unwrap(),
        "--demo",
    ]);
    let err = Settings::load(&args).unwrap_err();
    assert!(format!("{err:#}").contains("not found"), "{err:#}");

    // Without --config only the environment and defaults apply.
    assert!(Settings::load(&AppArgs::parse_from(["yakker-stream", "--demo"]))?.demo);
    Ok(())
}

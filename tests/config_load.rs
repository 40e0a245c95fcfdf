// tests/config_load.rs
use std::{env, fs};

use trendwire::config::PipelineConfig;
use trendwire::gatherer::ParsePolicy;

const ENV_PATH: &str = "TRENDWIRE_CONFIG_PATH";

#[serial_test::serial]
#[test]
fn env_path_takes_precedence() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("trendwire.toml");
    fs::write(
        &path,
        r#"
        [gatherer]
        batch_size = 16
        parse_policy = "skip_malformed"

        [http_receiver]
        enabled = false
        "#,
    )
    .unwrap();

    env::set_var(ENV_PATH, path.display().to_string());
    let cfg = PipelineConfig::load().unwrap();
    env::remove_var(ENV_PATH);

    assert_eq!(cfg.gatherer.batch_size, 16);
    assert_eq!(cfg.gatherer.parse_policy, ParsePolicy::SkipMalformed);
    assert!(!cfg.http_receiver.enabled);
    // Untouched sections keep their defaults.
    assert_eq!(cfg.gatherer.fetch_interval_secs, 5);
    assert!(cfg.queue.redis_url.is_none());
}

#[serial_test::serial]
#[test]
fn env_path_to_missing_file_is_an_error() {
    env::set_var(ENV_PATH, "/definitely/not/here.toml");
    let err = PipelineConfig::load().unwrap_err();
    env::remove_var(ENV_PATH);
    assert!(err.to_string().contains("non-existent"));
}

#[serial_test::serial]
#[test]
fn defaults_apply_when_nothing_is_configured() {
    env::remove_var(ENV_PATH);
    // Isolate CWD so a real config/ dir in the repo does not interfere.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    let cfg = PipelineConfig::load().unwrap();
    assert_eq!(cfg.gatherer.batch_size, 1);
    assert!(cfg.github_trending.enabled);
    assert!(!cfg.arxiv.enabled);

    env::set_current_dir(&old).unwrap();
}

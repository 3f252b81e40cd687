use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use omicorr::error::{ConfigError, Error};
use omicorr::infrastructure::config::logging::LogFormat;
use omicorr::infrastructure::config::settings::Config;
use omicorr::port::outbound::store::CommitMode;

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn write_temp_config(contents: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let suffix = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.push(format!("omicorr-config-test-{nanos}-{suffix}.toml"));
    fs::write(&path, contents).expect("write temp config");
    path
}

fn expect_invalid(toml: &str, expected: &str) {
    match Config::parse_toml(toml) {
        Err(Error::Config(ConfigError::InvalidValue { field, .. })) if field == expected => {}
        Err(err) => panic!("Expected invalid {expected}, got {err}"),
        Ok(_) => panic!("Expected invalid {expected}, config was accepted"),
    }
}

#[test]
fn empty_config_uses_defaults() {
    let config = Config::parse_toml("").unwrap();

    assert_eq!(config.executor.max_workers, 2);
    assert_eq!(config.executor.max_attempts, 3);
    assert_eq!(config.executor.commit_mode(), CommitMode::Transactional);
    assert_eq!(config.executor.results_table, "experiment_results");
    assert_eq!(config.engine.program, "omicorr-engine");
    assert!(config.engine.adjusts_p_values);
    assert_eq!(config.sources.delimiter_byte(), Some(b'\t'));
    assert_eq!(config.logging.level, "info");
}

#[test]
fn full_config_loads_from_file() {
    let toml = r#"
[logging]
level = "debug"
format = "json"

[executor]
max_workers = 1
max_attempts = 5
transactional = false
retry_delay_ms = 250
result_chunk_size = 200
results_table = "correlations"
staging_dir = "/var/tmp/omicorr"

[engine]
program = "/opt/ggca/bin/engine"
args = ["--threads", "4"]
poll_interval_ms = 100
in_memory_threshold_bytes = 0
adjusts_p_values = false

[sources]
chunk_size = 1000
delimiter = ","
root = "/data/omics"
"#;

    let path = write_temp_config(toml);
    let result = Config::load(&path);
    let _ = fs::remove_file(&path);
    let config = result.unwrap();

    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.executor.max_attempts, 5);
    assert_eq!(config.executor.commit_mode(), CommitMode::CompensatingDelete);
    assert_eq!(config.executor.retry_delay().as_millis(), 250);
    assert_eq!(
        config.executor.staging_dir(),
        PathBuf::from("/var/tmp/omicorr")
    );
    assert_eq!(config.engine.args, vec!["--threads", "4"]);
    assert_eq!(config.engine.in_memory_threshold(), None);
    assert!(!config.engine.adjusts_p_values);
    assert_eq!(config.sources.delimiter_byte(), Some(b','));
    assert_eq!(config.sources.root, Some(PathBuf::from("/data/omics")));
}

#[test]
fn zero_workers_rejected() {
    expect_invalid("[executor]\nmax_workers = 0\n", "max_workers");
}

#[test]
fn zero_attempts_rejected() {
    expect_invalid("[executor]\nmax_attempts = 0\n", "max_attempts");
}

#[test]
fn unsafe_results_table_rejected() {
    expect_invalid(
        "[executor]\nresults_table = \"results; DROP TABLE experiments\"\n",
        "results_table",
    );
}

#[test]
fn multi_byte_delimiter_rejected() {
    expect_invalid("[sources]\ndelimiter = \"::\"\n", "delimiter");
}

#[test]
fn empty_engine_program_rejected() {
    match Config::parse_toml("[engine]\nprogram = \"  \"\n") {
        Err(Error::Config(ConfigError::MissingField { field: "program" })) => {}
        Err(err) => panic!("Expected missing program, got {err}"),
        Ok(_) => panic!("Expected missing program, config was accepted"),
    }
}

#[test]
fn malformed_toml_is_a_parse_error() {
    assert!(matches!(
        Config::parse_toml("[executor\nmax_workers = 1"),
        Err(Error::Config(ConfigError::Parse(_)))
    ));
}

#[test]
fn missing_file_is_a_read_error() {
    assert!(matches!(
        Config::load("/nonexistent/omicorr.toml"),
        Err(Error::Config(ConfigError::ReadFile(_)))
    ));
}

//! Loading configuration from disk.

use std::io::Write;

use nc4async::{Config, ConfigError, EventLoop, LogFormat};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

#[test]
fn from_file_reads_both_tables() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[engine]
worker_threads = 2
thread_name = "nc-io"

[logging]
filter = "nc4async=trace"
format = "pretty"
"#
    )
    .unwrap();

    let mut config = Config::from_toml(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
    config.apply_overrides(|_| None);
    assert_eq!(config.engine.worker_threads, 2);
    assert_eq!(config.engine.thread_name, "nc-io");
    assert_eq!(config.logging.filter, "nc4async=trace");
    assert_eq!(config.logging.format, LogFormat::Pretty);

    assert!(Config::from_file(file.path()).is_ok());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    match Config::from_file(&path) {
        Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path.display().to_string()),
        other => panic!("expected an IO error, got {other:?}"),
    }
}

#[test]
fn malformed_file_is_a_parse_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[engine\nworker_threads = 1").unwrap();
    assert!(matches!(Config::from_file(file.path()), Err(ConfigError::Parse(_))));
}

#[test]
fn loaded_engine_config_starts_an_event_loop() {
    let config = Config::from_toml("[engine]\nworker_threads = 1\nthread_name = \"cfg-worker\"").unwrap();
    let event_loop = EventLoop::new(config.engine).unwrap();
    let name = event_loop.block_on(|engine| async move {
        engine
            .submit(
                |_ctx| Ok::<_, nc4async::TaskError>(std::thread::current().name().map(str::to_string)),
                |_env, name| Ok(name),
            )
            .await
    });
    assert_eq!(name.unwrap().as_deref(), Some("cfg-worker"));
}

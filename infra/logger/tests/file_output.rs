use std::fs;
use std::time::Duration;
use tempfile::tempdir;
use vain_logger::{LevelFilter, LogFormat, Logger, LoggerError};

#[test]
fn test_json_file_output_and_single_install() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    let log_dir = tmp_dir.path().join("logs");

    let logger = Logger::builder()
        .name("vaind-test")
        .console(false)
        .format(LogFormat::Json)
        .level(LevelFilter::INFO)
        .directory(&log_dir)
        .init()?;
    assert!(logger.writes_files());

    tracing::info!(namespace = "sm", "Namespace bound");

    let err = Logger::builder().name("vaind-second").init().expect_err("second init should fail");
    assert!(matches!(err, LoggerError::Subscriber { .. }), "{err}");

    std::thread::sleep(Duration::from_millis(30));
    drop(logger);

    let log_file = fs::read_dir(&log_dir)?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| path.extension().and_then(|ext| ext.to_str()) == Some("log"))
        .expect("log file should be created");

    let contents = fs::read_to_string(log_file)?;
    let line = contents.lines().find(|l| l.contains("Namespace bound")).expect("event logged");
    let event: serde_json::Value = serde_json::from_str(line)?;
    assert_eq!(event["fields"]["namespace"], "sm");
    Ok(())
}

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "coffeechat_digest";
const KEEP_LOG_FILES: usize = 7;

/// Daily-rotated log file in `log_dir`, keeping the last week of files.
fn file_writer(log_dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(KEEP_LOG_FILES)
        .build(log_dir)
        .context("Failed to open log file")?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Console output plus a rolling file under `log_dir`. The returned guard
/// flushes the file writer when dropped, so hold it for the whole process.
pub fn init(log_dir: &Path) -> Result<WorkerGuard> {
    let (file, guard) = file_writer(log_dir)?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_writer_creates_dir_and_flushes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        let (mut writer, guard) = file_writer(&log_dir).unwrap();
        writer.write_all(b"run started\n").unwrap();
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(&log_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(LOG_FILE_PREFIX));
        assert!(name.ends_with(".log"));
        assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), "run started\n");
    }

    #[test]
    fn file_writer_fails_when_dir_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, "x").unwrap();
        assert!(file_writer(&blocker).is_err());
    }
}

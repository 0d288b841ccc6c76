use crate::config;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, PartialEq, Eq)]
enum Sink {
    File(PathBuf),
    Stderr,
    Off,
}

/// Installs the global subscriber. Events go to a daily log file under the
/// data dir. Without one, one-shot commands log to stderr and the TUI, which
/// owns the terminal, logs nowhere. Keep the returned guard alive for the life
/// of the process.
pub fn init(filter: &str, verbose: u8, interactive: bool) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive(filter, verbose)))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    match sink(config::log_dir(), interactive) {
        Sink::Off => Ok(None),
        Sink::Stderr => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .try_init()
                .context("installing log subscriber")?;
            Ok(None)
        }
        Sink::File(dir) => {
            fs::create_dir_all(&dir).with_context(|| format!("creating {:?}", dir))?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("todos")
                .filename_suffix("log")
                .build(&dir)
                .context("opening log file")?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true)
                        .with_line_number(true),
                )
                .try_init()
                .context("installing log subscriber")?;
            Ok(Some(guard))
        }
    }
}

fn directive(filter: &str, verbose: u8) -> &str {
    match verbose {
        0 => filter,
        1 => "debug",
        _ => "trace",
    }
}

fn sink(log_dir: Option<PathBuf>, interactive: bool) -> Sink {
    match (log_dir, interactive) {
        (Some(dir), _) => Sink::File(dir),
        (None, true) => Sink::Off,
        (None, false) => Sink::Stderr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_overrides_configured_filter() {
        assert_eq!(directive("warn,todos=info", 0), "warn,todos=info");
        assert_eq!(directive("warn", 1), "debug");
        assert_eq!(directive("warn", 3), "trace");
    }

    #[test]
    fn tui_never_logs_to_the_terminal() {
        assert_eq!(sink(None, true), Sink::Off);
        assert_eq!(sink(None, false), Sink::Stderr);
        let dir = PathBuf::from("/tmp/todos/logs");
        assert_eq!(sink(Some(dir.clone()), true), Sink::File(dir));
    }
}

use std::{
    io::{self, IsTerminal, Write},
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::{cli::ColorChoice, config::CONFIG_FILE_NAME};

/// Keeps the file log writer alive. Dropping it flushes buffered lines.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Installs the global subscriber: a console layer on stderr and, when a
/// workspace and a level are given, a daily rolling file under
/// `<workspace>/.canopy/logs`.
pub fn init_logging(
    verbosity: u8,
    color: ColorChoice,
    workspace_dir: Option<&Path>,
    file_log_level: Option<LevelFilter>,
    command_name: &str,
) -> LogGuard {
    tracing_log::LogTracer::init().expect("Failed to set log tracer");

    let console_filter = match verbosity {
        0 => "info",
        1 => "info,libcanopy=debug",
        2 => "info,libcanopy=trace",
        _ => "trace",
    };

    let console_env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_filter));

    let use_ansi = match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => io::stderr().is_terminal(),
    };

    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(use_ansi)
        .without_time()
        .with_target(false)
        .with_thread_names(false)
        .with_level(true)
        .with_filter(console_env_filter);

    let (file_layer, file_guard) = match (workspace_dir, file_log_level) {
        (Some(dir), Some(level)) => match file_layer(dir, level, command_name) {
            Some((layer, guard)) => (Some(layer), Some(guard)),
            None => (None, None),
        },
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    LogGuard {
        _file_guard: file_guard,
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn file_layer(
    workspace_dir: &Path,
    level: LevelFilter,
    command_name: &str,
) -> Option<(BoxedLayer, WorkerGuard)> {
    let log_dir = workspace_dir.join(".canopy").join("logs");

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!(
            "Warning: could not create log directory {}: {e}",
            log_dir.display()
        );
        return None;
    }

    compress_old_logs(&log_dir, command_name);

    let file_appender = match tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(command_name)
        .filename_suffix("log")
        .build(&log_dir)
    {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!(
                "Warning: could not open a log file in {}: {e}",
                log_dir.display()
            );
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_filter(EnvFilter::new(level.to_string()))
        .boxed();

    Some((layer, guard))
}

/// Compressed logs older than this many days are deleted.
const GZ_RETENTION_DAYS: u64 = 7;

fn days_since_epoch(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|since| since.as_secs() / 86400)
}

fn modified_day(entry: &std::fs::DirEntry) -> Option<u64> {
    entry
        .metadata()
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(days_since_epoch)
}

/// Gzips logs of `command_name` from previous days and prunes old archives
/// of every command.
fn compress_old_logs(log_dir: &Path, command_name: &str) {
    let today = days_since_epoch(SystemTime::now()).unwrap_or_default();

    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if file_name.ends_with(".log.gz") {
            let age = modified_day(&entry).map_or(0, |day| today.saturating_sub(day));
            if age > GZ_RETENTION_DAYS {
                let _ = std::fs::remove_file(&path);
            }
            continue;
        }

        if !file_name.ends_with(".log") || !file_name.starts_with(command_name) {
            continue;
        }

        // The appender is still writing today's file.
        if modified_day(&entry).unwrap_or(today) >= today {
            continue;
        }

        let Ok(input) = std::fs::read(&path) else {
            continue;
        };
        let gz_path = path.with_extension("log.gz");
        let Ok(gz_file) = std::fs::File::create(&gz_path) else {
            continue;
        };

        let mut encoder = flate2::write::GzEncoder::new(gz_file, flate2::Compression::default());
        if encoder.write_all(&input).is_ok() && encoder.finish().is_ok() {
            let _ = std::fs::remove_file(&path);
        } else {
            let _ = std::fs::remove_file(&gz_path);
        }
    }
}

/// Maps a `fileLogLevel` value to a filter. `None` means file logging is
/// off. Unknown values fall back to trace.
pub fn parse_file_log_level(level: &str) -> Option<LevelFilter> {
    match level.to_lowercase().as_str() {
        "none" | "off" => None,
        "error" => Some(LevelFilter::ERROR),
        "warn" => Some(LevelFilter::WARN),
        "info" => Some(LevelFilter::INFO),
        "debug" => Some(LevelFilter::DEBUG),
        "trace" => Some(LevelFilter::TRACE),
        _ => Some(LevelFilter::TRACE),
    }
}

/// Lightweight pre-read of a workspace config to extract `fileLogLevel`
/// before logging is set up. Accepts either the config file itself or the
/// workspace directory.
///
/// Returns `None` if there is no config or the field is absent (caller
/// defaults to trace). Returns `Some(None)` when file logging is disabled.
pub fn quick_read_file_log_level(path: &Path) -> Option<Option<LevelFilter>> {
    let config_file = if path.is_file() {
        path.to_path_buf()
    } else {
        let config_path = path.join(CONFIG_FILE_NAME);
        if !config_path.is_file() {
            return None;
        }
        config_path
    };

    let contents = std::fs::read_to_string(&config_file).ok()?;
    let val = crate::json::parse_value(&contents).ok()?;
    let level = val.get("fileLogLevel")?.as_str()?;

    Some(parse_file_log_level(level))
}

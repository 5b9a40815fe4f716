use std::fs::OpenOptions;
use std::path::Path;

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

/// Drop the oldest lines of an oversized log, keeping whole lines that fit
/// in half of `max_log_size`. Returns whether the file was rewritten.
fn trim_log_file_if_oversized(log_path: &Path, max_log_size: u64) -> std::io::Result<bool> {
    let size = match std::fs::metadata(log_path) {
        Ok(metadata) => metadata.len(),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(error) => return Err(error),
    };
    if size <= max_log_size {
        return Ok(false);
    }

    let contents = std::fs::read(log_path)?;
    let budget = usize::try_from(max_log_size / 2).unwrap_or(usize::MAX);
    let tail_start = contents.len().saturating_sub(budget);
    let keep_from = contents[tail_start..]
        .iter()
        .position(|&byte| byte == b'\n')
        .map_or(contents.len(), |offset| tail_start + offset + 1);
    std::fs::write(log_path, &contents[keep_from..])?;
    Ok(true)
}

fn level_for(debug_enabled: bool) -> LevelFilter {
    if debug_enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Log to stderr and, when a path is given and can be opened, append to a
/// log file as well. Both sinks only accept records from the `refresh`
/// crates.
pub fn init_logging(debug_enabled: bool, log_path: Option<&Path>, max_log_size: u64) {
    let level = level_for(debug_enabled);
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("refresh")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(log_path) = log_path {
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(error) = trim_log_file_if_oversized(log_path, max_log_size) {
            eprintln!("refresh: cannot trim log file {}: {error}", log_path.display());
        }
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => loggers.push(WriteLogger::new(level, config, file)),
            Err(error) => {
                eprintln!("refresh: cannot open log file {}: {error}", log_path.display());
            }
        }
    }

    let _ = CombinedLogger::init(loggers);

    if let Some(log_path) = log_path {
        log::debug!("Logging initialized, log file: {}", log_path.display());
    }
}

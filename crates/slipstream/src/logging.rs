#[cfg(debug_assertions)]
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use simplelog::{CombinedLogger, ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

fn log_file_path() -> Option<PathBuf> {
    Some(dirs::cache_dir()?.join("slipstream/slipstream.log"))
}

fn trim_log_file_if_oversized(log_path: &Path, max_log_size: u64) {
    if let Ok(metadata) = std::fs::metadata(log_path)
        && metadata.len() > max_log_size
        && let Ok(contents) = std::fs::read(log_path)
    {
        let half = contents.len() / 2;
        let keep_from = contents[half..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(half, |pos| half + pos + 1);
        let _ = std::fs::write(log_path, &contents[keep_from..]);
    }
}

/// Initialize logging to the per-user log file (and to the terminal in
/// debug builds). Terminal output stays quiet in release builds so the
/// progress display owns stdout.
pub fn init_logging(debug_enabled: bool, max_log_size: u64) {
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("slipstream")
        .build();

    let file_logger = log_file_path().and_then(|log_path| {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        trim_log_file_if_oversized(&log_path, max_log_size);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok()?;
        Some(WriteLogger::new(LevelFilter::Debug, config.clone(), file))
    });

    #[cfg(debug_assertions)]
    {
        let term_logger = TermLogger::new(
            LevelFilter::Debug,
            config,
            TerminalMode::Stderr,
            ColorChoice::Auto,
        );
        let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> = vec![term_logger];
        if let Some(file_logger) = file_logger {
            loggers.push(file_logger);
        }
        let _ = CombinedLogger::init(loggers);
    }

    #[cfg(not(debug_assertions))]
    {
        if let Some(file_logger) = file_logger {
            let _ = CombinedLogger::init(vec![file_logger]);
        }
    }

    if debug_enabled {
        log::set_max_level(log::LevelFilter::Debug);
    } else {
        log::set_max_level(log::LevelFilter::Info);
    }
}

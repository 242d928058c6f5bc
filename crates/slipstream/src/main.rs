mod logging;
mod settings;
mod single_instance;

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use log::info;
use slipstream_core::{Outcome, UpdateEvent, UpdateSession};

use crate::settings::Settings;
use crate::single_instance::{LOCK_FILE_NAME, SingleInstance};

const USAGE: &str = "usage: slipstream <target-dir> [settings-file]";

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(target_dir) = args.next().map(PathBuf::from) else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };
    let settings_path = args.next().map(PathBuf::from);

    let settings = Settings::load(settings_path.as_deref());
    logging::init_logging(settings.debug_logging, settings.max_log_size_bytes);

    if !target_dir.is_dir() {
        eprintln!(
            "slipstream: target directory {} does not exist",
            target_dir.display()
        );
        return ExitCode::from(2);
    }

    let _instance = match SingleInstance::acquire(&target_dir) {
        Ok(guard) => guard,
        Err(error) => {
            eprintln!("slipstream: {error}");
            return ExitCode::FAILURE;
        }
    };

    let mut config = settings.into_config(target_dir);
    // The lock file lives inside the target directory; keep the pruner
    // away from it.
    config.preserved_roots.push(LOCK_FILE_NAME.to_string());

    info!("starting update against {}", config.target_dir.display());
    let (handle, mut events) = UpdateSession::new(config).spawn();

    let mut display = ProgressLine::default();
    let mut stop_requested = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(UpdateEvent::Status(text)) => display.status(&text),
                Some(UpdateEvent::Progress(percent)) => display.progress(percent),
                Some(UpdateEvent::Finished(outcome)) => {
                    display.clear();
                    return finish(&outcome);
                }
                None => {
                    eprintln!("slipstream: session ended without an outcome");
                    return ExitCode::FAILURE;
                }
            },
            result = tokio::signal::ctrl_c(), if !stop_requested => {
                if result.is_ok() {
                    stop_requested = true;
                    display.clear();
                    println!("Stopping...");
                    handle.request_stop();
                }
            }
        }
    }
}

/// Single-line terminal progress display. Stage banners get their own
/// line; per-chunk and per-member counters overwrite in place.
#[derive(Default)]
struct ProgressLine {
    percent: u8,
    detail: String,
    dirty: bool,
}

impl ProgressLine {
    fn status(&mut self, text: &str) {
        if text.contains(" / ") {
            self.detail = text.to_string();
            self.redraw();
        } else {
            self.clear();
            println!("{text}");
        }
    }

    fn progress(&mut self, percent: u8) {
        self.percent = percent;
        self.redraw();
    }

    fn redraw(&mut self) {
        let filled = usize::from(self.percent) / 5;
        print!(
            "\r[{:<20}] {:3}% {:<40}",
            "#".repeat(filled),
            self.percent,
            self.detail
        );
        let _ = std::io::stdout().flush();
        self.dirty = true;
    }

    fn clear(&mut self) {
        if self.dirty {
            println!();
            self.dirty = false;
            self.detail.clear();
        }
    }
}

fn finish(outcome: &Outcome) -> ExitCode {
    match outcome {
        Outcome::Success(message) => {
            println!("{message}");
            ExitCode::SUCCESS
        }
        Outcome::Failure(message) => {
            eprintln!("slipstream: {message}");
            ExitCode::FAILURE
        }
        Outcome::Cancelled => {
            println!("Update cancelled.");
            ExitCode::from(130)
        }
    }
}

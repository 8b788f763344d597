use std::io::IsTerminal;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Initializes tracing for the bridge binary. `RUST_LOG` overrides the
/// default level; `UIBRIDGE_LOG` redirects output to a file (the bridge
/// usually runs detached, so stderr may go nowhere).
pub fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let writer = match log_file_path_from_env() {
        Some(path) => match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            Ok(file) => BoxMakeWriter::new(std::sync::Mutex::new(file)),
            Err(err) => {
                eprintln!(
                    "Warning: failed to open log file {}: {}",
                    path.display(),
                    err
                );
                BoxMakeWriter::new(std::io::stderr)
            }
        },
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_names(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(writer);

    // A second init (tests, embedding) is fine; keep the first one.
    let _ = subscriber.try_init();
}

fn log_file_path_from_env() -> Option<PathBuf> {
    std::env::var("UIBRIDGE_LOG").ok().map(PathBuf::from)
}

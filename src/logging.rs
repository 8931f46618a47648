use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LogOutput, LoggingConfig};
use crate::error::Result;

/// Install the global subscriber. `RUST_LOG` takes precedence over `logging.level`.
pub fn init(cfg: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (cfg.format, cfg.output) {
        (LogFormat::Json, LogOutput::Stdout) => builder.json().init(),
        (LogFormat::Json, LogOutput::Stderr) => builder.json().with_writer(std::io::stderr).init(),
        (LogFormat::Console, LogOutput::Stdout) => builder.init(),
        (LogFormat::Console, LogOutput::Stderr) => builder.with_writer(std::io::stderr).init(),
        (format, LogOutput::File) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&cfg.file_path)?;
            let writer = Mutex::new(file);
            match format {
                LogFormat::Json => builder.json().with_writer(writer).init(),
                LogFormat::Console => builder.with_ansi(false).with_writer(writer).init(),
            }
        }
    }
    Ok(())
}

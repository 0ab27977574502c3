use std::path::PathBuf;

use fern::Dispatch;
use log::LevelFilter;

#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        LoggerOptions {
            log_level: LevelFilter::Info,
            log_file: None,
        }
    }
}

/// Build the process-wide logger dispatch; the caller applies it once at
/// startup. Logs go to stdout, plus a file when one is configured.
pub fn system_logger(options: LoggerOptions) -> std::io::Result<Dispatch> {
    let mut dispatcher = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{{{}}} [{}/{}] {}",
                chrono::Local::now().format("%d/%m/%y %H:%M:%S"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(options.log_level)
        .chain(std::io::stdout());

    if let Some(path) = options.log_file.as_ref() {
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        dispatcher = dispatcher.chain(fern::log_file(path)?);
    }

    Ok(dispatcher)
}

use log::LevelFilter;
use std::path::PathBuf;

/// Where diagnostics go and how much of them.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: LevelFilter,
    /// Append to this file instead of writing to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::Warn,
            file: None,
        }
    }
}

impl LogSettings {
    pub fn new(debug: bool, file: Option<PathBuf>) -> Self {
        let level = if debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        };
        Self { level, file }
    }
}

/// Install the global logger. Can only succeed once per process.
pub fn init(settings: &LogSettings) -> Result<(), fern::InitError> {
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(settings.level);

    let dispatch = match &settings.file {
        Some(path) => dispatch.chain(fern::log_file(path)?),
        None => dispatch.chain(std::io::stderr()),
    };

    dispatch.apply()?;
    Ok(())
}

//! Logging setup.
//!
//! Logs go to stderr so the run summary on stdout stays clean. `RUST_LOG`
//! always wins over the level picked from `-v`/`-q`.

use tracing_subscriber::{fmt, EnvFilter};

/// Log level selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
}

impl LogLevel {
    /// 0 = info, 1 = debug, 2+ = trace. `quiet` drops to warnings only.
    pub fn from_flags(verbosity: u8, quiet: bool) -> Self {
        if quiet {
            return LogLevel::Warn;
        }
        match verbosity {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Filter directive for this level.
    ///
    /// Noisy HTTP internals stay at `warn` unless tracing everything.
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug,hyper=info,reqwest=info",
            LogLevel::Info => "info,hyper=warn,reqwest=warn",
            LogLevel::Warn => "warn",
        }
    }
}

/// Configuration for the subscriber.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub with_target: bool,
    pub with_ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_target: false,
            with_ansi: true,
        }
    }
}

impl LoggingConfig {
    pub fn from_flags(verbosity: u8, quiet: bool) -> Self {
        Self {
            level: LogLevel::from_flags(verbosity, quiet),
            // Module paths only help when debugging.
            with_target: verbosity > 0,
            ..Self::default()
        }
    }

    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(self.level.directive())
        }
    }
}

/// Install the global subscriber. Call once, at startup.
pub fn init_logging(config: LoggingConfig) {
    fmt::Subscriber::builder()
        .with_env_filter(config.env_filter())
        .with_writer(std::io::stderr)
        .with_target(config.with_target)
        .with_ansi(config.with_ansi)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_flags() {
        assert_eq!(LogLevel::from_flags(0, false), LogLevel::Info);
        assert_eq!(LogLevel::from_flags(1, false), LogLevel::Debug);
        assert_eq!(LogLevel::from_flags(2, false), LogLevel::Trace);
        assert_eq!(LogLevel::from_flags(7, false), LogLevel::Trace);
        assert_eq!(LogLevel::from_flags(0, true), LogLevel::Warn);
    }

    #[test]
    fn test_config_from_flags() {
        let config = LoggingConfig::from_flags(1, false).with_ansi(false);
        assert_eq!(config.level, LogLevel::Debug);
        assert!(config.with_target);
        assert!(!config.with_ansi);

        assert!(!LoggingConfig::from_flags(0, false).with_target);
    }

    #[test]
    fn test_directives_parse() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
        ] {
            assert!(EnvFilter::try_new(level.directive()).is_ok());
        }
    }
}

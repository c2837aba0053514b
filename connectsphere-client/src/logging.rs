use log::LevelFilter;
use simplelog::*;
use std::fs::File;
use std::path::PathBuf;

/// Logging configuration for the ConnectSphere client
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Master switch to enable/disable all logging
    pub enabled: bool,
    /// Path to the log file
    pub log_file: PathBuf,
    /// Whether to clear the log file on startup
    pub clear_on_startup: bool,
    /// Feature flags for specific logging categories
    pub features: LogFeatures,
    /// Overall log level
    pub level: LevelFilter,
}

/// Feature flags for specific logging categories
#[derive(Debug, Clone)]
pub struct LogFeatures {
    /// Log every HTTP request and its outcome
    pub api_calls: bool,
    /// Log post store commits and rejected mutations
    pub store: bool,
    /// Log view loads and reconciliation commits
    pub views: bool,
    /// Log login, logout and credential handling
    pub auth: bool,
    /// Log general debug messages
    pub general: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_file: PathBuf::from("connectsphere.log"),
            clear_on_startup: true,
            features: LogFeatures::default(),
            level: LevelFilter::Debug,
        }
    }
}

impl Default for LogFeatures {
    fn default() -> Self {
        Self {
            api_calls: true,
            store: true,
            views: true,
            auth: true,
            general: true,
        }
    }
}

impl LogFeatures {
    fn none() -> Self {
        Self {
            api_calls: false,
            store: false,
            views: false,
            auth: false,
            general: false,
        }
    }
}

impl LogConfig {
    /// Create a new log configuration with all features disabled
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            features: LogFeatures::none(),
            ..Default::default()
        }
    }

    /// Only errors and warnings
    pub fn minimal() -> Self {
        Self {
            enabled: true,
            level: LevelFilter::Warn,
            features: LogFeatures::none(),
            ..Default::default()
        }
    }

    /// Everything, at trace level
    pub fn verbose() -> Self {
        Self {
            enabled: true,
            level: LevelFilter::Trace,
            features: LogFeatures::default(),
            ..Default::default()
        }
    }

    /// Same configuration writing to another file
    pub fn with_log_file(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.log_file = log_file.into();
        self
    }
}

/// Initialize the logging system with the given configuration
///
/// Only the first call in a process installs a logger; later calls are no-ops.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    if !config.enabled {
        let _ = WriteLogger::init(LevelFilter::Off, Config::default(), std::io::sink());
        return Ok(());
    }

    if config.clear_on_startup {
        let _ = File::create(&config.log_file)?;
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)?;

    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_time_offset_to_local()
        .unwrap_or_else(|builder| builder)
        .build();

    if WriteLogger::init(config.level, log_config, log_file).is_err() {
        log::debug!("Logger already initialized, keeping the existing one");
        return Ok(());
    }

    log::info!(
        "Logging initialized: file={}, level={:?}",
        config.log_file.display(),
        config.level
    );
    log::debug!("Log features: {:?}", config.features);

    Ok(())
}

/// Macro for logging API calls
#[macro_export]
macro_rules! log_api_call {
    ($config:expr, $($arg:tt)*) => {
        if $config.enabled && $config.features.api_calls {
            log::debug!(target: "api_calls", $($arg)*);
        }
    };
}

/// Macro for logging post store activity
#[macro_export]
macro_rules! log_store {
    ($config:expr, $($arg:tt)*) => {
        if $config.enabled && $config.features.store {
            log::debug!(target: "store", $($arg)*);
        }
    };
}

/// Macro for logging view loads and reconciliation
#[macro_export]
macro_rules! log_view {
    ($config:expr, $($arg:tt)*) => {
        if $config.enabled && $config.features.views {
            log::debug!(target: "views", $($arg)*);
        }
    };
}

/// Macro for logging authentication events
#[macro_export]
macro_rules! log_auth {
    ($config:expr, $($arg:tt)*) => {
        if $config.enabled && $config.features.auth {
            log::debug!(target: "auth", $($arg)*);
        }
    };
}

/// Macro for general debug logging
#[macro_export]
macro_rules! log_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.enabled && $config.features.general {
            log::debug!(target: "general", $($arg)*);
        }
    };
}

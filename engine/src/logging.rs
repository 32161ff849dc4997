//! Run-scoped logger registry.
//!
//! A [`LoggerRegistry`] is created once per run and hands out named
//! [`Logger`]s. Each logger owns its own `tracing` dispatcher built from the
//! handler configs in the policy document, so nothing is installed globally
//! and two runs in one process never share sinks.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing::Dispatch;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Which events a handler lets through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Informational messages and errors
    All,
    /// Errors only
    Errors,
}

impl LogLevel {
    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::All => LevelFilter::INFO,
            LogLevel::Errors => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerKind {
    /// Writes to stderr
    Console,
    /// Writes `<folder>/<logger name>.log`
    File { folder: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    pub kind: HandlerKind,
    pub level: LogLevel,
}

impl HandlerConfig {
    pub fn console(level: LogLevel) -> Self {
        HandlerConfig {
            kind: HandlerKind::Console,
            level,
        }
    }

    pub fn file(level: LogLevel, folder: impl Into<PathBuf>) -> Self {
        HandlerConfig {
            kind: HandlerKind::File {
                folder: folder.into(),
            },
            level,
        }
    }

    fn build_layer(&self, logger_name: &str) -> Result<BoxedLayer, ConfigError> {
        let filter = self.level.filter();
        let layer: BoxedLayer = match &self.kind {
            HandlerKind::Console => Box::new(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_filter(filter),
            ),
            HandlerKind::File { folder } => {
                let appender = RollingFileAppender::builder()
                    .rotation(Rotation::NEVER)
                    .filename_prefix(logger_name)
                    .filename_suffix("log")
                    .build(folder)
                    .map_err(|e| ConfigError::LogFile {
                        folder: folder.clone(),
                        message: e.to_string(),
                    })?;
                Box::new(
                    tracing_subscriber::fmt::layer()
                        .with_writer(appender)
                        .with_ansi(false)
                        .with_target(false)
                        .with_filter(filter),
                )
            }
        };
        Ok(layer)
    }
}

/// A named logging handle. Cheap to clone.
#[derive(Clone)]
pub struct Logger {
    name: String,
    dispatch: Dispatch,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("name", &self.name).finish()
    }
}

impl Logger {
    pub fn from_dispatch(name: impl Into<String>, dispatch: Dispatch) -> Self {
        Logger {
            name: name.into(),
            dispatch,
        }
    }

    /// A logger that drops everything.
    pub fn disabled(name: impl Into<String>) -> Self {
        Logger::from_dispatch(name, Dispatch::none())
    }

    #[cfg(test)]
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self, message: impl fmt::Display) {
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::info!("{} - {}", self.name, message);
        });
    }

    pub fn error(&self, message: impl fmt::Display) {
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::error!("{} - {}", self.name, message);
        });
    }
}

/// Creates loggers and caches them by full name for the duration of a run.
#[derive(Debug)]
pub struct LoggerRegistry {
    prefix: String,
    loggers: HashMap<String, Logger>,
}

impl LoggerRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        LoggerRegistry {
            prefix: prefix.into(),
            loggers: HashMap::new(),
        }
    }

    /// Return the logger `<prefix>.<name>`, building it from `configs` the
    /// first time it is requested. Later calls return the cached logger and
    /// ignore `configs`.
    pub fn add_logger(
        &mut self,
        name: &str,
        configs: &[HandlerConfig],
    ) -> Result<Logger, ConfigError> {
        let full_name = format!("{}.{}", self.prefix, name);
        if let Some(logger) = self.loggers.get(&full_name) {
            return Ok(logger.clone());
        }

        let layers = configs
            .iter()
            .map(|config| config.build_layer(&full_name))
            .collect::<Result<Vec<_>, _>>()?;
        let subscriber = tracing_subscriber::registry().with(layers);
        let logger = Logger::from_dispatch(full_name.clone(), Dispatch::new(subscriber));

        self.loggers.insert(full_name, logger.clone());
        Ok(logger)
    }
}

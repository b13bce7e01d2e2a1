use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::PrettyFields;
use tracing_subscriber::EnvFilter;

const CRATE_TARGET: &str = "dex_render";
const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("init logging error: `{0}`")]
    TryInitError(String),
}

/// Logging configuration of the renderer.
///
/// Logs always go to stderr, stdout is reserved for the rendered manifest.
#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
}

impl LoggingConfig {
    /// Attempts to initialize the global logging subscriber.
    pub fn try_init(&self) -> Result<(), LoggingError> {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(self.logging_filter())
            .fmt_fields(PrettyFields::new())
            .try_init()
            .map_err(|_| {
                LoggingError::TryInitError("unable to set global logging subscriber".to_string())
            })?;

        debug!("Logging initialized successfully");
        Ok(())
    }

    /// `LOG_LEVEL` takes precedence over the configured level.
    fn logging_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(self.level.crate_directive())
            .with_env_var(LOG_LEVEL_ENV)
            .from_env_lossy()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct LogLevel(Level);

impl LogLevel {
    pub fn as_level(&self) -> Level {
        self.0
    }

    fn crate_directive(&self) -> Directive {
        let level = self.0.to_string().to_lowercase();
        // Level is validated when deserialized, the directive is always parsable.
        format!("{CRATE_TARGET}={level}")
            .parse::<Directive>()
            .unwrap_or_else(|_| panic!("unparsable logging directive for level: {level}"))
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self(Level::INFO)
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value_str = String::deserialize(deserializer)?;
        Level::from_str(&value_str)
            .map(LogLevel)
            .map_err(serde::de::Error::custom)
    }
}

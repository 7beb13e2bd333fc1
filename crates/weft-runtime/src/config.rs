use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use weft_types::OverrideTableFile;

use crate::attribute::{AttributionConfig, OverrideTable};
use crate::tree::FailurePolicy;

/// Path to a JSON override table loaded when the process-wide runtime starts.
pub const OVERRIDES_ENV: &str = "WEFT_OVERRIDES";
/// `propagate` (default) or `isolate`.
pub const SUBSCRIBER_FAILURES_ENV: &str = "WEFT_SUBSCRIBER_FAILURES";

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        source_name: String,
        message: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read override table {}: {source}", path.display())
            }
            Self::Parse {
                source_name,
                message,
            } => write!(f, "malformed override table {source_name}: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub attribution: AttributionConfig,
    pub overrides: OverrideTable,
    pub failure_policy: FailurePolicy,
}

impl RuntimeConfig {
    /// Reads [`OVERRIDES_ENV`] and [`SUBSCRIBER_FAILURES_ENV`]. An override
    /// file that cannot be loaded is logged and treated as absent.
    pub fn from_env() -> Self {
        let failure_policy =
            FailurePolicy::from_env_value(std::env::var(SUBSCRIBER_FAILURES_ENV).ok().as_deref());

        let overrides = match std::env::var_os(OVERRIDES_ENV) {
            Some(path) if !path.is_empty() => {
                let path = PathBuf::from(path);
                match load_override_file(&path) {
                    Ok(table) => {
                        debug!(
                            path = %path.display(),
                            entries = table.len(),
                            "loaded override table"
                        );
                        table
                    }
                    Err(error) => {
                        warn!(%error, "ignoring override table");
                        OverrideTable::default()
                    }
                }
            }
            _ => OverrideTable::default(),
        };

        Self {
            attribution: AttributionConfig::default(),
            overrides,
            failure_policy,
        }
    }
}

pub fn load_override_file(path: &Path) -> Result<OverrideTable, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_override_table(&text).map_err(|error| match error {
        ConfigError::Parse { message, .. } => ConfigError::Parse {
            source_name: path.display().to_string(),
            message,
        },
        other => other,
    })
}

pub fn parse_override_table(text: &str) -> Result<OverrideTable, ConfigError> {
    let file: OverrideTableFile = facet_json::from_str(text).map_err(|e| ConfigError::Parse {
        source_name: "<inline>".to_string(),
        message: e.to_string(),
    })?;
    Ok(file.into())
}

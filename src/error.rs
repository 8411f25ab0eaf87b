//! Process-level failures.
//!
//! Contract violations found in the scanned sources are never errors; they are
//! `Diagnostic`s inside the `Report`. Only an unusable configuration or input
//! set stops a run.

use std::path::PathBuf;
use thiserror::Error;

use crate::classify::Role;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid engine config JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("invalid naming convention for role `{role}`: `{pattern}`")]
    InvalidPattern {
        role: Role,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid role suffix `{0}`: expected `.token` segments, `*` for a variant")]
    InvalidSuffix(String),

    #[error("role `unknown` cannot be assigned filename suffixes")]
    UnknownRoleSuffix,

    #[error("`{field}` must be a plain identifier, got `{value}`")]
    InvalidIdentifier { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("source input #{0} has an empty path")]
    EmptyPath(usize),
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("source root does not exist: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

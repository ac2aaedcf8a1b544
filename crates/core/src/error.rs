//! Error taxonomy for the pipeline.
//!
//! Structural problems (`ConfigError`, an unreachable source, a failed write) surface as
//! [`PipelineError`] and stop the command. Per-entry problems are [`EntryError`]s and end
//! up aggregated in a `GenerationResult` instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::generate::GenerationResult;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    /// A local artifact could not be read back.
    #[error("parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialize artifact: {0}")]
    Json(#[from] serde_json::Error),

    /// A multi-generator run stopped early. `completed` holds the results of the
    /// generators that finished before `source` hit.
    #[error("{source} ({} generator(s) had completed)", .completed.len())]
    Interrupted {
        completed: Vec<GenerationResult>,
        source: Box<PipelineError>,
    },
}

/// The canonical table or the pipeline settings are invalid. Lists every problem found.
#[derive(Debug, Error)]
#[error("invalid {origin}:{}", render_issues(.issues))]
pub struct ConfigError {
    pub origin: String,
    pub issues: Vec<ConfigIssue>,
}

impl ConfigError {
    pub fn new(origin: impl Into<String>, issues: Vec<ConfigIssue>) -> Self {
        Self {
            origin: origin.into(),
            issues,
        }
    }

    pub fn single(origin: impl Into<String>, issue: ConfigIssue) -> Self {
        Self::new(origin, vec![issue])
    }
}

fn render_issues(issues: &[ConfigIssue]) -> String {
    let mut out = String::new();
    for issue in issues {
        out.push_str("\n  - ");
        out.push_str(&issue.to_string());
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("duplicate key `{0}`")]
    DuplicateKey(String),

    #[error("source name `{name}` is claimed by both `{first}` and `{second}`")]
    DuplicateSource {
        name: String,
        first: String,
        second: String,
    },

    #[error("asset name `{name}` is claimed by both `{first}` and `{second}`")]
    DuplicateAsset {
        name: String,
        first: String,
        second: String,
    },

    #[error("key `{0}` may only contain letters, digits and `_`")]
    InvalidKey(String),

    #[error("key `{0}` is also listed as a static icon")]
    ReservedKey(String),

    #[error("`{key}`: field `{field}` is empty")]
    EmptyField { key: String, field: &'static str },

    #[error("{0}")]
    Unreadable(String),

    #[error("setting `{field}`: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

/// Failure of an upstream source as a whole.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{origin} unavailable after {attempts} attempt(s): {reason}")]
    Unavailable {
        origin: String,
        attempts: u32,
        reason: String,
    },

    #[error("{origin}: unexpected structure at `{fragment}`: {reason}")]
    Parse {
        origin: String,
        fragment: String,
        reason: String,
    },
}

/// Per-entry resolution or rendering failure. Never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("asset `{0}` not found in icon catalog")]
    MissingAsset(String),

    #[error("source `{0}` not found on wiki")]
    MissingSource(String),

    #[error("asset `{asset}` could not be loaded: {reason}")]
    AssetUnreadable { asset: String, reason: String },

    #[error("render failed: {0}")]
    RenderFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_lists_every_issue() {
        let err = ConfigError::new(
            "mapping table",
            vec![
                ConfigIssue::DuplicateKey("Reinforce".into()),
                ConfigIssue::EmptyField {
                    key: "Resupply".into(),
                    field: "asset",
                },
            ],
        );
        let text = err.to_string();
        assert!(text.starts_with("invalid mapping table:"));
        assert!(text.contains("duplicate key `Reinforce`"));
        assert!(text.contains("`Resupply`: field `asset` is empty"));
    }
}

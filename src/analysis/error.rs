//! Analysis error types.
//!
//! Every fault here is local to a row, bucket or snapshot; callers abort the
//! whole run rather than carry a NaN into the result tables.

use crate::analysis::time_buckets::{format_nanos, Nanos};

#[derive(Debug)]
pub enum AnalysisError {
    /// Input does not have the expected shape (missing column, bad side, ...).
    MalformedInput { context: String, message: String },
    /// Zero resting volume where a weighted mid-price needs a denominator.
    DegenerateBook {
        timestamp: Nanos,
        /// `None` when the whole visible depth is empty (imbalance variant).
        level: Option<usize>,
    },
    /// Not enough observations for the requested statistic.
    InsufficientHistory {
        what: &'static str,
        required: usize,
        available: usize,
    },
    /// A grouping step was handed a bucket with no rows.
    EmptyBucket { bucket_start: Nanos },
    /// Invalid analysis configuration.
    Config { message: String },
    /// File access failure.
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl AnalysisError {
    pub fn malformed(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedInput { context, message } => {
                write!(f, "Malformed input ({}): {}", context, message)
            }
            Self::DegenerateBook { timestamp, level } => match level {
                Some(level) => write!(
                    f,
                    "Degenerate book at {}: level {} has zero bid and ask size",
                    format_nanos(*timestamp),
                    level
                ),
                None => write!(
                    f,
                    "Degenerate book at {}: visible depth has zero total volume",
                    format_nanos(*timestamp)
                ),
            },
            Self::InsufficientHistory {
                what,
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient history for {}: need {}, have {}",
                    what, required, available
                )
            }
            Self::EmptyBucket { bucket_start } => {
                write!(f, "Empty bucket at {}", format_nanos(*bucket_start))
            }
            Self::Config { message } => write!(f, "Invalid configuration: {}", message),
            Self::Io { path, source } => write!(f, "I/O error on {}: {}", path, source),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed("json", err.to_string())
    }
}

impl From<csv::Error> for AnalysisError {
    fn from(err: csv::Error) -> Self {
        Self::malformed("csv", err.to_string())
    }
}

impl From<toml::de::Error> for AnalysisError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

use thiserror::Error;

use crate::model::EntityKind;

/// Failures reading the document source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("document source unavailable: {0}")]
    Unavailable(String),

    #[error("failed to parse {origin}: {reason}")]
    Parse { origin: String, reason: String },
}

/// Failures reported by a relational sink.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    /// Connection lost, pool closed or timed out. Uncommitted work is gone.
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// The sink refused a statement (constraint, type or data error).
    #[error("statement rejected: {0}")]
    Rejected(String),

    #[error("no open transaction")]
    NoTransaction,
}

impl SinkError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SinkError::Unavailable(_))
    }
}

impl From<sqlx::Error> for SinkError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => SinkError::Unavailable(err.to_string()),
            sqlx::Error::Database(db) => SinkError::Rejected(match db.constraint() {
                Some(constraint) => format!("{} ({})", db.message(), constraint),
                None => db.message().to_string(),
            }),
            other => SinkError::Rejected(other.to_string()),
        }
    }
}

/// Errors raised while loading one batch.
///
/// Only the two `*Unavailable` variants end a run; everything else is recorded
/// against the record that raised it and the batch carries on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("document source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("malformed record in {context}: {reason}")]
    MalformedRecord { context: String, reason: String },

    #[error("failed to resolve {kind} '{key}': {reason}")]
    Resolution {
        kind: EntityKind,
        key: String,
        reason: String,
    },

    #[error("outcome '{outcome}' already recorded for game odds {game_odds_id}")]
    DuplicateFact { game_odds_id: i64, outcome: String },

    #[error("failed to write {what}: {reason}")]
    WriteRejected { what: String, reason: String },
}

impl LoadError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LoadError::SourceUnavailable(_) | LoadError::SinkUnavailable(_)
        )
    }

    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadError::MalformedRecord {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Map a sink failure raised while resolving `kind`/`key`.
    pub fn resolving(kind: EntityKind, key: &str, err: SinkError) -> Self {
        match err {
            SinkError::Unavailable(msg) => LoadError::SinkUnavailable(msg),
            other => LoadError::Resolution {
                kind,
                key: key.to_string(),
                reason: other.to_string(),
            },
        }
    }

    /// Map a sink failure raised while writing a fact row.
    pub fn writing(what: impl Into<String>, err: SinkError) -> Self {
        match err {
            SinkError::Unavailable(msg) => LoadError::SinkUnavailable(msg),
            other => LoadError::WriteRejected {
                what: what.into(),
                reason: other.to_string(),
            },
        }
    }

    /// Short label used in summaries and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            LoadError::SourceUnavailable(_) => "source_unavailable",
            LoadError::SinkUnavailable(_) => "sink_unavailable",
            LoadError::MalformedRecord { .. } => "malformed_record",
            LoadError::Resolution { .. } => "resolution",
            LoadError::DuplicateFact { .. } => "duplicate_fact",
            LoadError::WriteRejected { .. } => "write_rejected",
        }
    }
}

impl From<SourceError> for LoadError {
    fn from(err: SourceError) -> Self {
        LoadError::SourceUnavailable(err.to_string())
    }
}

/// Configuration errors surfaced before any I/O.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} is set but empty")]
    Empty { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("secret file not found at {path} ({name}): {source}")]
    MissingSecret {
        path: String,
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

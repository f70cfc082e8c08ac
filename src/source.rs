//! Document source seam and the JSON directory implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::model::SeasonType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentKind {
    Season,
    Roster,
    Odds,
    Events,
}

impl DocumentKind {
    /// Load order. Schedules come first so odds referencing a game find it.
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Season,
        DocumentKind::Roster,
        DocumentKind::Odds,
        DocumentKind::Events,
    ];

    pub fn collection(&self) -> &'static str {
        match self {
            DocumentKind::Season => "seasons",
            DocumentKind::Roster => "rosters",
            DocumentKind::Odds => "odds",
            DocumentKind::Events => "events",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "season" | "seasons" => Ok(DocumentKind::Season),
            "roster" | "rosters" => Ok(DocumentKind::Roster),
            "odds" => Ok(DocumentKind::Odds),
            "event" | "events" => Ok(DocumentKind::Events),
            other => Err(format!("unknown document kind '{}'", other)),
        }
    }
}

/// One raw document as fetched from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub kind: DocumentKind,
    /// Where the document came from, for log and failure context.
    pub origin: String,
    pub body: Value,
}

impl Document {
    pub fn new(kind: DocumentKind, origin: impl Into<String>, body: Value) -> Self {
        Self {
            kind,
            origin: origin.into(),
            body,
        }
    }
}

/// Equality filter over top-level document fields.
///
/// Numbers and strings compare by their text, and strings ignore case, so a
/// `season: 2023` filter matches `"season": "2023"`. Season-type conditions compare
/// parsed values, so `regular` matches `"REG"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    fields: BTreeMap<String, Condition>,
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Equals(Value),
    SeasonType(SeasonType),
}

impl Condition {
    fn holds(&self, found: &Value) -> bool {
        match self {
            Condition::Equals(wanted) => loosely_equal(found, wanted),
            Condition::SeasonType(wanted) => found
                .as_str()
                .and_then(|s| s.parse::<SeasonType>().ok())
                .is_some_and(|parsed| parsed == *wanted),
        }
    }
}

impl DocumentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .insert(field.into(), Condition::Equals(value.into()));
        self
    }

    /// Match any spelling of `season_type` in `field`.
    pub fn with_season_type(mut self, field: impl Into<String>, season_type: SeasonType) -> Self {
        self.fields
            .insert(field.into(), Condition::SeasonType(season_type));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn matches(&self, body: &Value) -> bool {
        self.fields
            .iter()
            .all(|(field, condition)| body.get(field).is_some_and(|found| condition.holds(found)))
    }
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// All documents of `kind` matching `filter`, in a stable order.
    async fn find(
        &self,
        kind: DocumentKind,
        filter: &DocumentFilter,
    ) -> Result<Vec<Document>, SourceError>;
}

/// Reads `<root>/<collection>/*.json`. A file holds one document or an array of them.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    root: PathBuf,
}

impl JsonDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn json_files(&self, dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SourceError::Unavailable(format!(
                    "cannot list {}: {}",
                    dir.display(),
                    e
                )))
            }
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::Unavailable(format!("cannot list {}: {}", dir.display(), e)))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl DocumentSource for JsonDirSource {
    async fn find(
        &self,
        kind: DocumentKind,
        filter: &DocumentFilter,
    ) -> Result<Vec<Document>, SourceError> {
        if !tokio::fs::metadata(&self.root)
            .await
            .is_ok_and(|meta| meta.is_dir())
        {
            return Err(SourceError::Unavailable(format!(
                "{} is not a readable directory",
                self.root.display()
            )));
        }

        let dir = self.root.join(kind.collection());
        let mut documents = Vec::new();
        for path in self.json_files(&dir).await? {
            let origin = format!(
                "{}/{}",
                kind.collection(),
                path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
            );
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| SourceError::Unavailable(format!("cannot read {}: {}", origin, e)))?;
            let body: Value = serde_json::from_str(&raw).map_err(|e| SourceError::Parse {
                origin: origin.clone(),
                reason: e.to_string(),
            })?;

            match body {
                Value::Array(items) => {
                    for (i, item) in items.into_iter().enumerate() {
                        documents.push(Document::new(kind, format!("{}[{}]", origin, i), item));
                    }
                }
                single => documents.push(Document::new(kind, origin, single)),
            }
            debug!(file = %path.display(), "read source file");
        }

        let total = documents.len();
        documents.retain(|doc| filter.matches(&doc.body));
        info!(
            collection = kind.collection(),
            matched = documents.len(),
            total,
            "fetched documents"
        );
        Ok(documents)
    }
}

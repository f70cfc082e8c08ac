//! Environment configuration.
//!
//! Secrets/config:
//! - Docker Compose: the DB password comes from /run/secrets/db_password
//! - Anywhere else: DATABASE_URL or DB_PASSWORD in the environment

use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::model::SeasonType;
use crate::source::{DocumentFilter, DocumentKind};

const DB_PASSWORD_SECRET: &str = "/run/secrets/db_password";

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Applied as `search_path` on every pooled connection.
    pub schema: Option<String>,
    pub max_connections: u32,
    pub connect_retries: u32,
}

// Hand-written so the password in `url` never reaches a log line.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("schema", &self.schema)
            .field("max_connections", &self.max_connections)
            .field("connect_retries", &self.connect_retries)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub source_dir: PathBuf,
    pub kinds: Vec<DocumentKind>,
    pub filter: DocumentFilter,
    /// Run against the in-memory sink and write nothing.
    pub dry_run: bool,
    pub ensure_schema: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dry_run = flag(&lookup, "DRY_RUN")?;

        // A dry run never opens a connection, so it needs no credentials.
        let url = match lookup("DATABASE_URL") {
            Some(v) if !v.trim().is_empty() => v,
            Some(_) => return Err(ConfigError::Empty { field: "DATABASE_URL" }),
            None if dry_run => String::new(),
            None => {
                let db_user = lookup("DB_USER").unwrap_or_else(|| "sports".to_string());
                let db_name = lookup("DB_NAME").unwrap_or_else(|| "sports".to_string());
                let db_host = lookup("DB_HOST").unwrap_or_else(|| "postgres".to_string());
                let db_port = lookup("DB_PORT").unwrap_or_else(|| "5432".to_string());
                let db_password = match lookup("DB_PASSWORD") {
                    Some(v) if !v.trim().is_empty() => v,
                    Some(_) => return Err(ConfigError::Empty { field: "DB_PASSWORD" }),
                    None => {
                        let path = lookup("DB_PASSWORD_FILE")
                            .unwrap_or_else(|| DB_PASSWORD_SECRET.to_string());
                        read_secret_file(&path, "db_password")?
                    }
                };
                format!(
                    "postgresql://{}:{}@{}:{}/{}",
                    db_user, db_password, db_host, db_port, db_name
                )
            }
        };

        let schema = match lookup("DB_SCHEMA") {
            Some(v) if v.trim().is_empty() => return Err(ConfigError::Empty { field: "DB_SCHEMA" }),
            Some(v) => Some(v.trim().to_string()),
            None => None,
        };

        let kinds = match lookup("LOAD_KINDS") {
            Some(v) => parse_kinds(&v)?,
            None => DocumentKind::ALL.to_vec(),
        };

        let mut filter = DocumentFilter::new();
        if let Some(year) = lookup("SEASON_YEAR") {
            let year: i64 = year.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "SEASON_YEAR",
                reason: format!("'{}' is not a year", year),
            })?;
            filter = filter.with("season", year);
        }
        if let Some(season_type) = lookup("SEASON_TYPE") {
            let season_type = season_type
                .parse::<SeasonType>()
                .map_err(|reason| ConfigError::InvalidValue {
                    field: "SEASON_TYPE",
                    reason,
                })?;
            filter = filter.with_season_type("season_type", season_type);
        }

        Ok(Self {
            database: DatabaseConfig {
                url,
                schema,
                max_connections: number(&lookup, "DB_MAX_CONNECTIONS", 5)?,
                connect_retries: number(&lookup, "DB_CONNECT_RETRIES", 5)?,
            },
            source_dir: PathBuf::from(lookup("SOURCE_DIR").unwrap_or_else(|| "data".to_string())),
            kinds,
            filter,
            dry_run,
            ensure_schema: flag(&lookup, "ENSURE_SCHEMA")?,
        })
    }
}

/// Comma-separated kinds, kept in load order whatever order they were listed in.
fn parse_kinds(raw: &str) -> Result<Vec<DocumentKind>, ConfigError> {
    let mut kinds = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.parse::<DocumentKind>()
                .map_err(|reason| ConfigError::InvalidValue {
                    field: "LOAD_KINDS",
                    reason,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if kinds.is_empty() {
        return Err(ConfigError::Empty { field: "LOAD_KINDS" });
    }
    kinds.sort();
    kinds.dedup();
    Ok(kinds)
}

fn flag<F>(lookup: &F, field: &'static str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(field).map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) if v == "true" || v == "1" => Ok(true),
        Some(v) if v == "false" || v == "0" || v.is_empty() => Ok(false),
        Some(v) => Err(ConfigError::InvalidValue {
            field,
            reason: format!("expected true or false, got '{}'", v),
        }),
    }
}

fn number<F>(lookup: &F, field: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(field) {
        None => Ok(default),
        Some(v) => match v.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidValue {
                field,
                reason: format!("expected a positive integer, got '{}'", v),
            }),
        },
    }
}

/// Read a secret from a Docker secret file.
pub fn read_secret_file(file_path: &str, secret_name: &'static str) -> Result<String, ConfigError> {
    std::fs::read_to_string(file_path)
        .map(|s| s.trim().to_string())
        .map_err(|source| ConfigError::MissingSecret {
            path: file_path.to_string(),
            name: secret_name,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_with_database_url() {
        let cfg = config(&[("DATABASE_URL", "postgresql://u:p@localhost/db")]).unwrap();
        assert_eq!(cfg.database.url, "postgresql://u:p@localhost/db");
        assert_eq!(cfg.database.connect_retries, 5);
        assert_eq!(cfg.kinds, DocumentKind::ALL.to_vec());
        assert_eq!(cfg.source_dir, PathBuf::from("data"));
        assert!(cfg.filter.is_empty());
        assert!(!cfg.dry_run);
    }

    #[test]
    fn builds_url_from_parts_and_secret_file() {
        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("db_password");
        std::fs::write(&secret, "s3cret\n").unwrap();

        let cfg = config(&[
            ("DB_HOST", "db"),
            ("DB_USER", "loader"),
            ("DB_NAME", "nfl"),
            ("DB_PASSWORD_FILE", secret.to_str().unwrap()),
        ])
        .unwrap();
        assert_eq!(cfg.database.url, "postgresql://loader:s3cret@db:5432/nfl");
    }

    #[test]
    fn missing_secret_is_reported() {
        let err = config(&[("DB_PASSWORD_FILE", "/definitely/not/here")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret { name: "db_password", .. }));
    }

    #[test]
    fn empty_database_url_is_rejected() {
        let err = config(&[("DATABASE_URL", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::Empty { field: "DATABASE_URL" }));
    }

    #[test]
    fn dry_run_needs_no_credentials() {
        let cfg = config(&[("DRY_RUN", "true"), ("LOAD_KINDS", "odds, seasons")]).unwrap();
        assert!(cfg.dry_run);
        assert_eq!(cfg.kinds, vec![DocumentKind::Season, DocumentKind::Odds]);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        assert!(matches!(
            config(&[("DRY_RUN", "yes please")]).unwrap_err(),
            ConfigError::InvalidValue { field: "DRY_RUN", .. }
        ));
        assert!(matches!(
            config(&[("DRY_RUN", "true"), ("LOAD_KINDS", "players")]).unwrap_err(),
            ConfigError::InvalidValue { field: "LOAD_KINDS", .. }
        ));
        assert!(matches!(
            config(&[("DRY_RUN", "true"), ("SEASON_TYPE", "summer")]).unwrap_err(),
            ConfigError::InvalidValue { field: "SEASON_TYPE", .. }
        ));
    }

    #[test]
    fn season_filter_is_built_from_env() {
        let cfg = config(&[
            ("DRY_RUN", "1"),
            ("SEASON_YEAR", "2023"),
            ("SEASON_TYPE", "REG"),
        ])
        .unwrap();
        assert!(cfg
            .filter
            .matches(&serde_json::json!({"season": "2023", "season_type": "reg"})));
        assert!(!cfg
            .filter
            .matches(&serde_json::json!({"season": 2022, "season_type": "REG"})));
    }

    #[test]
    fn long_season_type_name_matches_feed_abbreviation() {
        let cfg = config(&[("DRY_RUN", "1"), ("SEASON_TYPE", "regular")]).unwrap();
        assert!(cfg
            .filter
            .matches(&serde_json::json!({"season_type": "REG"})));
        assert!(!cfg
            .filter
            .matches(&serde_json::json!({"season_type": "PRE"})));
    }
}

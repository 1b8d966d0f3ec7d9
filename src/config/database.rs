//! Database connection, credential and backup configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Keys read from the environment file. All but `DB_PASS` must be non-empty.
pub const CREDENTIAL_KEYS: [&str; 4] = ["DB_USER", "DB_PASS", "DB_HOST", "DB_PORT"];

/// Optional key overriding the database name
pub const DATABASE_NAME_KEY: &str = "DB_NAME";

/// Errors while loading database credentials
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("could not load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("environment variable {0} is required")]
    Missing(&'static str),
    #[error("environment variable DB_PORT is not a valid port: {0}")]
    InvalidPort(String),
}

/// PostgreSQL connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub user: String,
    /// May be empty (trust/peer authentication)
    #[serde(default)]
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Database name
    pub name: String,
    /// libpq `sslmode` value
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
    /// Pool size; the pipeline is sequential so a handful is plenty
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Environment file with `DB_*` credentials, applied over the values above
    #[serde(default)]
    pub env_file: Option<PathBuf>,
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_max_connections() -> u32 {
    4
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: String::new(),
            host: "localhost".to_string(),
            port: 5432,
            name: "eu_transparency".to_string(),
            ssl_mode: default_ssl_mode(),
            max_connections: default_max_connections(),
            env_file: Some(PathBuf::from(".env")),
        }
    }
}

impl DatabaseConfig {
    /// Connection URL understood by both sqlx and `pg_dump --dbname`.
    ///
    /// User and password are percent-encoded; an empty password is omitted so
    /// no password prompt is triggered.
    pub fn connection_url(&self) -> String {
        let base = format!("postgres://{}:{}/{}", self.host, self.port, self.name);
        match Url::parse(&base) {
            Ok(mut url) => {
                // set_username/set_password only fail for cannot-be-a-base URLs
                let _ = url.set_username(&self.user);
                if !self.password.is_empty() {
                    let _ = url.set_password(Some(&self.password));
                }
                url.query_pairs_mut().append_pair("sslmode", &self.ssl_mode);
                url.to_string()
            }
            Err(_) => format!("{}?sslmode={}", base, self.ssl_mode),
        }
    }

    /// Connection URL with the password masked, for logs
    pub fn redacted_url(&self) -> String {
        let mut masked = self.clone();
        if !masked.password.is_empty() {
            masked.password = "***".to_string();
        }
        masked.connection_url()
    }

    /// Apply credentials from `env_file` if one is configured.
    ///
    /// Variables already set in the process environment take precedence over
    /// the file, matching the usual dotenv behaviour.
    pub fn apply_env_file(&mut self) -> Result<(), CredentialsError> {
        let Some(path) = self.env_file.clone() else {
            return Ok(());
        };
        let file_values = read_env_file(&path)?;
        self.apply_credentials(|key| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .or_else(|| file_values.get(key).cloned())
        })
    }

    /// Apply `DB_*` credentials from an arbitrary lookup
    pub fn apply_credentials<F>(&mut self, lookup: F) -> Result<(), CredentialsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values: HashMap<&'static str, String> = HashMap::new();

        for key in CREDENTIAL_KEYS {
            let value = lookup(key).unwrap_or_default();
            if value.is_empty() && key != "DB_PASS" {
                return Err(CredentialsError::Missing(key));
            }
            values.insert(key, value);
        }

        let port = values["DB_PORT"].trim();
        self.port = port
            .parse()
            .map_err(|_| CredentialsError::InvalidPort(port.to_string()))?;
        self.user = values["DB_USER"].clone();
        self.password = values["DB_PASS"].clone();
        self.host = values["DB_HOST"].clone();

        if let Some(name) = lookup(DATABASE_NAME_KEY).filter(|n| !n.is_empty()) {
            self.name = name;
        }

        Ok(())
    }
}

/// Read an environment file into a map without touching the process environment
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, CredentialsError> {
    let load_err = |source| CredentialsError::Load {
        path: path.to_path_buf(),
        source,
    };

    let mut values = HashMap::new();
    for item in dotenvy::from_path_iter(path).map_err(load_err)? {
        let (key, value) = item.map_err(load_err)?;
        values.insert(key, value);
    }
    Ok(values)
}

/// `pg_dump` backup configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory receiving `DB_<date>.dump` files
    pub dir: PathBuf,
    /// Dump executable
    pub command: String,
    /// Compression level passed with `-Z`
    pub compression: u8,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("database/backups"),
            command: "pg_dump".to_string(),
            compression: 9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_env(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_env_file_is_an_error() {
        let err = read_env_file(Path::new("fixtures/config/null.env")).unwrap_err();
        assert!(matches!(err, CredentialsError::Load { .. }));
    }

    #[test]
    fn test_required_keys() {
        let cases = [
            (vec![("DB_PASS", "x"), ("DB_HOST", "h"), ("DB_PORT", "5432")], "DB_USER"),
            (vec![("DB_USER", ""), ("DB_HOST", "h"), ("DB_PORT", "5432")], "DB_USER"),
            (vec![("DB_USER", "u"), ("DB_PORT", "5432")], "DB_HOST"),
            (vec![("DB_USER", "u"), ("DB_HOST", ""), ("DB_PORT", "5432")], "DB_HOST"),
            (vec![("DB_USER", "u"), ("DB_HOST", "h")], "DB_PORT"),
            (vec![("DB_USER", "u"), ("DB_HOST", "h"), ("DB_PORT", "")], "DB_PORT"),
        ];

        for (pairs, missing) in cases {
            let mut cfg = DatabaseConfig::default();
            let err = cfg.apply_credentials(lookup_from(&pairs)).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("environment variable {} is required", missing)
            );
        }
    }

    #[test]
    fn test_empty_password_is_allowed() {
        let mut cfg = DatabaseConfig::default();
        cfg.apply_credentials(lookup_from(&[
            ("DB_USER", "postgres"),
            ("DB_PASS", ""),
            ("DB_HOST", "localhost"),
            ("DB_PORT", "5432"),
        ]))
        .unwrap();
        assert_eq!(cfg.password, "");
        assert_eq!(
            cfg.connection_url(),
            "postgres://postgres@localhost:5432/eu_transparency?sslmode=disable"
        );
    }

    #[test]
    fn test_env_file_values_and_url_encoding() {
        let file = write_env(
            "DB_USER=postgres\nDB_PASS='89asd76034Xs!3$'\nDB_HOST=localhost\nDB_PORT=5432\nDB_NAME=lobby\n",
        );
        let values = read_env_file(file.path()).unwrap();
        assert_eq!(values["DB_PASS"], "89asd76034Xs!3$");

        let mut cfg = DatabaseConfig::default();
        cfg.apply_credentials(|k| values.get(k).cloned()).unwrap();
        assert_eq!(cfg.user, "postgres");
        assert_eq!(cfg.port, 5432);
        assert_eq!(cfg.name, "lobby");

        let url = cfg.connection_url();
        assert!(url.starts_with("postgres://postgres:"));
        assert!(url.contains("@localhost:5432/lobby?sslmode=disable"));
        assert!(!cfg.redacted_url().contains("89asd"));
    }

    #[test]
    fn test_invalid_port() {
        let mut cfg = DatabaseConfig::default();
        let err = cfg
            .apply_credentials(lookup_from(&[
                ("DB_USER", "u"),
                ("DB_HOST", "h"),
                ("DB_PORT", "not-a-port"),
            ]))
            .unwrap_err();
        assert!(matches!(err, CredentialsError::InvalidPort(_)));
    }
}

//! Database backups with `pg_dump`
//!
//! A backup is a custom-format dump named after the day it was taken, so
//! running twice on the same day overwrites that day's dump.

use crate::config::{BackupConfig, DatabaseConfig};
use chrono::NaiveDate;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

/// Errors from a backup run
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to create backup directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed (exit {code}): {stderr}")]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },
}

/// `<dir>/DB_<YYYY-MM-DD>.dump`
pub fn dump_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("DB_{}.dump", date.format("%Y-%m-%d")))
}

/// Arguments for a compressed custom-format dump of `url` into `output`
pub fn dump_args(url: &str, compression: u8, output: &Path) -> Vec<OsString> {
    vec![
        "--dbname".into(),
        url.into(),
        "-Z".into(),
        compression.to_string().into(),
        "-F".into(),
        "c".into(),
        "-f".into(),
        output.as_os_str().to_owned(),
    ]
}

/// Dump the database into the backup directory and return the dump path
pub async fn run_backup(
    database: &DatabaseConfig,
    backup: &BackupConfig,
) -> Result<PathBuf, BackupError> {
    tokio::fs::create_dir_all(&backup.dir)
        .await
        .map_err(|source| BackupError::CreateDir {
            path: backup.dir.clone(),
            source,
        })?;

    let output_path = dump_path(&backup.dir, chrono::Local::now().date_naive());
    info!(
        "Backing up {} to {}",
        database.redacted_url(),
        output_path.display()
    );

    let output = Command::new(&backup.command)
        .args(dump_args(
            &database.connection_url(),
            backup.compression,
            &output_path,
        ))
        .output()
        .await
        .map_err(|source| BackupError::Spawn {
            command: backup.command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(BackupError::Failed {
            command: backup.command.clone(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    info!("Backup written to {}", output_path.display());
    Ok(output_path)
}

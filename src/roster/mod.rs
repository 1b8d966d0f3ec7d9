//! Department roster loading
//!
//! The roster is the canonical set of departments, leaders and members that
//! scraped participant names are resolved against. It lives in a directory of
//! JSON files, one per department, and is read once per run.

use crate::types::Department;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors while reading or validating roster files
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid roster file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{department}: {kind} \"{name}\" has no identifier")]
    MissingIdentifier {
        department: String,
        kind: &'static str,
        name: String,
    },
}

/// Read every `*.json` file in `dir` as a department, in file-name order.
pub fn load_departments(dir: &Path) -> Result<Vec<Department>, RosterError> {
    let io_err = |source| RosterError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    paths.iter().map(|p| load_department(p)).collect()
}

/// Read a single department file
pub fn load_department(path: &Path) -> Result<Department, RosterError> {
    let data = std::fs::read_to_string(path).map_err(|source| RosterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let department: Department =
        serde_json::from_str(&data).map_err(|source| RosterError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(
        "Loaded department {} ({} leaders, {} members)",
        department.abbreviation,
        department.leaders.len(),
        department.members.len()
    );
    Ok(department)
}

/// Check that every person the department would upsert carries an identifier.
///
/// Role assignments must name the leader they belong to.
pub fn validate_department(dep: &Department) -> Result<(), RosterError> {
    let missing = |kind, name: &str| RosterError::MissingIdentifier {
        department: dep.abbreviation.clone(),
        kind,
        name: name.to_string(),
    };

    for leader in &dep.leaders {
        if !has_id(&leader.id) {
            return Err(missing("leader", &leader.name));
        }
    }

    for member in &dep.members {
        if !has_id(&member.id) {
            return Err(missing("member", &member.name));
        }
        for role in &member.roles {
            if !has_id(&role.leader) {
                return Err(missing("role leader for member", &member.name));
            }
        }
    }

    Ok(())
}

fn has_id(id: &Option<String>) -> bool {
    id.as_deref().is_some_and(|s| !s.trim().is_empty())
}

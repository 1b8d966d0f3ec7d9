//! Table definitions
//!
//! Every statement is idempotent so the schema can be applied before each run.

use super::StoreError;
use sqlx::PgPool;
use tracing::info;

/// Statements creating the schema, in dependency order
pub const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS countries (
        country_id      SERIAL PRIMARY KEY,
        country_code    TEXT NOT NULL UNIQUE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS country_names (
        country_name    TEXT PRIMARY KEY,
        country_code    TEXT NOT NULL REFERENCES countries (country_code)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS departments (
        department_abbreviation TEXT PRIMARY KEY,
        department_name         TEXT NOT NULL,
        department_description  TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS leaders (
        leader_id           TEXT PRIMARY KEY,
        leader_name         TEXT NOT NULL,
        leader_role         TEXT NOT NULL,
        leader_country      INT REFERENCES countries (country_id),
        leader_department   TEXT NOT NULL REFERENCES departments (department_abbreviation)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS members (
        member_id       TEXT PRIMARY KEY,
        member_name     TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS members_roles (
        leader_id       TEXT NOT NULL,
        member_id       TEXT NOT NULL REFERENCES members (member_id),
        member_role     TEXT NOT NULL,
        PRIMARY KEY (leader_id, member_id, member_role)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS organizations (
        organization_id             TEXT PRIMARY KEY,
        organization_name           TEXT NOT NULL,
        organization_country        INT REFERENCES countries (country_id),
        organization_legal_status   TEXT NOT NULL,
        organization_updated_at     TIMESTAMP WITH TIME ZONE NOT NULL,
        organization_registered_at  TIMESTAMP WITH TIME ZONE NOT NULL
    )"#,
    // NULLS NOT DISTINCT needs PostgreSQL 15; undated meetings share a key.
    // meeting_key holds the sorted participants and entities.
    r#"CREATE TABLE IF NOT EXISTS meetings (
        meeting_id          BIGSERIAL PRIMARY KEY,
        meeting_host        TEXT NOT NULL,
        meeting_date        DATE,
        meeting_cancelled   BOOLEAN NOT NULL DEFAULT FALSE,
        meeting_location    TEXT NOT NULL,
        meeting_subject     TEXT NOT NULL,
        meeting_key         TEXT NOT NULL,
        UNIQUE NULLS NOT DISTINCT
            (meeting_host, meeting_date, meeting_location, meeting_subject, meeting_key)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS meetings_leaders (
        meeting_id  BIGINT NOT NULL REFERENCES meetings (meeting_id) ON DELETE CASCADE,
        leader_id   TEXT NOT NULL REFERENCES leaders (leader_id),
        PRIMARY KEY (meeting_id, leader_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS meetings_members (
        meeting_id  BIGINT NOT NULL REFERENCES meetings (meeting_id) ON DELETE CASCADE,
        member_id   TEXT NOT NULL REFERENCES members (member_id),
        PRIMARY KEY (meeting_id, member_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS meetings_entities (
        meeting_id  BIGINT NOT NULL REFERENCES meetings (meeting_id) ON DELETE CASCADE,
        entity_id   TEXT NOT NULL,
        PRIMARY KEY (meeting_id, entity_id)
    )"#,
];

/// Apply every schema statement in one transaction
pub async fn apply_schema(pool: &PgPool) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    info!("Schema applied ({} tables)", SCHEMA.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_name(statement: &str) -> &str {
        statement
            .trim_start_matches("CREATE TABLE IF NOT EXISTS ")
            .split_whitespace()
            .next()
            .unwrap_or_default()
    }

    #[test]
    fn test_tables_are_created_after_their_references() {
        let order: Vec<&str> = SCHEMA.iter().map(|s| table_name(s)).collect();
        let position = |name: &str| order.iter().position(|t| *t == name).unwrap();

        for (i, statement) in SCHEMA.iter().enumerate() {
            for referenced in statement.split("REFERENCES ").skip(1) {
                let target = referenced.split_whitespace().next().unwrap();
                assert!(
                    position(target) < i,
                    "{} references {} before it exists",
                    order[i],
                    target
                );
            }
        }
    }

    #[test]
    fn test_every_statement_is_idempotent() {
        assert_eq!(SCHEMA.len(), 11);
        assert!(SCHEMA
            .iter()
            .all(|s| s.starts_with("CREATE TABLE IF NOT EXISTS ")));
    }
}

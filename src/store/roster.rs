//! Department roster upserts

use super::StoreError;
use crate::roster::validate_department;
use crate::types::{CountryTables, Department};
use sqlx::PgPool;
use tracing::{debug, warn};

const UPSERT_DEPARTMENT: &str = r#"
    INSERT INTO departments (department_abbreviation, department_name, department_description)
    VALUES ($1, $2, $3)
    ON CONFLICT (department_abbreviation) DO UPDATE SET
        department_name = EXCLUDED.department_name,
        department_description = EXCLUDED.department_description
"#;

const UPSERT_LEADER: &str = r#"
    INSERT INTO leaders (leader_id, leader_name, leader_role, leader_country, leader_department)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (leader_id) DO UPDATE SET
        leader_name = EXCLUDED.leader_name,
        leader_role = EXCLUDED.leader_role,
        leader_country = EXCLUDED.leader_country,
        leader_department = EXCLUDED.leader_department
"#;

const UPSERT_MEMBER: &str = r#"
    INSERT INTO members (member_id, member_name)
    VALUES ($1, $2)
    ON CONFLICT (member_id) DO UPDATE SET
        member_name = EXCLUDED.member_name
"#;

const INSERT_ROLE: &str = r#"
    INSERT INTO members_roles (leader_id, member_id, member_role)
    VALUES ($1, $2, $3)
    ON CONFLICT DO NOTHING
"#;

/// Rows written for one department
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterCounts {
    pub leaders: usize,
    pub members: usize,
    pub roles: usize,
}

/// Writes roster departments to the store
#[derive(Clone)]
pub struct RosterLoader {
    pool: PgPool,
}

impl RosterLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert a department with its leaders, members and roles in one
    /// transaction.
    ///
    /// The department is validated first: a leader or member without an
    /// identifier fails the whole department before anything is written.
    pub async fn upsert_department(
        &self,
        dep: &Department,
        countries: &CountryTables,
    ) -> Result<RosterCounts, StoreError> {
        validate_department(dep)?;

        let mut counts = RosterCounts::default();
        let mut tx = self.pool.begin().await?;

        sqlx::query(UPSERT_DEPARTMENT)
            .bind(&dep.abbreviation)
            .bind(&dep.name)
            .bind(&dep.description)
            .execute(&mut *tx)
            .await?;

        for leader in &dep.leaders {
            let country = countries.id_for_code(&leader.country);
            if country.is_none() && !leader.country.is_empty() {
                warn!(
                    "Unknown country code {:?} for leader {}",
                    leader.country, leader.name
                );
            }

            sqlx::query(UPSERT_LEADER)
                .bind(person_id(&leader.id))
                .bind(&leader.name)
                .bind(&leader.role)
                .bind(country)
                .bind(&dep.abbreviation)
                .execute(&mut *tx)
                .await?;
            counts.leaders += 1;
        }

        for member in &dep.members {
            let member_id = person_id(&member.id);
            sqlx::query(UPSERT_MEMBER)
                .bind(member_id)
                .bind(&member.name)
                .execute(&mut *tx)
                .await?;
            counts.members += 1;

            for role in &member.roles {
                sqlx::query(INSERT_ROLE)
                    .bind(person_id(&role.leader))
                    .bind(member_id)
                    .bind(&role.role)
                    .execute(&mut *tx)
                    .await?;
                counts.roles += 1;
            }
        }

        tx.commit().await?;

        debug!(
            "Department {}: {} leaders, {} members, {} roles",
            dep.abbreviation, counts.leaders, counts.members, counts.roles
        );
        Ok(counts)
    }
}

/// Trimmed identifier; validation guarantees it is present
fn person_id(id: &Option<String>) -> &str {
    id.as_deref().map(str::trim).unwrap_or_default()
}

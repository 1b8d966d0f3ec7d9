//! Freshness-gated bulk upsert of organizations
//!
//! Each batch goes through its own transaction:
//!
//! 1. create a staging table that is dropped on commit
//! 2. `COPY` the batch into it
//! 3. merge into `organizations`, updating a row only when the incoming
//!    `lastUpdateDate` is strictly newer than the stored one
//! 4. commit
//!
//! Any failure drops the transaction, so a batch is loaded completely or not
//! at all. Reloading identical data changes nothing.

use super::copy::CopyEncoder;
use super::StoreError;
use crate::import::{ImportError, OrganizationSink};
use crate::types::Organization;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

pub const CREATE_STAGING: &str = "CREATE TEMP TABLE organizations_staging \
    (LIKE organizations INCLUDING DEFAULTS) ON COMMIT DROP";

pub const COPY_STAGING: &str = "COPY organizations_staging (\
    organization_id, organization_name, organization_country, organization_legal_status, \
    organization_updated_at, organization_registered_at) FROM STDIN";

/// Keeps only the newest copy of a code that appears twice in one batch,
/// since `ON CONFLICT` cannot touch the same row twice in one statement.
pub const MERGE_STAGING: &str = r#"
    INSERT INTO organizations (
        organization_id, organization_name, organization_country, organization_legal_status,
        organization_updated_at, organization_registered_at
    )
    SELECT DISTINCT ON (organization_id)
        organization_id, organization_name, organization_country, organization_legal_status,
        organization_updated_at, organization_registered_at
    FROM organizations_staging
    ORDER BY organization_id, organization_updated_at DESC
    ON CONFLICT (organization_id) DO UPDATE SET
        organization_name = EXCLUDED.organization_name,
        organization_country = EXCLUDED.organization_country,
        organization_legal_status = EXCLUDED.organization_legal_status,
        organization_updated_at = EXCLUDED.organization_updated_at,
        organization_registered_at = EXCLUDED.organization_registered_at
    WHERE EXCLUDED.organization_updated_at > organizations.organization_updated_at
"#;

/// Outcome of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows copied into staging
    pub staged: u64,
    /// Rows inserted or updated in `organizations`
    pub applied: u64,
}

/// Encode a batch in the column order of `COPY_STAGING`
pub fn encode_batch(batch: &[Organization]) -> CopyEncoder {
    let mut encoder = CopyEncoder::new();
    for org in batch {
        let country = org.country_id.map(|id| id.to_string());
        let updated_at = org.updated_at.to_rfc3339();
        let registered_at = org.registered_at.to_rfc3339();
        encoder.push_row(&[
            Some(org.identification_code.as_str()),
            Some(org.name.as_str()),
            country.as_deref(),
            Some(org.legal_status.as_str()),
            Some(updated_at.as_str()),
            Some(registered_at.as_str()),
        ]);
    }
    encoder
}

/// Loads organization batches into the store
#[derive(Clone)]
pub struct OrganizationLoader {
    pool: PgPool,
}

impl OrganizationLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Merge one batch in a single transaction
    pub async fn load(&self, batch: &[Organization]) -> Result<BatchOutcome, StoreError> {
        if batch.is_empty() {
            return Ok(BatchOutcome {
                staged: 0,
                applied: 0,
            });
        }

        let encoder = encode_batch(batch);
        let mut tx = self.pool.begin().await?;

        sqlx::query(CREATE_STAGING).execute(&mut *tx).await?;

        let mut copy = tx.copy_in_raw(COPY_STAGING).await?;
        let sent = copy.send(encoder.into_bytes()).await.map(|_| ());
        if let Err(e) = sent {
            copy.abort(e.to_string()).await?;
            return Err(e.into());
        }
        let staged = copy.finish().await?;

        let applied = sqlx::query(MERGE_STAGING)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        debug!(
            "Organization batch: {} staged, {} inserted or updated",
            staged, applied
        );
        Ok(BatchOutcome { staged, applied })
    }
}

#[async_trait]
impl OrganizationSink for OrganizationLoader {
    async fn load_batch(&mut self, batch: &[Organization]) -> Result<(), ImportError> {
        self.load(batch).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn org(code: &str, country: Option<i32>) -> Organization {
        Organization {
            identification_code: code.to_string(),
            name: "Acme\tHoldings".to_string(),
            country_name: "Belgium".to_string(),
            country_id: country,
            legal_status: "SA".to_string(),
            registered_at: Utc.with_ymd_and_hms(2012, 3, 9, 14, 17, 52).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2017, 6, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_encode_batch_column_order() {
        let encoder = encode_batch(&[org("1234-56", Some(21)), org("7890-12", None)]);
        assert_eq!(encoder.rows(), 2);

        let lines: Vec<&str> = encoder.as_str().lines().collect();
        assert_eq!(
            lines[0],
            "1234-56\tAcme\\tHoldings\t21\tSA\t2017-06-01T08:00:00+00:00\t2012-03-09T14:17:52+00:00"
        );
        assert!(lines[1].starts_with("7890-12\tAcme\\tHoldings\t\\N\tSA\t"));
    }

    #[test]
    fn test_merge_is_gated_on_freshness() {
        assert!(MERGE_STAGING.contains("ON CONFLICT (organization_id) DO UPDATE"));
        assert!(MERGE_STAGING.contains(
            "WHERE EXCLUDED.organization_updated_at > organizations.organization_updated_at"
        ));
        assert!(CREATE_STAGING.ends_with("ON COMMIT DROP"));
    }
}

use crate::error::{is_unique_violation, map_sqlx_error, Result, StorageError};
use async_trait::async_trait;
use jiff::Timestamp;
use phnix_core::{
    AuthorityRepository, AuthorityStatus, DuplicateKind, Insertion, IssuanceAuthority, Ledger, Phn,
    PoiCode, SubjectId,
};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

const POI_DDL: &str = include_str!("../ddl/mysql/poi.sql");
const PHN_DDL: &str = include_str!("../ddl/mysql/phn.sql");

/// MySQL implementation of the ledger and authority contracts.
///
/// Ledger uniqueness rests on the `uk_generated_phn` unique key: an insert
/// that collides is reported as a rejection, never retried here. Authority
/// counts are moved with a single conditional `UPDATE`, so two processes
/// drawing from the same POI can never push it past its maximum.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Creates the `poi` and `phn` tables when they do not exist yet.
    pub async fn apply_schema(&self) -> Result<()> {
        for ddl in [POI_DDL, PHN_DDL] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        tracing::debug!("ledger schema applied");
        Ok(())
    }
}

fn parse_last_updated(seconds: Option<i64>) -> Result<Option<Timestamp>> {
    seconds
        .map(|value| {
            Timestamp::from_second(value).map_err(|e| {
                StorageError::InvalidData(format!("invalid last_updated timestamp '{}': {e}", value))
            })
        })
        .transpose()
}

fn parse_authority(row: &MySqlRow) -> Result<IssuanceAuthority> {
    let code: String = row.try_get("poi_number").map_err(map_sqlx_error)?;
    let status: String = row.try_get("status").map_err(map_sqlx_error)?;
    let issued: u64 = row
        .try_get("total_generated_phn_count")
        .map_err(map_sqlx_error)?;
    let last_updated: Option<i64> = row.try_get("last_updated").map_err(map_sqlx_error)?;

    Ok(IssuanceAuthority {
        code: PoiCode::new(code).map_err(|e| StorageError::InvalidData(e.to_string()))?,
        status: status
            .parse::<AuthorityStatus>()
            .map_err(|e| StorageError::InvalidData(e.to_string()))?,
        issued,
        last_updated: parse_last_updated(last_updated)?,
    })
}

#[async_trait]
impl Ledger for MySqlRepository {
    async fn try_insert(&self, phn: &Phn, issued_for: &SubjectId) -> Result<Insertion> {
        let result = sqlx::query(
            r#"
            INSERT INTO phn (generated_phn, generated_for)
            VALUES (?, ?)
            "#,
        )
        .bind(phn.as_str())
        .bind(issued_for.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(Insertion::Accepted),
            Err(err) if is_unique_violation(&err) => {
                Ok(Insertion::Rejected(DuplicateKind::AlreadyIssued))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn contains(&self, phn: &Phn) -> Result<bool> {
        let exists = sqlx::query(
            r#"
            SELECT 1
            FROM phn
            WHERE generated_phn = ?
            LIMIT 1
            "#,
        )
        .bind(phn.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .is_some();

        Ok(exists)
    }

    async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM phn")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        u64::try_from(count).map_err(|e| StorageError::InvalidData(e.to_string()))
    }
}

#[async_trait]
impl AuthorityRepository for MySqlRepository {
    async fn next_available(
        &self,
        batch_size: u64,
        max_issued: u64,
    ) -> Result<Option<IssuanceAuthority>> {
        let row = sqlx::query(
            r#"
            SELECT poi_number, status, total_generated_phn_count,
                   CAST(UNIX_TIMESTAMP(last_updated) AS SIGNED) AS last_updated
            FROM poi
            WHERE status = 'active'
              AND total_generated_phn_count + ? <= ?
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(batch_size)
        .bind(max_issued)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(parse_authority).transpose()
    }

    async fn record_issued(
        &self,
        code: &PoiCode,
        count: u64,
        max_issued: u64,
    ) -> Result<Option<IssuanceAuthority>> {
        // MySQL applies SET clauses left to right, so status must read the
        // count before it is bumped.
        let result = sqlx::query(
            r#"
            UPDATE poi
            SET status = CASE
                    WHEN total_generated_phn_count + ? >= ? THEN 'exhausted'
                    ELSE status
                END,
                total_generated_phn_count = total_generated_phn_count + ?
            WHERE poi_number = ?
              AND status = 'active'
              AND total_generated_phn_count + ? <= ?
            "#,
        )
        .bind(count)
        .bind(max_issued)
        .bind(count)
        .bind(code.as_str())
        .bind(count)
        .bind(max_issued)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            tracing::debug!(poi = %code, count, "authority count not updated");
            return Ok(None);
        }

        self.get(code).await
    }

    async fn provision(&self, code: &PoiCode) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO poi (poi_number, status, total_generated_phn_count)
            VALUES (?, 'active', 0)
            "#,
        )
        .bind(code.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn get(&self, code: &PoiCode) -> Result<Option<IssuanceAuthority>> {
        let row = sqlx::query(
            r#"
            SELECT poi_number, status, total_generated_phn_count,
                   CAST(UNIX_TIMESTAMP(last_updated) AS SIGNED) AS last_updated
            FROM poi
            WHERE poi_number = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(parse_authority).transpose()
    }
}

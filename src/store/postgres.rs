//! Postgres-backed credential store.
//!
//! Single-record reads and writes only; `save` is an upsert so each write is
//! one atomic statement. The expected schema lives in `sql/schema.sql`.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;

use super::{CredentialRecord, StoreError, UserStore};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for CredentialRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            identity: row.try_get("identity")?,
            password_hash: row.try_get("password_hash")?,
            totp_secret: row.try_get("totp_secret")?,
            display_name: row.try_get("display_name")?,
            model_blob: row.try_get("model_blob")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_identity(
        &self,
        identity: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let query = r"
            SELECT identity, password_hash, totp_secret, display_name, model_blob, created_at
            FROM users
            WHERE identity = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let record = sqlx::query_as::<_, CredentialRecord>(query)
            .bind(identity)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup credential record")?;
        Ok(record)
    }

    async fn create(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO users
                (identity, password_hash, totp_secret, display_name, model_blob, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(&record.identity)
            .bind(&record.password_hash)
            .bind(&record.totp_secret)
            .bind(&record.display_name)
            .bind(&record.model_blob)
            .bind(record.created_at)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::AlreadyExists),
            Err(err) => Err(StoreError::Unavailable(
                anyhow::Error::new(err).context("failed to insert credential record"),
            )),
        }
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        // Upsert keeps the write a single atomic statement; the model blob is
        // replaced wholesale (last-write-wins).
        let query = r"
            INSERT INTO users
                (identity, password_hash, totp_secret, display_name, model_blob, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (identity) DO UPDATE SET
                password_hash = EXCLUDED.password_hash,
                totp_secret = EXCLUDED.totp_secret,
                display_name = EXCLUDED.display_name,
                model_blob = EXCLUDED.model_blob
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&record.identity)
            .bind(&record.password_hash)
            .bind(&record.totp_secret)
            .bind(&record.display_name)
            .bind(&record.model_blob)
            .bind(record.created_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to save credential record")?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

//! PostgreSQL implementation of the registry, queue, and ledger stores.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{PatternStore, StatusChange, TransactionStore, UnparsedStore};
use crate::errors::AppError;
use crate::models::pattern::{BankAddressInfo, BankAlias, Pattern, PatternHistory, PatternStatus};
use crate::models::transaction::Transaction;
use crate::models::unparsed::{UnparsedMessage, UnparsedStatus};

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PatternStore for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_pattern(&self, pattern: &Pattern) -> Result<Pattern, AppError> {
        let mut tx = self.pool.begin().await?;

        let saved = sqlx::query_as::<_, Pattern>(
            r#"
            INSERT INTO patterns (id, bank_address, bank_name, merchant_name, pattern_type,
                regex_pattern, message, category, status, priority, field_map, date_format,
                alt_date_format, negate_amount, created_by, approved_by, superseded_by,
                version, created_at, decided_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21)
            RETURNING *
            "#,
        )
        .bind(pattern.id)
        .bind(&pattern.bank_address)
        .bind(&pattern.bank_name)
        .bind(&pattern.merchant_name)
        .bind(pattern.pattern_type)
        .bind(&pattern.regex_pattern)
        .bind(&pattern.message)
        .bind(pattern.category)
        .bind(pattern.status)
        .bind(pattern.priority)
        .bind(Json(&pattern.field_map))
        .bind(&pattern.date_format)
        .bind(&pattern.alt_date_format)
        .bind(pattern.negate_amount)
        .bind(pattern.created_by)
        .bind(pattern.approved_by)
        .bind(pattern.superseded_by)
        .bind(pattern.version)
        .bind(pattern.created_at)
        .bind(pattern.decided_at)
        .bind(pattern.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO pattern_history (id, pattern_id, from_status, to_status, actor_id, note)
            VALUES ($1, $2, NULL, $3, $4, 'created')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(saved.id)
        .bind(saved.status)
        .bind(saved.created_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn find_pattern(&self, id: Uuid) -> Result<Option<Pattern>, AppError> {
        let pattern = sqlx::query_as::<_, Pattern>("SELECT * FROM patterns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(pattern)
    }

    async fn update_draft(
        &self,
        pattern: &Pattern,
        expected_version: i32,
    ) -> Result<Option<Pattern>, AppError> {
        let updated = sqlx::query_as::<_, Pattern>(
            r#"
            UPDATE patterns
            SET bank_address = $1, bank_name = $2, merchant_name = $3, pattern_type = $4,
                regex_pattern = $5, message = $6, category = $7, priority = $8,
                field_map = $9, date_format = $10, alt_date_format = $11,
                negate_amount = $12, version = version + 1, updated_at = NOW()
            WHERE id = $13 AND status = 'DRAFT' AND version = $14
            RETURNING *
            "#,
        )
        .bind(&pattern.bank_address)
        .bind(&pattern.bank_name)
        .bind(&pattern.merchant_name)
        .bind(pattern.pattern_type)
        .bind(&pattern.regex_pattern)
        .bind(&pattern.message)
        .bind(pattern.category)
        .bind(pattern.priority)
        .bind(Json(&pattern.field_map))
        .bind(&pattern.date_format)
        .bind(&pattern.alt_date_format)
        .bind(pattern.negate_amount)
        .bind(pattern.id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn compare_and_set_status(
        &self,
        change: &StatusChange,
    ) -> Result<Option<Pattern>, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Pattern>(
            r#"
            UPDATE patterns
            SET status = $1,
                approved_by = CASE WHEN $2 THEN $3 ELSE approved_by END,
                decided_at = CASE WHEN $2 THEN NOW() ELSE decided_at END,
                superseded_by = COALESCE($4, superseded_by),
                version = version + 1,
                updated_at = NOW()
            WHERE id = $5 AND status = $6 AND ($7::INT IS NULL OR version = $7)
            RETURNING *
            "#,
        )
        .bind(change.new_status)
        .bind(change.record_decision)
        .bind(change.actor_id)
        .bind(change.superseded_by)
        .bind(change.pattern_id)
        .bind(change.expected)
        .bind(change.expected_version)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(pattern) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO pattern_history (id, pattern_id, from_status, to_status, actor_id, note)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(change.pattern_id)
        .bind(change.expected)
        .bind(change.new_status)
        .bind(change.actor_id)
        .bind(&change.note)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(pattern))
    }

    async fn list_by_status(&self, status: PatternStatus) -> Result<Vec<Pattern>, AppError> {
        let patterns = sqlx::query_as::<_, Pattern>(
            r#"
            SELECT * FROM patterns
            WHERE status = $1
            ORDER BY priority DESC, decided_at DESC NULLS LAST, created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(patterns)
    }

    async fn history(&self, pattern_id: Uuid) -> Result<Vec<PatternHistory>, AppError> {
        let rows = sqlx::query_as::<_, PatternHistory>(
            "SELECT * FROM pattern_history WHERE pattern_id = $1 ORDER BY created_at ASC",
        )
        .bind(pattern_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn active_bank_addresses(&self) -> Result<Vec<BankAddressInfo>, AppError> {
        let rows = sqlx::query_as::<_, BankAddressInfo>(
            r#"
            SELECT DISTINCT ON (LOWER(bank_address)) bank_address AS address, bank_name
            FROM patterns
            WHERE status = 'ACTIVE'
            ORDER BY LOWER(bank_address), priority DESC, decided_at DESC NULLS LAST
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_aliases(&self) -> Result<Vec<BankAlias>, AppError> {
        let rows = sqlx::query_as::<_, BankAlias>("SELECT * FROM bank_aliases ORDER BY alias")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn upsert_alias(&self, alias: &BankAlias) -> Result<BankAlias, AppError> {
        let saved = sqlx::query_as::<_, BankAlias>(
            r#"
            INSERT INTO bank_aliases (alias, address, created_by, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (alias) DO UPDATE SET address = EXCLUDED.address
            RETURNING *
            "#,
        )
        .bind(&alias.alias)
        .bind(&alias.address)
        .bind(alias.created_by)
        .bind(alias.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }
}

#[async_trait]
impl UnparsedStore for PgStore {
    async fn enqueue(&self, message: &UnparsedMessage) -> Result<UnparsedMessage, AppError> {
        let saved = sqlx::query_as::<_, UnparsedMessage>(
            r#"
            INSERT INTO unparsed_messages (id, bank_address, sms_message, submitted_by, status,
                error_message, processed_by, processed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(message.id)
        .bind(&message.bank_address)
        .bind(&message.sms_message)
        .bind(message.submitted_by)
        .bind(message.status)
        .bind(&message.error_message)
        .bind(message.processed_by)
        .bind(message.processed_at)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    async fn find_unparsed(&self, id: Uuid) -> Result<Option<UnparsedMessage>, AppError> {
        let row = sqlx::query_as::<_, UnparsedMessage>(
            "SELECT * FROM unparsed_messages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_unparsed(
        &self,
        status: Option<UnparsedStatus>,
    ) -> Result<Vec<UnparsedMessage>, AppError> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, UnparsedMessage>(
                    "SELECT * FROM unparsed_messages WHERE status = $1 ORDER BY created_at DESC",
                )
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, UnparsedMessage>(
                    "SELECT * FROM unparsed_messages WHERE status <> 'DELETED' ORDER BY created_at DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    async fn count_unparsed(&self, status: UnparsedStatus) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM unparsed_messages WHERE status = $1",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn claim_unparsed(
        &self,
        id: Uuid,
        actor_id: Uuid,
    ) -> Result<Option<UnparsedMessage>, AppError> {
        let row = sqlx::query_as::<_, UnparsedMessage>(
            r#"
            UPDATE unparsed_messages
            SET status = 'PROCESSED', processed_by = $1, processed_at = NOW()
            WHERE id = $2 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(actor_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn discard_unparsed(
        &self,
        id: Uuid,
        actor_id: Uuid,
    ) -> Result<Option<UnparsedMessage>, AppError> {
        let row = sqlx::query_as::<_, UnparsedMessage>(
            r#"
            UPDATE unparsed_messages
            SET status = 'DELETED', deleted_by = $1, deleted_at = NOW()
            WHERE id = $2 AND status <> 'DELETED'
            RETURNING *
            "#,
        )
        .bind(actor_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn append_transaction(&self, transaction: &Transaction) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, merchant, amount, amount_sign, transaction_type,
                occurred_at, bank_name, bank_address, account_number, balance, ref_number,
                category, sms_message, matched_pattern_id, submitted_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(transaction.id)
        .bind(&transaction.merchant)
        .bind(transaction.amount)
        .bind(transaction.amount_sign)
        .bind(transaction.transaction_type)
        .bind(transaction.date)
        .bind(&transaction.bank_name)
        .bind(&transaction.bank_address)
        .bind(&transaction.account_number)
        .bind(transaction.balance)
        .bind(&transaction.ref_number)
        .bind(transaction.category)
        .bind(&transaction.sms_message)
        .bind(transaction.matched_pattern_id)
        .bind(transaction.submitted_by)
        .bind(transaction.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn transactions_for(&self, submitted_by: Uuid) -> Result<Vec<Transaction>, AppError> {
        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE submitted_by = $1 ORDER BY created_at DESC",
        )
        .bind(submitted_by)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

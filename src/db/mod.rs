//! Database connection pool and the persistence seams of the registry.
//!
//! Every status mutation goes through a compare-and-set method that returns
//! `None` when the row is no longer in the expected state; callers translate
//! that into the matching conflict error.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::pattern::{BankAddressInfo, BankAlias, Pattern, PatternHistory, PatternStatus};
use crate::models::transaction::Transaction;
use crate::models::unparsed::{UnparsedMessage, UnparsedStatus};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// A single guarded status transition.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub pattern_id: Uuid,
    pub expected: PatternStatus,
    /// When set, the row must also still be at this version.
    pub expected_version: Option<i32>,
    pub new_status: PatternStatus,
    pub actor_id: Uuid,
    /// Stamp `approved_by` and `decided_at` with this change.
    pub record_decision: bool,
    pub superseded_by: Option<Uuid>,
    pub note: Option<String>,
}

#[async_trait]
pub trait PatternStore: Send + Sync {
    async fn ping(&self) -> Result<(), AppError>;

    /// Insert a new pattern together with its creation history row.
    async fn insert_pattern(&self, pattern: &Pattern) -> Result<Pattern, AppError>;

    async fn find_pattern(&self, id: Uuid) -> Result<Option<Pattern>, AppError>;

    /// Replace the authored fields of a pattern that is still a draft at `expected_version`.
    async fn update_draft(
        &self,
        pattern: &Pattern,
        expected_version: i32,
    ) -> Result<Option<Pattern>, AppError>;

    /// Apply `change` atomically with its history row, or return `None`.
    async fn compare_and_set_status(
        &self,
        change: &StatusChange,
    ) -> Result<Option<Pattern>, AppError>;

    /// Patterns in `status`, highest priority and most recently decided first.
    async fn list_by_status(&self, status: PatternStatus) -> Result<Vec<Pattern>, AppError>;

    async fn history(&self, pattern_id: Uuid) -> Result<Vec<PatternHistory>, AppError>;

    /// One entry per distinct (case-insensitive) address with an active pattern.
    async fn active_bank_addresses(&self) -> Result<Vec<BankAddressInfo>, AppError>;

    async fn list_aliases(&self) -> Result<Vec<BankAlias>, AppError>;

    async fn upsert_alias(&self, alias: &BankAlias) -> Result<BankAlias, AppError>;
}

#[async_trait]
pub trait UnparsedStore: Send + Sync {
    async fn enqueue(&self, message: &UnparsedMessage) -> Result<UnparsedMessage, AppError>;

    async fn find_unparsed(&self, id: Uuid) -> Result<Option<UnparsedMessage>, AppError>;

    /// Newest first. `None` lists everything that is not deleted.
    async fn list_unparsed(
        &self,
        status: Option<UnparsedStatus>,
    ) -> Result<Vec<UnparsedMessage>, AppError>;

    async fn count_unparsed(&self, status: UnparsedStatus) -> Result<i64, AppError>;

    /// PENDING → PROCESSED, or `None` if the message is not pending.
    async fn claim_unparsed(
        &self,
        id: Uuid,
        actor_id: Uuid,
    ) -> Result<Option<UnparsedMessage>, AppError>;

    /// PENDING/PROCESSED → DELETED, or `None` if already deleted or missing.
    async fn discard_unparsed(
        &self,
        id: Uuid,
        actor_id: Uuid,
    ) -> Result<Option<UnparsedMessage>, AppError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Append to the submitter's ledger. Rows are never updated.
    async fn append_transaction(&self, transaction: &Transaction) -> Result<(), AppError>;

    async fn transactions_for(&self, submitted_by: Uuid) -> Result<Vec<Transaction>, AppError>;
}

/// Everything the service persists.
pub trait Store: PatternStore + UnparsedStore + TransactionStore {}

impl<T: PatternStore + UnparsedStore + TransactionStore> Store for T {}

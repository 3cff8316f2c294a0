//! In-process store with the same compare-and-set semantics as Postgres.
//!
//! Used by tests and by `STORE_BACKEND=memory` for local development.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::db::{PatternStore, StatusChange, TransactionStore, UnparsedStore};
use crate::errors::AppError;
use crate::models::pattern::{BankAddressInfo, BankAlias, Pattern, PatternHistory, PatternStatus};
use crate::models::transaction::Transaction;
use crate::models::unparsed::{UnparsedMessage, UnparsedStatus};

#[derive(Debug, Default)]
struct Registry {
    patterns: HashMap<Uuid, Pattern>,
    history: Vec<PatternHistory>,
    aliases: HashMap<String, BankAlias>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    registry: Mutex<Registry>,
    unparsed: Mutex<HashMap<Uuid, UnparsedMessage>>,
    transactions: Mutex<Vec<Transaction>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AppError> {
    mutex
        .lock()
        .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
}

fn history_row(
    pattern_id: Uuid,
    from_status: Option<PatternStatus>,
    to_status: PatternStatus,
    actor_id: Uuid,
    note: Option<String>,
) -> PatternHistory {
    PatternHistory {
        id: Uuid::new_v4(),
        pattern_id,
        from_status,
        to_status,
        actor_id,
        note,
        created_at: Utc::now(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PatternStore for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        lock(&self.registry).map(|_| ())
    }

    async fn insert_pattern(&self, pattern: &Pattern) -> Result<Pattern, AppError> {
        let mut registry = lock(&self.registry)?;
        if registry.patterns.contains_key(&pattern.id) {
            return Err(AppError::Internal(format!(
                "duplicate pattern id {}",
                pattern.id
            )));
        }
        registry.patterns.insert(pattern.id, pattern.clone());
        registry.history.push(history_row(
            pattern.id,
            None,
            pattern.status,
            pattern.created_by,
            Some("created".to_string()),
        ));
        Ok(pattern.clone())
    }

    async fn find_pattern(&self, id: Uuid) -> Result<Option<Pattern>, AppError> {
        Ok(lock(&self.registry)?.patterns.get(&id).cloned())
    }

    async fn update_draft(
        &self,
        pattern: &Pattern,
        expected_version: i32,
    ) -> Result<Option<Pattern>, AppError> {
        let mut registry = lock(&self.registry)?;
        let Some(current) = registry.patterns.get_mut(&pattern.id) else {
            return Ok(None);
        };
        if current.status != PatternStatus::Draft || current.version != expected_version {
            return Ok(None);
        }

        current.bank_address = pattern.bank_address.clone();
        current.bank_name = pattern.bank_name.clone();
        current.merchant_name = pattern.merchant_name.clone();
        current.pattern_type = pattern.pattern_type;
        current.regex_pattern = pattern.regex_pattern.clone();
        current.message = pattern.message.clone();
        current.category = pattern.category;
        current.priority = pattern.priority;
        current.field_map = pattern.field_map.clone();
        current.date_format = pattern.date_format.clone();
        current.alt_date_format = pattern.alt_date_format.clone();
        current.negate_amount = pattern.negate_amount;
        current.version += 1;
        current.updated_at = Utc::now();
        Ok(Some(current.clone()))
    }

    async fn compare_and_set_status(
        &self,
        change: &StatusChange,
    ) -> Result<Option<Pattern>, AppError> {
        let mut registry = lock(&self.registry)?;
        let Some(current) = registry.patterns.get_mut(&change.pattern_id) else {
            return Ok(None);
        };
        if current.status != change.expected {
            return Ok(None);
        }
        if change.expected_version.is_some_and(|v| v != current.version) {
            return Ok(None);
        }

        let now = Utc::now();
        current.status = change.new_status;
        if change.record_decision {
            current.approved_by = Some(change.actor_id);
            current.decided_at = Some(now);
        }
        if change.superseded_by.is_some() {
            current.superseded_by = change.superseded_by;
        }
        current.version += 1;
        current.updated_at = now;
        let updated = current.clone();

        registry.history.push(history_row(
            change.pattern_id,
            Some(change.expected),
            change.new_status,
            change.actor_id,
            change.note.clone(),
        ));
        Ok(Some(updated))
    }

    async fn list_by_status(&self, status: PatternStatus) -> Result<Vec<Pattern>, AppError> {
        let registry = lock(&self.registry)?;
        let mut patterns: Vec<Pattern> = registry
            .patterns
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        patterns.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.decided_at.cmp(&a.decided_at))
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(patterns)
    }

    async fn history(&self, pattern_id: Uuid) -> Result<Vec<PatternHistory>, AppError> {
        let registry = lock(&self.registry)?;
        Ok(registry
            .history
            .iter()
            .filter(|h| h.pattern_id == pattern_id)
            .cloned()
            .collect())
    }

    async fn active_bank_addresses(&self) -> Result<Vec<BankAddressInfo>, AppError> {
        let active = self.list_by_status(PatternStatus::Active).await?;
        let mut seen: HashMap<String, BankAddressInfo> = HashMap::new();
        for pattern in active {
            seen.entry(pattern.bank_address.to_lowercase())
                .or_insert(BankAddressInfo {
                    address: pattern.bank_address,
                    bank_name: pattern.bank_name,
                });
        }
        let mut infos: Vec<BankAddressInfo> = seen.into_values().collect();
        infos.sort_by(|a, b| a.address.to_lowercase().cmp(&b.address.to_lowercase()));
        Ok(infos)
    }

    async fn list_aliases(&self) -> Result<Vec<BankAlias>, AppError> {
        let registry = lock(&self.registry)?;
        let mut aliases: Vec<BankAlias> = registry.aliases.values().cloned().collect();
        aliases.sort_by(|a, b| a.alias.cmp(&b.alias));
        Ok(aliases)
    }

    async fn upsert_alias(&self, alias: &BankAlias) -> Result<BankAlias, AppError> {
        let mut registry = lock(&self.registry)?;
        let saved = registry
            .aliases
            .entry(alias.alias.clone())
            .and_modify(|existing| existing.address = alias.address.clone())
            .or_insert_with(|| alias.clone())
            .clone();
        Ok(saved)
    }
}

#[async_trait]
impl UnparsedStore for MemoryStore {
    async fn enqueue(&self, message: &UnparsedMessage) -> Result<UnparsedMessage, AppError> {
        lock(&self.unparsed)?.insert(message.id, message.clone());
        Ok(message.clone())
    }

    async fn find_unparsed(&self, id: Uuid) -> Result<Option<UnparsedMessage>, AppError> {
        Ok(lock(&self.unparsed)?.get(&id).cloned())
    }

    async fn list_unparsed(
        &self,
        status: Option<UnparsedStatus>,
    ) -> Result<Vec<UnparsedMessage>, AppError> {
        let unparsed = lock(&self.unparsed)?;
        let mut rows: Vec<UnparsedMessage> = unparsed
            .values()
            .filter(|m| match status {
                Some(s) => m.status == s,
                None => m.status != UnparsedStatus::Deleted,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn count_unparsed(&self, status: UnparsedStatus) -> Result<i64, AppError> {
        let unparsed = lock(&self.unparsed)?;
        Ok(unparsed.values().filter(|m| m.status == status).count() as i64)
    }

    async fn claim_unparsed(
        &self,
        id: Uuid,
        actor_id: Uuid,
    ) -> Result<Option<UnparsedMessage>, AppError> {
        let mut unparsed = lock(&self.unparsed)?;
        match unparsed.get_mut(&id) {
            Some(message) if message.status == UnparsedStatus::Pending => {
                message.status = UnparsedStatus::Processed;
                message.processed_by = Some(actor_id);
                message.processed_at = Some(Utc::now());
                Ok(Some(message.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn discard_unparsed(
        &self,
        id: Uuid,
        actor_id: Uuid,
    ) -> Result<Option<UnparsedMessage>, AppError> {
        let mut unparsed = lock(&self.unparsed)?;
        match unparsed.get_mut(&id) {
            Some(message) if message.status != UnparsedStatus::Deleted => {
                message.status = UnparsedStatus::Deleted;
                message.deleted_by = Some(actor_id);
                message.deleted_at = Some(Utc::now());
                Ok(Some(message.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn append_transaction(&self, transaction: &Transaction) -> Result<(), AppError> {
        lock(&self.transactions)?.push(transaction.clone());
        Ok(())
    }

    async fn transactions_for(&self, submitted_by: Uuid) -> Result<Vec<Transaction>, AppError> {
        let transactions = lock(&self.transactions)?;
        let mut rows: Vec<Transaction> = transactions
            .iter()
            .filter(|t| t.submitted_by == submitted_by)
            .cloned()
            .collect();
        rows.reverse();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pattern::CreatePattern;

    fn draft() -> Pattern {
        let input: CreatePattern = serde_json::from_value(serde_json::json!({
            "bankAddress": "HDFCBK",
            "bankName": "HDFC Bank",
            "regexPattern": "debited",
            "message": "Rs 10 debited"
        }))
        .unwrap();
        Pattern::from_input(&input, Uuid::new_v4(), PatternStatus::PendingApproval)
    }

    fn decide(pattern: &Pattern, to: PatternStatus) -> StatusChange {
        StatusChange {
            pattern_id: pattern.id,
            expected: PatternStatus::PendingApproval,
            expected_version: Some(pattern.version),
            new_status: to,
            actor_id: Uuid::new_v4(),
            record_decision: true,
            superseded_by: None,
            note: None,
        }
    }

    #[tokio::test]
    async fn compare_and_set_only_succeeds_once() {
        let store = MemoryStore::new();
        let pattern = store.insert_pattern(&draft()).await.unwrap();

        let first = store
            .compare_and_set_status(&decide(&pattern, PatternStatus::Active))
            .await
            .unwrap();
        let second = store
            .compare_and_set_status(&decide(&pattern, PatternStatus::Rejected))
            .await
            .unwrap();

        let first = first.expect("first decision applies");
        assert_eq!(first.status, PatternStatus::Active);
        assert_eq!(first.version, pattern.version + 1);
        assert!(first.decided_at.is_some());
        assert!(second.is_none());

        let history = store.history(pattern.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].from_status, Some(PatternStatus::PendingApproval));
        assert_eq!(history[1].to_status, PatternStatus::Active);
    }

    #[tokio::test]
    async fn update_draft_requires_draft_status() {
        let store = MemoryStore::new();
        let pattern = store.insert_pattern(&draft()).await.unwrap();
        let updated = store.update_draft(&pattern, pattern.version).await.unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn claim_is_single_shot() {
        let store = MemoryStore::new();
        let msg = UnparsedMessage::new("X", "sms", Uuid::new_v4(), "no match");
        store.enqueue(&msg).await.unwrap();

        let actor = Uuid::new_v4();
        assert!(store.claim_unparsed(msg.id, actor).await.unwrap().is_some());
        assert!(store.claim_unparsed(msg.id, actor).await.unwrap().is_none());
        assert_eq!(store.count_unparsed(UnparsedStatus::Pending).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deleted_messages_are_hidden_from_default_listing() {
        let store = MemoryStore::new();
        let keep = UnparsedMessage::new("X", "keep", Uuid::new_v4(), "no match");
        let drop = UnparsedMessage::new("X", "drop", Uuid::new_v4(), "no match");
        store.enqueue(&keep).await.unwrap();
        store.enqueue(&drop).await.unwrap();
        store.discard_unparsed(drop.id, Uuid::new_v4()).await.unwrap();

        let listed = store.list_unparsed(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, keep.id);
        assert!(store
            .discard_unparsed(drop.id, Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }
}

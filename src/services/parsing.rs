//! SMS submission: run the engine, append to the ledger or queue for review.

use uuid::Uuid;
use validator::Validate;

use crate::db::Store;
use crate::errors::AppError;
use crate::models::transaction::{ParseRequest, Transaction};
use crate::services::classifier::Classifier;
use crate::services::engine::{self, ParseOutcome};
use crate::services::registry::PatternRegistry;
use crate::services::unparsed;

/// Parse one SMS for `submitted_by`.
///
/// A match is appended to the submitter's ledger. Otherwise the SMS is
/// queued verbatim and `NoMatch` is returned.
pub async fn submit_sms(
    store: &dyn Store,
    registry: &PatternRegistry,
    classifier: &dyn Classifier,
    request: &ParseRequest,
    submitted_by: Uuid,
) -> Result<Transaction, AppError> {
    request.validate()?;
    if request.sms.trim().is_empty() || request.bank_address.trim().is_empty() {
        return Err(AppError::Validation(
            "sms and bankAddress must not be blank".to_string(),
        ));
    }

    match engine::parse(registry, classifier, &request.sms, &request.bank_address, submitted_by).await {
        ParseOutcome::Matched(transaction) => {
            store.append_transaction(&transaction).await?;
            tracing::info!(
                transaction_id = %transaction.id,
                pattern_id = %transaction.matched_pattern_id,
                "Transaction recorded"
            );
            Ok(transaction)
        }
        ParseOutcome::Unmatched(result) => {
            unparsed::enqueue(
                store,
                &result.bank_address,
                &result.sms_message,
                submitted_by,
                &result.reason,
            )
            .await?;
            Err(AppError::NoMatch(result.reason))
        }
    }
}

/// The caller's own ledger, newest first.
pub async fn ledger(store: &dyn Store, submitted_by: Uuid) -> Result<Vec<Transaction>, AppError> {
    store.transactions_for(submitted_by).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::db::{MemoryStore, UnparsedStore};
    use crate::services::classifier::MerchantClassifier;
    use crate::services::regex_cache::RegexCache;

    fn request(sms: &str, address: &str) -> ParseRequest {
        ParseRequest {
            sms: sms.to_string(),
            bank_address: address.to_string(),
        }
    }

    #[tokio::test]
    async fn unmatched_sms_is_queued_verbatim() {
        let store = Arc::new(MemoryStore::new());
        let registry = PatternRegistry::new(store.clone(), Arc::new(RegexCache::new(1 << 20)));
        let user = Uuid::new_v4();

        let err = submit_sms(
            store.as_ref(),
            &registry,
            &MerchantClassifier::offline(),
            &request("gibberish text", "UNKNOWN-ADDR"),
            user,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NoMatch(ref r) if r == engine::REASON_NO_PATTERN));

        let queued = store.list_unparsed(None).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].sms_message, "gibberish text");
        assert_eq!(queued[0].bank_address, "UNKNOWN-ADDR");
        assert_eq!(queued[0].submitted_by, user);
        assert!(ledger(store.as_ref(), user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_sms_is_rejected_without_queueing() {
        let store = Arc::new(MemoryStore::new());
        let registry = PatternRegistry::new(store.clone(), Arc::new(RegexCache::new(1 << 20)));

        let err = submit_sms(
            store.as_ref(),
            &registry,
            &MerchantClassifier::offline(),
            &request("   ", "HDFCBK"),
            Uuid::new_v4(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.list_unparsed(None).await.unwrap().is_empty());
    }
}

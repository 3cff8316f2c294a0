//! Review queue for SMS that no active pattern could extract.
//!
//! Messages are only ever moved between statuses; DELETED is a soft delete.

use uuid::Uuid;

use crate::db::Store;
use crate::errors::AppError;
use crate::models::unparsed::{ClaimedMessage, DraftSeed, UnparsedMessage, UnparsedStatus};
use crate::models::user::{Actor, PatternAction};
use crate::services::approval::require;
use crate::services::registry::PatternRegistry;

/// Record an unmatched SMS verbatim as PENDING.
pub async fn enqueue(
    store: &dyn Store,
    bank_address: &str,
    sms: &str,
    submitted_by: Uuid,
    reason: &str,
) -> Result<UnparsedMessage, AppError> {
    let message = UnparsedMessage::new(bank_address, sms, submitted_by, reason);
    let saved = store.enqueue(&message).await?;
    tracing::info!(message_id = %saved.id, bank_address = %saved.bank_address, reason, "SMS queued for review");
    Ok(saved)
}

/// PENDING → PROCESSED, returning a draft seed for the claiming maker.
///
/// Exactly one of several concurrent claims succeeds; the rest get
/// `AlreadyClaimed`.
pub async fn claim(
    store: &dyn Store,
    registry: &PatternRegistry,
    id: Uuid,
    actor: &Actor,
) -> Result<ClaimedMessage, AppError> {
    require(actor, PatternAction::ManageQueue)?;

    let Some(message) = store.claim_unparsed(id, actor.id).await? else {
        return match store.find_unparsed(id).await? {
            Some(m) if m.status == UnparsedStatus::Processed => Err(AppError::AlreadyClaimed(
                format!("Message {id} has already been claimed"),
            )),
            _ => Err(AppError::NotFound(format!("Unparsed message {id} not found"))),
        };
    };

    let draft = DraftSeed {
        bank_address: message.bank_address.clone(),
        bank_name: registry.snapshot().bank_name(&message.bank_address),
        message: message.sms_message.clone(),
    };
    tracing::info!(message_id = %id, actor = %actor.username, "Unparsed message claimed");
    Ok(ClaimedMessage { message, draft })
}

/// Soft-delete a pending or processed message.
pub async fn discard(store: &dyn Store, id: Uuid, actor: &Actor) -> Result<UnparsedMessage, AppError> {
    require(actor, PatternAction::ManageQueue)?;

    let discarded = store
        .discard_unparsed(id, actor.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Unparsed message {id} not found")))?;
    tracing::info!(message_id = %id, actor = %actor.username, "Unparsed message discarded");
    Ok(discarded)
}

pub async fn list_pending(store: &dyn Store) -> Result<Vec<UnparsedMessage>, AppError> {
    store.list_unparsed(Some(UnparsedStatus::Pending)).await
}

/// Everything not deleted, newest first.
pub async fn list_all(store: &dyn Store) -> Result<Vec<UnparsedMessage>, AppError> {
    store.list_unparsed(None).await
}

pub async fn pending_count(store: &dyn Store) -> Result<i64, AppError> {
    store.count_unparsed(UnparsedStatus::Pending).await
}

//! Explicit sender address aliases.

use chrono::Utc;
use validator::Validate;

use crate::db::Store;
use crate::errors::AppError;
use crate::models::pattern::{BankAlias, CreateBankAlias};
use crate::models::user::{Actor, PatternAction};
use crate::services::approval::require;
use crate::services::registry::PatternRegistry;
use crate::services::resolver::address_key;

/// Register (or repoint) `alias` to `address` and republish the active set.
pub async fn register(
    store: &dyn Store,
    registry: &PatternRegistry,
    input: &CreateBankAlias,
    actor: &Actor,
) -> Result<BankAlias, AppError> {
    require(actor, PatternAction::ManageAliases)?;
    input.validate()?;

    let alias = input.alias.trim().to_uppercase();
    let address = input.address.trim().to_string();
    if alias.is_empty() || address.is_empty() {
        return Err(AppError::Validation(
            "alias and address must not be blank".to_string(),
        ));
    }
    if address_key(&alias) == address_key(&address) {
        return Err(AppError::Validation(
            "An alias must differ from its address".to_string(),
        ));
    }

    let saved = store
        .upsert_alias(&BankAlias {
            alias,
            address,
            created_by: actor.id,
            created_at: Utc::now(),
        })
        .await?;
    registry.refresh().await?;
    tracing::info!(alias = %saved.alias, address = %saved.address, actor = %actor.username, "Bank alias registered");
    Ok(saved)
}

pub async fn list(store: &dyn Store) -> Result<Vec<BankAlias>, AppError> {
    store.list_aliases().await
}

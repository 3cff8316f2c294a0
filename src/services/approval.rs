//! Maker/checker approval state machine for pattern templates.
//!
//! DRAFT → PENDING_APPROVAL → {ACTIVE, REJECTED}; ACTIVE → DEPRECATED.
//! Every status change is a compare-and-set in the store, written together
//! with its history row. Capabilities are checked here, not only at the
//! HTTP layer.

use uuid::Uuid;
use validator::Validate;

use crate::db::{StatusChange, Store};
use crate::errors::AppError;
use crate::models::pattern::{
    CreatePattern, Decision, DeprecateRequest, Pattern, PatternHistory, PatternStatus,
    TestMatchResponse,
};
use crate::models::user::{Actor, PatternAction, UserRole};
use crate::services::engine::check_field_map;
use crate::services::regex_cache::compile_regex;
use crate::services::registry::PatternRegistry;

/// Check whether a status transition is valid per the state machine graph.
pub fn is_valid_transition(from: PatternStatus, to: PatternStatus) -> bool {
    matches!(
        (from, to),
        (PatternStatus::Draft, PatternStatus::PendingApproval)
            | (PatternStatus::PendingApproval, PatternStatus::Active)
            | (PatternStatus::PendingApproval, PatternStatus::Rejected)
            | (PatternStatus::Active, PatternStatus::Deprecated)
    )
}

/// Fail with `Forbidden` unless the actor's role grants `action`.
pub fn require(actor: &Actor, action: PatternAction) -> Result<(), AppError> {
    if actor.role.permits(action) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role {:?} cannot perform {action:?}",
            actor.role
        )))
    }
}

/// Compile the regex, match it against its own sample, and check the field map.
///
/// Pure: repeated calls on the same pattern give the same result.
pub fn self_test(pattern: &Pattern, size_limit: usize) -> Result<(), AppError> {
    let regex = compile_regex(&pattern.regex_pattern, size_limit)?;
    if !regex.is_match(&pattern.message) {
        return Err(AppError::SelfTestFailed(
            "regex does not match its sample message".to_string(),
        ));
    }
    check_field_map(pattern, &regex).map_err(AppError::SelfTestFailed)
}

/// Stateless regex preview for authors. Never touches the registry.
pub fn test_match(regex_pattern: &str, sample_message: &str, size_limit: usize) -> TestMatchResponse {
    let failure = |message: String| TestMatchResponse {
        success: false,
        message,
        matched_text: None,
        groups: Vec::new(),
    };

    if regex_pattern.trim().is_empty() {
        return failure("Please enter a regex pattern".to_string());
    }
    if sample_message.trim().is_empty() {
        return failure("Please enter a sample message".to_string());
    }

    let regex = match compile_regex(regex_pattern, size_limit) {
        Ok(regex) => regex,
        Err(AppError::InvalidPattern(e)) => return failure(format!("✗ Invalid regex pattern: {e}")),
        Err(other) => return failure(other.to_string()),
    };

    match regex.captures(sample_message) {
        Some(caps) => TestMatchResponse {
            success: true,
            message: "✓ Pattern matches! Regex successfully matched the sample message.".to_string(),
            matched_text: caps.get(0).map(|m| m.as_str().to_string()),
            groups: caps
                .iter()
                .skip(1)
                .map(|g| g.map(|m| m.as_str().to_string()))
                .collect(),
        },
        None => failure(
            "✗ Pattern does not match. The regex pattern did not match the sample message."
                .to_string(),
        ),
    }
}

async fn load(store: &dyn Store, id: Uuid) -> Result<Pattern, AppError> {
    store
        .find_pattern(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Pattern {id} not found")))
}

/// Save a new pattern as DRAFT. Drafts are not self-tested.
pub async fn create_draft(
    store: &dyn Store,
    input: &CreatePattern,
    actor: &Actor,
) -> Result<Pattern, AppError> {
    require(actor, PatternAction::Author)?;
    input.validate()?;

    let pattern = Pattern::from_input(input, actor.id, PatternStatus::Draft);
    let saved = store.insert_pattern(&pattern).await?;
    tracing::info!(pattern_id = %saved.id, bank_address = %saved.bank_address, actor = %actor.username, "Draft pattern created");
    Ok(saved)
}

/// Create a pattern directly in PENDING_APPROVAL after a passing self-test.
pub async fn create_and_submit(
    store: &dyn Store,
    input: &CreatePattern,
    actor: &Actor,
    size_limit: usize,
) -> Result<Pattern, AppError> {
    require(actor, PatternAction::Author)?;
    require(actor, PatternAction::Submit)?;
    input.validate()?;

    let pattern = Pattern::from_input(input, actor.id, PatternStatus::PendingApproval);
    self_test(&pattern, size_limit)?;

    let saved = store.insert_pattern(&pattern).await?;
    tracing::info!(pattern_id = %saved.id, bank_address = %saved.bank_address, actor = %actor.username, "Pattern submitted for approval");
    Ok(saved)
}

/// Replace the authored fields of the caller's own draft.
///
/// `expected_version` defaults to the version read here.
pub async fn update_draft(
    store: &dyn Store,
    registry: &PatternRegistry,
    id: Uuid,
    input: &CreatePattern,
    actor: &Actor,
    expected_version: Option<i32>,
) -> Result<Pattern, AppError> {
    require(actor, PatternAction::Author)?;
    input.validate()?;

    let mut pattern = load(store, id).await?;
    if pattern.status != PatternStatus::Draft {
        return Err(AppError::InvalidTransition(format!(
            "Only drafts can be edited; pattern is {:?}",
            pattern.status
        )));
    }
    if pattern.created_by != actor.id {
        return Err(AppError::Forbidden(
            "Only the author can edit a draft".to_string(),
        ));
    }

    let version = expected_version.unwrap_or(pattern.version);
    pattern.apply(input);
    let updated = store
        .update_draft(&pattern, version)
        .await?
        .ok_or_else(|| {
            AppError::InvalidTransition("Draft was modified concurrently; reload and retry".to_string())
        })?;

    registry.cache().invalidate(id);
    tracing::info!(pattern_id = %id, version = updated.version, "Draft pattern updated");
    Ok(updated)
}

/// DRAFT → PENDING_APPROVAL, gated by the self-test.
pub async fn submit_for_approval(
    store: &dyn Store,
    id: Uuid,
    actor: &Actor,
    size_limit: usize,
) -> Result<Pattern, AppError> {
    require(actor, PatternAction::Submit)?;

    let pattern = load(store, id).await?;
    if !is_valid_transition(pattern.status, PatternStatus::PendingApproval) {
        return Err(AppError::InvalidTransition(format!(
            "Cannot submit a pattern that is {:?}",
            pattern.status
        )));
    }
    if pattern.created_by != actor.id && actor.role != UserRole::Admin {
        return Err(AppError::Forbidden(
            "Only the author can submit a draft".to_string(),
        ));
    }

    self_test(&pattern, size_limit)?;

    let submitted = store
        .compare_and_set_status(&StatusChange {
            pattern_id: id,
            expected: PatternStatus::Draft,
            expected_version: Some(pattern.version),
            new_status: PatternStatus::PendingApproval,
            actor_id: actor.id,
            record_decision: false,
            superseded_by: None,
            note: None,
        })
        .await?
        .ok_or_else(|| {
            AppError::InvalidTransition("Draft was modified concurrently; reload and retry".to_string())
        })?;

    tracing::info!(pattern_id = %id, actor = %actor.username, "Draft submitted for approval");
    Ok(submitted)
}

/// Approve or reject a pending pattern.
///
/// The checker must not be the author. Of two concurrent decisions exactly
/// one is applied; the other fails with `AlreadyDecided`. Approval
/// invalidates the compiled regex before the active set is republished.
pub async fn decide(
    store: &dyn Store,
    registry: &PatternRegistry,
    id: Uuid,
    decision: Decision,
    actor: &Actor,
    note: Option<String>,
) -> Result<Pattern, AppError> {
    require(actor, PatternAction::Decide)?;

    let pattern = load(store, id).await?;
    if pattern.created_by == actor.id {
        return Err(AppError::Forbidden(
            "A checker cannot decide their own pattern".to_string(),
        ));
    }
    match pattern.status {
        PatternStatus::PendingApproval => {}
        PatternStatus::Draft => {
            return Err(AppError::InvalidTransition(
                "Pattern has not been submitted for approval".to_string(),
            ))
        }
        other => {
            return Err(AppError::AlreadyDecided(format!(
                "Pattern {id} is already {other:?}"
            )))
        }
    }

    let target = decision.target_status();
    let decided = store
        .compare_and_set_status(&StatusChange {
            pattern_id: id,
            expected: PatternStatus::PendingApproval,
            expected_version: Some(pattern.version),
            new_status: target,
            actor_id: actor.id,
            record_decision: true,
            superseded_by: None,
            note,
        })
        .await?
        .ok_or_else(|| AppError::AlreadyDecided(format!("Pattern {id} was decided concurrently")))?;

    tracing::info!(pattern_id = %id, status = ?target, checker = %actor.username, "Pattern decided");

    if target == PatternStatus::Active {
        if let Err(e) = registry.publish_change(id).await {
            tracing::error!(pattern_id = %id, error = %e, "Approved pattern not yet published; refresher will retry");
        }
    }
    Ok(decided)
}

/// ACTIVE → DEPRECATED, optionally pointing at the replacement pattern.
pub async fn deprecate(
    store: &dyn Store,
    registry: &PatternRegistry,
    id: Uuid,
    actor: &Actor,
    request: DeprecateRequest,
) -> Result<Pattern, AppError> {
    require(actor, PatternAction::Deprecate)?;

    let pattern = load(store, id).await?;
    if !is_valid_transition(pattern.status, PatternStatus::Deprecated) {
        return Err(AppError::InvalidTransition(format!(
            "Only active patterns can be deprecated; pattern is {:?}",
            pattern.status
        )));
    }
    if let Some(successor) = request.superseded_by {
        if successor == id {
            return Err(AppError::Validation(
                "A pattern cannot supersede itself".to_string(),
            ));
        }
        load(store, successor).await?;
    }

    let deprecated = store
        .compare_and_set_status(&StatusChange {
            pattern_id: id,
            expected: PatternStatus::Active,
            expected_version: Some(pattern.version),
            new_status: PatternStatus::Deprecated,
            actor_id: actor.id,
            record_decision: false,
            superseded_by: request.superseded_by,
            note: request.note,
        })
        .await?
        .ok_or_else(|| {
            AppError::InvalidTransition(format!("Pattern {id} changed concurrently; reload and retry"))
        })?;

    registry.publish_change(id).await?;
    tracing::info!(pattern_id = %id, superseded_by = ?deprecated.superseded_by, "Pattern deprecated");
    Ok(deprecated)
}

pub async fn get(store: &dyn Store, id: Uuid) -> Result<Pattern, AppError> {
    load(store, id).await
}

pub async fn history(store: &dyn Store, id: Uuid) -> Result<Vec<PatternHistory>, AppError> {
    load(store, id).await?;
    store.history(id).await
}

pub async fn list_pending(store: &dyn Store) -> Result<Vec<Pattern>, AppError> {
    store.list_by_status(PatternStatus::PendingApproval).await
}

pub async fn list_active(store: &dyn Store) -> Result<Vec<Pattern>, AppError> {
    store.list_by_status(PatternStatus::Active).await
}

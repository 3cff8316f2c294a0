//! Caller roles and the capability table for registry actions.
//!
//! Role storage and session issuance live outside this service; the role
//! arrives as a JWT claim and is only interpreted here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// End user submitting their own SMS.
    User,
    /// Authors and edits pattern templates.
    Maker,
    /// Approves or rejects submitted templates.
    Checker,
    Admin,
}

/// Registry actions gated at the state-machine boundary.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatternAction {
    Author,
    Submit,
    Decide,
    Deprecate,
    TestMatch,
    ManageQueue,
    ManageAliases,
}

impl UserRole {
    /// Whether this role may perform the given registry action.
    ///
    /// Admins hold every capability except `Decide`.
    pub fn permits(&self, action: PatternAction) -> bool {
        use PatternAction::*;
        match self {
            UserRole::User => false,
            UserRole::Maker => matches!(
                action,
                Author | Submit | TestMatch | ManageQueue | ManageAliases
            ),
            UserRole::Checker => matches!(action, Decide | Deprecate | TestMatch),
            UserRole::Admin => !matches!(action, Decide),
        }
    }
}

/// Identity of the caller performing a registry or queue action.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: uuid::Uuid,
    pub username: String,
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_role_serialization() {
        let json = serde_json::to_string(&UserRole::Checker).unwrap();
        assert_eq!(json, "\"CHECKER\"");
        let role: UserRole = serde_json::from_str("\"MAKER\"").unwrap();
        assert_eq!(role, UserRole::Maker);
    }

    #[test]
    fn maker_cannot_decide() {
        assert!(UserRole::Maker.permits(PatternAction::Submit));
        assert!(!UserRole::Maker.permits(PatternAction::Decide));
    }

    #[test]
    fn only_checker_decides() {
        assert!(UserRole::Checker.permits(PatternAction::Decide));
        assert!(!UserRole::Admin.permits(PatternAction::Decide));
        assert!(!UserRole::User.permits(PatternAction::Decide));
    }

    #[test]
    fn everyone_but_plain_users_can_test_match() {
        for role in [UserRole::Maker, UserRole::Checker, UserRole::Admin] {
            assert!(role.permits(PatternAction::TestMatch), "{role:?}");
        }
        assert!(!UserRole::User.permits(PatternAction::TestMatch));
    }
}

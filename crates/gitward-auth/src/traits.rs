//! Collaborator interfaces the decision engine reads from.
//!
//! Implementations are expected to be backed by an externally cached store.
//! Cache invalidation is the implementation's concern.

use crate::actor::{ProjectId, User, UserId};
use crate::error::LookupError;
use crate::level::AccessLevel;
use crate::membership::MembershipSourceId;
use crate::protected_ref::{ProtectedRefRule, RefKind};

/// Source of membership rows.
pub trait MembershipSource: Send + Sync {
    /// Every membership row of `user_id` that reaches `project_id`.
    ///
    /// Includes direct project membership, membership of every ancestor group
    /// of the project's namespace, personal namespace ownership and shared
    /// group links (already capped at the link's maximum level).
    /// A user with no membership yields an empty list.
    fn direct_and_inherited_levels(
        &self,
        user_id: UserId,
        project_id: ProjectId,
    ) -> Result<Vec<(MembershipSourceId, AccessLevel)>, LookupError>;
}

/// Source of protected branch and tag rules.
pub trait ProtectedRefStore: Send + Sync {
    /// All rules of one kind defined on a project.
    fn rules_for(
        &self,
        project_id: ProjectId,
        kind: RefKind,
    ) -> Result<Vec<ProtectedRefRule>, LookupError>;
}

/// Source of user accounts, for checking the users behind deploy keys and
/// CI jobs.
pub trait UserSource: Send + Sync {
    /// Look up a user; `None` if the account does not exist.
    fn find_user(&self, user_id: UserId) -> Result<Option<User>, LookupError>;
}

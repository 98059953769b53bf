//! Ref-level authorization over a snapshot of protection rules.

use crate::actor::{AccessActor, DeployKeyId, ProjectId, UserId};
use crate::level::AccessLevel;
use crate::protected_ref::{AccessList, ProtectedRefRule, RefName};

/// The identity a ref rule is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefActor {
    /// No identity; only role floors could apply, and only at `NoAccess`.
    Anonymous,
    /// A user.
    User(UserId),
    /// A deploy key and whether it has write access to the project.
    DeployKey {
        /// Key ID.
        id: DeployKeyId,
        /// Write access to the project being checked.
        can_push: bool,
    },
}

impl RefActor {
    /// Derive the ref identity of an actor for one project.
    ///
    /// CI jobs and deploy tokens have no write identity and evaluate as
    /// anonymous.
    pub fn for_project(actor: &AccessActor, project_id: ProjectId) -> Self {
        match actor {
            AccessActor::User(user) => RefActor::User(user.id),
            AccessActor::DeployKey(key) => RefActor::DeployKey {
                id: key.id,
                can_push: key.can_push_to(project_id),
            },
            AccessActor::Anonymous | AccessActor::DeployToken(_) | AccessActor::CiBuild(_) => {
                RefActor::Anonymous
            }
        }
    }

    fn admitted_by(self, list: &AccessList, level: AccessLevel) -> bool {
        match self {
            RefActor::Anonymous => false,
            RefActor::User(id) => list.admits_user(id, level),
            RefActor::DeployKey { id, .. } => list.admits_deploy_key(id),
        }
    }

    fn unprotected_write(self, level: AccessLevel) -> bool {
        match self {
            RefActor::Anonymous => false,
            RefActor::User(_) => level.has(AccessLevel::Developer),
            RefActor::DeployKey { can_push, .. } => can_push,
        }
    }
}

/// Answers push, merge, create and delete questions for the refs of one
/// project.
///
/// Built from the rules read once at the start of a check, so every change of
/// a push is judged against the same rule set.
#[derive(Debug, Clone, Default)]
pub struct ProtectedRefPolicy {
    rules: Vec<ProtectedRefRule>,
}

impl ProtectedRefPolicy {
    /// Build a policy from a rule snapshot (branch and tag rules may be mixed).
    pub fn new(rules: Vec<ProtectedRefRule>) -> Self {
        Self { rules }
    }

    /// Number of rules in the snapshot.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the snapshot holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The most specific rule matching `ref_name`.
    pub fn matching_rule(&self, ref_name: &RefName) -> Option<&ProtectedRefRule> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(ref_name))
            .max_by_key(|rule| rule.specificity())
    }

    /// Whether any rule protects `ref_name`.
    pub fn is_protected(&self, ref_name: &RefName) -> bool {
        self.matching_rule(ref_name).is_some()
    }

    /// Whether the actor may push to the ref.
    pub fn can_push(&self, actor: RefActor, ref_name: &RefName, level: AccessLevel) -> bool {
        match self.matching_rule(ref_name) {
            Some(rule) => actor.admitted_by(&rule.push, level),
            None => actor.unprotected_write(level),
        }
    }

    /// Whether the actor may merge into the ref.
    pub fn can_merge(&self, actor: RefActor, ref_name: &RefName, level: AccessLevel) -> bool {
        match self.matching_rule(ref_name) {
            Some(rule) => actor.admitted_by(&rule.merge, level),
            None => matches!(actor, RefActor::User(_)) && level.has(AccessLevel::Developer),
        }
    }

    /// Whether the actor may create the ref.
    pub fn can_create(&self, actor: RefActor, ref_name: &RefName, level: AccessLevel) -> bool {
        match self.matching_rule(ref_name) {
            Some(rule) => match &rule.create {
                Some(list) => actor.admitted_by(list, level),
                None => actor.admitted_by(&rule.push, level) || actor.admitted_by(&rule.merge, level),
            },
            None => actor.unprotected_write(level),
        }
    }

    /// Whether the actor may delete the ref.
    ///
    /// Protocol restrictions on deleting protected refs are left to the caller.
    pub fn can_delete(&self, actor: RefActor, ref_name: &RefName, level: AccessLevel) -> bool {
        match self.matching_rule(ref_name) {
            Some(_) => matches!(actor, RefActor::User(_)) && level.has(AccessLevel::Maintainer),
            None => actor.unprotected_write(level),
        }
    }

    /// Whether a non-fast-forward push to the ref is permitted by its rule.
    pub fn allows_force_push(&self, ref_name: &RefName) -> bool {
        self.matching_rule(ref_name)
            .map_or(true, |rule| rule.allow_force_push)
    }
}

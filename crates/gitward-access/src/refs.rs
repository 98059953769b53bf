//! Per-change branch and tag authorization.

use crate::change::{Change, ChangeAction};
use crate::command::Protocol;
use crate::error::AccessError;
use crate::messages;
use gitward_auth::{AccessLevel, ProtectedRefPolicy, RefActor, RefName};

/// Judges the changes of one push against a rule snapshot.
#[derive(Debug)]
pub(crate) struct RefCheck<'a> {
    pub policy: &'a ProtectedRefPolicy,
    pub actor: RefActor,
    pub level: AccessLevel,
    pub can_admin_tag: bool,
    pub protocol: Protocol,
    pub default_branch: &'a str,
}

fn forbidden(message: &str) -> AccessError {
    AccessError::Forbidden(message.to_string())
}

impl RefCheck<'_> {
    /// Validate a single change.
    pub fn validate(&self, change: &Change) -> Result<(), AccessError> {
        let ref_name = change.ref_name();
        match &ref_name {
            RefName::Branch(name) => self.validate_branch(change, &ref_name, name),
            RefName::Tag(_) => self.validate_tag(change, &ref_name),
            RefName::Other(_) => self.validate_unprotected(change, &ref_name),
        }
    }

    fn validate_branch(&self, change: &Change, ref_name: &RefName, name: &str) -> Result<(), AccessError> {
        let action = change.action();

        if action == ChangeAction::Delete && name == self.default_branch {
            return Err(forbidden(messages::DELETE_DEFAULT_BRANCH));
        }

        if !self.policy.is_protected(ref_name) {
            return self.validate_unprotected(change, ref_name);
        }

        if change.forced && !self.policy.allows_force_push(ref_name) {
            return Err(forbidden(messages::FORCE_PUSH_PROTECTED_BRANCH));
        }

        match action {
            ChangeAction::Delete => {
                if !self.policy.can_delete(self.actor, ref_name, self.level) {
                    return Err(forbidden(messages::DELETE_PROTECTED_BRANCH));
                }
                if self.protocol != Protocol::Web {
                    return Err(forbidden(messages::DELETE_PROTECTED_BRANCH_NON_WEB));
                }
                Ok(())
            }
            ChangeAction::Create => {
                if !self.policy.can_create(self.actor, ref_name, self.level) {
                    return Err(forbidden(messages::CREATE_PROTECTED_BRANCH));
                }
                Ok(())
            }
            ChangeAction::Update => {
                if self.policy.can_push(self.actor, ref_name, self.level) {
                    return Ok(());
                }
                if change.via_merge_request {
                    if self.policy.can_merge(self.actor, ref_name, self.level) {
                        return Ok(());
                    }
                    return Err(forbidden(messages::MERGE_PROTECTED_BRANCH));
                }
                Err(forbidden(messages::PUSH_PROTECTED_BRANCH))
            }
        }
    }

    fn validate_tag(&self, change: &Change, ref_name: &RefName) -> Result<(), AccessError> {
        let action = change.action();

        if action != ChangeAction::Create && !self.can_admin_tag {
            return Err(forbidden(messages::CHANGE_EXISTING_TAGS));
        }

        if !self.policy.is_protected(ref_name) {
            return self.validate_unprotected(change, ref_name);
        }

        match action {
            ChangeAction::Update => Err(forbidden(messages::UPDATE_PROTECTED_TAG)),
            ChangeAction::Delete => {
                if self.protocol != Protocol::Web {
                    return Err(forbidden(messages::DELETE_PROTECTED_TAG_NON_WEB));
                }
                if !self.policy.can_delete(self.actor, ref_name, self.level) {
                    return Err(forbidden(messages::DELETE_PROTECTED_TAG));
                }
                Ok(())
            }
            ChangeAction::Create => {
                if !self.policy.can_create(self.actor, ref_name, self.level) {
                    return Err(forbidden(messages::CREATE_PROTECTED_TAG));
                }
                Ok(())
            }
        }
    }

    fn validate_unprotected(&self, change: &Change, ref_name: &RefName) -> Result<(), AccessError> {
        let allowed = match change.action() {
            ChangeAction::Create => self.policy.can_create(self.actor, ref_name, self.level),
            ChangeAction::Update => self.policy.can_push(self.actor, ref_name, self.level),
            ChangeAction::Delete => self.policy.can_delete(self.actor, ref_name, self.level),
        };
        if allowed {
            Ok(())
        } else {
            Err(forbidden(messages::PUSH_CODE))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::BLANK_SHA1;
    use gitward_auth::{AccessList, ProtectedRefRule};

    const OLD: &str = "6f6d7e7ed";
    const NEW: &str = "570e7b2ab";

    fn policy() -> ProtectedRefPolicy {
        ProtectedRefPolicy::new(vec![
            ProtectedRefRule::branch(1, 1, "main"),
            ProtectedRefRule::branch(2, 1, "feature")
                .merge_access(AccessList::role(AccessLevel::Developer)),
            ProtectedRefRule::tag(3, 1, "v*"),
        ])
    }

    fn check(policy: &ProtectedRefPolicy, level: AccessLevel, protocol: Protocol) -> RefCheck<'_> {
        RefCheck {
            policy,
            actor: RefActor::User(1),
            level,
            can_admin_tag: level.has(AccessLevel::Developer),
            protocol,
            default_branch: "main",
        }
    }

    fn message(result: Result<(), AccessError>) -> String {
        result.unwrap_err().message().to_string()
    }

    #[test]
    fn test_default_branch_cannot_be_deleted() {
        let p = policy();
        let c = check(&p, AccessLevel::Owner, Protocol::Web);
        let change = Change::new(NEW, BLANK_SHA1, "refs/heads/main");
        assert_eq!(message(c.validate(&change)), messages::DELETE_DEFAULT_BRANCH);
    }

    #[test]
    fn test_protected_branch_delete() {
        let p = policy();
        let delete = Change::new(NEW, BLANK_SHA1, "refs/heads/feature");

        let ssh = check(&p, AccessLevel::Maintainer, Protocol::Ssh);
        assert_eq!(message(ssh.validate(&delete)), messages::DELETE_PROTECTED_BRANCH_NON_WEB);

        let developer = check(&p, AccessLevel::Developer, Protocol::Web);
        assert_eq!(message(developer.validate(&delete)), messages::DELETE_PROTECTED_BRANCH);

        let web = check(&p, AccessLevel::Maintainer, Protocol::Web);
        assert!(web.validate(&delete).is_ok());
    }

    #[test]
    fn test_protected_branch_push_and_merge() {
        let p = policy();
        let developer = check(&p, AccessLevel::Developer, Protocol::Ssh);

        let push = Change::new(OLD, NEW, "refs/heads/feature");
        assert_eq!(message(developer.validate(&push)), messages::PUSH_PROTECTED_BRANCH);

        let merge = push.clone().via_merge_request();
        assert!(developer.validate(&merge).is_ok());

        let merge_main = Change::new(OLD, NEW, "refs/heads/main").via_merge_request();
        assert_eq!(message(developer.validate(&merge_main)), messages::MERGE_PROTECTED_BRANCH);

        let force = Change::new(OLD, NEW, "refs/heads/main").forced();
        let maintainer = check(&p, AccessLevel::Maintainer, Protocol::Ssh);
        assert_eq!(message(maintainer.validate(&force)), messages::FORCE_PUSH_PROTECTED_BRANCH);
    }

    #[test]
    fn test_protected_branch_create() {
        let p = ProtectedRefPolicy::new(vec![ProtectedRefRule::branch(1, 1, "release-*")]);
        let create = Change::new(BLANK_SHA1, NEW, "refs/heads/release-2");

        let developer = check(&p, AccessLevel::Developer, Protocol::Ssh);
        assert_eq!(message(developer.validate(&create)), messages::CREATE_PROTECTED_BRANCH);
        assert!(check(&p, AccessLevel::Maintainer, Protocol::Ssh).validate(&create).is_ok());
    }

    #[test]
    fn test_unprotected_refs() {
        let p = policy();
        let reporter = check(&p, AccessLevel::Reporter, Protocol::Ssh);
        let developer = check(&p, AccessLevel::Developer, Protocol::Ssh);

        let push = Change::new(OLD, NEW, "refs/heads/wow");
        assert_eq!(message(reporter.validate(&push)), messages::PUSH_CODE);
        assert!(developer.validate(&push).is_ok());
        assert!(developer.validate(&push.clone().forced()).is_ok());

        let note = Change::new(OLD, NEW, "refs/notes/commits");
        assert!(developer.validate(&note).is_ok());
    }

    #[test]
    fn test_tags() {
        let p = policy();
        let developer = check(&p, AccessLevel::Developer, Protocol::Ssh);
        let maintainer = check(&p, AccessLevel::Maintainer, Protocol::Ssh);
        let reporter = check(&p, AccessLevel::Reporter, Protocol::Ssh);

        let update = Change::new(OLD, NEW, "refs/tags/v1.0.0");
        assert_eq!(message(reporter.validate(&update)), messages::CHANGE_EXISTING_TAGS);
        assert_eq!(message(maintainer.validate(&update)), messages::UPDATE_PROTECTED_TAG);

        let create = Change::new(BLANK_SHA1, NEW, "refs/tags/v7.8.9");
        assert_eq!(message(developer.validate(&create)), messages::CREATE_PROTECTED_TAG);
        assert!(maintainer.validate(&create).is_ok());

        let delete = Change::new(NEW, BLANK_SHA1, "refs/tags/v1.0.0");
        assert_eq!(message(maintainer.validate(&delete)), messages::DELETE_PROTECTED_TAG_NON_WEB);
        let web_dev = check(&p, AccessLevel::Developer, Protocol::Web);
        assert_eq!(message(web_dev.validate(&delete)), messages::DELETE_PROTECTED_TAG);

        let plain = Change::new(OLD, NEW, "refs/tags/nightly");
        assert!(developer.validate(&plain).is_ok());
    }
}

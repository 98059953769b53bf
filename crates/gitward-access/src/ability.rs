//! Abilities and the minimum access level each one needs.

use gitward_auth::{AccessActor, AccessLevel, FeatureAccess, Project, Visibility};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Something an actor may be allowed to do on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    /// See that the project exists.
    ReadProject,
    /// Clone and fetch.
    DownloadCode,
    /// Push.
    PushCode,
    /// Create, move and delete tags.
    AdminTag,
    /// Delete protected branches and tags.
    DeleteProtectedRef,
    /// Upload LFS objects.
    UploadLfsObject,
    /// Download LFS objects.
    DownloadLfsObject,
    /// Clone and fetch the wiki repository.
    DownloadWikiCode,
    /// Push to the wiki repository.
    CreateWiki,
    /// Read design management files.
    ReadDesign,
    /// Write design management files.
    CreateDesign,
    /// Fetch with CI build credentials.
    BuildDownloadCode,
}

impl Ability {
    /// Minimum membership level granting the ability.
    ///
    /// `None` for abilities that are never granted through membership.
    pub const fn min_level(self) -> Option<AccessLevel> {
        match self {
            Ability::ReadProject | Ability::DownloadWikiCode | Ability::ReadDesign => {
                Some(AccessLevel::Guest)
            }
            Ability::DownloadCode | Ability::DownloadLfsObject => Some(AccessLevel::Reporter),
            Ability::PushCode
            | Ability::AdminTag
            | Ability::UploadLfsObject
            | Ability::CreateWiki
            | Ability::CreateDesign => Some(AccessLevel::Developer),
            Ability::DeleteProtectedRef => Some(AccessLevel::Maintainer),
            Ability::BuildDownloadCode => None,
        }
    }

    /// Snake-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Ability::ReadProject => "read_project",
            Ability::DownloadCode => "download_code",
            Ability::PushCode => "push_code",
            Ability::AdminTag => "admin_tag",
            Ability::DeleteProtectedRef => "delete_protected_ref",
            Ability::UploadLfsObject => "upload_lfs_object",
            Ability::DownloadLfsObject => "download_lfs_object",
            Ability::DownloadWikiCode => "download_wiki_code",
            Ability::CreateWiki => "create_wiki",
            Ability::ReadDesign => "read_design",
            Ability::CreateDesign => "create_design",
            Ability::BuildDownloadCode => "build_download_code",
        }
    }

    fn is_read(self) -> bool {
        matches!(
            self,
            Ability::ReadProject
                | Ability::DownloadCode
                | Ability::DownloadLfsObject
                | Ability::DownloadWikiCode
                | Ability::ReadDesign
        )
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abilities the credential itself carries, independent of membership.
///
/// A read-only token can never push, whatever the user's role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthenticationAbilities(BTreeSet<Ability>);

impl AuthenticationAbilities {
    /// Credentials that may fetch and push (SSH keys, passwords, full tokens).
    pub fn full() -> Self {
        Self::from_iter([Ability::DownloadCode, Ability::PushCode])
    }

    /// Credentials that may only fetch.
    pub fn read_only() -> Self {
        Self::from_iter([Ability::DownloadCode])
    }

    /// CI job token credentials.
    pub fn build() -> Self {
        Self::from_iter([Ability::BuildDownloadCode])
    }

    /// Credentials that grant nothing.
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Whether the credential carries the ability.
    pub fn allows(&self, ability: Ability) -> bool {
        self.0.contains(&ability)
    }

    /// CI build credentials that carry no user abilities.
    pub fn is_build_only(&self) -> bool {
        self.allows(Ability::BuildDownloadCode)
            && !self.allows(Ability::DownloadCode)
            && !self.allows(Ability::PushCode)
    }
}

impl Default for AuthenticationAbilities {
    fn default() -> Self {
        Self::full()
    }
}

impl FromIterator<Ability> for AuthenticationAbilities {
    fn from_iter<I: IntoIterator<Item = Ability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Answers ability questions for one actor on one project.
#[derive(Debug, Clone, Copy)]
pub struct Permissions<'a> {
    actor: &'a AccessActor,
    project: &'a Project,
    level: AccessLevel,
    member_level: AccessLevel,
}

impl<'a> Permissions<'a> {
    /// Combine a resolved membership level with actor and project facts.
    ///
    /// Administrators in admin mode act as owners, except for
    /// [`Ability::BuildDownloadCode`] which only real membership grants.
    pub fn new(
        actor: &'a AccessActor,
        project: &'a Project,
        member_level: AccessLevel,
        admin_mode: bool,
    ) -> Self {
        let level = match actor.user() {
            Some(user) if user.admin && admin_mode && user.is_active() => AccessLevel::Owner,
            _ => member_level,
        };
        Self {
            actor,
            project,
            level,
            member_level,
        }
    }

    /// Effective level after admin elevation.
    pub fn level(&self) -> AccessLevel {
        self.level
    }

    /// Whether the actor has the ability on the project.
    pub fn can(&self, ability: Ability) -> bool {
        match ability {
            Ability::ReadProject => self.readable(),
            Ability::DownloadCode | Ability::DownloadLfsObject => {
                self.feature_allows(self.project.repository_access, ability)
            }
            Ability::DownloadWikiCode => self.feature_allows(self.project.wiki_access, ability),
            Ability::ReadDesign => {
                self.project.design_management_enabled && self.readable()
            }
            Ability::CreateDesign => {
                self.project.design_management_enabled && self.by_level(ability)
            }
            Ability::CreateWiki => {
                self.project.wiki_access != FeatureAccess::Disabled && self.by_level(ability)
            }
            Ability::PushCode | Ability::UploadLfsObject => match self.actor {
                AccessActor::DeployKey(key) => key.can_push_to(self.project.id),
                _ => {
                    self.project.repository_access != FeatureAccess::Disabled
                        && self.by_level(ability)
                }
            },
            Ability::AdminTag | Ability::DeleteProtectedRef => self.by_level(ability),
            Ability::BuildDownloadCode => {
                let access = self.project.repository_access;
                if access == FeatureAccess::Disabled {
                    return false;
                }
                match self.actor {
                    AccessActor::CiBuild(job) => {
                        job.is_scoped_to(self.project.id) || self.public_feature(access)
                    }
                    AccessActor::User(_) => {
                        self.member_level.has(AccessLevel::Reporter) || self.public_feature(access)
                    }
                    _ => false,
                }
            }
        }
    }

    fn by_level(&self, ability: Ability) -> bool {
        ability
            .min_level()
            .is_some_and(|floor| self.level.has(floor))
    }

    fn readable(&self) -> bool {
        if self.by_level(Ability::ReadProject) {
            return true;
        }
        match self.actor {
            AccessActor::DeployKey(key) if key.has_access_to(self.project.id) => true,
            AccessActor::DeployToken(token) if token.has_access_to(self.project.id) => true,
            AccessActor::CiBuild(job) if job.is_scoped_to(self.project.id) => true,
            _ => self.visible_to_actor(),
        }
    }

    /// Whether project visibility alone admits the actor.
    fn visible_to_actor(&self) -> bool {
        match self.project.visibility {
            Visibility::Public => true,
            Visibility::Internal => self.actor.user().is_some_and(|user| !user.external),
            Visibility::Private => false,
        }
    }

    fn public_feature(&self, access: FeatureAccess) -> bool {
        access == FeatureAccess::Enabled && self.visible_to_actor()
    }

    /// Read abilities of a feature: members by level, deploy keys and tokens
    /// on their projects, everyone else through visibility when the feature
    /// is open.
    fn feature_allows(&self, access: FeatureAccess, ability: Ability) -> bool {
        debug_assert!(ability.is_read());
        if access == FeatureAccess::Disabled {
            return false;
        }
        if self.by_level(ability) {
            return true;
        }
        match self.actor {
            AccessActor::DeployKey(key) if key.has_access_to(self.project.id) => true,
            AccessActor::DeployToken(token) if token.has_access_to(self.project.id) => true,
            AccessActor::CiBuild(_) => false,
            _ => self.public_feature(access),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitward_auth::{CiJob, DeployKey, DeployToken, Namespace, User};

    fn project(visibility: Visibility) -> Project {
        Project::new(1, "api", Namespace::Group(1)).with_visibility(visibility)
    }

    fn user() -> AccessActor {
        AccessActor::User(User::new(1, "alice"))
    }

    #[test]
    fn test_min_level_table() {
        assert_eq!(Ability::ReadProject.min_level(), Some(AccessLevel::Guest));
        assert_eq!(Ability::DownloadCode.min_level(), Some(AccessLevel::Reporter));
        assert_eq!(Ability::PushCode.min_level(), Some(AccessLevel::Developer));
        assert_eq!(Ability::AdminTag.min_level(), Some(AccessLevel::Developer));
        assert_eq!(Ability::DeleteProtectedRef.min_level(), Some(AccessLevel::Maintainer));
        assert_eq!(Ability::BuildDownloadCode.min_level(), None);
    }

    #[test]
    fn test_private_project_by_level() {
        let project = project(Visibility::Private);
        let actor = user();

        let guest = Permissions::new(&actor, &project, AccessLevel::Guest, false);
        assert!(guest.can(Ability::ReadProject));
        assert!(!guest.can(Ability::DownloadCode));

        let reporter = Permissions::new(&actor, &project, AccessLevel::Reporter, false);
        assert!(reporter.can(Ability::DownloadCode));
        assert!(!reporter.can(Ability::PushCode));

        let developer = Permissions::new(&actor, &project, AccessLevel::Developer, false);
        assert!(developer.can(Ability::PushCode));
        assert!(!developer.can(Ability::DeleteProtectedRef));

        let outsider = Permissions::new(&actor, &project, AccessLevel::NoAccess, false);
        assert!(!outsider.can(Ability::ReadProject));
    }

    #[test]
    fn test_visibility_grants_reads() {
        let public = project(Visibility::Public);
        let anon = AccessActor::Anonymous;
        let perms = Permissions::new(&anon, &public, AccessLevel::NoAccess, false);
        assert!(perms.can(Ability::ReadProject));
        assert!(perms.can(Ability::DownloadCode));
        assert!(!perms.can(Ability::PushCode));

        let members_only = public.clone().with_repository_access(FeatureAccess::Private);
        let perms = Permissions::new(&anon, &members_only, AccessLevel::NoAccess, false);
        assert!(perms.can(Ability::ReadProject));
        assert!(!perms.can(Ability::DownloadCode));

        let internal = project(Visibility::Internal);
        let actor = user();
        assert!(Permissions::new(&actor, &internal, AccessLevel::NoAccess, false)
            .can(Ability::DownloadCode));
        assert!(!Permissions::new(&anon, &internal, AccessLevel::NoAccess, false)
            .can(Ability::ReadProject));

        let mut external = User::new(2, "ext");
        external.external = true;
        let external = AccessActor::User(external);
        assert!(!Permissions::new(&external, &internal, AccessLevel::NoAccess, false)
            .can(Ability::ReadProject));
    }

    #[test]
    fn test_admin_mode_acts_as_owner() {
        let project = project(Visibility::Private);
        let admin = AccessActor::User(User::new(9, "root").admin());

        let without = Permissions::new(&admin, &project, AccessLevel::NoAccess, false);
        assert!(!without.can(Ability::ReadProject));

        let with = Permissions::new(&admin, &project, AccessLevel::NoAccess, true);
        assert_eq!(with.level(), AccessLevel::Owner);
        assert!(with.can(Ability::DeleteProtectedRef));
    }

    #[test]
    fn test_deploy_key_abilities() {
        let project = project(Visibility::Private);
        let key = AccessActor::DeployKey(DeployKey::new(1, "deploy", None).with_project(1, false));
        let perms = Permissions::new(&key, &project, AccessLevel::NoAccess, false);
        assert!(perms.can(Ability::ReadProject));
        assert!(perms.can(Ability::DownloadCode));
        assert!(!perms.can(Ability::PushCode));

        let stranger = AccessActor::DeployKey(DeployKey::new(2, "other", None));
        let perms = Permissions::new(&stranger, &project, AccessLevel::NoAccess, false);
        assert!(!perms.can(Ability::ReadProject));
    }

    #[test]
    fn test_deploy_token_abilities() {
        let token = AccessActor::DeployToken(DeployToken::new(1, "registry").with_project(1));
        let private = project(Visibility::Private);
        let perms = Permissions::new(&token, &private, AccessLevel::NoAccess, false);
        assert!(perms.can(Ability::ReadProject));
        assert!(perms.can(Ability::DownloadCode));
        assert!(!perms.can(Ability::PushCode));

        let elsewhere = AccessActor::DeployToken(DeployToken::new(2, "other").with_project(7));
        for visibility in [Visibility::Private, Visibility::Internal] {
            let project = project(visibility);
            let perms = Permissions::new(&elsewhere, &project, AccessLevel::NoAccess, false);
            assert!(!perms.can(Ability::ReadProject), "{visibility:?}");
        }
        let public = project(Visibility::Public);
        assert!(Permissions::new(&elsewhere, &public, AccessLevel::NoAccess, false)
            .can(Ability::DownloadCode));
    }

    #[test]
    fn test_user_build_download_needs_membership() {
        let private = project(Visibility::Private);
        let actor = user();
        assert!(Permissions::new(&actor, &private, AccessLevel::Reporter, false)
            .can(Ability::BuildDownloadCode));
        assert!(!Permissions::new(&actor, &private, AccessLevel::Guest, false)
            .can(Ability::BuildDownloadCode));

        // Admin mode elevates reads but not build access.
        let admin = AccessActor::User(User::new(9, "root").admin());
        let perms = Permissions::new(&admin, &private, AccessLevel::NoAccess, true);
        assert!(perms.can(Ability::DownloadCode));
        assert!(!perms.can(Ability::BuildDownloadCode));
        assert!(Permissions::new(&admin, &private, AccessLevel::Reporter, true)
            .can(Ability::BuildDownloadCode));

        let public = project(Visibility::Public);
        assert!(Permissions::new(&actor, &public, AccessLevel::NoAccess, false)
            .can(Ability::BuildDownloadCode));
    }

    #[test]
    fn test_build_download_code() {
        let private = project(Visibility::Private);
        let job = AccessActor::CiBuild(CiJob::new(1, 1, "main"));
        let perms = Permissions::new(&job, &private, AccessLevel::NoAccess, false);
        assert!(perms.can(Ability::BuildDownloadCode));
        assert!(!perms.can(Ability::DownloadCode));

        let other = AccessActor::CiBuild(CiJob::new(2, 77, "main"));
        assert!(!Permissions::new(&other, &private, AccessLevel::NoAccess, false)
            .can(Ability::BuildDownloadCode));

        let public = project(Visibility::Public);
        assert!(Permissions::new(&other, &public, AccessLevel::NoAccess, false)
            .can(Ability::BuildDownloadCode));
    }

    #[test]
    fn test_authentication_abilities() {
        assert!(AuthenticationAbilities::full().allows(Ability::PushCode));
        assert!(!AuthenticationAbilities::read_only().allows(Ability::PushCode));
        assert!(AuthenticationAbilities::build().allows(Ability::BuildDownloadCode));
        assert!(!AuthenticationAbilities::none().allows(Ability::DownloadCode));

        assert!(AuthenticationAbilities::build().is_build_only());
        assert!(!AuthenticationAbilities::full().is_build_only());
        let mixed = AuthenticationAbilities::from_iter([Ability::BuildDownloadCode, Ability::DownloadCode]);
        assert!(!mixed.is_build_only());
    }
}

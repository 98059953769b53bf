//! In-memory authorization store.

use crate::{
    actor::{
        CiJob, DeployKey, DeployKeyId, DeployToken, DeployTokenId, GroupId, JobId, ProjectId, User,
        UserId,
    },
    error::{AuthError, LookupError, Result},
    level::AccessLevel,
    membership::{GroupLink, Member, MemberSource, MembershipSourceId, ProjectAuthorization},
    namespace::{ancestor_chain, full_group_path, Group, Namespace},
    project::Project,
    protected_ref::{ProtectedRefRule, RefKind},
    traits::{MembershipSource, ProtectedRefStore, UserSource},
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe in-memory store for authorization data.
///
/// Serves as the reference [`MembershipSource`] and [`ProtectedRefStore`].
#[derive(Debug, Default)]
pub struct AuthStore {
    /// Next available ID for generated rules.
    next_id: AtomicU64,

    /// Users by ID.
    users: RwLock<HashMap<UserId, User>>,

    /// Groups by ID.
    groups: RwLock<HashMap<GroupId, Group>>,

    /// Projects by ID.
    projects: RwLock<HashMap<ProjectId, Project>>,

    /// Member rows indexed by user.
    members: RwLock<HashMap<UserId, Vec<Member>>>,

    /// Group links indexed by shared project.
    group_links: RwLock<HashMap<ProjectId, Vec<GroupLink>>>,

    /// Deploy keys by ID.
    deploy_keys: RwLock<HashMap<DeployKeyId, DeployKey>>,

    /// Deploy tokens by ID.
    deploy_tokens: RwLock<HashMap<DeployTokenId, DeployToken>>,

    /// CI jobs by ID.
    jobs: RwLock<HashMap<JobId, CiJob>>,

    /// Protected ref rules by ID.
    rules: RwLock<HashMap<u64, ProtectedRefRule>>,

    /// Old full path -> project ID, for renamed or transferred projects.
    redirects: RwLock<HashMap<String, ProjectId>>,
}

impl AuthStore {
    /// Create a new empty auth store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a new unique ID.
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Keep generated IDs clear of an explicitly assigned one.
    fn reserve_id(&self, id: u64) {
        self.next_id.fetch_max(id, Ordering::SeqCst);
    }

    // ==================== Users ====================

    /// Add a user.
    pub fn add_user(&self, user: User) -> Result<()> {
        let mut users = self.users.write();
        if users.contains_key(&user.id) {
            return Err(AuthError::AlreadyExists(format!("user {}", user.id)));
        }
        users.insert(user.id, user);
        Ok(())
    }

    /// Get a user by ID.
    pub fn get_user(&self, id: UserId) -> Option<User> {
        self.users.read().get(&id).cloned()
    }

    /// Get a user by username.
    pub fn find_user_by_username(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .values()
            .find(|user| user.username == username)
            .cloned()
    }

    // ==================== Groups ====================

    /// Add a group. The parent, if any, must already exist.
    pub fn add_group(&self, group: Group) -> Result<()> {
        let mut groups = self.groups.write();
        if groups.contains_key(&group.id) {
            return Err(AuthError::AlreadyExists(format!("group {}", group.id)));
        }
        if let Some(parent) = group.parent_id {
            if !groups.contains_key(&parent) {
                return Err(AuthError::InvalidInput(format!(
                    "parent group {} of group {} does not exist",
                    parent, group.id
                )));
            }
        }
        groups.insert(group.id, group);
        Ok(())
    }

    /// Get a group by ID.
    pub fn get_group(&self, id: GroupId) -> Option<Group> {
        self.groups.read().get(&id).cloned()
    }

    /// Full path of a group (e.g. "acme/platform").
    pub fn group_full_path(&self, id: GroupId) -> Option<String> {
        full_group_path(&self.groups.read(), id)
    }

    // ==================== Projects ====================

    /// Add a project. Its namespace must already exist.
    pub fn add_project(&self, project: Project) -> Result<()> {
        match project.namespace {
            Namespace::Group(id) if !self.groups.read().contains_key(&id) => {
                return Err(AuthError::InvalidInput(format!(
                    "namespace group {} of project {} does not exist",
                    id, project.id
                )));
            }
            Namespace::User(id) if !self.users.read().contains_key(&id) => {
                return Err(AuthError::InvalidInput(format!(
                    "namespace user {} of project {} does not exist",
                    id, project.id
                )));
            }
            _ => {}
        }

        let mut projects = self.projects.write();
        if projects.contains_key(&project.id) {
            return Err(AuthError::AlreadyExists(format!("project {}", project.id)));
        }
        projects.insert(project.id, project);
        Ok(())
    }

    /// Get a project by ID.
    pub fn get_project(&self, id: ProjectId) -> Option<Project> {
        self.projects.read().get(&id).cloned()
    }

    /// List all projects.
    pub fn list_projects(&self) -> Vec<Project> {
        let mut projects: Vec<Project> = self.projects.read().values().cloned().collect();
        projects.sort_by_key(|p| p.id);
        projects
    }

    /// Full path of a project (e.g. "acme/platform/api").
    pub fn full_path(&self, project: &Project) -> String {
        let namespace = match project.namespace {
            Namespace::Group(id) => self.group_full_path(id),
            Namespace::User(id) => self.get_user(id).map(|user| user.username),
        };
        match namespace {
            Some(namespace) => format!("{}/{}", namespace, project.path),
            None => project.path.clone(),
        }
    }

    /// Find a project by its current full path.
    pub fn find_project_by_path(&self, full_path: &str) -> Option<Project> {
        self.list_projects()
            .into_iter()
            .find(|project| self.full_path(project) == full_path)
    }

    /// Record that `old_path` now points to `project_id`.
    pub fn add_redirect(&self, old_path: impl Into<String>, project_id: ProjectId) -> Result<()> {
        if !self.projects.read().contains_key(&project_id) {
            return Err(AuthError::NotFound(format!("project {}", project_id)));
        }
        self.redirects.write().insert(old_path.into(), project_id);
        Ok(())
    }

    /// Resolve a path that may have been redirected.
    ///
    /// Returns the project and whether the path was a redirect.
    pub fn resolve_path(&self, full_path: &str) -> Option<(Project, bool)> {
        if let Some(project) = self.find_project_by_path(full_path) {
            return Some((project, false));
        }
        let id = self.redirects.read().get(full_path).copied()?;
        self.get_project(id).map(|project| (project, true))
    }

    // ==================== Members ====================

    /// Add or replace a membership row.
    pub fn set_member(&self, member: Member) -> Result<()> {
        match member.source {
            MemberSource::Project(id) if !self.projects.read().contains_key(&id) => {
                return Err(AuthError::NotFound(format!("project {}", id)));
            }
            MemberSource::Group(id) if !self.groups.read().contains_key(&id) => {
                return Err(AuthError::NotFound(format!("group {}", id)));
            }
            _ => {}
        }

        let mut members = self.members.write();
        let rows = members.entry(member.user_id).or_default();
        match rows.iter_mut().find(|row| row.source == member.source) {
            Some(existing) => existing.level = member.level,
            None => rows.push(member),
        }
        Ok(())
    }

    /// Remove a membership row.
    pub fn remove_member(&self, user_id: UserId, source: MemberSource) -> Result<()> {
        let mut members = self.members.write();
        let rows = members
            .get_mut(&user_id)
            .ok_or_else(|| AuthError::NotFound(format!("member {}", user_id)))?;

        let before = rows.len();
        rows.retain(|row| row.source != source);
        if rows.len() == before {
            return Err(AuthError::NotFound(format!("member {}", user_id)));
        }
        Ok(())
    }

    /// Share a project with a group.
    pub fn share_project(&self, link: GroupLink) -> Result<()> {
        if !self.projects.read().contains_key(&link.project_id) {
            return Err(AuthError::NotFound(format!("project {}", link.project_id)));
        }
        if !self.groups.read().contains_key(&link.group_id) {
            return Err(AuthError::NotFound(format!("group {}", link.group_id)));
        }

        let mut links = self.group_links.write();
        let entries = links.entry(link.project_id).or_default();
        entries.retain(|existing| existing.group_id != link.group_id);
        entries.push(link);
        Ok(())
    }

    // ==================== Deploy keys, tokens and jobs ====================

    /// Add a deploy key.
    pub fn add_deploy_key(&self, key: DeployKey) -> Result<()> {
        let mut keys = self.deploy_keys.write();
        if keys.contains_key(&key.id) {
            return Err(AuthError::AlreadyExists(format!("deploy key {}", key.id)));
        }
        keys.insert(key.id, key);
        Ok(())
    }

    /// Get a deploy key by ID.
    pub fn get_deploy_key(&self, id: DeployKeyId) -> Option<DeployKey> {
        self.deploy_keys.read().get(&id).cloned()
    }

    /// Add a deploy token.
    pub fn add_deploy_token(&self, token: DeployToken) -> Result<()> {
        let mut tokens = self.deploy_tokens.write();
        if tokens.contains_key(&token.id) {
            return Err(AuthError::AlreadyExists(format!("deploy token {}", token.id)));
        }
        tokens.insert(token.id, token);
        Ok(())
    }

    /// Get a deploy token by ID.
    pub fn get_deploy_token(&self, id: DeployTokenId) -> Option<DeployToken> {
        self.deploy_tokens.read().get(&id).cloned()
    }

    /// Add a CI job.
    pub fn add_job(&self, job: CiJob) -> Result<()> {
        let mut jobs = self.jobs.write();
        if jobs.contains_key(&job.id) {
            return Err(AuthError::AlreadyExists(format!("job {}", job.id)));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    /// Get a CI job by ID.
    pub fn get_job(&self, id: JobId) -> Option<CiJob> {
        self.jobs.read().get(&id).cloned()
    }

    // ==================== Protected refs ====================

    /// Protect refs matching `pattern` with default (maintainer) access.
    pub fn protect_ref(
        &self,
        project_id: ProjectId,
        kind: RefKind,
        pattern: impl Into<String>,
    ) -> Result<ProtectedRefRule> {
        if !self.projects.read().contains_key(&project_id) {
            return Err(AuthError::NotFound(format!("project {}", project_id)));
        }
        let id = self.next_id();
        let rule = match kind {
            RefKind::Branch => ProtectedRefRule::branch(id, project_id, pattern),
            RefKind::Tag => ProtectedRefRule::tag(id, project_id, pattern),
        };
        self.rules.write().insert(id, rule.clone());
        Ok(rule)
    }

    /// Insert a fully specified rule, keeping its ID.
    pub fn insert_rule(&self, rule: ProtectedRefRule) -> Result<()> {
        if !self.projects.read().contains_key(&rule.project_id) {
            return Err(AuthError::NotFound(format!("project {}", rule.project_id)));
        }
        if rule.pattern.is_empty() {
            return Err(AuthError::InvalidInput(format!("rule {} has an empty pattern", rule.id)));
        }

        let mut rules = self.rules.write();
        if rules.contains_key(&rule.id) {
            return Err(AuthError::AlreadyExists(format!("rule {}", rule.id)));
        }
        self.reserve_id(rule.id);
        rules.insert(rule.id, rule);
        Ok(())
    }

    /// Update a rule in place.
    pub fn update_rule(
        &self,
        id: u64,
        update: impl FnOnce(&mut ProtectedRefRule),
    ) -> Result<ProtectedRefRule> {
        let mut rules = self.rules.write();
        let rule = rules
            .get_mut(&id)
            .ok_or_else(|| AuthError::NotFound(format!("rule {}", id)))?;
        update(rule);
        Ok(rule.clone())
    }

    /// Remove a rule.
    pub fn remove_rule(&self, id: u64) -> Result<()> {
        self.rules
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AuthError::NotFound(format!("rule {}", id)))
    }

    /// All rules of a project, ordered by ID.
    pub fn list_rules(&self, project_id: ProjectId) -> Vec<ProtectedRefRule> {
        let mut rules: Vec<ProtectedRefRule> = self
            .rules
            .read()
            .values()
            .filter(|rule| rule.project_id == project_id)
            .cloned()
            .collect();
        rules.sort_by_key(|rule| rule.id);
        rules
    }

    // ==================== Authorization ====================

    /// Every membership row of a user reaching a project.
    fn membership_rows(
        &self,
        user_id: UserId,
        project_id: ProjectId,
    ) -> Vec<(MembershipSourceId, AccessLevel)> {
        let Some(namespace) = self.projects.read().get(&project_id).map(|p| p.namespace) else {
            return Vec::new();
        };

        let members = self.members.read();
        let rows = members.get(&user_id).map(Vec::as_slice).unwrap_or_default();
        let groups = self.groups.read();

        let group_level = |group_id: GroupId| {
            rows.iter()
                .find(|row| row.source == MemberSource::Group(group_id))
                .map(|row| row.level)
        };

        let mut levels = Vec::new();

        for row in rows {
            if row.source == MemberSource::Project(project_id) {
                levels.push((MembershipSourceId::Project(project_id), row.level));
            }
        }

        match namespace {
            Namespace::Group(group_id) => {
                for ancestor in ancestor_chain(&groups, group_id) {
                    if let Some(level) = group_level(ancestor) {
                        levels.push((MembershipSourceId::Group(ancestor), level));
                    }
                }
            }
            Namespace::User(owner) if owner == user_id => {
                levels.push((MembershipSourceId::PersonalNamespace(owner), AccessLevel::Owner));
            }
            Namespace::User(_) => {}
        }

        if let Some(links) = self.group_links.read().get(&project_id) {
            for link in links {
                let best = ancestor_chain(&groups, link.group_id)
                    .into_iter()
                    .filter_map(group_level)
                    .max();
                if let Some(level) = best {
                    levels.push((
                        MembershipSourceId::SharedGroup(link.group_id),
                        level.min(link.max_level),
                    ));
                }
            }
        }

        levels
    }

    /// Effective authorizations of a user over every project they reach.
    pub fn project_authorizations(&self, user_id: UserId) -> Vec<ProjectAuthorization> {
        if !self.get_user(user_id).is_some_and(|user| user.is_active()) {
            return Vec::new();
        }

        self.list_projects()
            .into_iter()
            .filter_map(|project| {
                let access_level = self
                    .membership_rows(user_id, project.id)
                    .into_iter()
                    .map(|(_, level)| level)
                    .max()?;
                (access_level > AccessLevel::NoAccess).then_some(ProjectAuthorization {
                    user_id,
                    project_id: project.id,
                    access_level,
                })
            })
            .collect()
    }
}

impl MembershipSource for AuthStore {
    fn direct_and_inherited_levels(
        &self,
        user_id: UserId,
        project_id: ProjectId,
    ) -> std::result::Result<Vec<(MembershipSourceId, AccessLevel)>, LookupError> {
        Ok(self.membership_rows(user_id, project_id))
    }
}

impl UserSource for AuthStore {
    fn find_user(&self, user_id: UserId) -> std::result::Result<Option<User>, LookupError> {
        Ok(self.get_user(user_id))
    }
}

impl ProtectedRefStore for AuthStore {
    fn rules_for(
        &self,
        project_id: ProjectId,
        kind: RefKind,
    ) -> std::result::Result<Vec<ProtectedRefRule>, LookupError> {
        Ok(self
            .list_rules(project_id)
            .into_iter()
            .filter(|rule| rule.kind == kind)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protected_ref::AccessList;

    fn store_with_tree() -> AuthStore {
        let store = AuthStore::new();
        store.add_user(User::new(1, "alice")).unwrap();
        store.add_user(User::new(2, "bob")).unwrap();
        store.add_group(Group::new(1, "acme")).unwrap();
        store.add_group(Group::child_of(2, "platform", 1)).unwrap();
        store.add_group(Group::child_of(3, "backend", 2)).unwrap();
        store
            .add_project(Project::new(10, "api", Namespace::Group(3)))
            .unwrap();
        store
    }

    #[test]
    fn test_user_and_group_crud() {
        let store = store_with_tree();

        assert!(store.add_user(User::new(1, "again")).is_err());
        assert_eq!(store.find_user_by_username("bob").map(|u| u.id), Some(2));
        assert_eq!(store.group_full_path(3).as_deref(), Some("acme/platform/backend"));

        let orphan = store.add_group(Group::child_of(9, "orphan", 99));
        assert!(matches!(orphan, Err(AuthError::InvalidInput(_))));
    }

    #[test]
    fn test_deploy_tokens() {
        let store = store_with_tree();
        store
            .add_deploy_token(DeployToken::new(4, "registry").with_project(10))
            .unwrap();

        assert!(store.get_deploy_token(4).is_some_and(|t| t.has_access_to(10)));
        assert!(store.get_deploy_token(5).is_none());
        assert!(matches!(
            store.add_deploy_token(DeployToken::new(4, "again")),
            Err(AuthError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_project_paths_and_redirects() {
        let store = store_with_tree();
        store
            .add_project(Project::new(11, "dotfiles", Namespace::User(1)))
            .unwrap();

        let api = store.get_project(10).unwrap();
        assert_eq!(store.full_path(&api), "acme/platform/backend/api");
        assert_eq!(
            store.find_project_by_path("alice/dotfiles").map(|p| p.id),
            Some(11)
        );

        store.add_redirect("acme/old-api", 10).unwrap();
        let (project, redirected) = store.resolve_path("acme/old-api").unwrap();
        assert_eq!(project.id, 10);
        assert!(redirected);

        let (_, redirected) = store.resolve_path("acme/platform/backend/api").unwrap();
        assert!(!redirected);
        assert!(store.resolve_path("nope/nope").is_none());

        let bad = store.add_project(Project::new(12, "x", Namespace::Group(77)));
        assert!(matches!(bad, Err(AuthError::InvalidInput(_))));
    }

    #[test]
    fn test_inherited_membership_rows() {
        let store = store_with_tree();
        store.set_member(Member::group(1, 1, AccessLevel::Developer)).unwrap();
        store.set_member(Member::group(1, 3, AccessLevel::Maintainer)).unwrap();
        store.set_member(Member::project(1, 10, AccessLevel::Reporter)).unwrap();

        let rows = store.direct_and_inherited_levels(1, 10).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.contains(&(MembershipSourceId::Group(3), AccessLevel::Maintainer)));
        assert!(rows.contains(&(MembershipSourceId::Group(1), AccessLevel::Developer)));
        assert!(rows.contains(&(MembershipSourceId::Project(10), AccessLevel::Reporter)));

        assert!(store.direct_and_inherited_levels(2, 10).unwrap().is_empty());
        assert!(store.direct_and_inherited_levels(1, 999).unwrap().is_empty());
    }

    #[test]
    fn test_set_member_replaces_level() {
        let store = store_with_tree();
        store.set_member(Member::project(2, 10, AccessLevel::Guest)).unwrap();
        store.set_member(Member::project(2, 10, AccessLevel::Developer)).unwrap();

        let rows = store.direct_and_inherited_levels(2, 10).unwrap();
        assert_eq!(rows, vec![(MembershipSourceId::Project(10), AccessLevel::Developer)]);

        store.remove_member(2, MemberSource::Project(10)).unwrap();
        assert!(store.direct_and_inherited_levels(2, 10).unwrap().is_empty());
        assert!(store.remove_member(2, MemberSource::Project(10)).is_err());
    }

    #[test]
    fn test_personal_namespace_owner() {
        let store = store_with_tree();
        store
            .add_project(Project::new(11, "dotfiles", Namespace::User(1)))
            .unwrap();

        let rows = store.direct_and_inherited_levels(1, 11).unwrap();
        assert_eq!(
            rows,
            vec![(MembershipSourceId::PersonalNamespace(1), AccessLevel::Owner)]
        );
        assert!(store.direct_and_inherited_levels(2, 11).unwrap().is_empty());
    }

    #[test]
    fn test_shared_group_is_capped() {
        let store = store_with_tree();
        store.add_group(Group::new(20, "partners")).unwrap();
        store.add_group(Group::child_of(21, "contractors", 20)).unwrap();
        store.set_member(Member::group(2, 20, AccessLevel::Owner)).unwrap();
        store
            .share_project(GroupLink {
                project_id: 10,
                group_id: 21,
                max_level: AccessLevel::Developer,
            })
            .unwrap();

        let rows = store.direct_and_inherited_levels(2, 10).unwrap();
        assert_eq!(
            rows,
            vec![(MembershipSourceId::SharedGroup(21), AccessLevel::Developer)]
        );
    }

    #[test]
    fn test_rules() {
        let store = store_with_tree();
        let main = store.protect_ref(10, RefKind::Branch, "main").unwrap();
        store
            .insert_rule(ProtectedRefRule::tag(50, 10, "v*"))
            .unwrap();
        let next = store.protect_ref(10, RefKind::Branch, "release-*").unwrap();
        assert!(next.id > 50);

        assert!(store.insert_rule(ProtectedRefRule::tag(50, 10, "x")).is_err());
        assert!(store.protect_ref(999, RefKind::Branch, "main").is_err());

        let branches = store.rules_for(10, RefKind::Branch).unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(store.rules_for(10, RefKind::Tag).unwrap().len(), 1);

        let updated = store
            .update_rule(main.id, |rule| rule.push = AccessList::no_one())
            .unwrap();
        assert!(updated.push.is_no_one());

        store.remove_rule(main.id).unwrap();
        assert_eq!(store.list_rules(10).len(), 2);
        assert!(store.remove_rule(main.id).is_err());
    }

    #[test]
    fn test_project_authorizations() {
        let store = store_with_tree();
        store
            .add_project(Project::new(11, "web", Namespace::Group(1)))
            .unwrap();
        store.set_member(Member::group(1, 1, AccessLevel::Reporter)).unwrap();
        store.set_member(Member::project(1, 10, AccessLevel::Maintainer)).unwrap();

        let auths = store.project_authorizations(1);
        assert_eq!(auths.len(), 2);
        assert_eq!(auths[0].project_id, 10);
        assert_eq!(auths[0].access_level, AccessLevel::Maintainer);
        assert_eq!(auths[1].access_level, AccessLevel::Reporter);

        assert!(store.project_authorizations(2).is_empty());
        assert!(store.project_authorizations(404).is_empty());
    }
}

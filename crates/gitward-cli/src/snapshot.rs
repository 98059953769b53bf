//! YAML snapshots of authorization data.
//!
//! A snapshot stands in for the databases a Git gateway would query: users,
//! the group tree, projects, memberships, deploy keys and tokens, CI jobs,
//! protected ref rules, redirects and repository sizes.

use gitward_access::MemoryQuota;
use gitward_auth::{
    AuthError, AuthStore, CiJob, DeployKey, DeployToken, Group, GroupId, GroupLink, Member,
    Project, ProjectId, ProtectedRefRule, User,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors loading a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse snapshot: {0}")]
    Parse(String),

    #[error("invalid snapshot: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] AuthError),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

/// An old project path that now leads to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectEntry {
    pub from: String,
    pub project_id: ProjectId,
}

/// Current size and optional limit of one repository, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUsage {
    pub project_id: ProjectId,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Repository size settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSnapshot {
    pub default_limit: Option<u64>,
    pub projects: Vec<ProjectUsage>,
}

/// Everything a check needs to know, as one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    pub projects: Vec<Project>,
    pub members: Vec<Member>,
    pub group_links: Vec<GroupLink>,
    pub deploy_keys: Vec<DeployKey>,
    pub deploy_tokens: Vec<DeployToken>,
    pub jobs: Vec<CiJob>,
    pub rules: Vec<ProtectedRefRule>,
    pub redirects: Vec<RedirectEntry>,
    pub quota: QuotaSnapshot,
}

/// A snapshot loaded into the in-memory collaborators.
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub store: Arc<AuthStore>,
    pub quota: Arc<MemoryQuota>,
}

fn duplicates<T: std::fmt::Display>(what: &str, ids: impl IntoIterator<Item = T>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id.to_string()) {
            return Err(SnapshotError::Invalid(format!("duplicate {what}: {id}")));
        }
    }
    Ok(())
}

impl Snapshot {
    /// Loads a snapshot from a YAML file.
    pub fn load_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Parses a snapshot from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let snapshot: Snapshot =
            serde_yaml::from_str(content).map_err(|e| SnapshotError::Parse(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Validates identifiers and references.
    pub fn validate(&self) -> Result<()> {
        duplicates("user id", self.users.iter().map(|u| u.id))?;
        duplicates("username", self.users.iter().map(|u| u.username.as_str()))?;
        duplicates("group id", self.groups.iter().map(|g| g.id))?;
        duplicates("project id", self.projects.iter().map(|p| p.id))?;
        duplicates("deploy key id", self.deploy_keys.iter().map(|k| k.id))?;
        duplicates("deploy token id", self.deploy_tokens.iter().map(|t| t.id))?;
        duplicates("job id", self.jobs.iter().map(|j| j.id))?;
        duplicates("rule id", self.rules.iter().map(|r| r.id))?;

        let groups: HashSet<GroupId> = self.groups.iter().map(|g| g.id).collect();
        for group in &self.groups {
            if let Some(parent) = group.parent_id {
                if !groups.contains(&parent) {
                    return Err(SnapshotError::Invalid(format!(
                        "group {} has unknown parent {}",
                        group.id, parent
                    )));
                }
            }
        }

        let projects: HashSet<ProjectId> = self.projects.iter().map(|p| p.id).collect();
        for job in &self.jobs {
            if !projects.contains(&job.project_id) {
                return Err(SnapshotError::Invalid(format!(
                    "job {} runs in unknown project {}",
                    job.id, job.project_id
                )));
            }
        }

        Ok(())
    }

    /// Builds the in-memory store and quota from the snapshot.
    pub fn into_store(self) -> Result<LoadedSnapshot> {
        self.validate()?;
        let store = Arc::new(AuthStore::new());

        for user in self.users {
            store.add_user(user)?;
        }
        insert_groups(&store, self.groups)?;
        for project in self.projects {
            store.add_project(project)?;
        }
        for member in self.members {
            store.set_member(member)?;
        }
        for link in self.group_links {
            store.share_project(link)?;
        }
        for key in self.deploy_keys {
            store.add_deploy_key(key)?;
        }
        for token in self.deploy_tokens {
            store.add_deploy_token(token)?;
        }
        for job in self.jobs {
            store.add_job(job)?;
        }
        for rule in self.rules {
            store.insert_rule(rule)?;
        }
        for redirect in self.redirects {
            store.add_redirect(redirect.from, redirect.project_id)?;
        }

        let quota = Arc::new(MemoryQuota::new(self.quota.default_limit));
        for usage in self.quota.projects {
            quota.set_size(usage.project_id, usage.size);
            if let Some(limit) = usage.limit {
                quota.set_limit(usage.project_id, limit);
            }
        }

        tracing::debug!(projects = store.list_projects().len(), "snapshot loaded");
        Ok(LoadedSnapshot { store, quota })
    }
}

/// Insert groups parents first, whatever their order in the document.
fn insert_groups(store: &AuthStore, groups: Vec<Group>) -> Result<()> {
    let mut pending: HashMap<GroupId, Group> = groups.into_iter().map(|g| (g.id, g)).collect();

    while !pending.is_empty() {
        let ready: Vec<GroupId> = pending
            .values()
            .filter(|g| match g.parent_id {
                Some(parent) => store.get_group(parent).is_some(),
                None => true,
            })
            .map(|g| g.id)
            .collect();

        if ready.is_empty() {
            let mut stuck: Vec<GroupId> = pending.keys().copied().collect();
            stuck.sort_unstable();
            return Err(SnapshotError::Invalid(format!(
                "group hierarchy contains a cycle through {stuck:?}"
            )));
        }

        for id in ready {
            if let Some(group) = pending.remove(&id) {
                store.add_group(group)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitward_auth::{AccessLevel, Namespace};
    use std::io::Write;

    const SNAPSHOT: &str = r#"
users:
  - { id: 1, username: alice }
  - { id: 2, username: bob, state: blocked }
groups:
  - { id: 2, path: backend, parent_id: 1 }
  - { id: 1, path: acme }
projects:
  - id: 10
    path: api
    namespace: { kind: group, id: 2 }
members:
  - { user_id: 1, source: { kind: group, id: 1 }, level: developer }
rules:
  - { id: 5, project_id: 10, kind: branch, pattern: "release-*", push: [no_one] }
redirects:
  - { from: acme/old-api, project_id: 10 }
quota:
  default_limit: 1000
  projects:
    - { project_id: 10, size: 900 }
"#;

    #[test]
    fn test_load_snapshot() {
        let loaded = Snapshot::from_yaml_str(SNAPSHOT).unwrap().into_store().unwrap();
        let store = &loaded.store;

        let project = store.get_project(10).unwrap();
        assert_eq!(project.namespace, Namespace::Group(2));
        assert_eq!(store.full_path(&project), "acme/backend/api");

        let (moved, redirected) = store.resolve_path("acme/old-api").unwrap();
        assert_eq!(moved.id, 10);
        assert!(redirected);

        let authorizations = store.project_authorizations(1);
        assert_eq!(authorizations.len(), 1);
        assert_eq!(authorizations[0].access_level, AccessLevel::Developer);

        let rules = store.list_rules(10);
        assert!(rules[0].push.is_no_one());
        assert!(!rules[0].merge.is_no_one());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();

        let snapshot = Snapshot::load_yaml(file.path()).unwrap();
        assert_eq!(snapshot.users.len(), 2);
        assert_eq!(snapshot.quota.default_limit, Some(1000));
    }

    #[test]
    fn test_rejects_duplicates_and_dangling_refs() {
        let duplicate = "users:\n  - { id: 1, username: a }\n  - { id: 1, username: b }\n";
        assert!(matches!(
            Snapshot::from_yaml_str(duplicate),
            Err(SnapshotError::Invalid(_))
        ));

        let orphan = "groups:\n  - { id: 2, path: x, parent_id: 9 }\n";
        assert!(matches!(
            Snapshot::from_yaml_str(orphan),
            Err(SnapshotError::Invalid(_))
        ));

        assert!(matches!(
            Snapshot::from_yaml_str("users: {"),
            Err(SnapshotError::Parse(_))
        ));
    }

    #[test]
    fn test_group_cycle() {
        let snapshot = Snapshot {
            groups: vec![Group::child_of(1, "a", 2), Group::child_of(2, "b", 1)],
            ..Snapshot::default()
        };
        assert!(matches!(
            snapshot.into_store(),
            Err(SnapshotError::Invalid(message)) if message.contains("cycle")
        ));
    }
}

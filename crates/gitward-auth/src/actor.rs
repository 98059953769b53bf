//! Actors attempting Git access.

use crate::key::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// User identifier.
pub type UserId = u64;
/// Deploy key identifier.
pub type DeployKeyId = u64;
/// Deploy token identifier.
pub type DeployTokenId = u64;
/// CI job identifier.
pub type JobId = u64;
/// Project identifier.
pub type ProjectId = u64;
/// Group identifier.
pub type GroupId = u64;

/// Account state of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    /// Normal account.
    #[default]
    Active,
    /// Blocked by an administrator.
    Blocked,
    /// Signed up, waiting for administrator approval.
    BlockedPendingApproval,
    /// Deactivated for inactivity; reactivated by signing in on the web.
    Deactivated,
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Account state.
    #[serde(default)]
    pub state: UserState,
    /// Instance administrator.
    #[serde(default)]
    pub admin: bool,
    /// Bot account (project/group access token user).
    #[serde(default)]
    pub bot: bool,
    /// External users do not see internal projects.
    #[serde(default)]
    pub external: bool,
    /// Password was set automatically and has expired.
    #[serde(default)]
    pub password_expired: bool,
    /// Authenticates through LDAP (password expiry is managed there).
    #[serde(default)]
    pub ldap: bool,
    /// Has accepted the instance terms of service.
    #[serde(default = "default_true")]
    pub terms_accepted: bool,
}

fn default_true() -> bool {
    true
}

impl User {
    /// Create an active, non-admin user.
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            state: UserState::Active,
            admin: false,
            bot: false,
            external: false,
            password_expired: false,
            ldap: false,
            terms_accepted: true,
        }
    }

    /// Set the account state.
    pub fn with_state(mut self, state: UserState) -> Self {
        self.state = state;
        self
    }

    /// Mark the user as an instance administrator.
    pub fn admin(mut self) -> Self {
        self.admin = true;
        self
    }

    /// Whether the account can authenticate at all.
    pub fn is_active(&self) -> bool {
        self.state == UserState::Active
    }

    /// Whether the password has expired in a way that blocks Git access.
    ///
    /// LDAP users manage their password outside the instance.
    pub fn password_expired_for_git(&self) -> bool {
        self.password_expired && !self.ldap
    }
}

/// A deploy key's grant on one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployKeyProject {
    /// Project the key is enabled on.
    pub project_id: ProjectId,
    /// Whether the key may push.
    #[serde(default)]
    pub can_push: bool,
}

/// An SSH deploy key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployKey {
    /// Unique key ID.
    pub id: DeployKeyId,
    /// Key title.
    pub title: String,
    /// User who added the key; used for audit attribution only.
    pub user_id: Option<UserId>,
    /// Projects the key is enabled on.
    #[serde(default)]
    pub projects: Vec<DeployKeyProject>,
    /// Public key material, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<PublicKey>,
}

impl DeployKey {
    /// Create a key with no project grants.
    pub fn new(id: DeployKeyId, title: impl Into<String>, user_id: Option<UserId>) -> Self {
        Self {
            id,
            title: title.into(),
            user_id,
            projects: Vec::new(),
            key: None,
        }
    }

    /// Attach the public key.
    pub fn with_key(mut self, key: PublicKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Enable the key on a project.
    pub fn with_project(mut self, project_id: ProjectId, can_push: bool) -> Self {
        self.projects.push(DeployKeyProject {
            project_id,
            can_push,
        });
        self
    }

    /// Whether the key is enabled on the project.
    pub fn has_access_to(&self, project_id: ProjectId) -> bool {
        self.projects.iter().any(|p| p.project_id == project_id)
    }

    /// Whether the key may push to the project.
    pub fn can_push_to(&self, project_id: ProjectId) -> bool {
        self.projects
            .iter()
            .any(|p| p.project_id == project_id && p.can_push)
    }
}

/// A read-only token for registries and clones, granted on a list of projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployToken {
    /// Unique token ID.
    pub id: DeployTokenId,
    /// Token name.
    pub name: String,
    /// Projects the token is valid for.
    #[serde(default)]
    pub project_ids: Vec<ProjectId>,
}

impl DeployToken {
    /// Create a token with no project grants.
    pub fn new(id: DeployTokenId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            project_ids: Vec::new(),
        }
    }

    /// Grant the token on a project.
    pub fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_ids.push(project_id);
        self
    }

    /// Whether the token is valid for the project.
    pub fn has_access_to(&self, project_id: ProjectId) -> bool {
        self.project_ids.contains(&project_id)
    }
}

/// A running CI job authenticating with its job token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiJob {
    /// Unique job ID.
    pub id: JobId,
    /// Project the pipeline runs in.
    pub project_id: ProjectId,
    /// User who triggered the pipeline; used for audit attribution only.
    pub user_id: Option<UserId>,
    /// Ref the pipeline runs for.
    pub ref_name: String,
    /// Other projects whose job-token allowlist admits this job's project.
    #[serde(default)]
    pub allowed_project_ids: Vec<ProjectId>,
}

impl CiJob {
    /// Create a job scoped to a single project.
    pub fn new(id: JobId, project_id: ProjectId, ref_name: impl Into<String>) -> Self {
        Self {
            id,
            project_id,
            user_id: None,
            ref_name: ref_name.into(),
            allowed_project_ids: Vec::new(),
        }
    }

    /// Whether the job token is scoped to the project.
    pub fn is_scoped_to(&self, project_id: ProjectId) -> bool {
        self.project_id == project_id || self.allowed_project_ids.contains(&project_id)
    }
}

/// The entity attempting Git access, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessActor {
    /// Unauthenticated caller.
    Anonymous,
    /// A user authenticated by SSH key, password or token.
    User(User),
    /// A deploy key.
    DeployKey(DeployKey),
    /// A deploy token.
    DeployToken(DeployToken),
    /// A CI job token.
    CiBuild(CiJob),
}

impl AccessActor {
    /// The user whose memberships apply, if the actor is a user.
    pub fn user(&self) -> Option<&User> {
        match self {
            AccessActor::User(user) => Some(user),
            _ => None,
        }
    }

    /// The user to attribute the operation to in audit records.
    pub fn attributed_user_id(&self) -> Option<UserId> {
        match self {
            AccessActor::Anonymous | AccessActor::DeployToken(_) => None,
            AccessActor::User(user) => Some(user.id),
            AccessActor::DeployKey(key) => key.user_id,
            AccessActor::CiBuild(job) => job.user_id,
        }
    }

    /// Whether the actor carries any credentials.
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AccessActor::Anonymous)
    }
}

impl fmt::Display for AccessActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessActor::Anonymous => write!(f, "anonymous"),
            AccessActor::User(user) => write!(f, "user:{}", user.username),
            AccessActor::DeployKey(key) => write!(f, "deploy_key:{}", key.id),
            AccessActor::DeployToken(token) => write!(f, "deploy_token:{}", token.id),
            AccessActor::CiBuild(job) => write!(f, "ci_job:{}", job.id),
        }
    }
}

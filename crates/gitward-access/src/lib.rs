//! # Gitward Access
//!
//! Decides whether an actor may run a Git command against a repository,
//! before any bytes are transferred.
//!
//! ## Features
//!
//! - **Layered checks**: actor, project, protocol, command, refs and quota
//! - **Repository kinds**: project code, wiki and design management
//! - **Protected refs**: per-change branch and tag authorization
//! - **CI job tokens**: read-only access scoped to the job's projects
//! - **Audit**: one event per decision, independent of the outcome
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     GitAccessCheck                        │
//! │  actor ─▶ project ─▶ protocol ─▶ command ─▶ refs ─▶ quota │
//! └──────┬──────────────┬──────────────┬──────────────┬──────┘
//!        ▼              ▼              ▼              ▼
//!  MembershipSource ProtectedRefStore QuotaSource AuditEmitter
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use gitward_access::{AccessServices, AuthenticationAbilities, Changes, GitAccessCheck, Protocol};
//! use gitward_auth::{AccessActor, AccessLevel, AuthStore, Member, Namespace, Project, User};
//!
//! let store = Arc::new(AuthStore::new());
//! store.add_user(User::new(1, "alice")).unwrap();
//! store.add_user(User::new(2, "bob")).unwrap();
//! store.add_project(Project::new(10, "api", Namespace::User(2))).unwrap();
//! store.set_member(Member::project(1, 10, AccessLevel::Reporter)).unwrap();
//!
//! let services = Arc::new(AccessServices::from_store(store.clone()));
//! let check = GitAccessCheck::new(
//!     services,
//!     AccessActor::User(store.get_user(1).unwrap()),
//!     store.get_project(10),
//!     Protocol::Ssh,
//!     AuthenticationAbilities::full(),
//! );
//!
//! assert!(check.check("git-upload-pack", &Changes::Any).is_ok());
//! let denied = check.check("git-receive-pack", &Changes::Any).unwrap_err();
//! assert_eq!(denied.status_code(), 403);
//! ```

mod ability;
mod audit;
mod change;
mod check;
mod command;
mod config;
mod error;
pub mod messages;
mod quota;
mod refs;

pub use ability::{Ability, AuthenticationAbilities, Permissions};
pub use audit::{
    AccessAuditEvent, AccessOutcome, AuditEmitter, AuditEntry, AuditError, AuditLog, AuditQuery,
    AuditQueryBuilder, NoopAudit,
};
pub use change::{is_blank_sha, Change, ChangeAction, Changes, BLANK_SHA1, BLANK_SHA256};
pub use check::{
    AccessCheckResult, AccessServices, CapabilitySet, GitAccessCheck, RepositoryKind, Stage,
};
pub use command::{GitCommand, Protocol};
pub use config::{
    AccessConfig, KeyRestrictions, KeyViolation, ENV_PREFIX, FORBIDDEN_KEY_VALUE,
};
pub use error::{prefix_lines, AccessError, ChangeParseError, ConfigError, ErrorKind, Result};
pub use quota::{MemoryQuota, NoQuota, QuotaSource};

/// Current access crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

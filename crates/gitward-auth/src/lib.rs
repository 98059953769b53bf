//! Project authorization and protected ref policy for gitward.
//!
//! This crate provides:
//! - **Access levels**: Ordered roles from Guest to Owner
//! - **Actors**: Users, deploy keys, deploy tokens, CI jobs and anonymous callers
//! - **Membership**: Inheritance through nested groups and shared groups
//! - **Resolution**: Effective level as the maximum over all membership paths
//! - **Protected refs**: Branch and tag rules with most-specific-match policy
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gitward_auth::{
//!     AccessActor, AccessLevel, AuthStore, Group, Member, Namespace, Project,
//!     ProjectAuthorizationResolver, User,
//! };
//!
//! let store = Arc::new(AuthStore::new());
//! store.add_user(User::new(1, "alice")).unwrap();
//! store.add_group(Group::new(1, "acme")).unwrap();
//! store.add_group(Group::child_of(2, "backend", 1)).unwrap();
//! store.add_project(Project::new(10, "api", Namespace::Group(2))).unwrap();
//!
//! // Membership on the root group reaches every project below it
//! store.set_member(Member::group(1, 1, AccessLevel::Developer)).unwrap();
//!
//! let resolver = ProjectAuthorizationResolver::new(store.clone());
//! let project = store.get_project(10).unwrap();
//! let alice = AccessActor::User(store.get_user(1).unwrap());
//! assert_eq!(resolver.access_level(&alice, &project).unwrap(), AccessLevel::Developer);
//! ```

mod actor;
mod error;
mod key;
mod level;
mod membership;
mod namespace;
mod policy;
mod project;
mod protected_ref;
mod resolver;
mod store;
mod traits;

pub use actor::{
    AccessActor, CiJob, DeployKey, DeployKeyId, DeployKeyProject, DeployToken, DeployTokenId,
    GroupId, JobId, ProjectId, User, UserId, UserState,
};
pub use error::{AuthError, LookupError, Result};
pub use key::{KeyAlgorithm, PublicKey};
pub use level::AccessLevel;
pub use membership::{GroupLink, Member, MemberSource, MembershipSourceId, ProjectAuthorization};
pub use namespace::{ancestor_chain, full_group_path, Group, Namespace};
pub use policy::{ProtectedRefPolicy, RefActor};
pub use project::{FeatureAccess, Project, Visibility};
pub use protected_ref::{glob_match, AccessGrant, AccessList, ProtectedRefRule, RefKind, RefName};
pub use resolver::ProjectAuthorizationResolver;
pub use store::AuthStore;
pub use traits::{MembershipSource, ProtectedRefStore, UserSource};

//! Effective access level resolution.

use crate::actor::{AccessActor, User};
use crate::error::LookupError;
use crate::level::AccessLevel;
use crate::membership::ProjectAuthorization;
use crate::project::Project;
use crate::traits::MembershipSource;
use std::sync::Arc;

/// Computes the access level an actor has on a project.
///
/// The level is the maximum over every membership path the source reports.
/// Nothing is cached here; every call reads the source.
#[derive(Clone)]
pub struct ProjectAuthorizationResolver {
    source: Arc<dyn MembershipSource>,
}

impl std::fmt::Debug for ProjectAuthorizationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectAuthorizationResolver").finish_non_exhaustive()
    }
}

impl ProjectAuthorizationResolver {
    /// Create a resolver over a membership source.
    pub fn new(source: Arc<dyn MembershipSource>) -> Self {
        Self { source }
    }

    /// Effective level of `actor` on `project`.
    ///
    /// Only users hold membership; deploy keys, deploy tokens, CI jobs and
    /// anonymous callers resolve to [`AccessLevel::NoAccess`] since their
    /// grants are scoped to the credential.
    pub fn access_level(
        &self,
        actor: &AccessActor,
        project: &Project,
    ) -> Result<AccessLevel, LookupError> {
        match actor {
            AccessActor::User(user) => self.user_access_level(user, project),
            AccessActor::Anonymous
            | AccessActor::DeployKey(_)
            | AccessActor::DeployToken(_)
            | AccessActor::CiBuild(_) => Ok(AccessLevel::NoAccess),
        }
    }

    /// Effective level of a user on `project`.
    pub fn user_access_level(
        &self,
        user: &User,
        project: &Project,
    ) -> Result<AccessLevel, LookupError> {
        if !user.is_active() {
            return Ok(AccessLevel::NoAccess);
        }

        let rows = self
            .source
            .direct_and_inherited_levels(user.id, project.id)?;

        let level = rows
            .iter()
            .map(|(_, level)| *level)
            .max()
            .unwrap_or(AccessLevel::NoAccess);

        tracing::trace!(
            user_id = user.id,
            project_id = project.id,
            paths = rows.len(),
            level = %level,
            "resolved project access level"
        );

        Ok(level)
    }

    /// The authorization tuple for `actor` on `project`, if the actor is a user.
    pub fn authorization(
        &self,
        actor: &AccessActor,
        project: &Project,
    ) -> Result<Option<ProjectAuthorization>, LookupError> {
        let Some(user) = actor.user() else {
            return Ok(None);
        };
        let access_level = self.user_access_level(user, project)?;
        Ok(Some(ProjectAuthorization {
            user_id: user.id,
            project_id: project.id,
            access_level,
        }))
    }
}

//! Membership rows and project authorizations.

use crate::actor::{GroupId, ProjectId, UserId};
use crate::level::AccessLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a membership row comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MembershipSourceId {
    /// Direct project membership.
    Project(ProjectId),
    /// Membership of the project's group or one of its ancestors.
    Group(GroupId),
    /// Owner of the personal namespace holding the project.
    PersonalNamespace(UserId),
    /// Membership of a group the project is shared with.
    SharedGroup(GroupId),
}

impl fmt::Display for MembershipSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipSourceId::Project(id) => write!(f, "project:{id}"),
            MembershipSourceId::Group(id) => write!(f, "group:{id}"),
            MembershipSourceId::PersonalNamespace(id) => write!(f, "namespace:{id}"),
            MembershipSourceId::SharedGroup(id) => write!(f, "shared_group:{id}"),
        }
    }
}

/// Where a member row is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MemberSource {
    /// A project member.
    Project(ProjectId),
    /// A group member.
    Group(GroupId),
}

/// A user's membership of a project or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The member.
    pub user_id: UserId,
    /// Project or group the membership is attached to.
    pub source: MemberSource,
    /// Granted level.
    pub level: AccessLevel,
}

impl Member {
    /// Direct project membership.
    pub fn project(user_id: UserId, project_id: ProjectId, level: AccessLevel) -> Self {
        Self {
            user_id,
            source: MemberSource::Project(project_id),
            level,
        }
    }

    /// Group membership.
    pub fn group(user_id: UserId, group_id: GroupId, level: AccessLevel) -> Self {
        Self {
            user_id,
            source: MemberSource::Group(group_id),
            level,
        }
    }
}

/// A project shared with a group, capping the level the group's members get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLink {
    /// Shared project.
    pub project_id: ProjectId,
    /// Group the project is shared with.
    pub group_id: GroupId,
    /// Highest level members of the group receive through this link.
    pub max_level: AccessLevel,
}

/// Effective access a user has on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAuthorization {
    /// The user.
    pub user_id: UserId,
    /// The project.
    pub project_id: ProjectId,
    /// Maximum level over every membership path.
    pub access_level: AccessLevel,
}

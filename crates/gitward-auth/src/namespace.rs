//! Groups, namespaces and the ancestor walk.

use crate::actor::{GroupId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A group. Groups nest to arbitrary depth through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique group ID.
    pub id: GroupId,
    /// URL path segment (e.g. "backend").
    pub path: String,
    /// Parent group, `None` for a top-level group.
    #[serde(default)]
    pub parent_id: Option<GroupId>,
}

impl Group {
    /// Create a top-level group.
    pub fn new(id: GroupId, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            parent_id: None,
        }
    }

    /// Create a subgroup of `parent_id`.
    pub fn child_of(id: GroupId, path: impl Into<String>, parent_id: GroupId) -> Self {
        Self {
            id,
            path: path.into(),
            parent_id: Some(parent_id),
        }
    }
}

/// Owner of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Namespace {
    /// A (possibly nested) group.
    Group(GroupId),
    /// A user's personal namespace.
    User(UserId),
}

/// Walk from `start` up to the root group.
///
/// Returns `start` first, then each parent in turn. The walk is iterative and
/// stops at the first repeated group, so a corrupted parent chain cannot loop.
/// Missing groups end the chain.
pub fn ancestor_chain(groups: &HashMap<GroupId, Group>, start: GroupId) -> Vec<GroupId> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut current = Some(start);

    while let Some(id) = current {
        if !visited.insert(id) {
            tracing::warn!(group_id = id, "cycle in group hierarchy, stopping ancestor walk");
            break;
        }
        let Some(group) = groups.get(&id) else {
            break;
        };
        chain.push(id);
        current = group.parent_id;
    }

    chain
}

/// Full path of a group (e.g. "acme/platform/backend").
pub fn full_group_path(groups: &HashMap<GroupId, Group>, id: GroupId) -> Option<String> {
    let chain = ancestor_chain(groups, id);
    if chain.is_empty() {
        return None;
    }
    let segments: Vec<&str> = chain
        .iter()
        .rev()
        .filter_map(|gid| groups.get(gid).map(|g| g.path.as_str()))
        .collect();
    Some(segments.join("/"))
}

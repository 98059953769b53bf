//! Projects and their visibility settings.

use crate::actor::ProjectId;
use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};

/// Visibility level of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only members can see the project.
    #[default]
    Private,
    /// Any signed-in, non-external user can see the project.
    Internal,
    /// Everyone can see the project.
    Public,
}

/// Access setting of a project feature (repository, wiki).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeatureAccess {
    /// Everyone who can see the project can use the feature.
    #[default]
    Enabled,
    /// Only project members can use the feature.
    Private,
    /// Nobody can use the feature.
    Disabled,
}

/// A project, with the settings that influence Git access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project ID.
    pub id: ProjectId,
    /// URL path segment.
    pub path: String,
    /// Owning namespace.
    pub namespace: Namespace,
    /// Visibility level.
    #[serde(default)]
    pub visibility: Visibility,
    /// Repository feature access.
    #[serde(default)]
    pub repository_access: FeatureAccess,
    /// Wiki feature access.
    #[serde(default)]
    pub wiki_access: FeatureAccess,
    /// Whether the Git repository has been created on disk.
    #[serde(default = "default_true")]
    pub repository_exists: bool,
    /// Archived projects reject pushes.
    #[serde(default)]
    pub archived: bool,
    /// Repository temporarily read-only (e.g. during a storage move).
    #[serde(default)]
    pub read_only: bool,
    /// Default branch name.
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Git LFS enabled for the project.
    #[serde(default = "default_true")]
    pub lfs_enabled: bool,
    /// Design management available for the project.
    #[serde(default)]
    pub design_management_enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_branch() -> String {
    "main".to_string()
}

impl Project {
    /// Create a private project with default settings.
    pub fn new(id: ProjectId, path: impl Into<String>, namespace: Namespace) -> Self {
        Self {
            id,
            path: path.into(),
            namespace,
            visibility: Visibility::Private,
            repository_access: FeatureAccess::Enabled,
            wiki_access: FeatureAccess::Enabled,
            repository_exists: true,
            archived: false,
            read_only: false,
            default_branch: default_branch(),
            lfs_enabled: true,
            design_management_enabled: false,
        }
    }

    /// Set the visibility level.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set repository feature access.
    pub fn with_repository_access(mut self, access: FeatureAccess) -> Self {
        self.repository_access = access;
        self
    }

    /// Whether the project is public.
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Whether the project is internal.
    pub fn is_internal(&self) -> bool {
        self.visibility == Visibility::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_defaults() {
        let project = Project::new(1, "api", Namespace::Group(1));
        assert_eq!(project.visibility, Visibility::Private);
        assert_eq!(project.default_branch, "main");
        assert!(project.repository_exists);
        assert!(!project.design_management_enabled);
    }

    #[test]
    fn test_project_deserialize_defaults() {
        let project: Project = serde_json::from_str(
            r#"{"id":5,"path":"web","namespace":{"kind":"user","id":2},"visibility":"public"}"#,
        )
        .unwrap();
        assert!(project.is_public());
        assert_eq!(project.namespace, Namespace::User(2));
        assert_eq!(project.repository_access, FeatureAccess::Enabled);
        assert!(project.lfs_enabled);
    }
}

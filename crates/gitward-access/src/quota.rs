//! Repository size limits.

use gitward_auth::{LookupError, ProjectId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Source of repository size limits.
pub trait QuotaSource: Send + Sync {
    /// Whether adding `additional_bytes` would take the project over its limit.
    fn exceeds_size_limit(
        &self,
        project_id: ProjectId,
        additional_bytes: u64,
    ) -> Result<bool, LookupError>;
}

/// No limits at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoQuota;

impl QuotaSource for NoQuota {
    fn exceeds_size_limit(&self, _project_id: ProjectId, _additional_bytes: u64) -> Result<bool, LookupError> {
        Ok(false)
    }
}

#[derive(Debug, Clone, Copy)]
struct Usage {
    size: u64,
    limit: Option<u64>,
}

/// In-memory sizes and limits per project.
#[derive(Debug, Default)]
pub struct MemoryQuota {
    /// Limit for projects without their own.
    default_limit: Option<u64>,
    usage: RwLock<HashMap<ProjectId, Usage>>,
}

impl MemoryQuota {
    /// Create a quota with an instance-wide default limit (`None` = unlimited).
    pub fn new(default_limit: Option<u64>) -> Self {
        Self {
            default_limit,
            usage: RwLock::new(HashMap::new()),
        }
    }

    /// Set the current repository size of a project.
    pub fn set_size(&self, project_id: ProjectId, size: u64) {
        self.usage
            .write()
            .entry(project_id)
            .or_insert(Usage { size: 0, limit: None })
            .size = size;
    }

    /// Set a per-project limit overriding the default.
    pub fn set_limit(&self, project_id: ProjectId, limit: u64) {
        self.usage
            .write()
            .entry(project_id)
            .or_insert(Usage { size: 0, limit: None })
            .limit = Some(limit);
    }
}

impl QuotaSource for MemoryQuota {
    fn exceeds_size_limit(
        &self,
        project_id: ProjectId,
        additional_bytes: u64,
    ) -> Result<bool, LookupError> {
        let usage = self.usage.read().get(&project_id).copied();
        let size = usage.map_or(0, |u| u.size);
        let limit = usage.and_then(|u| u.limit).or(self.default_limit);

        Ok(match limit {
            Some(limit) => size.saturating_add(additional_bytes) > limit,
            None => false,
        })
    }
}

//! Audit records of access decisions.
//!
//! Every check emits exactly one event. Emission failures are logged and never
//! change the decision.

use crate::command::Protocol;
use crate::error::ErrorKind;
use gitward_auth::{ProjectId, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Maximum number of audit entries to keep in memory.
const MAX_ENTRIES: usize = 100_000;

/// Failure to record an audit event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    /// The sink cannot accept more events.
    #[error("audit log capacity exceeded")]
    Full,

    /// The sink is unreachable or rejected the event.
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a check, as recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "kind", rename_all = "snake_case")]
pub enum AccessOutcome {
    /// Access granted.
    Allowed,
    /// Access refused.
    Denied(ErrorKind),
}

/// One access decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessAuditEvent {
    /// Correlation ID of the check.
    pub check_id: Uuid,
    /// Actor description (e.g. "user:alice", "deploy_key:3").
    pub actor: String,
    /// User the operation is attributed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Project checked, if it was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    /// Requested command as sent by the client (e.g. "git-upload-pack").
    pub command: String,
    /// Transport used.
    pub protocol: Protocol,
    /// Decision.
    pub outcome: AccessOutcome,
    /// Denial message, without client prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Number of ref changes evaluated.
    pub changes: usize,
}

impl AccessAuditEvent {
    /// Whether the event records a granted access.
    pub fn allowed(&self) -> bool {
        self.outcome == AccessOutcome::Allowed
    }
}

/// Sink for access audit events.
pub trait AuditEmitter: Send + Sync {
    /// Record an event.
    fn record(&self, event: &AccessAuditEvent) -> Result<(), AuditError>;
}

/// Emitter that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAudit;

impl AuditEmitter for NoopAudit {
    fn record(&self, _event: &AccessAuditEvent) -> Result<(), AuditError> {
        Ok(())
    }
}

/// A stored audit entry with ID and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique ID of the entry.
    pub id: u64,
    /// Unix timestamp when the event was recorded.
    pub timestamp: u64,
    /// The audit event.
    #[serde(flatten)]
    pub event: AccessAuditEvent,
}

/// Query parameters for searching audit logs.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Filter by actor substring.
    pub actor: Option<String>,
    /// Filter by project.
    pub project_id: Option<ProjectId>,
    /// Filter by command.
    pub command: Option<String>,
    /// Only denied (`Some(false)`) or allowed (`Some(true)`) decisions.
    pub allowed: Option<bool>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

/// Builder for constructing audit queries.
#[derive(Debug, Clone, Default)]
pub struct AuditQueryBuilder {
    query: AuditQuery,
}

impl AuditQueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by actor.
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.query.actor = Some(actor.into());
        self
    }

    /// Filters by project.
    pub fn project(mut self, project_id: ProjectId) -> Self {
        self.query.project_id = Some(project_id);
        self
    }

    /// Filters by command.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.query.command = Some(command.into());
        self
    }

    /// Only denied decisions.
    pub fn denied(mut self) -> Self {
        self.query.allowed = Some(false);
        self
    }

    /// Only allowed decisions.
    pub fn allowed(mut self) -> Self {
        self.query.allowed = Some(true);
        self
    }

    /// Sets the maximum number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the offset for pagination.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Builds the query.
    pub fn build(self) -> AuditQuery {
        self.query
    }
}

/// Thread-safe in-memory audit log.
#[derive(Debug)]
pub struct AuditLog {
    /// Stored entries.
    entries: RwLock<VecDeque<AuditEntry>>,
    /// Next ID counter.
    next_id: AtomicU64,
    /// Maximum entries to store.
    max_entries: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    /// Creates a new audit log with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(MAX_ENTRIES)
    }

    /// Creates a new audit log with specified capacity.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(max_entries.min(MAX_ENTRIES))),
            next_id: AtomicU64::new(1),
            max_entries: max_entries.max(1),
        }
    }

    /// Stores an event, evicting the oldest entry when full.
    pub fn push(&self, event: AccessAuditEvent) -> AuditEntry {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let entry = AuditEntry {
            id,
            timestamp,
            event,
        };

        {
            let mut entries = self.entries.write();
            while entries.len() >= self.max_entries {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        tracing::info!(
            check_id = %entry.event.check_id,
            actor = %entry.event.actor,
            project_id = ?entry.event.project_id,
            command = %entry.event.command,
            protocol = %entry.event.protocol,
            outcome = ?entry.event.outcome,
            "access audit event recorded"
        );

        entry
    }

    /// Queries entries matching the given criteria.
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        let entries = self.entries.read();
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);

        entries
            .iter()
            .filter(|e| {
                if let Some(ref actor) = query.actor {
                    if !e.event.actor.contains(actor.as_str()) {
                        return false;
                    }
                }
                if let Some(project_id) = query.project_id {
                    if e.event.project_id != Some(project_id) {
                        return false;
                    }
                }
                if let Some(ref command) = query.command {
                    if e.event.command != *command {
                        return false;
                    }
                }
                if let Some(allowed) = query.allowed {
                    if e.event.allowed() != allowed {
                        return false;
                    }
                }
                true
            })
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the total number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns recent entries up to the specified limit, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Exports entries as JSON.
    pub fn export_json(&self) -> serde_json::Result<String> {
        let entries = self.entries.read();
        serde_json::to_string_pretty(&*entries)
    }
}

impl AuditEmitter for AuditLog {
    fn record(&self, event: &AccessAuditEvent) -> Result<(), AuditError> {
        self.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(actor: &str, project_id: u64, outcome: AccessOutcome) -> AccessAuditEvent {
        AccessAuditEvent {
            check_id: Uuid::new_v4(),
            actor: actor.to_string(),
            user_id: None,
            project_id: Some(project_id),
            command: "git-upload-pack".to_string(),
            protocol: Protocol::Ssh,
            outcome,
            message: None,
            changes: 0,
        }
    }

    #[test]
    fn test_record_and_query() {
        let log = AuditLog::new();
        log.record(&event("user:alice", 1, AccessOutcome::Allowed)).unwrap();
        log.record(&event("user:bob", 1, AccessOutcome::Denied(ErrorKind::Forbidden)))
            .unwrap();
        log.record(&event("user:alice", 2, AccessOutcome::Denied(ErrorKind::NotFound)))
            .unwrap();

        assert_eq!(log.len(), 3);
        assert_eq!(log.query(&AuditQueryBuilder::new().actor("alice").build()).len(), 2);
        assert_eq!(log.query(&AuditQueryBuilder::new().denied().build()).len(), 2);
        assert_eq!(
            log.query(&AuditQueryBuilder::new().project(1).allowed().build()).len(),
            1
        );
        assert_eq!(
            log.query(&AuditQueryBuilder::new().offset(1).limit(1).build())[0].event.actor,
            "user:bob"
        );
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let log = AuditLog::with_capacity(2);
        for project_id in 1..=3 {
            log.push(event("user:alice", project_id, AccessOutcome::Allowed));
        }

        assert_eq!(log.len(), 2);
        let recent = log.recent(10);
        assert_eq!(recent[0].event.project_id, Some(2));
        assert_eq!(recent[1].event.project_id, Some(3));
        assert_eq!(log.recent(1)[0].event.project_id, Some(3));
    }

    #[test]
    fn test_event_serialization() {
        let e = event("deploy_key:3", 7, AccessOutcome::Denied(ErrorKind::Forbidden));
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["command"], "git-upload-pack");
        assert_eq!(json["outcome"]["outcome"], "denied");
        assert_eq!(json["outcome"]["kind"], "forbidden");
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_log_subscribers_can_read_the_log() {
        use std::sync::atomic::AtomicUsize;
        use std::sync::Arc;
        use tracing_subscriber::layer::{Context, SubscriberExt};
        use tracing_subscriber::Layer;

        struct ReadBack {
            log: Arc<AuditLog>,
            seen: Arc<AtomicUsize>,
        }

        impl<S: tracing::Subscriber> Layer<S> for ReadBack {
            fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
                self.seen.store(self.log.len(), Ordering::SeqCst);
            }
        }

        let log = Arc::new(AuditLog::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ReadBack {
            log: log.clone(),
            seen: seen.clone(),
        });

        tracing::subscriber::with_default(subscriber, || {
            log.push(event("user:1", 1, AccessOutcome::Allowed));
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_export_json() {
        let log = AuditLog::new();
        log.push(event("user:1", 1, AccessOutcome::Allowed));

        let exported: serde_json::Value = serde_json::from_str(&log.export_json().unwrap()).unwrap();
        assert_eq!(exported[0]["id"], 1);
        assert_eq!(exported[0]["actor"], "user:1");
        assert_eq!(exported[0]["outcome"]["outcome"], "allowed");
    }
}

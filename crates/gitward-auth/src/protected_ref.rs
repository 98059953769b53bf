//! Protected branch and tag rules.

use crate::actor::{DeployKeyId, ProjectId, UserId};
use crate::level::AccessLevel;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;

/// Kind of ref a rule protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    /// `refs/heads/*`
    Branch,
    /// `refs/tags/*`
    Tag,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::Branch => write!(f, "branch"),
            RefKind::Tag => write!(f, "tag"),
        }
    }
}

/// A ref name split into its kind and short name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefName {
    /// A branch, stored without the `refs/heads/` prefix.
    Branch(String),
    /// A tag, stored without the `refs/tags/` prefix.
    Tag(String),
    /// Any other ref (notes, merge request heads, ...), stored in full.
    Other(String),
}

impl RefName {
    /// Split a fully qualified ref name.
    pub fn parse(full: &str) -> Self {
        if let Some(name) = full.strip_prefix("refs/heads/") {
            RefName::Branch(name.to_string())
        } else if let Some(name) = full.strip_prefix("refs/tags/") {
            RefName::Tag(name.to_string())
        } else {
            RefName::Other(full.to_string())
        }
    }

    /// Branch shorthand.
    pub fn branch(name: impl Into<String>) -> Self {
        RefName::Branch(name.into())
    }

    /// Tag shorthand.
    pub fn tag(name: impl Into<String>) -> Self {
        RefName::Tag(name.into())
    }

    /// Kind of the ref, `None` for refs that cannot be protected.
    pub fn kind(&self) -> Option<RefKind> {
        match self {
            RefName::Branch(_) => Some(RefKind::Branch),
            RefName::Tag(_) => Some(RefKind::Tag),
            RefName::Other(_) => None,
        }
    }

    /// Short name that rule patterns match against.
    pub fn name(&self) -> &str {
        match self {
            RefName::Branch(name) | RefName::Tag(name) | RefName::Other(name) => name,
        }
    }

    /// Fully qualified name.
    pub fn full(&self) -> String {
        match self {
            RefName::Branch(name) => format!("refs/heads/{name}"),
            RefName::Tag(name) => format!("refs/tags/{name}"),
            RefName::Other(name) => name.clone(),
        }
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of a rule's allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessGrant {
    /// Members at or above this level.
    Role(AccessLevel),
    /// A specific user.
    User(UserId),
    /// A specific deploy key.
    DeployKey(DeployKeyId),
    /// Nobody, whatever else the list contains.
    NoOne,
}

impl AccessGrant {
    fn is_no_one(self) -> bool {
        // A stored level of 0 has always meant "no one".
        matches!(
            self,
            AccessGrant::NoOne | AccessGrant::Role(AccessLevel::NoAccess)
        )
    }
}

/// Who may perform one kind of operation on a protected ref.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessList(pub Vec<AccessGrant>);

impl AccessList {
    /// Members at or above `level`.
    pub fn role(level: AccessLevel) -> Self {
        Self(vec![AccessGrant::Role(level)])
    }

    /// Nobody.
    pub fn no_one() -> Self {
        Self(vec![AccessGrant::NoOne])
    }

    /// Add a grant.
    pub fn with(mut self, grant: AccessGrant) -> Self {
        self.0.push(grant);
        self
    }

    /// Whether the list is locked down to nobody.
    pub fn is_no_one(&self) -> bool {
        self.0.iter().any(|grant| grant.is_no_one())
    }

    /// Whether the list admits a user at `level`.
    pub fn admits_user(&self, user_id: UserId, level: AccessLevel) -> bool {
        if self.is_no_one() {
            return false;
        }
        self.0.iter().any(|grant| match *grant {
            AccessGrant::Role(floor) => level.has(floor),
            AccessGrant::User(id) => id == user_id,
            AccessGrant::DeployKey(_) | AccessGrant::NoOne => false,
        })
    }

    /// Whether the list admits a deploy key. Role floors never admit keys.
    pub fn admits_deploy_key(&self, key_id: DeployKeyId) -> bool {
        if self.is_no_one() {
            return false;
        }
        self.0
            .iter()
            .any(|grant| matches!(*grant, AccessGrant::DeployKey(id) if id == key_id))
    }
}

/// Protection rule for branches or tags matching a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedRefRule {
    /// Unique rule ID.
    pub id: u64,
    /// Project the rule belongs to.
    pub project_id: ProjectId,
    /// Whether the rule protects branches or tags.
    pub kind: RefKind,
    /// Exact name or `*` glob (e.g. "main", "release-*").
    pub pattern: String,
    /// Who may push.
    #[serde(default = "maintainers")]
    pub push: AccessList,
    /// Who may merge.
    #[serde(default = "maintainers")]
    pub merge: AccessList,
    /// Who may create matching refs; push-or-merge when absent.
    #[serde(default)]
    pub create: Option<AccessList>,
    /// Allow non-fast-forward pushes.
    #[serde(default)]
    pub allow_force_push: bool,
}

fn maintainers() -> AccessList {
    AccessList::role(AccessLevel::Maintainer)
}

impl ProtectedRefRule {
    /// Protect branches matching `pattern`; maintainers push and merge.
    pub fn branch(id: u64, project_id: ProjectId, pattern: impl Into<String>) -> Self {
        Self::new(id, project_id, RefKind::Branch, pattern)
    }

    /// Protect tags matching `pattern`; maintainers create.
    pub fn tag(id: u64, project_id: ProjectId, pattern: impl Into<String>) -> Self {
        Self::new(id, project_id, RefKind::Tag, pattern)
    }

    fn new(id: u64, project_id: ProjectId, kind: RefKind, pattern: impl Into<String>) -> Self {
        Self {
            id,
            project_id,
            kind,
            pattern: pattern.into(),
            push: maintainers(),
            merge: maintainers(),
            create: None,
            allow_force_push: false,
        }
    }

    /// Replace the push list.
    pub fn push_access(mut self, list: AccessList) -> Self {
        self.push = list;
        self
    }

    /// Replace the merge list.
    pub fn merge_access(mut self, list: AccessList) -> Self {
        self.merge = list;
        self
    }

    /// Set an explicit create list.
    pub fn create_access(mut self, list: AccessList) -> Self {
        self.create = Some(list);
        self
    }

    /// Allow force pushes.
    pub fn with_force_push(mut self) -> Self {
        self.allow_force_push = true;
        self
    }

    /// Whether the pattern contains a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.pattern.contains('*')
    }

    /// Check if this rule matches a ref.
    pub fn matches(&self, ref_name: &RefName) -> bool {
        ref_name.kind() == Some(self.kind) && glob_match(&self.pattern, ref_name.name())
    }

    /// Sort key: greater is more specific.
    ///
    /// Exact patterns beat wildcards; among wildcards the longer literal prefix
    /// wins, then the longer pattern, then the older rule.
    pub fn specificity(&self) -> (bool, usize, usize, Reverse<u64>) {
        let prefix = self.pattern.find('*').unwrap_or(self.pattern.len());
        (
            !self.is_wildcard(),
            prefix,
            self.pattern.len(),
            Reverse(self.id),
        )
    }
}

/// Match `text` against a pattern where each `*` matches any run of characters.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !text.starts_with(first) {
        return false;
    }

    let mut pos = first.len();
    for part in &parts[1..parts.len() - 1] {
        match text[pos..].find(part) {
            Some(offset) => pos += offset + part.len(),
            None => return false,
        }
    }

    text.len() - pos >= last.len() && text[pos..].ends_with(last)
}

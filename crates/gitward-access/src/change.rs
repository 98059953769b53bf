//! Ref updates requested by a push.

use crate::error::ChangeParseError;
use gitward_auth::RefName;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regex for object IDs (abbreviated or full SHA-1 / SHA-256).
pub static REVISION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{4,64}$").expect("Invalid regex"));

/// Regex for fully qualified ref names.
/// Excludes whitespace, control characters and the characters Git reserves.
pub static REF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^refs/[^\x00-\x20\x7f~^:?*\[\\]+$").expect("Invalid regex"));

/// All-zero SHA-1, the "no object" revision.
pub const BLANK_SHA1: &str = "0000000000000000000000000000000000000000";

/// All-zero SHA-256.
pub const BLANK_SHA256: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Whether a revision is the all-zero "no object" ID.
pub fn is_blank_sha(rev: &str) -> bool {
    rev == BLANK_SHA1 || rev == BLANK_SHA256
}

fn is_valid_ref(name: &str) -> bool {
    REF_REGEX.is_match(name)
        && !name.contains("..")
        && !name.contains("//")
        && !name.contains("@{")
        && !name.ends_with('/')
        && !name.ends_with('.')
        && !name.ends_with(".lock")
}

/// What a change does to its ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// The ref does not exist yet.
    Create,
    /// The ref moves to a new object.
    Update,
    /// The ref is removed.
    Delete,
}

/// One ref update: `<oldrev> <newrev> <ref>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Current object ID, blank when creating.
    pub oldrev: String,
    /// Target object ID, blank when deleting.
    pub newrev: String,
    /// Fully qualified ref name.
    pub ref_name: String,
    /// The update is not a fast-forward.
    #[serde(default)]
    pub forced: bool,
    /// The update is performed by merging a merge request.
    #[serde(default)]
    pub via_merge_request: bool,
}

impl Change {
    /// Create a change without validation.
    pub fn new(
        oldrev: impl Into<String>,
        newrev: impl Into<String>,
        ref_name: impl Into<String>,
    ) -> Self {
        Self {
            oldrev: oldrev.into(),
            newrev: newrev.into(),
            ref_name: ref_name.into(),
            forced: false,
            via_merge_request: false,
        }
    }

    /// Parse and validate a hook line.
    pub fn parse(line: &str) -> Result<Self, ChangeParseError> {
        let mut fields = line.split_whitespace();
        let (Some(oldrev), Some(newrev), Some(ref_name), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(ChangeParseError::Malformed(line.to_string()));
        };

        for rev in [oldrev, newrev] {
            if !REVISION_REGEX.is_match(rev) {
                return Err(ChangeParseError::InvalidRevision(rev.to_string()));
            }
        }
        if !is_valid_ref(ref_name) {
            return Err(ChangeParseError::InvalidRef(ref_name.to_string()));
        }

        Ok(Self::new(oldrev, newrev, ref_name))
    }

    /// Mark the change as a non-fast-forward update.
    pub fn forced(mut self) -> Self {
        self.forced = true;
        self
    }

    /// Mark the change as the result of a merge request merge.
    pub fn via_merge_request(mut self) -> Self {
        self.via_merge_request = true;
        self
    }

    /// What the change does.
    pub fn action(&self) -> ChangeAction {
        if is_blank_sha(&self.newrev) {
            ChangeAction::Delete
        } else if is_blank_sha(&self.oldrev) {
            ChangeAction::Create
        } else {
            ChangeAction::Update
        }
    }

    /// Checks if this change creates its ref.
    pub fn is_create(&self) -> bool {
        self.action() == ChangeAction::Create
    }

    /// Checks if this change deletes its ref.
    pub fn is_delete(&self) -> bool {
        self.action() == ChangeAction::Delete
    }

    /// The ref split into kind and short name.
    pub fn ref_name(&self) -> RefName {
        RefName::parse(&self.ref_name)
    }
}

impl FromStr for Change {
    type Err = ChangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Change::parse(s)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.oldrev, self.newrev, self.ref_name)
    }
}

/// The ref updates a check is asked about.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Changes {
    /// No concrete list: only command-level permissions are checked.
    #[default]
    Any,
    /// Every listed change must pass.
    List(Vec<Change>),
}

impl Changes {
    /// Parse newline-separated hook lines, skipping blank lines.
    pub fn parse(text: &str) -> Result<Self, ChangeParseError> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Change::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(Changes::List)
    }

    /// Whether no concrete list was given.
    pub fn is_any(&self) -> bool {
        matches!(self, Changes::Any)
    }

    /// The listed changes; empty for [`Changes::Any`].
    pub fn as_slice(&self) -> &[Change] {
        match self {
            Changes::Any => &[],
            Changes::List(changes) => changes,
        }
    }

    /// Number of listed changes.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether there are no listed changes.
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl From<Vec<Change>> for Changes {
    fn from(changes: Vec<Change>) -> Self {
        Changes::List(changes)
    }
}

impl From<Change> for Changes {
    fn from(change: Change) -> Self {
        Changes::List(vec![change])
    }
}

//! Access levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a member holds on a project or group.
///
/// Levels are totally ordered by their numeric rank:
/// `NoAccess < Guest < Reporter < Developer < Maintainer < Owner`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// No membership.
    #[default]
    NoAccess,
    /// Can view issues and, on public projects, the code.
    Guest,
    /// Can pull code.
    Reporter,
    /// Can push to unprotected branches.
    Developer,
    /// Can push to protected branches and manage the project.
    Maintainer,
    /// Full control.
    Owner,
}

impl AccessLevel {
    /// All levels in ascending order.
    pub const ALL: [AccessLevel; 6] = [
        AccessLevel::NoAccess,
        AccessLevel::Guest,
        AccessLevel::Reporter,
        AccessLevel::Developer,
        AccessLevel::Maintainer,
        AccessLevel::Owner,
    ];

    /// Numeric rank, compatible with the values GitLab stores.
    pub fn rank(self) -> u8 {
        match self {
            AccessLevel::NoAccess => 0,
            AccessLevel::Guest => 10,
            AccessLevel::Reporter => 20,
            AccessLevel::Developer => 30,
            AccessLevel::Maintainer => 40,
            AccessLevel::Owner => 50,
        }
    }

    /// Inverse of [`AccessLevel::rank`].
    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.rank() == rank)
    }

    /// Check if this level is at least the required one.
    pub fn has(self, required: AccessLevel) -> bool {
        self >= required
    }

    /// Parse from a role name or a numeric rank.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(rank) = s.parse::<u8>() {
            return Self::from_rank(rank);
        }
        match s.to_lowercase().as_str() {
            "no_access" | "none" | "no_one" => Some(AccessLevel::NoAccess),
            "guest" => Some(AccessLevel::Guest),
            "reporter" => Some(AccessLevel::Reporter),
            "developer" => Some(AccessLevel::Developer),
            "maintainer" | "master" => Some(AccessLevel::Maintainer),
            "owner" => Some(AccessLevel::Owner),
            _ => None,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::NoAccess => write!(f, "no access"),
            AccessLevel::Guest => write!(f, "guest"),
            AccessLevel::Reporter => write!(f, "reporter"),
            AccessLevel::Developer => write!(f, "developer"),
            AccessLevel::Maintainer => write!(f, "maintainer"),
            AccessLevel::Owner => write!(f, "owner"),
        }
    }
}

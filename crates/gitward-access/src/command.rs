//! Git commands and transport protocols.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A Git operation a client asks to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitCommand {
    /// `git-upload-pack`: fetch and clone.
    UploadPack,
    /// `git-receive-pack`: push.
    ReceivePack,
    /// `git-upload-archive`: `git archive --remote`.
    UploadArchive,
    /// Git LFS object upload.
    LfsUpload,
    /// Git LFS object download.
    LfsDownload,
}

impl GitCommand {
    /// All commands.
    pub const ALL: [GitCommand; 5] = [
        GitCommand::UploadPack,
        GitCommand::ReceivePack,
        GitCommand::UploadArchive,
        GitCommand::LfsUpload,
        GitCommand::LfsDownload,
    ];

    /// Parse the command string sent by a Git client or the SSH gateway.
    ///
    /// Returns `None` for anything that is not a known Git command.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "git-upload-pack" => Some(GitCommand::UploadPack),
            "git-receive-pack" => Some(GitCommand::ReceivePack),
            "git-upload-archive" => Some(GitCommand::UploadArchive),
            "git-lfs-upload" | "lfs-upload" => Some(GitCommand::LfsUpload),
            "git-lfs-download" | "lfs-download" => Some(GitCommand::LfsDownload),
            _ => None,
        }
    }

    /// Wire name of the command.
    pub fn as_str(self) -> &'static str {
        match self {
            GitCommand::UploadPack => "git-upload-pack",
            GitCommand::ReceivePack => "git-receive-pack",
            GitCommand::UploadArchive => "git-upload-archive",
            GitCommand::LfsUpload => "git-lfs-upload",
            GitCommand::LfsDownload => "git-lfs-download",
        }
    }

    /// Whether the command writes to the repository.
    pub fn is_write(self) -> bool {
        matches!(self, GitCommand::ReceivePack | GitCommand::LfsUpload)
    }

    /// Whether the command only reads from the repository.
    pub fn is_read(self) -> bool {
        !self.is_write()
    }

    /// Whether the command is an LFS transfer.
    pub fn is_lfs(self) -> bool {
        matches!(self, GitCommand::LfsUpload | GitCommand::LfsDownload)
    }
}

impl FromStr for GitCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GitCommand::parse(s).ok_or_else(|| format!("unknown git command: {s}"))
    }
}

impl fmt::Display for GitCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport the request arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Git over SSH.
    Ssh,
    /// Git over HTTP(S).
    Http,
    /// Operations performed by the application itself on the user's behalf.
    Web,
}

impl Protocol {
    /// Parse a protocol name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" => Some(Protocol::Ssh),
            "http" | "https" => Some(Protocol::Http),
            "web" => Some(Protocol::Web),
            _ => None,
        }
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Ssh => "ssh",
            Protocol::Http => "http",
            Protocol::Web => "web",
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Protocol::parse(s).ok_or_else(|| format!("unknown protocol: {s}"))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(GitCommand::parse("git-upload-pack"), Some(GitCommand::UploadPack));
        assert_eq!(GitCommand::parse("git-receive-pack"), Some(GitCommand::ReceivePack));
        assert_eq!(GitCommand::parse("git-upload-archive"), Some(GitCommand::UploadArchive));
        assert_eq!(GitCommand::parse("rm -rf /"), None);
        assert_eq!(GitCommand::parse("git-upload-pack "), None);

        for cmd in GitCommand::ALL {
            assert_eq!(cmd.as_str().parse::<GitCommand>(), Ok(cmd));
        }
    }

    #[test]
    fn test_command_direction() {
        assert!(GitCommand::ReceivePack.is_write());
        assert!(GitCommand::LfsUpload.is_write());
        assert!(GitCommand::UploadArchive.is_read());
        assert!(GitCommand::LfsDownload.is_lfs());
        assert!(!GitCommand::UploadPack.is_lfs());
    }

    #[test]
    fn test_protocol_parse() {
        assert_eq!(Protocol::parse("SSH"), Some(Protocol::Ssh));
        assert_eq!(Protocol::parse("https"), Some(Protocol::Http));
        assert_eq!(Protocol::parse("web"), Some(Protocol::Web));
        assert_eq!(Protocol::parse("ftp"), None);
        assert_eq!(Protocol::Http.to_string(), "http");
    }
}

//! User-facing denial messages.
//!
//! These strings reach Git clients verbatim (prefixed per line), so they are
//! kept in one place and matched exactly by tests.

// Actor state
pub const ACCOUNT_BLOCKED: &str = "Your account has been blocked.";
pub const ACCOUNT_PENDING_APPROVAL: &str =
    "Your account is pending approval from your administrator and hence blocked.";
pub const PASSWORD_EXPIRED: &str =
    "Your password expired. Please access GitLab from a web browser to update your password.";
pub const TERMS_NOT_ACCEPTED: &str = "You (@{username}) must accept the Terms of Service in order to perform this action. To accept these terms, please access GitLab from a web browser at {url}.";
pub const ACCOUNT_DEACTIVATED: &str = "Your account has been deactivated by your administrator. Please log back in from a web browser to reactivate your account at {url}";

// SSH keys
pub const KEY_TOO_SMALL: &str = "Your SSH key must be at least {bits} bits.";
pub const KEY_TYPE_FORBIDDEN: &str = "Your SSH key type is forbidden. Must be {allowed_types}.";

// Project resolution
pub const PROJECT_NOT_FOUND: &str =
    "The project you were looking for could not be found or you don't have permission to view it.";
pub const NO_REPO: &str = "A repository for this project does not exist yet.";

// Protocol
pub const SSH_DISABLED: &str = "Git access over SSH is not allowed";
pub const HTTP_DISABLED: &str = "Git access over HTTP is not allowed";
pub const UPLOAD_PACK_DISABLED_OVER_HTTP: &str = "Pulling over HTTP is not allowed.";
pub const RECEIVE_PACK_DISABLED_OVER_HTTP: &str = "Pushing over HTTP is not allowed.";
pub const DESIGN_PROTOCOL_NOT_ALLOWED: &str = "Designs are only accessible using the web interface";

// Commands and abilities
pub const COMMAND_NOT_ALLOWED: &str = "The command you're trying to execute is not allowed.";
pub const AUTH_DOWNLOAD: &str = "You are not allowed to download code.";
pub const AUTH_UPLOAD: &str = "You are not allowed to upload code.";
pub const DOWNLOAD: &str = "You are not allowed to download code from this project.";
pub const PUSH_CODE: &str = "You are not allowed to push code to this project.";
pub const DEPLOY_KEY_UPLOAD: &str = "This deploy key does not have write access to this project.";
pub const READ_ONLY_INSTANCE: &str = "You can't push code to a read-only GitLab instance.";
pub const READ_ONLY_REPOSITORY: &str =
    "The repository is temporarily read-only. Please try again later.";
pub const ARCHIVED: &str = "You can't push code to an archived project.";
pub const LFS_DISABLED: &str = "Git LFS is not enabled for this project.";
pub const LFS_DOWNLOAD: &str = "You are not allowed to download LFS objects from this project.";
pub const LFS_UPLOAD: &str = "You are not allowed to upload LFS objects to this project.";

// Wiki
pub const WIKI_DISABLED: &str = "The wiki for this project is disabled.";
pub const WIKI_READ: &str = "You are not allowed to download files from this wiki.";
pub const WIKI_WRITE: &str = "You are not allowed to write to this project's wiki.";

// Design
pub const DESIGN_DISABLED: &str = "Design management is not available for this project.";
pub const DESIGN_READ: &str = "You are not allowed to read designs on this project.";
pub const DESIGN_WRITE: &str = "You are not allowed to manage designs on this project.";

// Branches
pub const DELETE_DEFAULT_BRANCH: &str = "The default branch of a project cannot be deleted.";
pub const DELETE_PROTECTED_BRANCH_NON_WEB: &str =
    "You can only delete protected branches using the web interface.";
pub const DELETE_PROTECTED_BRANCH: &str = "You are not allowed to delete protected branches from this project. Only a project maintainer or owner can delete a protected branch.";
pub const FORCE_PUSH_PROTECTED_BRANCH: &str =
    "You are not allowed to force push code to a protected branch on this project.";
pub const MERGE_PROTECTED_BRANCH: &str =
    "You are not allowed to merge code into protected branches on this project.";
pub const PUSH_PROTECTED_BRANCH: &str =
    "You are not allowed to push code to protected branches on this project.";
pub const CREATE_PROTECTED_BRANCH: &str =
    "You are not allowed to create protected branches on this project.";

// Tags
pub const CHANGE_EXISTING_TAGS: &str = "You are not allowed to change existing tags on this project.";
pub const UPDATE_PROTECTED_TAG: &str = "Protected tags cannot be updated.";
pub const DELETE_PROTECTED_TAG_NON_WEB: &str =
    "You can only delete protected tags using the web interface.";
pub const DELETE_PROTECTED_TAG: &str = "You are not allowed to delete protected tags from this project. Only a project maintainer or owner can delete a protected tag.";
pub const CREATE_PROTECTED_TAG: &str = "You are not allowed to create this tag as it is protected.";

// Quota
pub const SIZE_LIMIT_EXCEEDED: &str = "Your push has been rejected, because this repository has exceeded its size limit.";

/// Fill `{name}` placeholders in a message template.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |message, (key, value)| {
        message.replace(&format!("{{{key}}}"), value)
    })
}

/// Join items as an English list: "a, b, or c".
pub fn sentence<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [first, second] => format!("{} or {}", first.as_ref(), second.as_ref()),
        [init @ .., last] => {
            let init: Vec<&str> = init.iter().map(AsRef::as_ref).collect();
            format!("{}, or {}", init.join(", "), last.as_ref())
        }
    }
}

/// Guidance shown when a project is reached through an old path.
pub fn project_moved(old_path: &str, new_path: &str, url_to_repo: &str) -> String {
    format!(
        "Project '{old_path}' was moved to '{new_path}'.\n\nPlease update your Git remote:\n\n  git remote set-url origin {url_to_repo} and try again.\n"
    )
}

/// Message for a push whose ref checks did not finish in time.
pub fn push_timed_out(ref_name: &str) -> String {
    format!(
        "Push operation timed out\n\nTiming information for debugging purposes:\nRunning checks for ref: {ref_name}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_placeholders() {
        let message = render(ACCOUNT_DEACTIVATED, &[("url", "https://gitlab.example.com")]);
        assert!(message.ends_with("reactivate your account at https://gitlab.example.com"));

        let terms = render(
            TERMS_NOT_ACCEPTED,
            &[("username", "alice"), ("url", "https://gitlab.example.com")],
        );
        assert!(terms.starts_with("You (@alice) must accept the Terms of Service"));
        assert!(!terms.contains('{'));
    }

    #[test]
    fn test_sentence() {
        assert_eq!(sentence::<&str>(&[]), "");
        assert_eq!(sentence(&["RSA"]), "RSA");
        assert_eq!(sentence(&["RSA", "DSA"]), "RSA or DSA");
        assert_eq!(sentence(&["RSA", "ECDSA", "ED25519"]), "RSA, ECDSA, or ED25519");
    }

    #[test]
    fn test_push_timed_out() {
        assert_eq!(
            push_timed_out("wow"),
            "Push operation timed out\n\nTiming information for debugging purposes:\nRunning checks for ref: wow"
        );
    }

    #[test]
    fn test_project_moved() {
        let message = project_moved("old/path", "new/path", "https://gitlab.example.com/new/path.git");
        assert!(message.starts_with("Project 'old/path' was moved to 'new/path'."));
        assert!(message.contains("git remote set-url origin https://gitlab.example.com/new/path.git"));
    }
}

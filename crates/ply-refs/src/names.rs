//! Branch and tag name validation following git-style conventions.
//!
//! Valid names:
//! - Must be non-empty
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..` or `@{`
//! - Must not start or end with `.` or `/`, nor end with `.lock`
//! - Slash-separated components must be non-empty and not start with `.`
//! - Must not be `HEAD` or a 64-character hex string, which would be
//!   ambiguous in commit specs

use ply_types::Hash;

use crate::error::{RefError, RefResult};

/// Characters that are forbidden anywhere in a ref name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a branch name.
///
/// ```
/// use ply_refs::names::validate_branch_name;
///
/// assert!(validate_branch_name("main").is_ok());
/// assert!(validate_branch_name("feature/auth").is_ok());
/// assert!(validate_branch_name("").is_err());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> RefResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "must not be empty"));
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }
    if name.contains("@{") {
        return Err(invalid(name, "must not contain '@{'"));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid(name, "must not start or end with '.'"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }
    if name.ends_with(".lock") {
        return Err(invalid(name, "must not end with '.lock'"));
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid(name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }
    if name == "HEAD" {
        return Err(invalid(name, "reserved name"));
    }
    if Hash::is_hex_hash(name) {
        return Err(invalid(name, "must not look like a commit hash"));
    }
    Ok(())
}

/// Validate a tag name. Same rules as branch names.
pub fn validate_tag_name(name: &str) -> RefResult<()> {
    validate_branch_name(name)
}

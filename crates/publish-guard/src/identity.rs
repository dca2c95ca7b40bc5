//! Package name and version validation.

use std::sync::OnceLock;

use regex_lite::Regex;
use thiserror::Error;

/// Message naming the version grammar.
pub const SEMVER_MESSAGE: &str = "should follow SemVer: https://semver.org";

/// Sequences that climb out of a path segment, raw or percent-encoded.
const TRAVERSAL_SEQUENCES: &[&str] = &["..", "%2e", "%2f", "%5c", "\\"];

/// `name` or `@scope/name`; segments start alphanumeric, then a conservative
/// character class.
const NAME_PATTERN: &str = r"^(?:@[A-Za-z0-9][A-Za-z0-9._-]*/)?[A-Za-z0-9][A-Za-z0-9._-]*$";

const SEMVER_PATTERN: &str = concat!(
    r"^(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)",
    r"(?:-((?:0|[1-9][0-9]*|[0-9]*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9][0-9]*|[0-9]*[a-zA-Z-][0-9a-zA-Z-]*))*))?",
    r"(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
);

/// Identity rejections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Name is empty")]
    EmptyName,

    #[error("Name '{0}' contains a path traversal sequence")]
    NameTraversal(String),

    #[error("Name '{0}' is invalid: expected 'name' or '@scope/name'")]
    InvalidName(String),

    #[error("Version {}", SEMVER_MESSAGE)]
    InvalidVersion(String),
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAME_PATTERN).expect("static name pattern"))
}

fn semver_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SEMVER_PATTERN).expect("static semver pattern"))
}

/// Validate a package name.
pub fn validate_name(name: &str) -> Result<(), IdentityError> {
    if name.is_empty() {
        return Err(IdentityError::EmptyName);
    }

    let lowered = name.to_ascii_lowercase();
    if TRAVERSAL_SEQUENCES.iter().any(|seq| lowered.contains(seq)) {
        return Err(IdentityError::NameTraversal(name.to_string()));
    }

    // "." alone is a path segment too.
    let package_segment = name.rsplit('/').next().unwrap_or(name);
    if package_segment == "." {
        return Err(IdentityError::NameTraversal(name.to_string()));
    }

    if !name_regex().is_match(name) {
        return Err(IdentityError::InvalidName(name.to_string()));
    }

    Ok(())
}

/// Validate a version string against the SemVer grammar.
pub fn validate_version(version: &str) -> Result<(), IdentityError> {
    if semver_regex().is_match(version) {
        Ok(())
    } else {
        Err(IdentityError::InvalidVersion(version.to_string()))
    }
}

/// Validate a name and version pair.
pub fn validate(name: &str, version: &str) -> Result<(), IdentityError> {
    validate_name(name)?;
    validate_version(version)
}

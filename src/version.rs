//! Kubernetes version normalization and comparison.
//!
//! Nodes report their kubelet version as `vMAJOR.MINOR.PATCH` while machine
//! specs carry the bare `MAJOR.MINOR.PATCH`. Every comparison goes through
//! [`normalize`] so both spellings compare equal. Pre-release and build
//! metadata are rejected rather than interpreted.

use semver::Version;

use crate::error::{MupError, Result};

/// Normalize a version string to its canonical `vMAJOR.MINOR.PATCH` form.
pub fn normalize(version: &str) -> Result<String> {
    let parsed = parse(version)?;
    Ok(format!("v{parsed}"))
}

/// Bare `MAJOR.MINOR.PATCH` form written into machine specs.
pub fn spec_version(version: &str) -> Result<String> {
    Ok(parse(version)?.to_string())
}

/// Returns true if a reported version is exactly the target version.
///
/// A reported version that does not parse never matches.
pub fn matches(reported: &str, target: &str) -> bool {
    match (normalize(reported), normalize(target)) {
        (Ok(reported), Ok(target)) => reported == target,
        _ => false,
    }
}

fn parse(version: &str) -> Result<Version> {
    let trimmed = version.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);

    let parsed =
        Version::parse(bare).map_err(|_| MupError::InvalidVersion(version.to_string()))?;

    if !parsed.pre.is_empty() || !parsed.build.is_empty() {
        return Err(MupError::InvalidVersion(format!(
            "{version} (pre-release and build metadata are not supported)"
        )));
    }

    Ok(parsed)
}

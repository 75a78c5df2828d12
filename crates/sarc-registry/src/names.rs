//! Logical name validation.
//!
//! A logical name is also the on-disk file name of its vault object, so the
//! rules keep it a single, visible path component:
//! - Must be non-empty
//! - Must not have leading or trailing whitespace
//! - Must not start with `.` (the reconciler ignores hidden files)
//! - Must not contain `/`, `\`, NUL, or any other control character
//! - Must not be `.` or `..`
//!
//! A trailing ` (n)` segment is always read as the collision counter (see
//! [`sarc_types::LogicalName`]); it is accepted here and never escaped.

use sarc_types::TypeError;

/// Characters that are forbidden anywhere in a logical name.
const FORBIDDEN_CHARS: &[char] = &['/', '\\', '\0'];

/// Longest accepted name in bytes (common filesystem component limit).
const MAX_NAME_LEN: usize = 255;

/// Validate a logical name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use sarc_registry::names::validate_logical_name;
///
/// assert!(validate_logical_name("report").is_ok());
/// assert!(validate_logical_name("report (2)").is_ok());
/// assert!(validate_logical_name("").is_err());
/// assert!(validate_logical_name("../escape").is_err());
/// ```
pub fn validate_logical_name(name: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name is longer than 255 bytes"));
    }

    if name.trim() != name {
        return Err(invalid("must not start or end with whitespace"));
    }

    if name == "." || name == ".." {
        return Err(invalid("must not be a relative path component"));
    }

    if name.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }

    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(TypeError::InvalidName {
                name: name.to_string(),
                reason: format!("contains forbidden character: {ch:?}"),
            });
        }
    }

    if name.chars().any(char::is_control) {
        return Err(invalid("contains a control character"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(validate_logical_name("docs").is_ok());
        assert!(validate_logical_name("tax return 2024").is_ok());
        assert!(validate_logical_name("archive.tar").is_ok());
        assert!(validate_logical_name("report (3)").is_ok());
        assert!(validate_logical_name("naïve").is_ok());
    }

    #[test]
    fn reject_empty() {
        assert!(validate_logical_name("").is_err());
    }

    #[test]
    fn reject_separators() {
        assert!(validate_logical_name("a/b").is_err());
        assert!(validate_logical_name("a\\b").is_err());
        assert!(validate_logical_name("../../etc/passwd").is_err());
    }

    #[test]
    fn reject_dot_names() {
        assert!(validate_logical_name(".").is_err());
        assert!(validate_logical_name("..").is_err());
        assert!(validate_logical_name(".hidden").is_err());
    }

    #[test]
    fn reject_whitespace_boundaries() {
        assert!(validate_logical_name(" lead").is_err());
        assert!(validate_logical_name("trail ").is_err());
    }

    #[test]
    fn reject_control_chars() {
        assert!(validate_logical_name("nul\0byte").is_err());
        assert!(validate_logical_name("new\nline").is_err());
        assert!(validate_logical_name("tab\tbed").is_err());
    }

    #[test]
    fn reject_overlong() {
        assert!(validate_logical_name(&"a".repeat(256)).is_err());
        assert!(validate_logical_name(&"a".repeat(255)).is_ok());
    }
}

//! File name validation
//!
//! Names typed by the user are checked here before any remote request is
//! built. The rules are the portable subset that is safe on both POSIX and
//! Windows SSH servers.

/// Longest accepted name in bytes (POSIX `NAME_MAX`).
pub const MAX_FILE_NAME_LEN: usize = 255;

const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("Name must not be empty")]
    Empty,

    #[error("Name contains invalid character '{0}'")]
    InvalidChar(char),

    #[error("Name contains control characters")]
    ControlChar,

    #[error("Name is too long: {len} bytes (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("'{0}' is a reserved device name")]
    Reserved(String),

    #[error("'{0}' is not a usable name")]
    DotName(String),
}

/// Validate a user-supplied file or directory name.
///
/// Reserved device names are matched case-insensitively on the part before
/// the first `.`, so `con` and `CON.txt` are both rejected.
pub fn validate_file_name(name: &str) -> Result<(), NameError> {
    if name.trim().is_empty() {
        return Err(NameError::Empty);
    }

    if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
        return Err(NameError::InvalidChar(c));
    }

    if name.chars().any(char::is_control) {
        return Err(NameError::ControlChar);
    }

    if name.len() > MAX_FILE_NAME_LEN {
        return Err(NameError::TooLong {
            len: name.len(),
            max: MAX_FILE_NAME_LEN,
        });
    }

    if name == "." || name == ".." {
        return Err(NameError::DotName(name.to_string()));
    }

    let stem = name.split('.').next().unwrap_or(name);
    if RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
    {
        return Err(NameError::Reserved(name.to_string()));
    }

    Ok(())
}

pub fn is_valid_file_name(name: &str) -> bool {
    validate_file_name(name).is_ok()
}

/// Trim surrounding whitespace and validate. Returns the trimmed name.
pub fn checked_name(name: &str) -> Result<&str, NameError> {
    let trimmed = name.trim();
    validate_file_name(trimmed)?;
    Ok(trimmed)
}

/// Validate the name of an entry that came from a directory listing.
///
/// Listed names are whatever the server allows, so only the checks that keep
/// the resulting path inside the current directory apply.
pub fn validate_entry_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.contains('/') {
        return Err(NameError::InvalidChar('/'));
    }
    if name == "." || name == ".." {
        return Err(NameError::DotName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_names() {
        assert!(is_valid_file_name("notes.txt"));
        assert!(is_valid_file_name(".bashrc"));
        assert!(is_valid_file_name("my dir"));
        assert!(is_valid_file_name("console.log"));
        assert!(is_valid_file_name("COM10"));
    }

    #[test]
    fn test_rejects_invalid_chars() {
        for c in INVALID_CHARS {
            let name = format!("bad{}name", c);
            assert_eq!(validate_file_name(&name), Err(NameError::InvalidChar(*c)));
        }
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert_eq!(validate_file_name(""), Err(NameError::Empty));
        assert_eq!(validate_file_name("   \t"), Err(NameError::Empty));
    }

    #[test]
    fn test_rejects_control_chars() {
        assert_eq!(validate_file_name("a\u{7}b"), Err(NameError::ControlChar));
        assert_eq!(validate_file_name("line\nbreak"), Err(NameError::ControlChar));
    }

    #[test]
    fn test_rejects_reserved_names() {
        assert!(!is_valid_file_name("con"));
        assert!(!is_valid_file_name("CON"));
        assert!(!is_valid_file_name("Lpt1"));
        assert!(!is_valid_file_name("nul.txt"));
    }

    #[test]
    fn test_length_limit() {
        assert!(is_valid_file_name(&"a".repeat(255)));
        assert!(matches!(
            validate_file_name(&"a".repeat(256)),
            Err(NameError::TooLong { len: 256, .. })
        ));
    }

    #[test]
    fn test_dot_names() {
        assert!(!is_valid_file_name("."));
        assert!(!is_valid_file_name(".."));
        assert!(validate_entry_name("..").is_err());
        assert!(validate_entry_name("a/b").is_err());
        assert!(validate_entry_name("weird:name").is_ok());
    }

    #[test]
    fn test_checked_name_trims() {
        assert_eq!(checked_name("  report.md "), Ok("report.md"));
        assert!(checked_name(" a|b ").is_err());
    }
}

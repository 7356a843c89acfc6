//! Command, group and option name rules

use regex::Regex;
use std::sync::OnceLock;

use crate::core::DescriptorError;

/// Longest name or label the platform accepts.
pub const MAX_NAME_LEN: usize = 32;

static NAME_PATTERN: OnceLock<Regex> = OnceLock::new();

fn name_pattern() -> &'static Regex {
    NAME_PATTERN.get_or_init(|| {
        Regex::new(r"^[-_\p{L}\p{N}\p{Devanagari}\p{Thai}]{1,32}$")
            .expect("command name pattern is a valid regex")
    })
}

/// Normalize and validate a name.
///
/// Letters with a lowercase variant are lowercased first, since the platform
/// only accepts the lowercase form.
pub fn validate_name(what: &'static str, name: &str) -> Result<String, DescriptorError> {
    let normalized = name.to_lowercase();
    if name_pattern().is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(DescriptorError::InvalidName {
            what,
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_valid_names() {
        for name in ["ping", "set_user", "a-b", "x1", "ñandú", "पिंग", "ทดสอบ", "名前"] {
            assert_eq!(validate_name("command", name).as_deref(), Ok(name), "{name}");
        }
        let longest = "a".repeat(32);
        assert!(validate_name("command", &longest).is_ok());
    }

    #[test]
    fn test_lowercases() {
        assert_eq!(validate_name("command", "Ping").as_deref(), Ok("ping"));
    }

    #[test]
    fn test_rejects_invalid_names() {
        let too_long = "a".repeat(33);
        for name in ["", too_long.as_str(), "with space", "dot.ted", "emoji🎉", "slash/"] {
            assert!(
                matches!(
                    validate_name("option", name),
                    Err(DescriptorError::InvalidName { what: "option", .. })
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_length_counts_characters() {
        let multibyte = "é".repeat(32);
        assert!(validate_name("command", &multibyte).is_ok());
        assert!(validate_name("command", &"é".repeat(33)).is_err());
    }
}

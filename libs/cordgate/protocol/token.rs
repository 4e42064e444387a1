use serde::{Serialize, Serializer};
use std::fmt;

/// Authentication credential sent in Identify, Resume and REST headers
///
/// Stored with its scheme prefix (`Bot ` or `Bearer `). `Debug` never
/// prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Bot token; the `Bot ` prefix is added if missing
    pub fn bot(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim();
        if raw.starts_with("Bot ") {
            Self(raw.to_string())
        } else {
            Self(format!("Bot {}", raw))
        }
    }

    /// OAuth2 bearer token; the `Bearer ` prefix is added if missing
    pub fn bearer(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim();
        if raw.starts_with("Bearer ") {
            Self(raw.to_string())
        } else {
            Self(format!("Bearer {}", raw))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.split_once(' ').map_or(true, |(_, secret)| secret.is_empty())
    }

    /// Value for an `Authorization` header
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = self.0.split_once(' ').map_or("", |(scheme, _)| scheme);
        write!(f, "Token({} <redacted>)", scheme)
    }
}

impl Serialize for Token {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_added_once() {
        assert_eq!(Token::bot("abc").as_str(), "Bot abc");
        assert_eq!(Token::bot("Bot abc").as_str(), "Bot abc");
        assert_eq!(Token::bearer("xyz").as_str(), "Bearer xyz");
    }

    #[test]
    fn test_debug_is_redacted() {
        let printed = format!("{:?}", Token::bot("super-secret"));
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("Bot"));
    }

    #[test]
    fn test_empty() {
        assert!(Token::bot("").is_empty());
        assert!(!Token::bot("x").is_empty());
    }
}

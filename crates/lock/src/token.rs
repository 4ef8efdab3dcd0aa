//! Owner tokens written into lease keys

use std::fmt;

use uuid::Uuid;

/// Value stored under a lease key to prove which holder owns it.
///
/// Every acquisition attempt gets a fresh random token, so two holders that
/// raced for the same name never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerToken(String);

impl OwnerToken {
    /// Generate a new random token
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing token value
    pub fn from_value(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The token as written to the store
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OwnerToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique() {
        let a = OwnerToken::generate();
        let b = OwnerToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn from_value_round_trips_display() {
        let token = OwnerToken::from_value("holder-a");
        assert_eq!(token.to_string(), "holder-a");
        assert_eq!(token.as_ref(), "holder-a");
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Anonymous per-browser identity. Doubles as the conversation storage key.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a client-supplied token only if it is a well-formed UUID.
    pub fn parse_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Uuid::parse_str(token).ok().map(|_| Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::UserId;

    #[test]
    fn new_ids_are_distinct() {
        assert_ne!(UserId::new(), UserId::new());
    }

    #[test]
    fn parse_token_accepts_uuid_and_rejects_garbage() {
        let id = UserId::new();
        assert_eq!(UserId::parse_token(id.as_str()), Some(id));
        assert!(UserId::parse_token("not-a-uuid").is_none());
        assert!(UserId::parse_token("").is_none());
    }
}

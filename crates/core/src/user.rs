//! User account types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user as persisted, including the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique username (primary identity)
    pub username: String,

    /// Unique email address
    pub email: String,

    /// Salted hash of the password; never leaves the backend
    pub password_hash: String,

    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The public projection of this account.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            username: self.username.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

/// The user shape returned over the wire — no credential material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_omits_password_hash() {
        let user = User {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "deadbeef".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user.profile()).unwrap();
        assert!(json.contains("alice"));
        assert!(!json.contains("deadbeef"));
    }
}

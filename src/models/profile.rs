// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Profile model: the application's projection of an identity-provider user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

/// Profile row, keyed by the identity provider's user ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Profile {
    pub id: Uuid,
    /// Normalized (trimmed, lower-case) email
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Name to show next to the avatar: full name, else email.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// User as reported by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Normalize an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let now = Utc::now();
        let mut profile = Profile {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            full_name: Some("  ".to_string()),
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(profile.display_name(), "ada@example.com");

        profile.full_name = Some("Ada Lovelace".to_string());
        assert_eq!(profile.display_name(), "Ada Lovelace");
    }
}

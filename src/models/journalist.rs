//! Journalist model
//!
//! Journalists are the newsroom roster. A journalist may be linked to a login
//! account on the auth platform through `auth_user_id`; the link is how a
//! signed-in caller is resolved to a role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Journalist entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journalist {
    pub id: String,
    pub name: String,
    /// Unique case-insensitively when present
    pub email: Option<String>,
    pub role: JournalistRole,
    pub department: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub status: JournalistStatus,
    /// Linked auth account
    pub auth_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Journalist {
    pub fn is_editor_in_chief(&self) -> bool {
        self.role == JournalistRole::EditorInChief
    }
}

/// Newsroom role.
///
/// Stored and serialized with the display spelling ("Editor in Chief"). The
/// privileged operations (inviting, creating accounts, and optionally
/// publishing) compare against [`JournalistRole::EditorInChief`] and nothing
/// else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JournalistRole {
    #[default]
    Contributor,
    Editor,
    EditorInChief,
}

impl JournalistRole {
    pub const ALL: [JournalistRole; 3] = [Self::EditorInChief, Self::Editor, Self::Contributor];

    pub fn as_str(&self) -> &'static str {
        match self {
            JournalistRole::Contributor => "Contributor",
            JournalistRole::Editor => "Editor",
            JournalistRole::EditorInChief => "Editor in Chief",
        }
    }

    /// Role for text read back from storage. Anything but an exact role
    /// spelling is treated as Contributor, so it never grants privileges.
    pub fn from_stored(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for JournalistRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JournalistRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Contributor" => Ok(JournalistRole::Contributor),
            "Editor" => Ok(JournalistRole::Editor),
            "Editor in Chief" | "Editor-in-Chief" => Ok(JournalistRole::EditorInChief),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}

impl Serialize for JournalistRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JournalistRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Roster status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JournalistStatus {
    #[default]
    Active,
    #[serde(rename = "On Leave")]
    OnLeave,
    Inactive,
}

impl JournalistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalistStatus::Active => "Active",
            JournalistStatus::OnLeave => "On Leave",
            JournalistStatus::Inactive => "Inactive",
        }
    }
}

impl fmt::Display for JournalistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JournalistStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
        match key.as_str() {
            "active" => Ok(JournalistStatus::Active),
            "on leave" | "onleave" => Ok(JournalistStatus::OnLeave),
            "inactive" => Ok(JournalistStatus::Inactive),
            _ => Err(anyhow::anyhow!("Invalid journalist status: {}", s)),
        }
    }
}

/// Fields written when creating or upserting a journalist
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JournalistInput {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: JournalistRole,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub status: JournalistStatus,
    #[serde(default)]
    pub auth_user_id: Option<String>,
}

/// Upsert by id: overwrite the row with this id, or insert it
#[derive(Debug, Clone, Deserialize)]
pub struct JournalistUpsert {
    pub id: String,
    #[serde(flatten)]
    pub fields: JournalistInput,
}

//! Contact form submissions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subjects offered on the public contact form
pub const SUBJECT_TYPES: &[&str] = &["News Tip", "General Inquiry", "Advertising"];

/// A message sent through the public contact form. Missing fields
/// deserialize as empty so validation can name them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactSubmission {
    pub full_name: String,
    pub email: String,
    pub subject_type: String,
    pub message: String,
}

/// A stored submission
#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub subject_type: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

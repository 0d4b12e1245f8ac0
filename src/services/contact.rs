//! Contact form service

use anyhow::Context;
use std::sync::Arc;
use thiserror::Error;

use crate::db::repositories::ContactRepository;
use crate::models::{Contact, ContactSubmission, SUBJECT_TYPES};

const MAX_MESSAGE_LEN: usize = 5000;

#[derive(Debug, Error)]
pub enum ContactServiceError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ContactService {
    repo: Arc<dyn ContactRepository>,
}

impl ContactService {
    pub fn new(repo: Arc<dyn ContactRepository>) -> Self {
        Self { repo }
    }

    /// Validate and store a public contact form submission
    pub async fn submit(&self, form: ContactSubmission) -> Result<Contact, ContactServiceError> {
        let form = ContactSubmission {
            full_name: form.full_name.trim().to_string(),
            email: form.email.trim().to_string(),
            subject_type: form.subject_type.trim().to_string(),
            message: form.message.trim().to_string(),
        };
        validate(&form)?;

        let contact = self
            .repo
            .insert(&form)
            .await
            .context("Failed to store contact submission")?;
        tracing::info!("Contact submission {} received ({})", contact.id, contact.subject_type);
        Ok(contact)
    }

    pub async fn count(&self) -> Result<i64, ContactServiceError> {
        Ok(self
            .repo
            .count()
            .await
            .context("Failed to count contact submissions")?)
    }
}

fn validate(form: &ContactSubmission) -> Result<(), ContactServiceError> {
    let invalid = |msg: &str| Err(ContactServiceError::ValidationError(msg.to_string()));

    if form.full_name.is_empty() {
        return invalid("Full name is required");
    }
    let well_formed = form
        .email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        return invalid("A valid email address is required");
    }
    if !SUBJECT_TYPES.contains(&form.subject_type.as_str()) {
        return invalid("Unknown subject type");
    }
    if form.message.is_empty() {
        return invalid("Message is required");
    }
    if form.message.chars().count() > MAX_MESSAGE_LEN {
        return invalid("Message is too long");
    }
    Ok(())
}

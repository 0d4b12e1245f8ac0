//! Data models
//!
//! Entities stored by the newsroom (articles, journalists, media, contact
//! submissions, site settings) plus the input types the API accepts.

mod article;
mod contact;
mod journalist;
mod media;
mod setting;

pub use article::{
    category_badge_class, is_known_category, published_at_on_save, published_at_on_transition,
    Article, ArticleCounts, ArticlePatch, ArticleStatus, AuthorRef, SaveArticleInput, CATEGORIES,
};
pub use contact::{Contact, ContactSubmission, SUBJECT_TYPES};
pub use journalist::{
    Journalist, JournalistInput, JournalistRole, JournalistStatus, JournalistUpsert,
};
pub use media::{MediaItem, NewMediaItem};
pub use setting::{GeneralSettings, SiteSetting, GENERAL_SETTINGS_KEY};

use serde::{Deserialize, Deserializer};

/// Deserialize a field that distinguishes "absent" (`None`, via
/// `#[serde(default)]`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories or platform
//! clients. They own validation, authorization rules and the article
//! publication state.

pub mod analytics;
pub mod article;
pub mod contact;
pub mod invite;
pub mod journalist;
pub mod media;
pub mod rate_limiter;
pub mod relative_time;
pub mod session;
pub mod settings;

pub use analytics::{Analytics, AnalyticsService, CategoryShare, Dashboard, DayBucket};
pub use article::{slugify, ArticleService, ArticleServiceError};
pub use contact::{ContactService, ContactServiceError};
pub use invite::{InviteError, InviteOutcome, InviteRequest, InviteService};
pub use journalist::{AccountInput, JournalistService, JournalistServiceError};
pub use media::{MediaService, MediaServiceError, UploadedFile};
pub use rate_limiter::{LoginRateLimiter, RateLimited};
pub use relative_time::format_relative_time;
pub use session::{AdminSession, MemorySessionStore, SessionEvent, SessionStore};
pub use settings::{SettingsService, SettingsServiceError};

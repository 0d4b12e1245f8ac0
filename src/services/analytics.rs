//! Dashboard and analytics aggregation
//!
//! Everything here is computed on request from exact counts and the most
//! recent published articles; nothing is cached or precomputed.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::repositories::{ArticleRepository, ContactRepository, JournalistRepository};
use crate::models::{Article, ArticleCounts, ArticleStatus};

/// Number of daily buckets in the publishing trend
pub const TREND_DAYS: i64 = 14;
/// Published articles sampled for the trend and category breakdown
pub const ANALYTICS_SAMPLE: i64 = 200;
/// Recent articles shown on the dashboard
pub const DASHBOARD_RECENT: i64 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Short label such as "Oct 19"
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryShare {
    pub category: String,
    pub count: i64,
    /// Rounded percentage of the sampled articles
    pub pct: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub counts: ArticleCounts,
    pub recent: Vec<Article>,
    pub latest_published: Option<Article>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub counts: ArticleCounts,
    pub contacts: i64,
    pub journalists: i64,
    pub daily: Vec<DayBucket>,
    pub categories: Vec<CategoryShare>,
}

/// Publication counts for `today` (UTC) and the 13 days before it, oldest
/// first, matched on the UTC calendar day of `published_at`.
pub fn daily_buckets(articles: &[Article], today: NaiveDate) -> Vec<DayBucket> {
    let mut per_day: HashMap<NaiveDate, i64> = HashMap::new();
    for published_at in articles.iter().filter_map(|a| a.published_at) {
        *per_day.entry(published_at.date_naive()).or_default() += 1;
    }

    (0..TREND_DAYS)
        .rev()
        .map(|back| today - Duration::days(back))
        .map(|day| DayBucket {
            date: day.format("%Y-%m-%d").to_string(),
            label: day.format("%b %-d").to_string(),
            count: per_day.get(&day).copied().unwrap_or(0),
        })
        .collect()
}

/// Articles per category, most frequent first; equal counts keep the order
/// in which each category first appears.
pub fn category_breakdown(articles: &[Article]) -> Vec<CategoryShare> {
    let total = articles.len() as i64;
    let mut shares: Vec<CategoryShare> = Vec::new();
    for article in articles {
        match shares.iter_mut().find(|s| s.category == article.category) {
            Some(share) => share.count += 1,
            None => shares.push(CategoryShare {
                category: article.category.clone(),
                count: 1,
                pct: 0,
            }),
        }
    }
    for share in &mut shares {
        share.pct = if total == 0 {
            0
        } else {
            ((share.count as f64 / total as f64) * 100.0).round() as i64
        };
    }
    // sort_by is stable, so ties stay in first-seen order
    shares.sort_by(|a, b| b.count.cmp(&a.count));
    shares
}

pub struct AnalyticsService {
    articles: Arc<dyn ArticleRepository>,
    journalists: Arc<dyn JournalistRepository>,
    contacts: Arc<dyn ContactRepository>,
}

impl AnalyticsService {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        journalists: Arc<dyn JournalistRepository>,
        contacts: Arc<dyn ContactRepository>,
    ) -> Self {
        Self {
            articles,
            journalists,
            contacts,
        }
    }

    async fn counts(&self) -> Result<ArticleCounts> {
        let (draft, pending, published) = futures::try_join!(
            self.articles.count_by_status(ArticleStatus::Draft),
            self.articles.count_by_status(ArticleStatus::Pending),
            self.articles.count_by_status(ArticleStatus::Published),
        )?;
        Ok(ArticleCounts {
            draft,
            pending,
            published,
        })
    }

    pub async fn dashboard(&self) -> Result<Dashboard> {
        let (counts, recent, latest_published) = futures::try_join!(
            self.counts(),
            self.articles.list_recent(DASHBOARD_RECENT),
            self.articles.latest_published(),
        )
        .context("Failed to load dashboard")?;
        Ok(Dashboard {
            counts,
            recent,
            latest_published,
        })
    }

    pub async fn analytics(&self, now: DateTime<Utc>) -> Result<Analytics> {
        let (counts, contacts, journalists, sample) = futures::try_join!(
            self.counts(),
            self.contacts.count(),
            self.journalists.count(),
            self.articles.list_published(None, ANALYTICS_SAMPLE),
        )
        .context("Failed to load analytics")?;

        Ok(Analytics {
            counts,
            contacts,
            journalists,
            daily: daily_buckets(&sample, now.date_naive()),
            categories: category_breakdown(&sample),
        })
    }
}

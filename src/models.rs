use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use url::Url;

/// A post URL found in the sitemap, plus whatever the sitemap itself tells us about it.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub url: Url,
    pub title: String, // derived from the slug until the page is scraped
    pub lastmod: Option<String>,
    pub featured_image: Option<Url>,
}

/// Everything the generator needs to know about the chosen post.
#[derive(Debug, Clone)]
pub struct PostContent {
    pub url: Url,
    pub title: String,
    pub description: String,
    pub excerpt: String,
    pub featured_image: Option<Url>,
    pub lastmod: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweetStatus {
    Success,
    Failed,
    /// The publish call timed out; the post may or may not be live.
    Unconfirmed,
}

impl TweetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TweetStatus::Success => "success",
            TweetStatus::Failed => "failed",
            TweetStatus::Unconfirmed => "unconfirmed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(TweetStatus::Success),
            "failed" => Ok(TweetStatus::Failed),
            "unconfirmed" => Ok(TweetStatus::Unconfirmed),
            other => Err(anyhow!("Unknown tweet status `{}`", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TweetRecord {
    pub post_url: String,
    pub post_title: String,
    pub tweet_text: String,
    pub tweet_id: Option<String>,
    pub tweeted_at: DateTime<Utc>,
    pub style_params: Option<String>, // JSON
    pub status: TweetStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailySchedule {
    pub date: NaiveDate,
    pub slot_index: usize,
    pub hour: u32,
    pub minute: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_posts_tweeted: i64,
    pub total_tweets_sent: i64,
    pub tweets_last_7_days: i64,
    pub failed_attempts: i64,
    pub unconfirmed_attempts: i64,
    pub last_published: Vec<(String, DateTime<Utc>)>,
}

/// Fixed-width UTC timestamps, so SQLite string comparison matches time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .map_err(|e| anyhow!("Failed to parse timestamp `{}`: {}", s, e))?;
    Ok(parsed.with_timezone(&Utc))
}

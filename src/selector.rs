use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use rand::Rng;

use crate::error::RunError;
use crate::models::SitemapEntry;

/// Posts never published, or last published before `now - cooldown_days`.
pub fn eligible_posts<'a>(
    posts: &'a [SitemapEntry],
    last_tweeted: &HashMap<String, DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown_days: u32,
) -> Vec<&'a SitemapEntry> {
    // A cooldown reaching past the calendar's start covers every recorded date.
    let cutoff = Duration::try_days(i64::from(cooldown_days)).and_then(|d| now.checked_sub_signed(d));

    posts
        .iter()
        .filter(|post| match (last_tweeted.get(post.url.as_str()), cutoff) {
            (Some(last), Some(cutoff)) => *last < cutoff,
            (Some(_), None) => false,
            (None, _) => true,
        })
        .collect()
}

pub fn select_post<'a, R: Rng + ?Sized>(
    posts: &'a [SitemapEntry],
    last_tweeted: &HashMap<String, DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown_days: u32,
    rng: &mut R,
) -> Result<&'a SitemapEntry, RunError> {
    let eligible = eligible_posts(posts, last_tweeted, now, cooldown_days);
    info!(
        "Found {} eligible posts out of {} total (cooldown: {} days)",
        eligible.len(),
        posts.len(),
        cooldown_days
    );

    if eligible.is_empty() {
        return Err(RunError::NoEligiblePosts { cooldown_days });
    }

    let chosen = eligible[rng.random_range(0..eligible.len())];
    debug!("Selected {}", chosen.url);
    Ok(chosen)
}

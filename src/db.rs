use rusqlite::OptionalExtension;
use std::collections::HashMap;
use std::path::Path;

use crate::models::{
    DailySchedule, StoreStats, TweetRecord, TweetStatus, format_timestamp, parse_timestamp,
};

use anyhow::{Context, Result};
use log::debug;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{Connection, params};

const SCHEMA_SQL: &str = include_str!("../schema.sql");

// Rows that may be live on the timeline. Failed attempts never count.
const PUBLISHED_STATUSES: &str = "('success', 'unconfirmed')";

pub struct Db {
    conn: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub tweets_deleted: usize,
    pub schedules_deleted: usize,
}

impl Db {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DB at {}", path.display()))?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory DB")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL).context("Failed to initialize schema")?;
        Ok(Db { conn })
    }

    /// Append one publishing attempt. Rows are never updated afterwards.
    pub fn log_tweet(&self, record: &TweetRecord) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO tweet_history (
                    post_url, post_title, tweet_text, tweet_id, tweeted_at, style_params, status, error_message
                ) VALUES (
                    ?, ?, ?, ?, ?, ?, ?, ?
                )",
                params![
                    &record.post_url,
                    &record.post_title,
                    &record.tweet_text,
                    &record.tweet_id,
                    format_timestamp(&record.tweeted_at),
                    &record.style_params,
                    record.status.as_str(),
                    &record.error_message,
                ],
            )
            .context("Failed to insert into tweet_history")?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent publication per post URL.
    pub fn last_tweeted_at(&self) -> Result<HashMap<String, DateTime<Utc>>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT post_url, MAX(tweeted_at) FROM tweet_history
             WHERE status IN {PUBLISHED_STATUSES}
             GROUP BY post_url"
        ))?;

        let iter = stmt.query_and_then([], |row| {
            let url: String = row.get(0)?;
            let ts = parse_timestamp(&row.get::<_, String>(1)?)?;
            Ok((url, ts))
        })?;

        iter.collect::<Result<HashMap<_, _>>>()
    }

    /// The last `limit` messages published for a post, newest first.
    pub fn previous_tweets(&self, post_url: &str, limit: usize) -> Result<Vec<TweetRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT post_url, post_title, tweet_text, tweet_id, tweeted_at, style_params, status, error_message
             FROM tweet_history
             WHERE post_url = ? AND status IN {PUBLISHED_STATUSES}
             ORDER BY tweeted_at DESC, id DESC
             LIMIT ?"
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let iter = stmt.query_and_then(params![post_url, limit], |row| {
            Ok(TweetRecord {
                post_url: row.get(0)?,
                post_title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                tweet_text: row.get(2)?,
                tweet_id: row.get(3)?,
                tweeted_at: parse_timestamp(&row.get::<_, String>(4)?)?,
                style_params: row.get(5)?,
                status: TweetStatus::parse(&row.get::<_, String>(6)?)?,
                error_message: row.get(7)?,
            })
        })?;

        iter.collect::<Result<Vec<_>>>()
    }

    pub fn get_schedule(&self, date: NaiveDate) -> Result<Option<DailySchedule>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, slot_index, hour, minute, created_at FROM daily_schedule WHERE date = ?",
        )?;

        let raw = stmt
            .query_row([date.format("%Y-%m-%d").to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .optional()?;

        let Some((date, slot_index, hour, minute, created_at)) = raw else { return Ok(None) };

        Ok(Some(DailySchedule {
            date: date
                .parse()
                .with_context(|| format!("Invalid schedule date `{}`", date))?,
            slot_index: slot_index as usize,
            hour: hour as u32,
            minute: minute as u32,
            created_at: parse_timestamp(&created_at)?,
        }))
    }

    /// Write the day's slot unless one already exists, then return whatever is stored.
    pub fn insert_schedule_if_absent(&self, schedule: &DailySchedule) -> Result<DailySchedule> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO daily_schedule (date, slot_index, hour, minute, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    schedule.date.format("%Y-%m-%d").to_string(),
                    schedule.slot_index as i64,
                    schedule.hour as i64,
                    schedule.minute as i64,
                    format_timestamp(&schedule.created_at),
                ],
            )
            .context("Failed to insert into daily_schedule")?;

        if inserted == 0 {
            debug!("Schedule for {} already present, keeping it", schedule.date);
        }

        self.get_schedule(schedule.date)?
            .context("Schedule row missing right after insert")
    }

    pub fn stats(&self, now: DateTime<Utc>) -> Result<StoreStats> {
        let count = |sql: &str, args: &[&dyn rusqlite::ToSql]| -> Result<i64> {
            Ok(self.conn.query_row(sql, args, |row| row.get(0))?)
        };

        let week_ago = format_timestamp(&(now - Duration::days(7)));

        let mut stmt = self.conn.prepare(
            "SELECT post_url, MAX(tweeted_at) AS last FROM tweet_history
             WHERE status = 'success'
             GROUP BY post_url
             ORDER BY last DESC",
        )?;
        let last_published = stmt
            .query_and_then([], |row| {
                let url: String = row.get(0)?;
                let ts = parse_timestamp(&row.get::<_, String>(1)?)?;
                Ok((url, ts))
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(StoreStats {
            total_posts_tweeted: count(
                "SELECT COUNT(DISTINCT post_url) FROM tweet_history WHERE status = 'success'",
                &[],
            )?,
            total_tweets_sent: count(
                "SELECT COUNT(*) FROM tweet_history WHERE status = 'success'",
                &[],
            )?,
            tweets_last_7_days: count(
                "SELECT COUNT(*) FROM tweet_history WHERE status = 'success' AND tweeted_at >= ?",
                &[&week_ago],
            )?,
            failed_attempts: count(
                "SELECT COUNT(*) FROM tweet_history WHERE status = 'failed'",
                &[],
            )?,
            unconfirmed_attempts: count(
                "SELECT COUNT(*) FROM tweet_history WHERE status = 'unconfirmed'",
                &[],
            )?,
            last_published,
        })
    }

    /// Delete history older than `days` days, and schedule rows for dates before the cutoff day.
    pub fn cleanup_old_data(&mut self, days: u32, now: DateTime<Utc>) -> Result<CleanupReport> {
        let Some(cutoff) = Duration::try_days(i64::from(days)).and_then(|d| now.checked_sub_signed(d))
        else {
            debug!("Cleanup cutoff of {} days predates any storable time, nothing to delete", days);
            return Ok(CleanupReport {
                tweets_deleted: 0,
                schedules_deleted: 0,
            });
        };
        let tx = self.conn.transaction()?;

        let tweets_deleted = tx
            .execute(
                "DELETE FROM tweet_history WHERE tweeted_at < ?",
                [format_timestamp(&cutoff)],
            )
            .context("Failed to prune tweet_history")?;

        let schedules_deleted = tx
            .execute(
                "DELETE FROM daily_schedule WHERE date < ?",
                [cutoff.date_naive().format("%Y-%m-%d").to_string()],
            )
            .context("Failed to prune daily_schedule")?;

        tx.commit().context("Failed to commit cleanup")?;

        Ok(CleanupReport {
            tweets_deleted,
            schedules_deleted,
        })
    }
}

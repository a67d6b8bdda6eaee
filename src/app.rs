use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use tokio::time::Duration;
use url::Url;

use crate::config::Config;
use crate::db::Db;
use crate::delay::delay_then_now;
use crate::error::{PublishError, RunError};
use crate::extractor::fetch_post_content;
use crate::generator::{BlogContext, OpenAiGenerator, TextGenerator, generate_message, select_history};
use crate::logger::init_logger;
use crate::models::{PostContent, SitemapEntry, StoreStats, TweetRecord, TweetStatus};
use crate::notifier::{Event, Notifier};
use crate::publisher::{Publisher, TwitterPublisher};
use crate::scheduler::{self, ScheduleDecision};
use crate::selector::select_post;
use crate::sitemap::fetch_posts;
use crate::style::StyleParams;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const STATS_RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub test_mode: bool,
    pub force: bool,
    pub stats: bool,
    pub cleanup_days: Option<u32>,
    pub init_config: bool,
}

/// Where candidate posts and their page content come from.
#[allow(async_fn_in_trait)]
pub trait ContentSource {
    async fn discover(&self) -> Result<Vec<SitemapEntry>, RunError>;
    async fn fetch(&self, entry: &SitemapEntry) -> Result<PostContent, RunError>;
}

pub struct WebSource {
    http: Client,
    sitemap_url: Url,
}

impl WebSource {
    pub fn new(http: Client, sitemap_url: Url) -> Self {
        WebSource { http, sitemap_url }
    }
}

impl ContentSource for WebSource {
    async fn discover(&self) -> Result<Vec<SitemapEntry>, RunError> {
        fetch_posts(&self.http, &self.sitemap_url).await
    }

    async fn fetch(&self, entry: &SitemapEntry) -> Result<PostContent, RunError> {
        fetch_post_content(&self.http, entry).await
    }
}

pub struct RunContext<'a> {
    pub db: &'a Db,
    pub notifier: &'a Notifier,
    pub blog: BlogContext,
    pub cooldown_days: u32,
    pub history_depth: usize,
    pub test_mode: bool,
}

#[derive(Debug, PartialEq)]
pub enum RunOutcome {
    Published {
        post_url: String,
        tweet_id: String,
        text: String,
    },
    /// Test mode: generated but neither published nor recorded.
    DryRun { post_url: String, text: String },
    NothingEligible,
}

pub async fn run(opts: RunOptions) -> Result<()> {
    // 0) Logger
    init_logger()?;

    // 1) Config
    if opts.init_config {
        let outcome = Config::ensure_user_config()?;
        if outcome.created {
            println!("Config file created at {}. Edit it and run again.", outcome.path.display());
        } else {
            println!("Config file already exists at {}", outcome.path.display());
        }
        return Ok(());
    }

    let cfg = Config::load()?;
    debug!("Config loaded, store at {}", cfg.cache_db_path.display());

    // 2) Store
    let mut db = Db::open(&cfg.cache_db_path)?;
    let now = Utc::now();

    if opts.stats {
        let stats = db.stats(now)?;
        print!("{}", format_stats(&stats));
        return Ok(());
    }

    if let Some(days) = opts.cleanup_days {
        let report = db.cleanup_old_data(days, now)?;
        info!(
            "Cleanup removed {} tweet records and {} schedule rows older than {} days",
            report.tweets_deleted, report.schedules_deleted, days
        );
        println!(
            "🧹 Removed {} tweet records and {} schedule entries older than {} days",
            report.tweets_deleted, report.schedules_deleted, days
        );
        return Ok(());
    }

    let mut rng = StdRng::from_os_rng();

    // 3) Today's slot
    let decision = scheduler::check(&db, now, opts.force, &mut rng)?;
    let slot = decision.schedule();
    if !decision.should_run() {
        info!(
            "Not scheduled time: slot is {:02}:{:02} UTC, now {}",
            slot.hour,
            slot.minute,
            now.format("%H:%M")
        );
        println!(
            "⏰ Not scheduled time. Today's slot is {:02}:{:02} UTC (now {} UTC). Skipping.",
            slot.hour,
            slot.minute,
            now.format("%H:%M")
        );
        return Ok(());
    }
    if matches!(decision, ScheduleDecision::Forced(_)) {
        info!("Forced run, ignoring today's slot {:02}:{:02} UTC", slot.hour, slot.minute);
    } else {
        info!("Scheduled slot {:02}:{:02} UTC matched", slot.hour, slot.minute);
    }

    // 4) Required keys, then the optional pre-publish pause
    cfg.validate_required(opts.test_mode)?;

    let publish_at = if opts.test_mode {
        Utc::now()
    } else {
        delay_then_now(cfg.enable_delay, &mut rng, Utc::now).await
    };

    // 5) Collaborators
    let http = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;
    debug!("HTTP client created");

    let sitemap_url = Url::parse(&cfg.sitemap_url)
        .with_context(|| format!("Invalid sitemap URL {}", cfg.sitemap_url))?;
    let source = WebSource::new(http.clone(), sitemap_url);

    let api_key = cfg
        .openai_api_key
        .as_deref()
        .context("OPENAI_API_KEY is not set")?;
    let generator = OpenAiGenerator::new(api_key, &cfg.openai_model);

    // Test mode never reaches the publisher, so an empty token is fine there.
    let publisher = TwitterPublisher::new(
        http.clone(),
        cfg.twitter_access_token.as_deref().unwrap_or_default(),
    );

    let notifier = Notifier::from_config(http, &cfg);

    let ctx = RunContext {
        db: &db,
        notifier: &notifier,
        blog: BlogContext {
            title: cfg.blog_title.clone(),
            description: cfg.blog_description.clone(),
        },
        cooldown_days: cfg.cooldown_days,
        history_depth: cfg.max_previous_tweets,
        test_mode: opts.test_mode,
    };

    // 6) Pipeline
    match run_pipeline(&ctx, &source, &generator, &publisher, &mut rng, publish_at).await {
        Ok(RunOutcome::Published { post_url, tweet_id, text }) => {
            println!("✅ Tweet posted for {} (id {}):\n{}", post_url, tweet_id, text);
            Ok(())
        }
        Ok(RunOutcome::DryRun { post_url, text }) => {
            println!("🧪 Test mode, not posting. Generated for {}:\n{}", post_url, text);
            Ok(())
        }
        Ok(RunOutcome::NothingEligible) => {
            println!(
                "No eligible posts found. Everything was tweeted within the last {} days.",
                cfg.cooldown_days
            );
            Ok(())
        }
        Err(e) if !e.is_fatal() => {
            info!("{}", e);
            println!("{}", e);
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            Err(e.into())
        }
    }
}

/// discover → select → extract → generate → publish → record → notify
pub async fn run_pipeline<S, G, P, R>(
    ctx: &RunContext<'_>,
    source: &S,
    generator: &G,
    publisher: &P,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<RunOutcome, RunError>
where
    S: ContentSource,
    G: TextGenerator,
    P: Publisher,
    R: Rng + ?Sized,
{
    let posts = match source.discover().await {
        Ok(posts) => posts,
        Err(e) => return Err(notify_failure(ctx, e, None).await),
    };
    info!("Discovered {} posts", posts.len());

    let last_tweeted = ctx.db.last_tweeted_at().map_err(RunError::Storage)?;

    let entry = match select_post(&posts, &last_tweeted, now, ctx.cooldown_days, rng) {
        Ok(entry) => entry,
        Err(RunError::NoEligiblePosts { cooldown_days }) => {
            info!("No eligible posts within the {} day cooldown, nothing to do", cooldown_days);
            return Ok(RunOutcome::NothingEligible);
        }
        Err(e) => return Err(e),
    };
    let post_url = entry.url.to_string();

    let content = match source.fetch(entry).await {
        Ok(content) => content,
        Err(e) => return Err(notify_failure(ctx, e, Some(&post_url)).await),
    };

    let records = ctx
        .db
        .previous_tweets(&post_url, ctx.history_depth)
        .map_err(RunError::Storage)?;
    let previous = select_history(&records, ctx.history_depth);
    debug!("{} previous messages for {}", previous.len(), post_url);

    let style = StyleParams::random(rng);
    debug!("Style: {}", style.to_json());

    let text = match generate_message(generator, &ctx.blog, &content, &style, &previous).await {
        Ok(text) => text,
        Err(e) => return Err(notify_failure(ctx, e, Some(&post_url)).await),
    };

    if ctx.test_mode {
        info!("Test mode, skipping publish for {}", post_url);
        return Ok(RunOutcome::DryRun { post_url, text });
    }

    let published = publisher.publish(&text, content.featured_image.as_ref()).await;

    let mut record = TweetRecord {
        post_url: post_url.clone(),
        post_title: content.title.clone(),
        tweet_text: text.clone(),
        tweet_id: None,
        tweeted_at: now,
        style_params: Some(style.to_json()),
        status: TweetStatus::Success,
        error_message: None,
    };

    match published {
        Ok(tweet_id) => {
            record.tweet_id = Some(tweet_id.clone());
            ctx.db.log_tweet(&record).map_err(RunError::Storage)?;
            info!("Recorded tweet {} for {}", tweet_id, post_url);

            ctx.notifier
                .notify(&Event::Posted {
                    text: &text,
                    post_url: &post_url,
                    tweet_id: Some(&tweet_id),
                })
                .await;

            Ok(RunOutcome::Published { post_url, tweet_id, text })
        }
        Err(e) => {
            record.status = match e {
                PublishError::Failed(_) => TweetStatus::Failed,
                PublishError::Unconfirmed(_) => TweetStatus::Unconfirmed,
            };
            record.error_message = Some(e.to_string());
            ctx.db.log_tweet(&record).map_err(RunError::Storage)?;
            warn!("Recorded {} attempt for {}: {}", record.status.as_str(), post_url, e);

            Err(notify_failure(ctx, RunError::Publish(e), Some(&post_url)).await)
        }
    }
}

async fn notify_failure(ctx: &RunContext<'_>, err: RunError, post_url: Option<&str>) -> RunError {
    let message = err.to_string();
    ctx.notifier
        .notify(&Event::Failed {
            error: &message,
            post_url,
        })
        .await;
    err
}

pub fn format_stats(stats: &StoreStats) -> String {
    let mut out = String::new();
    out.push_str("📊 Tweet Statistics\n");
    out.push_str(&format!("Total posts tweeted: {}\n", stats.total_posts_tweeted));
    out.push_str(&format!("Total tweets sent: {}\n", stats.total_tweets_sent));
    out.push_str(&format!("Tweets in last 7 days: {}\n", stats.tweets_last_7_days));
    out.push_str(&format!("Failed attempts: {}\n", stats.failed_attempts));
    out.push_str(&format!("Unconfirmed attempts: {}\n", stats.unconfirmed_attempts));

    if !stats.last_published.is_empty() {
        out.push_str("\nMost recently tweeted posts:\n");
        for (url, at) in stats.last_published.iter().take(STATS_RECENT_LIMIT) {
            out.push_str(&format!("  {}  {}\n", at.format("%Y-%m-%d %H:%M"), url));
        }
    }

    out
}

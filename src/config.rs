use std::{
    env,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_yaml::Deserializer;

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub twitter_access_token: Option<String>,
    pub sitemap_url: String,
    pub blog_title: String,
    pub blog_description: String,
    pub cooldown_days: u32,
    pub max_previous_tweets: usize,
    pub cache_db_path: PathBuf,
    pub enable_delay: bool,
    pub ntfy_topic: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_ids: Option<Vec<String>>,
    pub email_smtp_host: Option<String>,
    pub email_username: Option<String>,
    pub email_app_password: Option<String>,
    pub email_recipients: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            openai_api_key: None,
            openai_model: "gpt-4.1-mini".to_string(),
            twitter_access_token: None,
            sitemap_url: "https://pikeandvine.com/post-sitemap.xml".to_string(),
            blog_title: "Pike & Vine".to_string(),
            blog_description: "SaaS Marketing & Growth".to_string(),
            cooldown_days: 30,
            max_previous_tweets: 3,
            cache_db_path: PathBuf::from("cache.db"),
            enable_delay: false,
            ntfy_topic: None,
            telegram_bot_token: None,
            telegram_chat_ids: None,
            email_smtp_host: None,
            email_username: None,
            email_app_password: None,
            email_recipients: None,
        }
    }
}

pub struct EnsureOutcome {
    pub path: PathBuf,
    pub created: bool,
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("Invalid value for {}: `{}` ({})", key, raw, e))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => bail!("Invalid value for {}: `{}` (expected true or false)", key, raw),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Defaults, then the YAML file if there is one, then environment variables.
    pub fn load() -> Result<Config> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix(PKG_NAME);

        let mut cfg = match xdg_dirs.find_config_file(CONFIG_FILE) {
            Some(path) => Self::from_yaml_file(&path)?,
            None => Config::default(),
        };

        cfg.apply_env(|key| env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Config> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml_str(&raw, &path.display().to_string())
    }

    pub fn from_yaml_str(raw: &str, origin: &str) -> Result<Config> {
        if raw.trim().is_empty() {
            return Ok(Config::default());
        }
        let deserialized = Deserializer::from_str(raw);
        serde_path_to_error::deserialize(deserialized).map_err(|e| {
            anyhow!("Invalid YAML in {} at `{}`: {}", origin, e.path(), e.inner())
        })
    }

    /// Override fields from environment-style `KEY=value` lookups. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.openai_model = v;
        }
        if let Some(v) = get("TWITTER_ACCESS_TOKEN") {
            self.twitter_access_token = Some(v);
        }
        if let Some(v) = get("SITEMAP_URL") {
            self.sitemap_url = v;
        }
        if let Some(v) = get("BLOG_TITLE") {
            self.blog_title = v;
        }
        if let Some(v) = get("BLOG_DESCRIPTION") {
            self.blog_description = v;
        }
        if let Some(v) = get("COOLDOWN_DAYS") {
            self.cooldown_days = parse_value("COOLDOWN_DAYS", &v)?;
        }
        if let Some(v) = get("MAX_PREVIOUS_TWEETS") {
            self.max_previous_tweets = parse_value("MAX_PREVIOUS_TWEETS", &v)?;
        }
        if let Some(v) = get("CACHE_DB_PATH") {
            self.cache_db_path = PathBuf::from(v);
        }
        if let Some(v) = get("ENABLE_DELAY") {
            self.enable_delay = parse_bool("ENABLE_DELAY", &v)?;
        }
        if let Some(v) = get("NTFY_TOPIC") {
            self.ntfy_topic = Some(v);
        }
        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram_bot_token = Some(v);
        }
        if let Some(v) = get("TELEGRAM_CHAT_IDS") {
            self.telegram_chat_ids = Some(parse_list(&v));
        }
        if let Some(v) = get("EMAIL_SMTP_HOST") {
            self.email_smtp_host = Some(v);
        }
        if let Some(v) = get("EMAIL_USERNAME") {
            self.email_username = Some(v);
        }
        if let Some(v) = get("EMAIL_APP_PASSWORD") {
            self.email_app_password = Some(v);
        }
        if let Some(v) = get("EMAIL_RECIPIENTS") {
            self.email_recipients = Some(parse_list(&v));
        }

        Ok(())
    }

    /// Keys a publishing run cannot do without. Test mode never posts, so it only needs the model key.
    pub fn validate_required(&self, test_mode: bool) -> Result<()> {
        let mut missing = Vec::new();

        if self.openai_api_key.is_none() {
            missing.push("OPENAI_API_KEY");
        }
        if !test_mode && self.twitter_access_token.is_none() {
            missing.push("TWITTER_ACCESS_TOKEN");
        }

        if !missing.is_empty() {
            bail!("Missing required environment variables: {}", missing.join(", "));
        }

        url::Url::parse(&self.sitemap_url)
            .with_context(|| format!("SITEMAP_URL is not a valid URL: {}", self.sitemap_url))?;

        Ok(())
    }

    /// Write a commented template to the XDG config dir unless a config file already exists.
    pub fn ensure_user_config() -> Result<EnsureOutcome> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix(PKG_NAME);

        if let Some(path) = xdg_dirs.find_config_file(CONFIG_FILE) {
            return Ok(EnsureOutcome {
                path,
                created: false,
            });
        }

        let config_path = xdg_dirs
            .place_config_file(CONFIG_FILE)
            .context("Cannot create configuration directory")?;
        let mut config_file = File::create(&config_path)?;

        write!(
            &mut config_file,
            r#"# {PKG_NAME} config (YAML)
# Every key is optional here; environment variables of the same name in
# UPPER_CASE override these values.

openai_api_key: "<your OpenAI API key>"
openai_model: "gpt-4.1-mini"
twitter_access_token: "<OAuth 2.0 user access token with tweet.write>"

sitemap_url: "https://example.com/post-sitemap.xml"
blog_title: "My Blog"
blog_description: "What the blog is about"

cooldown_days: 30
max_previous_tweets: 3
cache_db_path: "cache.db"
enable_delay: false

# Optional notifications
# ntfy_topic: "my-topic"
# telegram_bot_token: "<bot token>"
# telegram_chat_ids: ["123456"]
# email_smtp_host: "smtp.example.com"
# email_username: "me@example.com"
# email_app_password: "<app password>"
# email_recipients: ["me@example.com"]
"#
        )?;

        Ok(EnsureOutcome {
            path: config_path,
            created: true,
        })
    }
}

use anyhow::Result;
use log::{debug, error, info};
use reqwest::Client;

use crate::config::Config;
use crate::email::{SmtpSettings, send_email};
use crate::telegram::send_telegram_message;

const NTFY_BASE_URL: &str = "https://ntfy.sh";

pub enum Event<'a> {
    Posted {
        text: &'a str,
        post_url: &'a str,
        tweet_id: Option<&'a str>,
    },
    Failed {
        error: &'a str,
        post_url: Option<&'a str>,
    },
}

#[derive(Debug, PartialEq)]
pub struct Rendered {
    pub title: &'static str,
    pub body: String,
    pub tags: &'static str,
    pub high_priority: bool,
}

pub fn tweet_link(tweet_id: &str) -> String {
    format!("https://x.com/i/status/{}", tweet_id)
}

pub fn render(event: &Event<'_>) -> Rendered {
    match event {
        Event::Posted { text, post_url, tweet_id } => {
            let mut lines = vec![
                "🐦 Tweet Posted!".to_string(),
                String::new(),
                format!("📝 {}", text),
                String::new(),
                format!("📄 Post: {}", post_url),
            ];
            if let Some(id) = tweet_id {
                lines.push(format!("🔗 Tweet: {}", tweet_link(id)));
            }
            Rendered {
                title: "Tweet Posted!",
                body: lines.join("\n"),
                tags: "bird,blog,automation",
                high_priority: false,
            }
        }
        Event::Failed { error, post_url } => {
            let mut lines = vec![
                "⚠️ Tweet Generation Failed".to_string(),
                String::new(),
                format!("❌ {}", error),
            ];
            if let Some(url) = post_url {
                lines.push(format!("📄 Post: {}", url));
            }
            Rendered {
                title: "Tweet Generation Failed",
                body: lines.join("\n"),
                tags: "warning,blog,automation",
                high_priority: true,
            }
        }
    }
}

/// Fire-and-forget fan-out to every configured sink. Nothing here can fail a run.
pub struct Notifier {
    http: Client,
    ntfy_topic: Option<String>,
    telegram: Option<(String, Vec<String>)>,
    email: Option<(String, String, String, Vec<String>)>,
}

impl Notifier {
    pub fn from_config(http: Client, cfg: &Config) -> Self {
        let telegram = match (&cfg.telegram_bot_token, &cfg.telegram_chat_ids) {
            (Some(token), Some(ids)) if !ids.is_empty() => Some((token.clone(), ids.clone())),
            _ => None,
        };

        let email = match (
            &cfg.email_smtp_host,
            &cfg.email_username,
            &cfg.email_app_password,
            &cfg.email_recipients,
        ) {
            (Some(host), Some(user), Some(pass), Some(rcpts)) if !rcpts.is_empty() => {
                Some((host.clone(), user.clone(), pass.clone(), rcpts.clone()))
            }
            _ => None,
        };

        Notifier {
            http,
            ntfy_topic: cfg.ntfy_topic.clone(),
            telegram,
            email,
        }
    }

    pub fn has_sinks(&self) -> bool {
        self.ntfy_topic.is_some() || self.telegram.is_some() || self.email.is_some()
    }

    /// Returns how many sinks failed.
    pub async fn notify(&self, event: &Event<'_>) -> usize {
        if !self.has_sinks() {
            debug!("No notification sinks configured, skipping notification");
            return 0;
        }

        let rendered = render(event);

        let ntfy = async {
            match &self.ntfy_topic {
                Some(topic) => self.send_ntfy(topic, &rendered).await,
                None => Ok(()),
            }
        };

        let telegram = async {
            match &self.telegram {
                Some((token, ids)) => send_telegram_message(token, ids, &rendered.body).await,
                None => Ok(()),
            }
        };

        let email = async {
            match &self.email {
                Some((host, user, pass, rcpts)) => {
                    let smtp = SmtpSettings {
                        host: host.as_str(),
                        username: user.as_str(),
                        app_password: pass.as_str(),
                    };
                    send_email(&smtp, rcpts, rendered.title, &rendered.body).await
                }
                None => Ok(()),
            }
        };

        let (ntfy_res, telegram_res, email_res) = tokio::join!(ntfy, telegram, email);

        [("ntfy", ntfy_res), ("telegram", telegram_res), ("email", email_res)]
            .into_iter()
            .filter(|(sink, res)| match res {
                Ok(_) => false,
                Err(e) => {
                    error!("❌ Failed to send {} notification: {:#}", sink, e);
                    true
                }
            })
            .count()
    }

    async fn send_ntfy(&self, topic: &str, rendered: &Rendered) -> Result<()> {
        let mut req = self
            .http
            .post(format!("{}/{}", NTFY_BASE_URL, topic))
            .header("Title", rendered.title)
            .header("Tags", rendered.tags)
            .timeout(std::time::Duration::from_secs(10))
            .body(rendered.body.clone());

        if rendered.high_priority {
            req = req.header("Priority", "high");
        }

        req.send().await?.error_for_status()?;
        info!("✅ Notification sent to ntfy.sh topic: {}", topic);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posted_event_links_the_tweet() {
        let rendered = render(&Event::Posted {
            text: "Stop underpricing",
            post_url: "https://blog.example/a/",
            tweet_id: Some("42"),
        });

        assert_eq!(rendered.title, "Tweet Posted!");
        assert!(rendered.body.contains("📝 Stop underpricing"));
        assert!(rendered.body.contains("📄 Post: https://blog.example/a/"));
        assert!(rendered.body.contains("https://x.com/i/status/42"));
        assert!(!rendered.high_priority);
    }

    #[test]
    fn failure_event_is_high_priority() {
        let rendered = render(&Event::Failed {
            error: "quota exceeded",
            post_url: None,
        });

        assert!(rendered.high_priority);
        assert!(rendered.body.contains("❌ quota exceeded"));
        assert!(!rendered.body.contains("Post:"));
    }

    #[test]
    fn incomplete_sink_config_is_ignored() {
        let mut cfg = Config::default();
        cfg.telegram_bot_token = Some("token".into());
        cfg.email_smtp_host = Some("smtp.example.com".into());

        let notifier = Notifier::from_config(Client::new(), &cfg);
        assert!(!notifier.has_sinks());
    }

    #[tokio::test]
    async fn no_sinks_means_no_failures() {
        let notifier = Notifier::from_config(Client::new(), &Config::default());
        let failures = notifier
            .notify(&Event::Failed { error: "boom", post_url: None })
            .await;
        assert_eq!(failures, 0);
    }
}

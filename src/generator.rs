use anyhow::{Context, Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
};
use log::{debug, info};
use tokio::time::Duration;

use crate::error::RunError;
use crate::models::{PostContent, TweetRecord};
use crate::style::StyleParams;
use crate::utils::{truncate_at_word, truncate_chars};

/// Hard platform limit, counted in characters.
pub const MAX_TWEET_CHARS: usize = 280;

const OPENAI_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You are a social media expert who writes engaging tweets to promote blog posts. \
You write in a natural, human voice that doesn't sound like AI-generated content.";

const QUOTE_CHARS: [char; 6] = ['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

#[derive(Debug, Clone)]
pub struct BlogContext {
    pub title: String,
    pub description: String,
}

#[allow(async_fn_in_trait)]
pub trait TextGenerator {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: &str, model: &str) -> Self {
        let openai_config = OpenAIConfig::default().with_api_key(api_key);
        OpenAiGenerator {
            client: Client::with_config(openai_config),
            model: model.to_string(),
        }
    }
}

impl TextGenerator for OpenAiGenerator {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        debug!("Building OpenAI request with model: {}", self.model);
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessage::from(system).into(),
                ChatCompletionRequestUserMessage::from(prompt).into(),
            ])
            .max_tokens(100u32)
            .temperature(0.8)
            .presence_penalty(0.6)
            .frequency_penalty(0.6)
            .build()
            .context("Failed to build OpenAI request")?;

        let start_time = std::time::Instant::now();
        let response = match tokio::time::timeout(OPENAI_TIMEOUT, self.client.chat().create(request)).await {
            Ok(Ok(response)) => {
                debug!("OpenAI API call completed in {:?}", start_time.elapsed());
                response
            }
            Ok(Err(api_error)) => return Err(anyhow!("OpenAI API error: {}", api_error)),
            Err(_) => {
                return Err(anyhow!(
                    "OpenAI API call timed out after {} seconds",
                    OPENAI_TIMEOUT.as_secs()
                ));
            }
        };

        response
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("No valid content in OpenAI response"))
    }
}

/// Texts of the newest `depth` prior messages. `records` must be newest first.
pub fn select_history(records: &[TweetRecord], depth: usize) -> Vec<String> {
    records
        .iter()
        .take(depth)
        .map(|record| record.tweet_text.clone())
        .collect()
}

pub fn build_prompt(
    blog: &BlogContext,
    post: &PostContent,
    style: &StyleParams,
    previous: &[String],
) -> String {
    let mut parts = vec![
        "Write a tweet promoting this blog post:".to_string(),
        format!("Title: {}", post.title),
    ];

    if !post.description.is_empty() {
        parts.push(format!("Description: {}", post.description));
    }
    if !post.excerpt.is_empty() {
        parts.push(format!("Excerpt: {}", post.excerpt));
    }
    if let Some(lastmod) = &post.lastmod {
        parts.push(format!("Published: {}", lastmod));
    }
    parts.push(format!("URL: {}", post.url));
    parts.push(String::new());

    parts.extend(style.instructions());

    if !previous.is_empty() {
        parts.push(String::new());
        parts.push(
            "IMPORTANT: We've previously tweeted about this post. Make sure your tweet is completely different from these previous tweets:"
                .to_string(),
        );
        for (i, text) in previous.iter().enumerate() {
            parts.push(format!("{}. {}", i + 1, text));
        }
        parts.push(String::new());
        parts.push("Your new tweet must use different wording, angle, and style than the above.".to_string());
    }

    parts.extend([
        String::new(),
        "Requirements:".to_string(),
        format!("- Must include the URL: {}", post.url),
        format!("- Maximum {} characters total", MAX_TWEET_CHARS),
        format!("- Target length: about {} characters", style.length.chars()),
        "- Natural, human voice (not AI-sounding)".to_string(),
        "- Engaging and clickable".to_string(),
        "- DO NOT refer to the post as 'latest', 'new', or 'just published' unless it's from the last 7 days".to_string(),
        "- Focus on the content value rather than recency".to_string(),
        format!("- Blog context: {} - {}", blog.title, blog.description),
        String::new(),
        "GRAMMAR RULES:".to_string(),
        "- NO Oxford commas (do not use comma before 'and' in lists)".to_string(),
        "- NO em dashes (—) - use regular hyphens (-) or avoid dashes entirely".to_string(),
    ]);

    parts.join("\n")
}

fn strip_wrapping_quotes(mut text: &str) -> &str {
    loop {
        let trimmed = text.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next_back()) {
            (Some(first), Some(last)) if QUOTE_CHARS.contains(&first) && QUOTE_CHARS.contains(&last) => {
                text = &trimmed[first.len_utf8()..trimmed.len() - last.len_utf8()];
            }
            _ => return trimmed,
        }
    }
}

fn body_with_url(body: &str, url: &str) -> String {
    let url_len = url.chars().count();
    let budget = MAX_TWEET_CHARS.saturating_sub(url_len + 1);

    let body = truncate_at_word(body.trim(), budget).trim();
    if budget == 0 || body.is_empty() {
        return truncate_chars(url, MAX_TWEET_CHARS).to_string();
    }
    format!("{} {}", body, url)
}

/// Normalize model output into a publishable message: unwrap quotes, drop em dashes,
/// make sure the post URL is present, and fit within [`MAX_TWEET_CHARS`].
pub fn clean_message(raw: &str, url: &str) -> String {
    let text = strip_wrapping_quotes(raw).replace('\u{2014}', "-");

    let text = if text.contains(url) {
        text
    } else if text.chars().count() + 1 + url.chars().count() <= MAX_TWEET_CHARS {
        if text.is_empty() { url.to_string() } else { format!("{} {}", text, url) }
    } else {
        body_with_url(&text, url)
    };

    if text.chars().count() <= MAX_TWEET_CHARS {
        return text;
    }

    // Too long with the URL inline: rebuild as trimmed body + URL at the end.
    let body = text.replace(url, " ");
    let body = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let rebuilt = body_with_url(&body, url);
    truncate_chars(&rebuilt, MAX_TWEET_CHARS).to_string()
}

/// Prompt the model and return a cleaned message for `post`.
pub async fn generate_message<G: TextGenerator>(
    generator: &G,
    blog: &BlogContext,
    post: &PostContent,
    style: &StyleParams,
    previous: &[String],
) -> Result<String, RunError> {
    let prompt = build_prompt(blog, post, style, previous);
    info!("Generating tweet for {}", post.url);
    debug!("Prompt: {}", prompt);

    let raw = generator
        .complete(SYSTEM_PROMPT, &prompt)
        .await
        .map_err(RunError::Generation)?;

    let message = clean_message(&raw, post.url.as_str());
    if message.trim() == post.url.as_str() {
        return Err(RunError::Generation(anyhow!("Model returned no usable text: {:?}", raw)));
    }

    info!("Generated tweet ({} chars): {}", message.chars().count(), message);
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{CtaStyle, EmojiStyle, LengthTarget, Tone};
    use std::sync::Mutex;
    use url::Url;

    const URL: &str = "https://blog.example/saas-pricing-tips/";

    fn blog() -> BlogContext {
        BlogContext {
            title: "Pike & Vine".to_string(),
            description: "SaaS Marketing & Growth".to_string(),
        }
    }

    fn post() -> PostContent {
        PostContent {
            url: Url::parse(URL).unwrap(),
            title: "Seven SaaS pricing tips".to_string(),
            description: "How to price a SaaS product.".to_string(),
            excerpt: "Pricing is the fastest lever.".to_string(),
            featured_image: None,
            lastmod: None,
        }
    }

    fn style() -> StyleParams {
        StyleParams {
            emoji: EmojiStyle::Minimal,
            tone: Tone::Professional,
            cta: CtaStyle::Direct,
            length: LengthTarget::Medium,
            include_hashtags: true,
        }
    }

    struct FakeModel {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl TextGenerator for FakeModel {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(|e| anyhow!(e))
        }
    }

    #[test]
    fn prompt_carries_blog_context_style_and_history() {
        let previous = vec!["first take".to_string(), "second take".to_string(), "third take".to_string()];
        let prompt = build_prompt(&blog(), &post(), &style(), &previous);

        assert!(prompt.contains("Blog context: Pike & Vine - SaaS Marketing & Growth"));
        assert!(prompt.contains("Title: Seven SaaS pricing tips"));
        assert!(prompt.contains("Description: How to price a SaaS product."));
        assert!(prompt.contains("- Use exactly 1 emoji, placed naturally"));
        assert!(prompt.contains("- Include 1-2 relevant hashtags"));
        assert!(prompt.contains("about 220 characters"));
        assert!(prompt.contains("completely different from these previous tweets"));
        assert!(prompt.contains("1. first take\n2. second take\n3. third take"));
        assert!(!prompt.contains("4. "));
    }

    #[test]
    fn prompt_without_history_has_no_dedup_section() {
        let prompt = build_prompt(&blog(), &post(), &style(), &[]);
        assert!(!prompt.contains("previously tweeted"));
    }

    #[test]
    fn history_keeps_newest_depth_texts() {
        use crate::models::TweetStatus;
        use chrono::Utc;

        let records: Vec<TweetRecord> = (1..=5)
            .map(|i| TweetRecord {
                post_url: URL.to_string(),
                post_title: "Pricing".to_string(),
                tweet_text: format!("take {i}"),
                tweet_id: None,
                tweeted_at: Utc::now(),
                style_params: None,
                status: TweetStatus::Success,
                error_message: None,
            })
            .collect();

        assert_eq!(select_history(&records, 3), vec!["take 1", "take 2", "take 3"]);
        assert_eq!(select_history(&records[..2], 3), vec!["take 1", "take 2"]);
        assert!(select_history(&records, 0).is_empty());
        assert!(select_history(&[], 3).is_empty());
    }

    #[test]
    fn strips_wrapping_quotes() {
        let text = format!("\"Pricing matters. {URL}\"");
        assert_eq!(clean_message(&text, URL), format!("Pricing matters. {URL}"));

        let curly = format!("\u{201C}Pricing matters. {URL}\u{201D}");
        assert_eq!(clean_message(&curly, URL), format!("Pricing matters. {URL}"));

        let inner = format!("Why \"value\" pricing wins {URL}");
        assert_eq!(clean_message(&inner, URL), inner);
    }

    #[test]
    fn appends_missing_url() {
        assert_eq!(clean_message("Pricing matters.", URL), format!("Pricing matters. {URL}"));
    }

    #[test]
    fn replaces_em_dashes() {
        let cleaned = clean_message(&format!("Price high — then prove it {URL}"), URL);
        assert!(!cleaned.contains('\u{2014}'));
    }

    #[test]
    fn output_never_exceeds_limit() {
        let long_word = "a".repeat(400);
        let cases = vec![
            "word ".repeat(100),
            format!("{} {}", "word ".repeat(100), URL),
            format!("{} {}", URL, "🚀 ".repeat(200)),
            long_word,
            String::new(),
        ];

        for raw in cases {
            let cleaned = clean_message(&raw, URL);
            assert!(cleaned.chars().count() <= MAX_TWEET_CHARS, "too long: {}", cleaned.chars().count());
            assert!(cleaned.contains(URL), "url missing in {cleaned}");
            assert_eq!(cleaned.matches(URL).count(), 1);
        }
    }

    #[test]
    fn absurd_url_is_still_capped() {
        let url = format!("https://blog.example/{}", "x".repeat(400));
        let cleaned = clean_message("hello", &url);
        assert_eq!(cleaned.chars().count(), MAX_TWEET_CHARS);
    }

    #[tokio::test]
    async fn generate_passes_prompt_and_cleans_reply() {
        let model = FakeModel {
            reply: Ok("'Stop underpricing your SaaS.'".to_string()),
            prompts: Mutex::new(vec![]),
        };
        let previous = vec!["old one".to_string()];

        let message = generate_message(&model, &blog(), &post(), &style(), &previous).await.unwrap();

        assert_eq!(message, format!("Stop underpricing your SaaS. {URL}"));
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("1. old one"));
    }

    #[tokio::test]
    async fn model_failure_is_a_generation_error() {
        let model = FakeModel {
            reply: Err("quota exceeded".to_string()),
            prompts: Mutex::new(vec![]),
        };

        let err = generate_message(&model, &blog(), &post(), &style(), &[]).await.unwrap_err();
        assert!(matches!(err, RunError::Generation(_)));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn empty_reply_is_a_generation_error() {
        let model = FakeModel {
            reply: Ok("\"\"".to_string()),
            prompts: Mutex::new(vec![]),
        };

        let err = generate_message(&model, &blog(), &post(), &style(), &[]).await.unwrap_err();
        assert!(matches!(err, RunError::Generation(_)));
    }
}

use crate::error::RunError;
use crate::models::{PostContent, SitemapEntry};
use crate::utils::{clean_html_tags, truncate_chars};
use log::{debug, info};
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

const EXCERPT_MAX_CHARS: usize = 300;

const TITLE_SELECTORS: [&str; 4] = ["h1.entry-title", "h1.post-title", "h1", "title"];

const EXCERPT_SELECTORS: [&str; 6] = [
    ".entry-excerpt",
    ".post-excerpt",
    ".excerpt",
    ".entry-content p",
    ".post-content p",
    ".content p",
];

pub async fn fetch_post_content(client: &Client, entry: &SitemapEntry) -> Result<PostContent, RunError> {
    info!("Scraping content from {}", entry.url);

    let res = async {
        client
            .get(entry.url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
    .await
    .map_err(|e| RunError::ContentFetch {
        url: entry.url.to_string(),
        source: e.into(),
    })?;

    Ok(extract_post_content(&res, entry))
}

/// Pull title, description, excerpt and featured image out of a post page.
/// Anything missing falls back to what the sitemap knew, or to an empty string.
pub fn extract_post_content(html: &str, entry: &SitemapEntry) -> PostContent {
    let document = Html::parse_document(html);

    let title = first_text(&document, &TITLE_SELECTORS)
        .unwrap_or_else(|| entry.title.clone());

    let description = meta_content(&document, "meta[name=\"description\"]")
        .or_else(|| meta_content(&document, "meta[property=\"og:description\"]"))
        .map(|d| clean_html_tags(&d))
        .unwrap_or_default();

    let excerpt = first_text(&document, &EXCERPT_SELECTORS)
        .map(|e| truncate_excerpt(&e))
        .unwrap_or_default();

    let featured_image = entry.featured_image.clone().or_else(|| {
        meta_content(&document, "meta[property=\"og:image\"]")
            .and_then(|src| entry.url.join(&src).ok())
    });

    debug!(
        "Extracted title={:?} description={} chars excerpt={} chars image={:?}",
        title,
        description.chars().count(),
        excerpt.chars().count(),
        featured_image.as_ref().map(Url::as_str)
    );

    PostContent {
        url: entry.url.clone(),
        title,
        description,
        excerpt,
        featured_image,
        lastmod: entry.lastmod.clone(),
    }
}

fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let selector = Selector::parse(raw).unwrap();
        if let Some(elem) = document.select(&selector).next() {
            let text = clean_html_tags(&elem.text().collect::<Vec<_>>().join(" "));
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn meta_content(document: &Html, raw_selector: &str) -> Option<String> {
    let selector = Selector::parse(raw_selector).unwrap();
    document
        .select(&selector)
        .filter_map(|tag| tag.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
}

fn truncate_excerpt(text: &str) -> String {
    if text.chars().count() > EXCERPT_MAX_CHARS {
        format!("{}...", truncate_chars(text, EXCERPT_MAX_CHARS))
    } else {
        text.to_string()
    }
}

use std::collections::HashSet;

use log::{debug, error, info};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::RunError;
use crate::models::SitemapEntry;

const EXCLUDED_PATH_PATTERNS: [&str; 11] = [
    "/wp-", "/feed", "/sitemap", "/category/", "/tag/", "/author/", "/search/", "/page/", "/privacy",
    "/terms", "/attachment/",
];

/// Fetch the sitemap and return the blog posts listed in it.
pub async fn fetch_posts(client: &Client, sitemap_url: &Url) -> Result<Vec<SitemapEntry>, RunError> {
    info!("Fetching sitemap from {}", sitemap_url);

    let body = async {
        client
            .get(sitemap_url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
    .await
    .map_err(|e| {
        error!("Failed to fetch sitemap: {:?}", e);
        RunError::NoPostsAvailable {
            reason: format!("could not fetch sitemap {}: {}", sitemap_url, e),
        }
    })?;

    let posts = parse_sitemap(&body);
    info!("Parsed {} posts from sitemap", posts.len());

    if posts.is_empty() {
        return Err(RunError::NoPostsAvailable {
            reason: format!("sitemap {} lists no blog posts", sitemap_url),
        });
    }

    Ok(posts)
}

/// Read `<url>` entries out of a sitemap document, keeping only blog posts.
pub fn parse_sitemap(xml: &str) -> Vec<SitemapEntry> {
    let document = Html::parse_document(xml);
    let url_selector = Selector::parse("url").unwrap();

    let mut seen = HashSet::new();
    let mut posts = Vec::new();

    for url_elem in document.select(&url_selector) {
        let Some(entry) = entry_from_element(url_elem) else { continue };

        if !is_blog_post_url(&entry.url) {
            debug!("Skipping non-post URL {}", entry.url);
            continue;
        }

        if seen.insert(entry.url.clone()) {
            posts.push(entry);
        }
    }

    posts
}

fn entry_from_element(url_elem: ElementRef) -> Option<SitemapEntry> {
    let mut loc = None;
    let mut lastmod = None;
    let mut image = None;

    // The HTML parser keeps namespaced tags like `image:loc` as plain local names.
    for child in url_elem.descendants().filter_map(ElementRef::wrap) {
        let text = child.text().collect::<String>().trim().to_string();
        if text.is_empty() {
            continue;
        }

        match child.value().name() {
            "loc" if loc.is_none() => loc = Some(text),
            "lastmod" if lastmod.is_none() => lastmod = Some(text),
            "image:loc" if image.is_none() => image = Some(text),
            _ => {}
        }
    }

    let url = match Url::parse(&loc?) {
        Ok(url) => url,
        Err(e) => {
            debug!("Ignoring unparsable <loc>: {}", e);
            return None;
        }
    };

    Some(SitemapEntry {
        title: title_from_slug(&url),
        featured_image: image.and_then(|i| Url::parse(&i).ok()),
        lastmod,
        url,
    })
}

pub fn is_blog_post_url(url: &Url) -> bool {
    let path = url.path().to_lowercase();

    if matches!(path.as_str(), "/" | "/blog" | "/blog/") {
        return false;
    }

    if EXCLUDED_PATH_PATTERNS.iter().any(|pattern| path.contains(pattern)) {
        return false;
    }

    !path.trim_matches('/').is_empty()
}

/// "/blog/saas-pricing_tips/" -> "Saas Pricing Tips"
pub fn title_from_slug(url: &Url) -> String {
    let path = url.path().trim_matches('/');
    let slug = path.rsplit('/').next().unwrap_or(path);

    slug.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
    <url>
        <loc>https://blog.example/</loc>
    </url>
    <url>
        <loc>https://blog.example/saas-pricing-tips/</loc>
        <lastmod>2026-09-01T10:00:00+00:00</lastmod>
        <image:image>
            <image:loc>https://blog.example/wp-content/uploads/pricing.png</image:loc>
        </image:image>
    </url>
    <url>
        <loc>https://blog.example/category/growth/</loc>
    </url>
    <url>
        <loc>https://blog.example/churn_playbook/</loc>
    </url>
    <url>
        <loc>https://blog.example/churn_playbook/</loc>
    </url>
    <url>
        <loc>https://blog.example/tag/seo/</loc>
    </url>
</urlset>"#;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn parses_posts_and_skips_archive_pages() {
        let posts = parse_sitemap(SITEMAP);

        let urls: Vec<&str> = posts.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://blog.example/saas-pricing-tips/", "https://blog.example/churn_playbook/"]
        );

        let first = &posts[0];
        assert_eq!(first.title, "Saas Pricing Tips");
        assert_eq!(first.lastmod.as_deref(), Some("2026-09-01T10:00:00+00:00"));
        assert_eq!(
            first.featured_image.as_ref().map(Url::as_str),
            Some("https://blog.example/wp-content/uploads/pricing.png")
        );

        assert_eq!(posts[1].featured_image, None);
        assert_eq!(posts[1].lastmod, None);
    }

    #[test]
    fn empty_urlset_yields_nothing() {
        assert!(parse_sitemap(r#"<urlset></urlset>"#).is_empty());
        assert!(parse_sitemap("not xml at all").is_empty());
    }

    #[test]
    fn post_url_heuristic() {
        assert!(is_blog_post_url(&url("https://blog.example/how-to-grow/")));
        assert!(is_blog_post_url(&url("https://blog.example/2026/05/how-to-grow/")));

        assert!(!is_blog_post_url(&url("https://blog.example/")));
        assert!(!is_blog_post_url(&url("https://blog.example/blog/")));
        assert!(!is_blog_post_url(&url("https://blog.example/Category/news/")));
        assert!(!is_blog_post_url(&url("https://blog.example/tag/seo/")));
        assert!(!is_blog_post_url(&url("https://blog.example/blog/page/2/")));
        assert!(!is_blog_post_url(&url("https://blog.example/author/jo/")));
        assert!(!is_blog_post_url(&url("https://blog.example/privacy-policy/")));
        assert!(!is_blog_post_url(&url("https://blog.example/wp-login.php")));
    }

    #[test]
    fn slug_titles() {
        assert_eq!(title_from_slug(&url("https://blog.example/blog/saas-pricing_tips/")), "Saas Pricing Tips");
        assert_eq!(title_from_slug(&url("https://blog.example/SEO-basics")), "Seo Basics");
        assert_eq!(title_from_slug(&url("https://blog.example/")), "");
    }
}

use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::PublishError;

const X_API_BASE: &str = "https://api.x.com";

#[allow(async_fn_in_trait)]
pub trait Publisher {
    /// Publish `text`, optionally with an image, and return the new post's id.
    async fn publish(&self, text: &str, image: Option<&Url>) -> Result<String, PublishError>;
}

pub struct TwitterPublisher {
    http: Client,
    access_token: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct TweetResponseWrapper {
    data: TweetResponse,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    data: MediaUploadData,
}

#[derive(Debug, Deserialize)]
struct MediaUploadData {
    id: String,
}

impl TwitterPublisher {
    pub fn new(http: Client, access_token: &str) -> Self {
        Self::with_api_base(http, access_token, X_API_BASE)
    }

    pub fn with_api_base(http: Client, access_token: &str, api_base: &str) -> Self {
        TwitterPublisher {
            http,
            access_token: access_token.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Download the image and upload it as tweet media. Any failure here just drops the image.
    async fn upload_image(&self, image_url: &Url) -> Option<String> {
        match self.try_upload_image(image_url).await {
            Ok(media_id) => {
                debug!("Uploaded {} as media {}", image_url, media_id);
                Some(media_id)
            }
            Err(e) => {
                warn!("Failed to upload image {}: {:#}", image_url, e);
                None
            }
        }
    }

    async fn try_upload_image(&self, image_url: &Url) -> anyhow::Result<String> {
        let resp = self.http.get(image_url.clone()).send().await?.error_for_status()?;
        let media_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or("image/jpeg")
            .to_string();
        let data = resp.bytes().await?;

        let media_category = if media_type == "image/gif" { "tweet_gif" } else { "tweet_image" };
        let part = reqwest::multipart::Part::bytes(data.to_vec()).mime_str(&media_type)?;
        let form = reqwest::multipart::Form::new()
            .text("media_category", media_category)
            .text("media_type", media_type.clone())
            .part("media", part);

        let resp = self
            .http
            .post(self.endpoint("/2/media/upload"))
            .header("Authorization", self.bearer())
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            anyhow::bail!("media upload returned {}: {}", status, text);
        }

        let wrapper: MediaUploadResponse = serde_json::from_str(&text)?;
        Ok(wrapper.data.id)
    }
}

impl Publisher for TwitterPublisher {
    async fn publish(&self, text: &str, image: Option<&Url>) -> Result<String, PublishError> {
        let media_id = match image {
            Some(url) => self.upload_image(url).await,
            None => None,
        };

        let body = tweet_body(text, media_id.as_deref());

        let resp = self
            .http
            .post(self.endpoint("/2/tweets"))
            .header("Authorization", self.bearer())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PublishError::Failed(format!("status {}: {}", status, text)));
        }

        // A 2xx means the post exists even if we can't read its id back.
        let text = resp
            .text()
            .await
            .map_err(|e| PublishError::Unconfirmed(format!("accepted with status {} but body unreadable: {}", status, e)))?;
        let wrapper: TweetResponseWrapper = serde_json::from_str(&text)
            .map_err(|e| PublishError::Unconfirmed(format!("accepted with status {} but unparsable body: {}", status, e)))?;

        info!("Successfully posted tweet: {}", wrapper.data.id);
        Ok(wrapper.data.id)
    }
}

fn tweet_body(text: &str, media_id: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({ "text": text });
    if let Some(id) = media_id {
        body["media"] = serde_json::json!({ "media_ids": [id] });
    }
    body
}

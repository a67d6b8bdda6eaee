use thiserror::Error;

/// Ways a run can end early. Only `NoEligiblePosts` is a clean exit.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("No eligible posts: every discovered post was published within the last {cooldown_days} days")]
    NoEligiblePosts { cooldown_days: u32 },

    #[error("No posts available: {reason}")]
    NoPostsAvailable { reason: String },

    #[error("Failed to fetch post content from {url}: {source}")]
    ContentFetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Message generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    #[error("Publishing failed: {0}")]
    Publish(#[from] PublishError),

    #[error("Storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl RunError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RunError::NoEligiblePosts { .. })
    }
}

#[derive(Error, Debug)]
pub enum PublishError {
    /// Definitely not published: refused by the service, or never sent.
    #[error("not published: {0}")]
    Failed(String),

    /// The request went out but no answer came back; the post may exist.
    #[error("outcome unknown: {0}")]
    Unconfirmed(String),
}

impl From<reqwest::Error> for PublishError {
    fn from(e: reqwest::Error) -> Self {
        // Failing before the request left (connect, builder) is a clean failure.
        if e.is_timeout() || (e.is_request() && !e.is_connect()) || e.is_body() || e.is_decode() {
            PublishError::Unconfirmed(e.to_string())
        } else {
            PublishError::Failed(e.to_string())
        }
    }
}

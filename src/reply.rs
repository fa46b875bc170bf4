use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::trace;

/// Origin of the reply endpoint.
pub const API_BASE: &str = "https://medbot-jvsz.onrender.com";
const REPLY_PATH: &str = "/get";

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("reply endpoint returned {status}")]
    Status { status: StatusCode },
    #[error("reply body is not valid UTF-8")]
    Malformed,
}

/// Produces the bot's reply to one user message.
///
/// A call is a single suspension point with no cancellation and no
/// timeout: it finishes when the remote side answers or the transport
/// gives up.
#[async_trait]
pub trait ReplyService: Send + Sync {
    async fn reply(&self, msg: &str) -> Result<String, ReplyError>;
}

pub struct HttpReplyService {
    url: String,
    http: Client,
}

impl HttpReplyService {
    pub fn new(base: &str) -> Self {
        Self {
            url: format!("{}{REPLY_PATH}", base.trim_end_matches('/')),
            http: Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for HttpReplyService {
    fn default() -> Self {
        Self::new(API_BASE)
    }
}

#[async_trait]
impl ReplyService for HttpReplyService {
    async fn reply(&self, msg: &str) -> Result<String, ReplyError> {
        trace!(url = %self.url, len = msg.len(), "posting message");
        let response = self
            .http
            .post(&self.url)
            .form(&[("msg", msg)])
            .send()
            .await
            .map_err(|source| ReplyError::Transport {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReplyError::Status { status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ReplyError::Transport {
                url: self.url.clone(),
                source,
            })?;
        String::from_utf8(body.to_vec()).map_err(|_| ReplyError::Malformed)
    }
}

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::article::{Article, ArticleId, Notification, RawArticle, SourceDescriptor};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("authentication required")]
    Unauthorized,
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid API base URL '{0}'")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

#[derive(Serialize)]
struct FavoriteBody<'a> {
    article_id: &'a ArticleId,
}

/// Typed client for the aggregator REST API.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(api_base: &str, timeout: Duration, token: Option<String>) -> Result<Self, ApiError> {
        let base = Url::parse(api_base).map_err(|_| ApiError::InvalidUrl(api_base.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(api_base.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Newsstand/1.0 (Feed Client)")
            .build()?;

        Ok(Self {
            client,
            base,
            token,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        debug!("{} {}", status, response.url());

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_articles(&self, request: RequestBuilder) -> Result<Vec<Article>, ApiError> {
        let raw: Vec<RawArticle> = self.send_json(request).await?;
        Ok(raw.into_iter().map(Article::from_raw).collect())
    }

    fn with_query(request: RequestBuilder, text: &str) -> RequestBuilder {
        let text = text.trim();
        if text.is_empty() {
            request
        } else {
            request.query(&[("q", text)])
        }
    }

    /// `GET /v1/articles?q=<text>`
    pub async fn search_articles(&self, text: &str) -> Result<Vec<Article>, ApiError> {
        let url = self.endpoint(&["v1", "articles", ""])?;
        self.send_articles(Self::with_query(self.client.get(url), text))
            .await
    }

    /// `GET /v1/articles/popular`
    pub async fn popular_articles(&self, text: &str) -> Result<Vec<Article>, ApiError> {
        let url = self.endpoint(&["v1", "articles", "popular"])?;
        self.send_articles(Self::with_query(self.client.get(url), text))
            .await
    }

    pub async fn list_favorites(&self) -> Result<Vec<Article>, ApiError> {
        let url = self.endpoint(&["v1", "me", "favorites"])?;
        self.send_articles(self.client.get(url)).await
    }

    pub async fn add_favorite(&self, id: &ArticleId) -> Result<(), ApiError> {
        let url = self.endpoint(&["v1", "me", "favorites"])?;
        self.send(self.client.post(url).json(&FavoriteBody { article_id: id }))
            .await?;
        Ok(())
    }

    pub async fn remove_favorite(&self, id: &ArticleId) -> Result<(), ApiError> {
        let id = id.to_string();
        let url = self.endpoint(&["v1", "me", "favorites", &id])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    /// `GET /v1/me/read-later`
    pub async fn list_read_later(&self) -> Result<Vec<Article>, ApiError> {
        let url = self.endpoint(&["v1", "me", "read-later"])?;
        self.send_articles(self.client.get(url)).await
    }

    pub async fn add_read_later(&self, id: &ArticleId) -> Result<(), ApiError> {
        let url = self.endpoint(&["v1", "me", "read-later"])?;
        self.send(self.client.post(url).json(&FavoriteBody { article_id: id }))
            .await?;
        Ok(())
    }

    pub async fn remove_read_later(&self, id: &ArticleId) -> Result<(), ApiError> {
        let id = id.to_string();
        let url = self.endpoint(&["v1", "me", "read-later", &id])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    pub async fn list_sources(&self) -> Result<Vec<SourceDescriptor>, ApiError> {
        let url = self.endpoint(&["v1", "sources", ""])?;
        self.send_json(self.client.get(url)).await
    }

    pub async fn follow_source(&self, source_id: i64) -> Result<(), ApiError> {
        let id = source_id.to_string();
        let url = self.endpoint(&["v1", "sources", &id, "follow"])?;
        self.send(self.client.post(url)).await?;
        Ok(())
    }

    pub async fn unfollow_source(&self, source_id: i64) -> Result<(), ApiError> {
        let id = source_id.to_string();
        let url = self.endpoint(&["v1", "sources", &id, "follow"])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    pub async fn list_notifications(&self) -> Result<Vec<Notification>, ApiError> {
        let url = self.endpoint(&["v1", "me", "notifications"])?;
        self.send_json(self.client.get(url)).await
    }

    pub async fn mark_notification_read(&self, notification_id: i64) -> Result<(), ApiError> {
        let id = notification_id.to_string();
        let url = self.endpoint(&["v1", "me", "notifications", &id, "read"])?;
        self.send(self.client.post(url)).await?;
        Ok(())
    }
}

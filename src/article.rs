use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scorer::article_host;

/// Backend article identifier. Numeric for stored articles, textual for some
/// externally-sourced entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArticleId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArticleId::Number(n) => write!(f, "{}", n),
            ArticleId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ArticleId {
    fn from(value: i64) -> Self {
        ArticleId::Number(value)
    }
}

impl From<&str> for ArticleId {
    fn from(value: &str) -> Self {
        ArticleId::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub id: Option<ArticleId>,
    pub title: String,
    pub content: Option<String>,
    pub url: Option<String>,
    /// Lower-cased host of `url` without a leading `www.`; empty when unknown
    pub source_host: String,
    pub created_at: Option<DateTime<Utc>>,
    pub popularity: i64,
}

/// Article as it comes off the wire: every field optional.
#[derive(Debug, Default, Deserialize)]
pub struct RawArticle {
    #[serde(default)]
    pub id: Option<ArticleId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub popularity: Option<i64>,
}

impl Article {
    pub fn new(title: impl Into<String>) -> Self {
        Self::from_raw(RawArticle {
            title: Some(title.into()),
            ..Default::default()
        })
    }

    pub fn with_id(mut self, id: impl Into<ArticleId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.source_host = article_host(&url);
        self.url = non_blank(Some(url));
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = non_blank(Some(content.into()));
        self
    }

    /// Normalize a wire article. This is the only place optional fields are
    /// defaulted and the host is derived.
    pub fn from_raw(raw: RawArticle) -> Self {
        let title = raw
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());
        let url = non_blank(raw.url);
        let source_host = url.as_deref().map(article_host).unwrap_or_default();
        let created_at = raw
            .created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let id = match raw.id {
            Some(ArticleId::Text(s)) if s.trim().is_empty() => None,
            other => other,
        };

        Self {
            id,
            title,
            content: non_blank(raw.content),
            url,
            source_host,
            created_at,
            popularity: raw.popularity.unwrap_or(0),
        }
    }

    /// Stable key for views: the id when present, the title otherwise.
    pub fn key(&self) -> String {
        match &self.id {
            Some(id) => id.to_string(),
            None => self.title.clone(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceDescriptor {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_followed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Notification {
    pub id: i64,
    #[serde(default)]
    pub source_id: Option<i64>,
    #[serde(default)]
    pub article_id: Option<i64>,
    #[serde(default)]
    pub newspaper_id: Option<i64>,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

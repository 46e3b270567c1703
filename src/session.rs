use tracing::warn;

use crate::db::{Database, StoreError};

pub const TOKEN_KEY: &str = "token";
pub const USER_EMAIL_KEY: &str = "user_email";
pub const USER_ID_KEY: &str = "user_id";
pub const THEME_KEY: &str = "theme";

/// Display theme of the client, independent of feed personalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayTheme {
    #[default]
    Light,
    Dark,
}

impl DisplayTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayTheme::Light => "light",
            DisplayTheme::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(DisplayTheme::Light),
            "dark" => Some(DisplayTheme::Dark),
            _ => None,
        }
    }
}

/// Per-user session state. Constructed explicitly and handed to whatever
/// needs it; nothing reads storage behind its back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub email: Option<String>,
    pub user_id: Option<i64>,
    pub theme: DisplayTheme,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Restore the session from storage. Unreadable or malformed values fall
    /// back to their defaults.
    pub async fn load(db: &Database) -> Self {
        let token = read_value(db, TOKEN_KEY).await;
        let email = read_value(db, USER_EMAIL_KEY).await;
        let user_id = read_value(db, USER_ID_KEY)
            .await
            .and_then(|v| v.trim().parse().ok());
        let theme = read_value(db, THEME_KEY)
            .await
            .and_then(|v| DisplayTheme::parse(&v))
            .unwrap_or_default();

        Self {
            token,
            email,
            user_id,
            theme,
        }
    }

    pub async fn save(&self, db: &Database) -> Result<(), StoreError> {
        put_optional(db, TOKEN_KEY, self.token.as_deref()).await?;
        put_optional(db, USER_EMAIL_KEY, self.email.as_deref()).await?;
        put_optional(db, USER_ID_KEY, self.user_id.map(|id| id.to_string()).as_deref()).await?;
        db.set(THEME_KEY, self.theme.as_str()).await
    }

    /// Drop credentials from memory and storage, keeping the display theme.
    pub async fn sign_out(&mut self, db: &Database) -> Result<(), StoreError> {
        self.token = None;
        self.email = None;
        self.user_id = None;
        db.remove(TOKEN_KEY).await?;
        db.remove(USER_EMAIL_KEY).await?;
        db.remove(USER_ID_KEY).await
    }
}

async fn read_value(db: &Database, key: &str) -> Option<String> {
    match db.get(key).await {
        Ok(value) => value.filter(|v| !v.trim().is_empty()),
        Err(e) => {
            warn!("Failed to read '{}' from storage: {}", key, e);
            None
        }
    }
}

async fn put_optional(db: &Database, key: &str, value: Option<&str>) -> Result<(), StoreError> {
    match value {
        Some(value) => db.set(key, value).await,
        None => db.remove(key).await,
    }
}

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::config::Config;
use crate::db::Database;
use crate::favorites::{FavoriteSync, ReadLater};
use crate::feed::{Feed, FeedOptions};
use crate::notifications::NotificationPoller;
use crate::preferences::PreferenceStore;
use crate::session::Session;
use crate::sources::SourceDirectory;

/// What happened to backend follow state when a source preference flipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowChange {
    Followed(i64),
    Unfollowed(i64),
    /// No known source carries this label; only ranking changed
    Unresolved,
    Failed { source_id: i64, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceToggle {
    pub preferred: bool,
    pub follow: FollowChange,
}

/// Wires the session, storage and API client into the engine components.
pub struct Engine {
    config: Config,
    session: Session,
    client: ApiClient,
    preferences: Arc<PreferenceStore>,
    favorites: Arc<FavoriteSync<ApiClient>>,
    read_later: Arc<FavoriteSync<ReadLater>>,
    sources: Arc<SourceDirectory>,
}

impl Engine {
    /// Build an engine around the session persisted in `db`.
    pub async fn open(config: Config, db: Arc<Database>) -> Result<Self, ApiError> {
        let session = Session::load(&db).await;
        Self::with_session(config, db, session).await
    }

    pub async fn with_session(
        config: Config,
        db: Arc<Database>,
        session: Session,
    ) -> Result<Self, ApiError> {
        let client = ApiClient::new(&config.api_base, config.request_timeout(), session.token.clone())?;
        let preferences = Arc::new(PreferenceStore::load(db).await);
        let favorites = Arc::new(FavoriteSync::new(client.clone()));
        let read_later = Arc::new(FavoriteSync::new(ReadLater(client.clone())));
        let sources = Arc::new(SourceDirectory::new(client.clone()));

        info!(
            "Engine ready for {} ({})",
            config.api_base,
            if session.is_authenticated() { "signed in" } else { "anonymous" }
        );

        Ok(Self {
            config,
            session,
            client,
            preferences,
            favorites,
            read_later,
            sources,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn preferences(&self) -> &Arc<PreferenceStore> {
        &self.preferences
    }

    pub fn favorites(&self) -> &Arc<FavoriteSync<ApiClient>> {
        &self.favorites
    }

    pub fn read_later(&self) -> &Arc<FavoriteSync<ReadLater>> {
        &self.read_later
    }

    pub fn sources(&self) -> &Arc<SourceDirectory> {
        &self.sources
    }

    /// Load the source directory, favorites and read-later list side by side.
    /// Failures are logged; the engine stays usable with whatever loaded.
    pub async fn bootstrap(&self) {
        let (sources, favorites, read_later) = tokio::join!(
            self.sources.refresh(),
            self.favorites.refresh(),
            self.read_later.refresh()
        );
        if let Err(e) = sources {
            warn!("Starting without source directory: {}", e);
        }
        if let Err(e) = favorites {
            warn!("Starting without favorites: {}", e);
        }
        if let Err(e) = read_later {
            warn!("Starting without read-later list: {}", e);
        }
    }

    /// A new article list bound to this engine's preferences.
    pub fn feed(&self) -> Feed<ApiClient> {
        Feed::new(
            self.client.clone(),
            self.preferences.subscribe(),
            FeedOptions::from_config(&self.config),
        )
    }

    pub fn notifications(&self) -> NotificationPoller {
        NotificationPoller::start(self.client.clone(), self.config.notification_interval())
    }

    pub async fn toggle_theme_preference(&self, label: &str) -> bool {
        self.preferences.toggle_theme(label).await
    }

    /// Flip a source preference and mirror it to the backend follow state
    /// when the label names a known source.
    pub async fn toggle_source_preference(&self, label: &str) -> SourceToggle {
        let preferred = self.preferences.toggle_source(label).await;

        let Some(source_id) = self.sources.resolve_source_id(label) else {
            return SourceToggle {
                preferred,
                follow: FollowChange::Unresolved,
            };
        };

        let result = if preferred {
            self.sources.follow(source_id).await
        } else {
            self.sources.unfollow(source_id).await
        };

        let follow = match result {
            Ok(()) if preferred => FollowChange::Followed(source_id),
            Ok(()) => FollowChange::Unfollowed(source_id),
            Err(e) => {
                warn!("Failed to update follow state for source {}: {}", source_id, e);
                FollowChange::Failed {
                    source_id,
                    error: e.to_string(),
                }
            }
        };

        SourceToggle { preferred, follow }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ArticleId;
    use crate::favorites::ToggleOutcome;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_test_db() -> Arc<Database> {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        Arc::new(db)
    }

    async fn engine_for(server: &MockServer) -> Engine {
        Mock::given(method("GET"))
            .and(path("/v1/sources/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 11, "name": "Wired", "status": "active", "is_followed": false}
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/me/favorites"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(server)
            .await;

        let engine = Engine::with_session(
            Config::with_api_base(server.uri()),
            create_test_db().await,
            Session::with_token("t"),
        )
        .await
        .unwrap();
        engine.bootstrap().await;
        engine
    }

    #[tokio::test]
    async fn test_open_rejects_bad_api_base() {
        let result = Engine::open(Config::with_api_base("nope"), create_test_db().await).await;
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_open_restores_session() {
        let db = create_test_db().await;
        Session::with_token("persisted").save(&db).await.unwrap();

        let engine = Engine::open(Config::with_api_base("http://localhost:9"), db)
            .await
            .unwrap();

        assert_eq!(engine.session().token.as_deref(), Some("persisted"));
    }

    #[tokio::test]
    async fn test_known_source_is_followed_and_unfollowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sources/11/follow"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/sources/11/follow"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let engine = engine_for(&server).await;

        let toggle = engine.toggle_source_preference("wired").await;
        assert_eq!(
            toggle,
            SourceToggle {
                preferred: true,
                follow: FollowChange::Followed(11)
            }
        );
        assert!(engine.sources().is_followed(11));

        let toggle = engine.toggle_source_preference("WIRED").await;
        assert_eq!(toggle.follow, FollowChange::Unfollowed(11));
        assert!(!toggle.preferred);
    }

    #[tokio::test]
    async fn test_unknown_source_only_changes_ranking() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let engine = engine_for(&server).await;

        let toggle = engine.toggle_source_preference("techcrunch.com").await;

        assert_eq!(toggle.follow, FollowChange::Unresolved);
        assert!(toggle.preferred);
        assert_eq!(engine.preferences().snapshot().sources, vec!["techcrunch.com"]);
    }

    #[tokio::test]
    async fn test_follow_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sources/11/follow"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let engine = engine_for(&server).await;

        let toggle = engine.toggle_source_preference("Wired").await;

        assert!(matches!(toggle.follow, FollowChange::Failed { source_id: 11, .. }));
        assert!(toggle.preferred);
        assert!(!engine.sources().is_followed(11));
    }

    #[tokio::test]
    async fn test_read_later_is_kept_apart_from_favorites() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me/read-later"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 5, "title": "Saved for the weekend"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/me/read-later"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        let engine = engine_for(&server).await;

        assert!(engine.read_later().is_favorited(&ArticleId::Number(5)));
        assert!(!engine.favorites().is_favorited(&ArticleId::Number(5)));

        let outcome = engine.read_later().toggle(&ArticleId::Number(6), false).await;
        assert_eq!(outcome, ToggleOutcome::Added);
        assert!(engine.favorites().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_theme_toggle_goes_through_store() {
        let server = MockServer::start().await;
        let engine = engine_for(&server).await;

        assert!(engine.toggle_theme_preference("AI").await);
        assert_eq!(engine.preferences().snapshot().themes, vec!["AI"]);
    }
}

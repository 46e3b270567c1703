use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::article::{Article, ArticleId};

pub type FavoriteSet = HashSet<ArticleId>;

/// Remote side of the favorite set.
pub trait FavoriteBackend: Send + Sync + 'static {
    fn list(&self) -> impl Future<Output = Result<Vec<Article>, ApiError>> + Send;
    fn add(&self, id: &ArticleId) -> impl Future<Output = Result<(), ApiError>> + Send;
    fn remove(&self, id: &ArticleId) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Noun used in logs and alerts
    fn label(&self) -> &'static str {
        "favorite"
    }
}

impl FavoriteBackend for ApiClient {
    async fn list(&self) -> Result<Vec<Article>, ApiError> {
        self.list_favorites().await
    }

    async fn add(&self, id: &ArticleId) -> Result<(), ApiError> {
        self.add_favorite(id).await
    }

    async fn remove(&self, id: &ArticleId) -> Result<(), ApiError> {
        self.remove_favorite(id).await
    }
}

/// The read-later list: same add/remove shape as favorites, separate
/// collection on the backend.
#[derive(Clone)]
pub struct ReadLater(pub ApiClient);

impl FavoriteBackend for ReadLater {
    async fn list(&self) -> Result<Vec<Article>, ApiError> {
        self.0.list_read_later().await
    }

    async fn add(&self, id: &ArticleId) -> Result<(), ApiError> {
        self.0.add_read_later(id).await
    }

    async fn remove(&self, id: &ArticleId) -> Result<(), ApiError> {
        self.0.remove_read_later(id).await
    }

    fn label(&self) -> &'static str {
        "read-later"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// The remote call failed and the local membership was restored
    Reverted { error: String },
}

/// User-facing failure notice, sent once per failed toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub article_id: ArticleId,
    pub message: String,
}

/// The favorite set shared by every view. Views read snapshots through
/// [`FavoriteSync::subscribe`]; only the methods here write.
pub struct FavoriteSync<B: FavoriteBackend> {
    backend: B,
    tx: watch::Sender<Arc<FavoriteSet>>,
    alerts: broadcast::Sender<Alert>,
}

impl<B: FavoriteBackend> FavoriteSync<B> {
    pub fn new(backend: B) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(FavoriteSet::new()));
        let (alerts, _) = broadcast::channel(16);
        Self { backend, tx, alerts }
    }

    pub fn snapshot(&self) -> Arc<FavoriteSet> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<FavoriteSet>> {
        self.tx.subscribe()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }

    pub fn is_favorited(&self, id: &ArticleId) -> bool {
        self.tx.borrow().contains(id)
    }

    /// Flip membership of `id` right away, then confirm remotely. A failed
    /// remote call puts `currently_favorited` back and raises an alert.
    pub async fn toggle(&self, id: &ArticleId, currently_favorited: bool) -> ToggleOutcome {
        let target = !currently_favorited;
        self.set_membership(id, target);

        let result = if target {
            self.backend.add(id).await
        } else {
            self.backend.remove(id).await
        };

        match result {
            Ok(()) if target => ToggleOutcome::Added,
            Ok(()) => ToggleOutcome::Removed,
            Err(e) => {
                self.set_membership(id, currently_favorited);
                let action = if target { "add" } else { "remove" };
                let label = self.backend.label();
                error!("Failed to {} {} {}: {}", action, label, id, e);
                let _ = self.alerts.send(Alert {
                    article_id: id.clone(),
                    message: format!("Could not {} {}: {}", action, label, e),
                });
                ToggleOutcome::Reverted {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Toggle using the set's own view of `article`. Articles without an id
    /// cannot be favorited and yield `None`.
    pub async fn toggle_article(&self, article: &Article) -> Option<ToggleOutcome> {
        let id = article.id.as_ref()?;
        let current = self.is_favorited(id);
        Some(self.toggle(id, current).await)
    }

    /// Replace the whole set with server truth.
    pub fn sync_from(&self, articles: &[Article]) {
        let set: FavoriteSet = articles.iter().filter_map(|a| a.id.clone()).collect();
        self.tx.send_replace(Arc::new(set));
    }

    /// Reload from the backend. An unauthenticated session counts as having no
    /// favorites; other failures leave the set untouched.
    pub async fn refresh(&self) -> Result<usize, ApiError> {
        match self.backend.list().await {
            Ok(articles) => {
                self.sync_from(&articles);
                let count = self.tx.borrow().len();
                info!("Synced {} {} entries", count, self.backend.label());
                Ok(count)
            }
            Err(ApiError::Unauthorized) => {
                self.sync_from(&[]);
                Ok(0)
            }
            Err(e) => {
                warn!("Failed to load {} list: {}", self.backend.label(), e);
                Err(e)
            }
        }
    }

    fn set_membership(&self, id: &ArticleId, member: bool) {
        self.tx.send_if_modified(|set| {
            if set.contains(id) == member {
                return false;
            }
            let mut next = FavoriteSet::clone(set);
            if member {
                next.insert(id.clone());
            } else {
                next.remove(id);
            }
            *set = Arc::new(next);
            true
        });
    }
}

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::article::SourceDescriptor;

/// Last-fetched list of known sources and their follow state.
pub struct SourceDirectory {
    client: ApiClient,
    tx: watch::Sender<Arc<Vec<SourceDescriptor>>>,
}

impl SourceDirectory {
    pub fn new(client: ApiClient) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Self { client, tx }
    }

    pub fn snapshot(&self) -> Arc<Vec<SourceDescriptor>> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<SourceDescriptor>>> {
        self.tx.subscribe()
    }

    /// Reload the directory. On failure the previous snapshot stays.
    pub async fn refresh(&self) -> Result<usize, ApiError> {
        match self.client.list_sources().await {
            Ok(sources) => {
                let count = sources.len();
                self.tx.send_replace(Arc::new(sources));
                info!("Loaded {} sources", count);
                Ok(count)
            }
            Err(e) => {
                warn!("Failed to load sources: {}", e);
                Err(e)
            }
        }
    }

    /// Case-insensitive lookup of a source name in the current snapshot.
    pub fn resolve_source_id(&self, label: &str) -> Option<i64> {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return None;
        }
        self.tx
            .borrow()
            .iter()
            .find(|source| source.name.trim().to_lowercase() == label)
            .map(|source| source.id)
    }

    pub fn is_followed(&self, source_id: i64) -> bool {
        self.tx
            .borrow()
            .iter()
            .any(|source| source.id == source_id && source.is_followed)
    }

    pub async fn follow(&self, source_id: i64) -> Result<(), ApiError> {
        self.client.follow_source(source_id).await?;
        self.set_followed(source_id, true);
        Ok(())
    }

    pub async fn unfollow(&self, source_id: i64) -> Result<(), ApiError> {
        self.client.unfollow_source(source_id).await?;
        self.set_followed(source_id, false);
        Ok(())
    }

    fn set_followed(&self, source_id: i64, followed: bool) {
        self.tx.send_if_modified(|sources| {
            let Some(index) = sources
                .iter()
                .position(|s| s.id == source_id && s.is_followed != followed)
            else {
                return false;
            };
            let mut next = Vec::clone(sources);
            next[index].is_followed = followed;
            *sources = Arc::new(next);
            true
        });
    }
}

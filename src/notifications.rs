use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::article::Notification;

/// Published notification state.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    pub unread: Arc<Vec<Notification>>,
    /// Completed poll attempts, successful or not
    pub polls: u64,
}

struct Inner {
    client: ApiClient,
    tx: watch::Sender<Inbox>,
}

impl Inner {
    async fn poll_once(&self) {
        match self.client.list_notifications().await {
            Ok(notifications) => {
                let unread: Vec<Notification> =
                    notifications.into_iter().filter(|n| !n.is_read).collect();
                debug!("{} unread notifications", unread.len());
                self.tx.send_modify(|inbox| {
                    inbox.unread = Arc::new(unread);
                    inbox.polls += 1;
                });
            }
            Err(ApiError::Unauthorized) => {
                self.tx.send_modify(|inbox| {
                    inbox.unread = Arc::new(Vec::new());
                    inbox.polls += 1;
                });
            }
            Err(e) => {
                warn!("Failed to poll notifications: {}", e);
                self.tx.send_modify(|inbox| inbox.polls += 1);
            }
        }
    }
}

/// Background polling of unread notifications.
pub struct NotificationPoller {
    inner: Arc<Inner>,
    stop: CancellationToken,
}

impl NotificationPoller {
    /// Poll immediately, then every `interval`, until stopped or dropped.
    pub fn start(client: ApiClient, interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(Inbox::default());
        let inner = Arc::new(Inner { client, tx });
        let stop = CancellationToken::new();

        let poller = inner.clone();
        let token = stop.clone();
        tokio::spawn(async move {
            info!("Starting notification polling every {:?}", interval);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = poller.poll_once() => {}
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            debug!("Notification polling stopped");
        });

        Self { inner, stop }
    }

    pub fn snapshot(&self) -> Arc<Vec<Notification>> {
        self.inner.tx.borrow().unread.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Inbox> {
        self.inner.tx.subscribe()
    }

    /// Wait for the first completed poll and return the unread list.
    pub async fn first_poll(&self) -> Arc<Vec<Notification>> {
        let mut rx = self.subscribe();
        tokio::select! {
            _ = self.stop.cancelled() => self.snapshot(),
            result = rx.wait_for(|inbox| inbox.polls > 0) => match result {
                Ok(inbox) => inbox.unread.clone(),
                Err(_) => self.snapshot(),
            },
        }
    }

    /// Acknowledge a notification and drop it from the unread list.
    pub async fn mark_read(&self, notification_id: i64) -> Result<(), ApiError> {
        self.inner.client.mark_notification_read(notification_id).await?;
        self.inner.tx.send_if_modified(|inbox| {
            if !inbox.unread.iter().any(|n| n.id == notification_id) {
                return false;
            }
            let next: Vec<Notification> = inbox
                .unread
                .iter()
                .filter(|n| n.id != notification_id)
                .cloned()
                .collect();
            inbox.unread = Arc::new(next);
            true
        });
        Ok(())
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }
}

impl Drop for NotificationPoller {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

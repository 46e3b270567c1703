//! Debounced, cancellable article fetching.
//!
//! A [`Feed`] owns one trigger stream. Each query change supersedes whatever
//! was pending: the debounce timer and any in-flight request share a
//! cancellation token, and results are published only when their generation
//! is still the latest one.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::article::Article;
use crate::config::Config;
use crate::preferences::Preferences;
use crate::scorer::{is_personalized, rank, ScoringWeights};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedQuery {
    pub text: String,
    /// Use the popularity-ordered listing instead of plain search
    pub popular: bool,
}

impl FeedQuery {
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            popular: false,
        }
    }

    pub fn popular() -> Self {
        Self {
            text: String::new(),
            popular: true,
        }
    }
}

/// Anything that can answer a feed query.
pub trait ArticleSource: Send + Sync + 'static {
    fn fetch(&self, query: &FeedQuery) -> impl Future<Output = Result<Vec<Article>, ApiError>> + Send;
}

impl ArticleSource for ApiClient {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<Article>, ApiError> {
        if query.popular {
            self.popular_articles(&query.text).await
        } else {
            self.search_articles(&query.text).await
        }
    }
}

impl<S: ArticleSource> ArticleSource for Arc<S> {
    fn fetch(&self, query: &FeedQuery) -> impl Future<Output = Result<Vec<Article>, ApiError>> + Send {
        S::fetch(self, query)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Debouncing,
    InFlight,
    Success,
    Failure,
}

impl FeedPhase {
    pub fn is_settled(&self) -> bool {
        matches!(self, FeedPhase::Success | FeedPhase::Failure)
    }
}

#[derive(Debug, Clone)]
pub struct FeedState {
    pub phase: FeedPhase,
    pub query: FeedQuery,
    /// Articles as the backend returned them
    pub raw: Arc<Vec<Article>>,
    /// `raw` ranked against the current preferences
    pub articles: Arc<Vec<Article>>,
    pub error: Option<String>,
    pub generation: u64,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            phase: FeedPhase::Idle,
            query: FeedQuery::default(),
            raw: Arc::new(Vec::new()),
            articles: Arc::new(Vec::new()),
            error: None,
            generation: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeedOptions {
    pub debounce: Duration,
    pub weights: ScoringWeights,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            weights: ScoringWeights::default(),
        }
    }
}

impl FeedOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: config.debounce(),
            weights: config.scoring,
        }
    }
}

struct Inner<S> {
    source: S,
    tx: watch::Sender<FeedState>,
    prefs: watch::Receiver<Arc<Preferences>>,
    weights: ScoringWeights,
    latest: AtomicU64,
}

impl<S: ArticleSource> Inner<S> {
    fn ranked(&self, raw: &Arc<Vec<Article>>) -> Arc<Vec<Article>> {
        let prefs = self.prefs.borrow().clone();
        if is_personalized(&prefs.themes, &prefs.sources) {
            Arc::new(rank(raw, &prefs.themes, &prefs.sources, &self.weights))
        } else {
            Arc::clone(raw)
        }
    }

    /// Apply `f` only while `generation` is still the latest request.
    fn publish(&self, generation: u64, f: impl FnOnce(&mut FeedState)) -> bool {
        self.tx.send_if_modified(|state| {
            if self.latest.load(Ordering::SeqCst) != generation {
                return false;
            }
            f(state);
            true
        })
    }

    /// Re-rank whatever list is on screen, including a previous result still
    /// shown while the next request is debouncing or in flight.
    fn rerank(&self) {
        self.tx.send_if_modified(|state| {
            if state.raw.is_empty() {
                return false;
            }
            state.articles = self.ranked(&state.raw);
            true
        });
    }

    async fn run(
        self: Arc<Self>,
        query: FeedQuery,
        generation: u64,
        token: CancellationToken,
        delay: Option<Duration>,
    ) {
        if let Some(delay) = delay {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if !self.publish(generation, |state| state.phase = FeedPhase::InFlight) {
            return;
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Cancelled feed request {} ({:?})", generation, query.text);
                return;
            }
            result = self.source.fetch(&query) => result,
        };

        let published = match result {
            Ok(articles) => {
                let count = articles.len();
                let raw = Arc::new(articles);
                // Rank under the state lock so a concurrent preference change
                // either sees this list or is seen by it.
                let published = self.publish(generation, |state| {
                    state.phase = FeedPhase::Success;
                    state.articles = self.ranked(&raw);
                    state.raw = raw;
                    state.error = None;
                });
                if published {
                    info!("Feed loaded {} articles for {:?}", count, query.text);
                }
                published
            }
            Err(e) => {
                warn!("Feed request for {:?} failed: {}", query.text, e);
                self.publish(generation, |state| {
                    state.phase = FeedPhase::Failure;
                    state.raw = Arc::new(Vec::new());
                    state.articles = Arc::new(Vec::new());
                    state.error = Some(e.to_string());
                })
            }
        };

        if !published {
            debug!("Discarded stale response for request {}", generation);
        }
    }
}

/// One view's article list. Must be created inside a tokio runtime.
pub struct Feed<S: ArticleSource> {
    inner: Arc<Inner<S>>,
    root: CancellationToken,
    current: Option<CancellationToken>,
    debounce: Duration,
}

impl<S: ArticleSource> Feed<S> {
    pub fn new(source: S, prefs: watch::Receiver<Arc<Preferences>>, options: FeedOptions) -> Self {
        let (tx, _rx) = watch::channel(FeedState::default());
        let inner = Arc::new(Inner {
            source,
            tx,
            prefs,
            weights: options.weights,
            latest: AtomicU64::new(0),
        });
        let root = CancellationToken::new();

        // Re-rank the held list whenever preferences change.
        let watcher = inner.clone();
        let mut changes = inner.prefs.clone();
        changes.mark_unchanged();
        let stop = root.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        watcher.rerank();
                    }
                }
            }
        });

        Self {
            inner,
            root,
            current: None,
            debounce: options.debounce,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.inner.tx.subscribe()
    }

    pub fn state(&self) -> FeedState {
        self.inner.tx.borrow().clone()
    }

    /// Change the query. The request fires once the debounce delay passes
    /// without another change.
    pub fn set_query(&mut self, query: FeedQuery) {
        let delay = self.debounce;
        self.start(query, FeedPhase::Debouncing, Some(delay));
    }

    /// Fire the current query now, superseding anything pending.
    pub fn refresh(&mut self) {
        let query = self.inner.tx.borrow().query.clone();
        self.start(query, FeedPhase::InFlight, None);
    }

    /// Re-rank the held articles against the latest preferences.
    pub fn rerank(&self) {
        self.inner.rerank();
    }

    /// Stop the pending timer, any in-flight request and the preference
    /// watcher. The feed publishes nothing afterwards.
    pub fn close(&mut self) {
        if self.root.is_cancelled() {
            return;
        }
        self.root.cancel();
        self.current = None;
        self.inner.latest.fetch_add(1, Ordering::SeqCst);
        self.inner.tx.send_if_modified(|state| {
            if state.phase.is_settled() || state.phase == FeedPhase::Idle {
                return false;
            }
            state.phase = FeedPhase::Idle;
            true
        });
    }

    pub fn is_closed(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Wait until the latest request has settled. Returns the current state
    /// right away when the feed is closed or idle.
    pub async fn settled(&self) -> FeedState {
        let generation = self.inner.latest.load(Ordering::SeqCst);
        if generation == 0 {
            return self.state();
        }
        let mut rx = self.subscribe();
        tokio::select! {
            _ = self.root.cancelled() => self.state(),
            result = rx.wait_for(|s| s.generation == generation && s.phase.is_settled()) => {
                match result {
                    Ok(state) => state.clone(),
                    Err(_) => self.state(),
                }
            }
        }
    }

    fn start(&mut self, query: FeedQuery, phase: FeedPhase, delay: Option<Duration>) {
        if self.root.is_cancelled() {
            return;
        }
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
        let token = self.root.child_token();
        self.current = Some(token.clone());

        let generation = self.inner.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.tx.send_modify(|state| {
            state.phase = phase;
            state.query = query.clone();
            state.generation = generation;
        });

        tokio::spawn(self.inner.clone().run(query, generation, token, delay));
    }
}

impl<S: ArticleSource> Drop for Feed<S> {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

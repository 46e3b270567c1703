use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::db::Database;

pub const THEMES_KEY: &str = "preferred_themes";
pub const SOURCES_KEY: &str = "preferred_sources";

/// Theme and source labels in insertion order. Labels are trimmed, never
/// empty, and never duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    pub themes: Vec<String>,
    pub sources: Vec<String>,
}

impl Preferences {
    pub fn new<T, S>(themes: T, sources: S) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            themes: normalize(themes.into_iter().map(Into::into), Kind::Theme),
            sources: normalize(sources.into_iter().map(Into::into), Kind::Source),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty() && self.sources.is_empty()
    }

    pub fn has_theme(&self, label: &str) -> bool {
        position(&self.themes, label.trim(), Kind::Theme).is_some()
    }

    pub fn has_source(&self, label: &str) -> bool {
        position(&self.sources, label.trim(), Kind::Source).is_some()
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Theme,
    Source,
}

fn same_label(a: &str, b: &str, kind: Kind) -> bool {
    match kind {
        Kind::Theme => a == b,
        Kind::Source => a.to_lowercase() == b.to_lowercase(),
    }
}

fn position(list: &[String], label: &str, kind: Kind) -> Option<usize> {
    list.iter().position(|existing| same_label(existing, label, kind))
}

fn normalize(values: impl Iterator<Item = String>, kind: Kind) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim();
        if !value.is_empty() && position(&out, value, kind).is_none() {
            out.push(value.to_string());
        }
    }
    out
}

/// Present: remove. Absent: append. Returns whether the label is present
/// afterwards, or `None` for a blank label.
fn toggle(list: &mut Vec<String>, label: &str, kind: Kind) -> Option<bool> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    match position(list, label, kind) {
        Some(index) => {
            list.remove(index);
            Some(false)
        }
        None => {
            list.push(label.to_string());
            Some(true)
        }
    }
}

fn add(list: &mut Vec<String>, label: &str, kind: Kind) -> bool {
    let label = label.trim();
    if label.is_empty() || position(list, label, kind).is_some() {
        return false;
    }
    list.push(label.to_string());
    true
}

/// Session-wide preference state. Every mutation publishes a fresh snapshot
/// and writes both lists back to storage.
pub struct PreferenceStore {
    db: Arc<Database>,
    tx: watch::Sender<Arc<Preferences>>,
    write_lock: Mutex<()>,
}

impl PreferenceStore {
    pub fn new(db: Arc<Database>, initial: Preferences) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self {
            db,
            tx,
            write_lock: Mutex::new(()),
        }
    }

    /// Restore persisted preferences. Corrupt or missing entries load as
    /// empty lists.
    pub async fn load(db: Arc<Database>) -> Self {
        let themes = db.get_string_list(THEMES_KEY).await;
        let sources = db.get_string_list(SOURCES_KEY).await;
        let prefs = Preferences::new(themes, sources);
        info!(
            "Loaded {} theme and {} source preferences",
            prefs.themes.len(),
            prefs.sources.len()
        );
        Self::new(db, prefs)
    }

    pub fn snapshot(&self) -> Arc<Preferences> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Preferences>> {
        self.tx.subscribe()
    }

    pub async fn toggle_theme(&self, label: &str) -> bool {
        self.update(|p| toggle(&mut p.themes, label, Kind::Theme))
            .await
            .unwrap_or(false)
    }

    pub async fn toggle_source(&self, label: &str) -> bool {
        self.update(|p| toggle(&mut p.sources, label, Kind::Source))
            .await
            .unwrap_or(false)
    }

    pub async fn add_theme(&self, label: &str) -> bool {
        self.update(|p| add(&mut p.themes, label, Kind::Theme).then_some(true))
            .await
            .is_some()
    }

    pub async fn add_source(&self, label: &str) -> bool {
        self.update(|p| add(&mut p.sources, label, Kind::Source).then_some(true))
            .await
            .is_some()
    }

    pub async fn clear(&self) {
        self.update(|p| {
            let changed = !p.is_empty();
            p.themes.clear();
            p.sources.clear();
            changed.then_some(())
        })
        .await;
    }

    /// Apply `f` to a copy of the current preferences. `None` from `f` means
    /// nothing changed: no snapshot is published and nothing is written.
    async fn update<R>(&self, f: impl FnOnce(&mut Preferences) -> Option<R>) -> Option<R> {
        let _guard = self.write_lock.lock().await;

        let mut next = Preferences::clone(&self.snapshot());
        let result = f(&mut next)?;
        let next = Arc::new(next);
        self.tx.send_replace(next.clone());

        self.persist(&next).await;
        Some(result)
    }

    async fn persist(&self, prefs: &Preferences) {
        if let Err(e) = self.db.set_string_list(THEMES_KEY, &prefs.themes).await {
            warn!("Failed to persist theme preferences: {}", e);
        }
        if let Err(e) = self.db.set_string_list(SOURCES_KEY, &prefs.sources).await {
            warn!("Failed to persist source preferences: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_db() -> Arc<Database> {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        Arc::new(db)
    }

    mod preferences_tests {
        use super::*;

        #[test]
        fn test_new_normalizes() {
            let prefs = Preferences::new(
                vec![" AI ", "", "AI", "ai", "climate"],
                vec!["Wired", "wired", "  "],
            );
            assert_eq!(prefs.themes, vec!["AI", "ai", "climate"]);
            assert_eq!(prefs.sources, vec!["Wired"]);
        }

        #[test]
        fn test_source_lookup_is_case_insensitive() {
            let prefs = Preferences::new(Vec::<String>::new(), vec!["TechCrunch"]);
            assert!(prefs.has_source("techcrunch"));
            assert!(!prefs.has_theme("techcrunch"));
        }
    }

    mod store_tests {
        use super::*;

        #[tokio::test]
        async fn test_toggle_is_presence_flip() {
            let store = PreferenceStore::load(create_test_db().await).await;

            assert!(store.toggle_theme("AI").await);
            assert_eq!(store.snapshot().themes, vec!["AI"]);

            assert!(!store.toggle_theme("AI").await);
            assert!(store.snapshot().themes.is_empty());
        }

        #[tokio::test]
        async fn test_toggle_appends_without_reordering() {
            let store = PreferenceStore::load(create_test_db().await).await;
            store.toggle_theme("a").await;
            store.toggle_theme("b").await;
            store.toggle_theme("c").await;

            store.toggle_theme("a").await;
            store.toggle_theme("a").await;

            assert_eq!(store.snapshot().themes, vec!["b", "c", "a"]);
        }

        #[tokio::test]
        async fn test_blank_labels_are_ignored() {
            let store = PreferenceStore::load(create_test_db().await).await;
            let mut rx = store.subscribe();
            rx.mark_unchanged();

            assert!(!store.toggle_theme("   ").await);
            assert!(!store.add_source("").await);

            assert!(store.snapshot().is_empty());
            assert!(!rx.has_changed().unwrap());
        }

        #[tokio::test]
        async fn test_labels_are_trimmed() {
            let store = PreferenceStore::load(create_test_db().await).await;
            store.toggle_source("  Wired ").await;
            assert_eq!(store.snapshot().sources, vec!["Wired"]);

            assert!(!store.toggle_source("wired").await);
            assert!(store.snapshot().sources.is_empty());
        }

        #[tokio::test]
        async fn test_add_does_not_duplicate() {
            let store = PreferenceStore::load(create_test_db().await).await;
            assert!(store.add_theme("rust").await);
            assert!(!store.add_theme("rust").await);
            assert_eq!(store.snapshot().themes, vec!["rust"]);
        }

        #[tokio::test]
        async fn test_every_mutation_publishes_new_snapshot() {
            let store = PreferenceStore::load(create_test_db().await).await;
            let before = store.snapshot();
            let mut rx = store.subscribe();
            rx.mark_unchanged();

            store.toggle_source("hn").await;

            assert!(rx.has_changed().unwrap());
            assert!(!Arc::ptr_eq(&before, &store.snapshot()));
        }

        #[tokio::test]
        async fn test_mutations_are_persisted() {
            let db = create_test_db().await;
            {
                let store = PreferenceStore::load(db.clone()).await;
                store.toggle_theme("AI").await;
                store.toggle_source("techcrunch.com").await;
            }

            let reloaded = PreferenceStore::load(db).await;
            assert_eq!(
                *reloaded.snapshot(),
                Preferences::new(vec!["AI"], vec!["techcrunch.com"])
            );
        }

        #[tokio::test]
        async fn test_clear_persists_empty_lists() {
            let db = create_test_db().await;
            let store = PreferenceStore::load(db.clone()).await;
            store.toggle_theme("AI").await;
            store.clear().await;

            assert!(store.snapshot().is_empty());
            assert_eq!(db.get(THEMES_KEY).await.unwrap(), Some("[]".to_string()));
        }

        #[tokio::test]
        async fn test_corrupt_storage_loads_empty() {
            let db = create_test_db().await;
            db.set(THEMES_KEY, "{oops").await.unwrap();
            db.set(SOURCES_KEY, r#"["  ", "wired", "wired"]"#).await.unwrap();

            let store = PreferenceStore::load(db).await;
            assert!(store.snapshot().themes.is_empty());
            assert_eq!(store.snapshot().sources, vec!["wired"]);
        }
    }
}

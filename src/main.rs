use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsstand::config::Config;
use newsstand::db::Database;
use newsstand::engine::Engine;
use newsstand::feed::{FeedPhase, FeedQuery};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsstand=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("NEWSSTAND_CONFIG").unwrap_or_else(|_| "newsstand.toml".to_string());
    let config = Config::load(&config_path)?;
    info!("Using API at {}", config.api_base);

    // Open local storage
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| config.storage_url.clone());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    let db = Arc::new(db);

    let engine = Engine::open(config, db).await?;
    engine.bootstrap().await;

    // `newsstand [--popular] [search words...]`
    let mut popular = false;
    let mut words = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--popular" {
            popular = true;
        } else {
            words.push(arg);
        }
    }
    let query = FeedQuery {
        text: words.join(" "),
        popular,
    };

    let mut feed = engine.feed();
    feed.set_query(query);
    let state = feed.settled().await;
    feed.close();

    if state.phase == FeedPhase::Failure {
        eprintln!(
            "Could not load articles: {}",
            state.error.as_deref().unwrap_or("unknown error")
        );
        return Ok(());
    }

    let favorites = engine.favorites().snapshot();
    for article in state.articles.iter() {
        let marker = match &article.id {
            Some(id) if favorites.contains(id) => '*',
            _ => ' ',
        };
        if article.source_host.is_empty() {
            println!("[{}] {}", marker, article.title);
        } else {
            println!("[{}] {} ({})", marker, article.title, article.source_host);
        }
    }
    info!("Listed {} articles", state.articles.len());

    Ok(())
}

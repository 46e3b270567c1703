//! Preference-driven relevance scoring.
//!
//! Everything here is pure: articles are only read, and ranking returns a
//! new ordering.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::article::Article;

/// Points awarded per matching keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub title_theme: u32,
    pub content_theme: u32,
    pub source_host: u32,
    pub source_title: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            title_theme: 3,
            content_theme: 2,
            source_host: 5,
            source_title: 2,
        }
    }
}

/// Host of `url`, lower-cased and without a leading `www.`.
///
/// Falls back to a plain pattern match for scheme-less or otherwise
/// unparseable input, and to an empty string when nothing looks like a host.
pub fn article_host(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }

    let host = match Url::parse(url) {
        Ok(parsed) => parsed.host_str().map(str::to_string),
        Err(_) => fallback_host(url),
    };

    match host {
        Some(host) => {
            let host = host.to_lowercase();
            host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
        }
        None => String::new(),
    }
}

fn fallback_host(url: &str) -> Option<String> {
    static HOST_RE: OnceLock<Regex> = OnceLock::new();
    let re = HOST_RE.get_or_init(|| {
        Regex::new(r"^(?:(?:[A-Za-z][A-Za-z0-9+.-]*:)?//)?([^/?#:\s@]*)").expect("valid host regex")
    });
    re.captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|host| !host.is_empty())
}

fn keywords(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .map(|label| label.trim().to_lowercase())
        .filter(|label| !label.is_empty())
        .collect()
}

/// True when at least one usable theme or source keyword is present.
pub fn is_personalized(themes: &[String], sources: &[String]) -> bool {
    themes.iter().chain(sources).any(|label| !label.trim().is_empty())
}

fn score_with(article: &Article, themes: &[String], sources: &[String], weights: &ScoringWeights) -> u32 {
    let title = article.title.to_lowercase();
    let content = article
        .content
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();

    let mut score = 0;
    for theme in themes {
        if title.contains(theme.as_str()) {
            score += weights.title_theme;
        }
        if content.contains(theme.as_str()) {
            score += weights.content_theme;
        }
    }
    for source in sources {
        if !article.source_host.is_empty() && article.source_host.contains(source.as_str()) {
            score += weights.source_host;
        }
        if title.contains(source.as_str()) {
            score += weights.source_title;
        }
    }
    score
}

/// Relevance score of a single article.
pub fn score(article: &Article, themes: &[String], sources: &[String], weights: &ScoringWeights) -> u32 {
    score_with(article, &keywords(themes), &keywords(sources), weights)
}

/// Reorder `articles` by descending score. Equal scores keep their input
/// order; with no usable preferences the input order is returned as is.
pub fn rank(
    articles: &[Article],
    themes: &[String],
    sources: &[String],
    weights: &ScoringWeights,
) -> Vec<Article> {
    let themes = keywords(themes);
    let sources = keywords(sources);
    if themes.is_empty() && sources.is_empty() {
        return articles.to_vec();
    }

    let mut scored: Vec<(u32, &Article)> = articles
        .iter()
        .map(|article| (score_with(article, &themes, &sources, weights), article))
        .collect();
    // `sort_by` is stable, so ties stay in input order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, article)| article.clone()).collect()
}

pub fn rank_default(articles: &[Article], themes: &[String], sources: &[String]) -> Vec<Article> {
    rank(articles, themes, sources, &ScoringWeights::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn titles(articles: &[Article]) -> Vec<&str> {
        articles.iter().map(|a| a.title.as_str()).collect()
    }

    fn sample() -> Vec<Article> {
        vec![
            Article::new("Weather today"),
            Article::new("AI breakthrough").with_url("https://techcrunch.com/x"),
            Article::new("Local sports"),
        ]
    }

    mod host_tests {
        use super::*;

        #[test]
        fn test_strips_www_and_lowercases() {
            assert_eq!(article_host("https://WWW.Example.COM/path?q=1"), "example.com");
        }

        #[test]
        fn test_keeps_subdomains() {
            assert_eq!(article_host("http://news.ycombinator.com/item?id=1"), "news.ycombinator.com");
        }

        #[test]
        fn test_scheme_less_falls_back_to_pattern() {
            assert_eq!(article_host("www.wired.com/story/abc"), "wired.com");
            assert_eq!(article_host("techcrunch.com"), "techcrunch.com");
        }

        #[test]
        fn test_empty_and_hostless() {
            assert_eq!(article_host(""), "");
            assert_eq!(article_host("   "), "");
            assert_eq!(article_host("mailto:someone@example.com"), "");
            assert_eq!(article_host("/relative/path"), "");
            assert_eq!(article_host("http://"), "");
        }

        #[test]
        fn test_protocol_relative_url() {
            assert_eq!(article_host("//cdn.Example.com/a.js"), "cdn.example.com");
        }
    }

    mod score_tests {
        use super::*;

        #[test]
        fn test_title_and_content_theme_points_add() {
            let weights = ScoringWeights::default();
            let article = Article::new("Rust 2.0").with_content("All about rust");
            assert_eq!(score(&article, &labels(&["rust"]), &[], &weights), 5);
        }

        #[test]
        fn test_source_host_and_title_points_add() {
            let weights = ScoringWeights::default();
            let article = Article::new("Wired picks").with_url("https://www.wired.com/a");
            assert_eq!(score(&article, &[], &labels(&["Wired"]), &weights), 7);
        }

        #[test]
        fn test_blank_keywords_are_ignored() {
            let weights = ScoringWeights::default();
            let article = Article::new("Anything");
            assert_eq!(score(&article, &labels(&["", "  "]), &labels(&[" "]), &weights), 0);
        }

        #[test]
        fn test_adding_keyword_to_title_never_lowers_score() {
            let weights = ScoringWeights::default();
            let themes = labels(&["climate", "energy"]);
            let plain = Article::new("Markets update").with_content("energy prices");
            let with_kw = Article::new("Markets update on climate").with_content("energy prices");
            assert!(
                score(&with_kw, &themes, &[], &weights) >= score(&plain, &themes, &[], &weights)
            );
        }

        #[test]
        fn test_custom_weights() {
            let weights = ScoringWeights {
                title_theme: 10,
                content_theme: 0,
                source_host: 1,
                source_title: 0,
            };
            let article = Article::new("AI news").with_url("https://ai.example.com");
            assert_eq!(score(&article, &labels(&["ai"]), &labels(&["example"]), &weights), 11);
        }
    }

    mod rank_tests {
        use super::*;

        #[test]
        fn test_identity_without_preferences() {
            let articles = sample();
            let ranked = rank_default(&articles, &[], &[]);
            assert_eq!(ranked, articles);
        }

        #[test]
        fn test_identity_with_only_blank_preferences() {
            let articles = sample();
            assert_eq!(rank_default(&articles, &labels(&[" "]), &[]), articles);
        }

        #[test]
        fn test_theme_match_moves_article_first() {
            let articles = vec![
                Article::new("AI breakthrough").with_url("https://techcrunch.com/x"),
                Article::new("Weather today"),
            ];
            let ranked = rank_default(&articles, &labels(&["AI"]), &[]);
            assert_eq!(titles(&ranked), vec!["AI breakthrough", "Weather today"]);

            let ranked = rank_default(&sample(), &labels(&["AI"]), &[]);
            assert_eq!(titles(&ranked)[0], "AI breakthrough");
        }

        #[test]
        fn test_source_match_moves_article_first() {
            let ranked = rank_default(&sample(), &[], &labels(&["techcrunch.com"]));
            assert_eq!(titles(&ranked), vec!["AI breakthrough", "Weather today", "Local sports"]);
        }

        #[test]
        fn test_ties_keep_input_order() {
            let articles = vec![
                Article::new("b rust"),
                Article::new("a nothing"),
                Article::new("c rust"),
                Article::new("d nothing"),
            ];
            let ranked = rank_default(&articles, &labels(&["rust"]), &[]);
            assert_eq!(titles(&ranked), vec!["b rust", "c rust", "a nothing", "d nothing"]);
        }

        #[test]
        fn test_deterministic() {
            let articles = sample();
            let themes = labels(&["today", "sports"]);
            let first = rank_default(&articles, &themes, &[]);
            let second = rank_default(&articles, &themes, &[]);
            assert_eq!(first, second);
        }

        #[test]
        fn test_input_is_untouched() {
            let articles = sample();
            let before = articles.clone();
            let _ = rank_default(&articles, &labels(&["sports"]), &labels(&["techcrunch"]));
            assert_eq!(articles, before);
        }

        #[test]
        fn test_is_personalized() {
            assert!(!is_personalized(&[], &[]));
            assert!(!is_personalized(&labels(&[""]), &labels(&["  "])));
            assert!(is_personalized(&[], &labels(&["wired"])));
        }
    }
}

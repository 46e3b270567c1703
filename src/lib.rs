//! Newsstand - a personalized news feed client
//!
//! This crate talks to a content-aggregation API and keeps a personalized,
//! re-rankable article feed, a shared favorite set and the source directory
//! in sync across views.

pub mod api;
pub mod article;
pub mod config;
pub mod db;
pub mod engine;
pub mod favorites;
pub mod feed;
pub mod notifications;
pub mod preferences;
pub mod scorer;
pub mod session;
pub mod sources;

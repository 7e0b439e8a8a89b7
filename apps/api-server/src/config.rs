//! Application configuration loaded from environment variables.

use std::env;

use quill_core::services::{ListingConfig, PostServiceConfig};
use quill_infra::{DatabaseConfig, JwtConfig, LocalMediaConfig};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: Option<DatabaseConfig>,
    pub media: LocalMediaConfig,
    pub listing: ListingConfig,
    pub posts: PostServiceConfig,
    pub jwt: JwtConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let listing_defaults = ListingConfig::default();
        let post_defaults = PostServiceConfig::default();

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT").unwrap_or(8080),
            database: DatabaseConfig::from_env(),
            media: LocalMediaConfig::from_env(),
            listing: ListingConfig {
                default_page_size: parse_var("DEFAULT_PAGE_SIZE")
                    .unwrap_or(listing_defaults.default_page_size),
                max_page_size: parse_var("MAX_PAGE_SIZE").unwrap_or(listing_defaults.max_page_size),
            },
            posts: PostServiceConfig {
                slug_insert_attempts: parse_var("SLUG_INSERT_ATTEMPTS")
                    .unwrap_or(post_defaults.slug_insert_attempts),
            },
            jwt: JwtConfig::from_env(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

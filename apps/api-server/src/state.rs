//! Application state - shared across all handlers.

use std::sync::Arc;

use quill_core::ports::{
    CategoryRepository, MediaStore, PasswordService, PostRepository, TokenService, UserRepository,
};
use quill_core::services::{PostListing, PostService, PostViewResolver};
use quill_infra::{
    Argon2PasswordService, InMemoryCategoryRepository, InMemoryPostRepository,
    InMemoryUserRepository, JwtTokenService, LocalMediaStore,
};

use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub posts: PostService,
    pub listing: PostListing,
    pub users: Arc<dyn UserRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub media: Arc<dyn MediaStore>,
    pub tokens: Arc<dyn TokenService>,
    pub passwords: Arc<dyn PasswordService>,
    /// Upper bound on a multipart post form, in bytes.
    pub upload_limit: usize,
}

type Stores = (
    Arc<dyn PostRepository>,
    Arc<dyn UserRepository>,
    Arc<dyn CategoryRepository>,
);

fn in_memory_stores() -> Stores {
    (
        Arc::new(InMemoryPostRepository::new()),
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemoryCategoryRepository::new()),
    )
}

impl AppState {
    /// Build the application state, connecting to PostgreSQL when configured.
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let stores = Self::stores(config).await?;
        tracing::info!("Application state initialized");
        Ok(Self::assemble(config, stores))
    }

    /// State backed entirely by in-memory stores.
    pub fn in_memory(config: &AppConfig) -> Self {
        Self::assemble(config, in_memory_stores())
    }

    fn assemble(config: &AppConfig, (posts, users, categories): Stores) -> Self {
        let views = PostViewResolver::new(users.clone(), categories.clone());
        let post_service = PostService::new(
            posts.clone(),
            users.clone(),
            categories.clone(),
            config.posts.clone(),
        );
        let listing = PostListing::new(posts, views, config.listing.clone());

        Self {
            posts: post_service,
            listing,
            users,
            categories,
            media: Arc::new(LocalMediaStore::new(config.media.clone())),
            tokens: Arc::new(JwtTokenService::new(config.jwt.clone())),
            passwords: Arc::new(Argon2PasswordService::new()),
            // Room for the text fields alongside the image.
            upload_limit: config.media.max_bytes + 1024 * 1024,
        }
    }

    #[cfg(feature = "postgres")]
    async fn stores(config: &AppConfig) -> anyhow::Result<Stores> {
        use migration::{Migrator, MigratorTrait};
        use quill_infra::{
            DatabaseConnections, PostgresCategoryRepository, PostgresPostRepository,
            PostgresUserRepository,
        };

        let Some(db_config) = config.database.as_ref() else {
            tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
            return Ok(in_memory_stores());
        };

        let connections = DatabaseConnections::init(db_config).await?;
        if db_config.run_migrations {
            Migrator::up(&connections.main, None).await?;
            tracing::info!("Database migrations applied");
        }

        let db = Arc::new(connections.main);
        Ok((
            Arc::new(PostgresPostRepository::new(Arc::clone(&db))),
            Arc::new(PostgresUserRepository::new(Arc::clone(&db))),
            Arc::new(PostgresCategoryRepository::new(db)),
        ))
    }

    #[cfg(not(feature = "postgres"))]
    async fn stores(config: &AppConfig) -> anyhow::Result<Stores> {
        if config.database.is_some() {
            tracing::warn!("DATABASE_URL ignored: built without the postgres feature");
        }
        tracing::info!("Running without postgres feature - using in-memory stores");
        Ok(in_memory_stores())
    }
}

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Category, Comment, Page, PageRequest, Post, PostChanges, User};
use crate::error::RepoError;

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Save an entity (create or update).
    async fn save(&self, entity: T) -> Result<T, RepoError>;

    /// Delete an entity by its ID.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// User repository with domain-specific methods.
#[async_trait]
pub trait UserRepository: BaseRepository<User, Uuid> {
    /// Find a user by their email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
}

/// Category repository.
#[async_trait]
pub trait CategoryRepository: BaseRepository<Category, Uuid> {
    /// Case-insensitive lookup by name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepoError>;

    /// All categories ordered by name.
    async fn list_all(&self) -> Result<Vec<Category>, RepoError>;
}

/// Post entity store.
///
/// The store is the final authority on slug uniqueness: `insert` and
/// `update` must reject a slug held by another post with
/// [`RepoError::DuplicateSlug`] atomically with the write.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a new post if its slug is free.
    async fn insert(&self, post: Post) -> Result<Post, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError>;

    /// Apply a partial change set. Fails with `NotFound` if the post is absent.
    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Post, RepoError>;

    /// Hard-delete a post and its comments. Fails with `NotFound` if absent.
    async fn remove(&self, id: Uuid) -> Result<(), RepoError>;

    /// Newest-first page of posts plus totals.
    async fn list(&self, request: PageRequest) -> Result<Page<Post>, RepoError>;

    async fn exists_by_slug(&self, slug: &str) -> Result<bool, RepoError>;

    /// Atomically add one to the view counter and return the new value.
    async fn increment_view_count(&self, id: Uuid) -> Result<u64, RepoError>;

    /// Append a comment and return the updated post.
    async fn push_comment(&self, id: Uuid, comment: Comment) -> Result<Post, RepoError>;

    async fn count(&self) -> Result<u64, RepoError>;
}

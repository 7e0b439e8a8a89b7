//! Post lifecycle service.
//!
//! Orchestrates create, update, delete, comment and view operations against
//! the post store. It validates input, checks that referenced users and
//! categories exist, enforces ownership, and assigns slugs.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{
    Comment, EXCERPT_MAX_CHARS, NewPost, Post, PostChanges, PostPatch, PostView, TITLE_MAX_CHARS,
};
use crate::error::{DomainError, RepoError};
use crate::ports::{CategoryRepository, PostRepository, UserRepository};

use super::slug::SlugCandidates;
use super::views::PostViewResolver;

/// Tuning for the lifecycle service.
#[derive(Debug, Clone)]
pub struct PostServiceConfig {
    /// How many times a write is retried after the store reports a slug
    /// collision that the existence probe missed.
    pub slug_insert_attempts: u32,
}

impl Default for PostServiceConfig {
    fn default() -> Self {
        Self {
            slug_insert_attempts: 5,
        }
    }
}

/// Input for [`PostService::create_post`].
#[derive(Debug, Clone, Default)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    pub category_id: Option<Uuid>,
    pub author_id: Uuid,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub tags: Vec<String>,
    pub is_published: bool,
}

/// Post lifecycle service.
#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserRepository>,
    categories: Arc<dyn CategoryRepository>,
    views: PostViewResolver,
    config: PostServiceConfig,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        users: Arc<dyn UserRepository>,
        categories: Arc<dyn CategoryRepository>,
        config: PostServiceConfig,
    ) -> Self {
        let views = PostViewResolver::new(users.clone(), categories.clone());
        Self {
            posts,
            users,
            categories,
            views,
            config,
        }
    }

    /// Create a post owned by `input.author_id`.
    #[tracing::instrument(skip(self, input), fields(author_id = %input.author_id))]
    pub async fn create_post(&self, input: CreatePostInput) -> Result<Post, DomainError> {
        let title = validate_title(&input.title)?;
        let content = validate_content(&input.content)?;
        let category_id = input
            .category_id
            .ok_or_else(|| DomainError::validation("Title, content, and category are required"))?;
        let excerpt = match input.excerpt {
            Some(excerpt) => validate_excerpt(&excerpt)?,
            None => String::new(),
        };

        self.ensure_author_exists(input.author_id).await?;
        self.ensure_category_exists(category_id).await?;

        let new_post = NewPost {
            title,
            content,
            author_id: input.author_id,
            category_id,
            excerpt,
            featured_image: input.featured_image,
            tags: normalize_tags(input.tags),
            is_published: input.is_published,
        };

        let attempts = self.config.slug_insert_attempts.max(1);
        let mut last_slug = String::new();
        for attempt in 1..=attempts {
            let slug = self.free_slug(&new_post.title, None).await?;
            match self.posts.insert(Post::new(new_post.clone(), slug)).await {
                Ok(post) => {
                    tracing::info!(post_id = %post.id, slug = %post.slug, "Post created");
                    return Ok(post);
                }
                Err(RepoError::DuplicateSlug(slug)) => {
                    tracing::warn!(%slug, attempt, "Slug taken at insert time, retrying");
                    last_slug = slug;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(slug = %last_slug, attempts, "Giving up on slug assignment");
        Err(DomainError::DuplicateSlug(last_slug))
    }

    /// Fetch a post with its author and category resolved.
    pub async fn get_post(&self, id: Uuid) -> Result<PostView, DomainError> {
        let post = self.load(id).await?;
        self.views.resolve(post).await
    }

    pub async fn get_post_by_slug(&self, slug: &str) -> Result<Option<PostView>, DomainError> {
        match self.posts.find_by_slug(slug).await? {
            Some(post) => Ok(Some(self.views.resolve(post).await?)),
            None => Ok(None),
        }
    }

    /// Apply a partial update on behalf of `requester_id`.
    ///
    /// Only the author may update a post. A title change regenerates the slug.
    #[tracing::instrument(skip(self, patch), fields(post_id = %id, requester_id = %requester_id))]
    pub async fn update_post(
        &self,
        id: Uuid,
        requester_id: Uuid,
        patch: PostPatch,
    ) -> Result<Post, DomainError> {
        let post = self.load_owned(id, requester_id).await?;
        if patch.is_empty() {
            return Ok(post);
        }

        let mut changes = PostChanges {
            content: patch.content.as_deref().map(validate_content).transpose()?,
            excerpt: patch.excerpt.as_deref().map(validate_excerpt).transpose()?,
            featured_image: patch.featured_image,
            tags: patch.tags.map(normalize_tags),
            is_published: patch.is_published,
            ..Default::default()
        };

        if let Some(category_id) = patch.category_id {
            if category_id != post.category_id {
                self.ensure_category_exists(category_id).await?;
            }
            changes.category_id = Some(category_id);
        }

        let new_title = match patch.title.as_deref() {
            Some(title) => {
                let title = validate_title(title)?;
                (title != post.title).then_some(title)
            }
            None => None,
        };

        let Some(title) = new_title else {
            return self.write_changes(id, changes).await;
        };

        changes.title = Some(title.clone());
        let attempts = self.config.slug_insert_attempts.max(1);
        let mut last_slug = String::new();
        for attempt in 1..=attempts {
            let slug = self.free_slug(&title, Some(&post.slug)).await?;
            changes.slug = Some(slug);
            match self.posts.update(id, changes.clone()).await {
                Ok(updated) => {
                    tracing::info!(slug = %updated.slug, "Post renamed");
                    return Ok(updated);
                }
                Err(RepoError::DuplicateSlug(slug)) => {
                    tracing::warn!(%slug, attempt, "Slug taken at update time, retrying");
                    last_slug = slug;
                }
                Err(RepoError::NotFound) => return Err(DomainError::post_not_found(id)),
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(slug = %last_slug, attempts, "Giving up on slug assignment");
        Err(DomainError::DuplicateSlug(last_slug))
    }

    /// Delete a post on behalf of `requester_id`, returning the removed record.
    #[tracing::instrument(skip(self), fields(post_id = %id, requester_id = %requester_id))]
    pub async fn delete_post(&self, id: Uuid, requester_id: Uuid) -> Result<Post, DomainError> {
        let post = self.load_owned(id, requester_id).await?;

        match self.posts.remove(id).await {
            Ok(()) => {
                tracing::info!("Post deleted");
                Ok(post)
            }
            Err(RepoError::NotFound) => Err(DomainError::post_not_found(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Append a comment by `user_id`.
    #[tracing::instrument(skip(self, content), fields(post_id = %post_id, user_id = %user_id))]
    pub async fn add_comment(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> Result<Post, DomainError> {
        if content.trim().is_empty() {
            return Err(DomainError::validation("Comment content is required"));
        }

        let comment = Comment::new(user_id, content.to_string());
        match self.posts.push_comment(post_id, comment).await {
            Ok(post) => Ok(post),
            Err(RepoError::NotFound) => Err(DomainError::post_not_found(post_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Record one view and return the new count.
    pub async fn increment_view(&self, post_id: Uuid) -> Result<u64, DomainError> {
        match self.posts.increment_view_count(post_id).await {
            Ok(count) => {
                tracing::debug!(%post_id, view_count = count, "View recorded");
                Ok(count)
            }
            Err(RepoError::NotFound) => Err(DomainError::post_not_found(post_id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn count_posts(&self) -> Result<u64, DomainError> {
        Ok(self.posts.count().await?)
    }

    async fn write_changes(&self, id: Uuid, changes: PostChanges) -> Result<Post, DomainError> {
        match self.posts.update(id, changes).await {
            Ok(post) => Ok(post),
            Err(RepoError::NotFound) => Err(DomainError::post_not_found(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self, id: Uuid) -> Result<Post, DomainError> {
        self.posts
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::post_not_found(id))
    }

    async fn load_owned(&self, id: Uuid, requester_id: Uuid) -> Result<Post, DomainError> {
        let post = self.load(id).await?;
        if !post.is_owned_by(requester_id) {
            tracing::warn!(author_id = %post.author_id, "Requester does not own post");
            return Err(DomainError::Unauthorized);
        }
        Ok(post)
    }

    /// First slug candidate for `title` not held by another post.
    /// `current` is the post's own slug, which never counts as a collision.
    async fn free_slug(&self, title: &str, current: Option<&str>) -> Result<String, DomainError> {
        let mut candidates = SlugCandidates::for_title(title);
        loop {
            let candidate = candidates.next_candidate();
            if current == Some(candidate.as_str()) || !self.posts.exists_by_slug(&candidate).await? {
                return Ok(candidate);
            }
        }
    }

    async fn ensure_author_exists(&self, id: Uuid) -> Result<(), DomainError> {
        match self.users.find_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::InvalidReference {
                entity_type: "User",
                id,
            }),
        }
    }

    async fn ensure_category_exists(&self, id: Uuid) -> Result<(), DomainError> {
        match self.categories.find_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::InvalidReference {
                entity_type: "Category",
                id,
            }),
        }
    }
}

fn validate_title(title: &str) -> Result<String, DomainError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("Please provide a title"));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(DomainError::validation(format!(
            "Title cannot be more than {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str) -> Result<String, DomainError> {
    if content.trim().is_empty() {
        return Err(DomainError::validation("Please provide content"));
    }
    Ok(content.to_string())
}

fn validate_excerpt(excerpt: &str) -> Result<String, DomainError> {
    if excerpt.chars().count() > EXCERPT_MAX_CHARS {
        return Err(DomainError::validation(format!(
            "Excerpt cannot be more than {EXCERPT_MAX_CHARS} characters"
        )));
    }
    Ok(excerpt.to_string())
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

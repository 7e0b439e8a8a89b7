use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use quill_core::domain::{Comment, Page, PageRequest, Post, PostChanges};
use quill_core::error::RepoError;
use quill_core::ports::PostRepository;

#[derive(Default)]
struct PostTable {
    rows: HashMap<Uuid, Post>,
    /// Unique index: slug -> post id.
    slugs: HashMap<String, Uuid>,
}

/// In-memory post store.
///
/// Every write takes the table's write lock, so the slug check and the write
/// it guards happen as one step, and view increments never lose updates.
#[derive(Default)]
pub struct InMemoryPostRepository {
    table: RwLock<PostTable>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn insert(&self, post: Post) -> Result<Post, RepoError> {
        let mut table = self.table.write().await;

        if table.slugs.contains_key(&post.slug) {
            return Err(RepoError::DuplicateSlug(post.slug));
        }
        if table.rows.contains_key(&post.id) {
            return Err(RepoError::Constraint(format!("Post {} already exists", post.id)));
        }

        table.slugs.insert(post.slug.clone(), post.id);
        table.rows.insert(post.id, post.clone());
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let table = self.table.read().await;
        Ok(table
            .slugs
            .get(slug)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Post, RepoError> {
        let mut table = self.table.write().await;
        let PostTable { rows, slugs } = &mut *table;

        let post = rows.get_mut(&id).ok_or(RepoError::NotFound)?;
        let old_slug = post.slug.clone();

        if let Some(new_slug) = &changes.slug {
            if slugs.get(new_slug).is_some_and(|owner| *owner != id) {
                return Err(RepoError::DuplicateSlug(new_slug.clone()));
            }
        }

        post.apply(changes);
        if post.slug != old_slug {
            slugs.remove(&old_slug);
            slugs.insert(post.slug.clone(), id);
        }

        Ok(post.clone())
    }

    async fn remove(&self, id: Uuid) -> Result<(), RepoError> {
        let mut table = self.table.write().await;
        let post = table.rows.remove(&id).ok_or(RepoError::NotFound)?;
        table.slugs.remove(&post.slug);
        Ok(())
    }

    async fn list(&self, request: PageRequest) -> Result<Page<Post>, RepoError> {
        let table = self.table.read().await;

        let mut posts: Vec<&Post> = table.rows.values().collect();
        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let items = posts
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.page_size as usize)
            .cloned()
            .collect();

        Ok(Page::new(items, request, table.rows.len() as u64))
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool, RepoError> {
        Ok(self.table.read().await.slugs.contains_key(slug))
    }

    async fn increment_view_count(&self, id: Uuid) -> Result<u64, RepoError> {
        let mut table = self.table.write().await;
        let post = table.rows.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.view_count += 1;
        Ok(post.view_count)
    }

    async fn push_comment(&self, id: Uuid, comment: Comment) -> Result<Post, RepoError> {
        let mut table = self.table.write().await;
        let post = table.rows.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.comments.push(comment);
        post.updated_at = Utc::now();
        Ok(post.clone())
    }

    async fn count(&self) -> Result<u64, RepoError> {
        Ok(self.table.read().await.rows.len() as u64)
    }
}

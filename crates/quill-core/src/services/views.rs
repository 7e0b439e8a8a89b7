//! Read-time resolution of a post's author and category.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{AuthorSummary, CategorySummary, Post, PostView};
use crate::error::DomainError;
use crate::ports::{CategoryRepository, UserRepository};

/// Joins posts with summaries of the entities they reference.
#[derive(Clone)]
pub struct PostViewResolver {
    users: Arc<dyn UserRepository>,
    categories: Arc<dyn CategoryRepository>,
}

impl PostViewResolver {
    pub fn new(users: Arc<dyn UserRepository>, categories: Arc<dyn CategoryRepository>) -> Self {
        Self { users, categories }
    }

    pub async fn resolve(&self, post: Post) -> Result<PostView, DomainError> {
        let author = self
            .users
            .find_by_id(post.author_id)
            .await?
            .map(|u| AuthorSummary::from(&u));
        let category = self
            .categories
            .find_by_id(post.category_id)
            .await?
            .map(|c| CategorySummary::from(&c));

        Ok(PostView {
            post,
            author,
            category,
        })
    }

    /// Resolve many posts, looking each referenced entity up once.
    pub async fn resolve_all(&self, posts: Vec<Post>) -> Result<Vec<PostView>, DomainError> {
        let mut authors: HashMap<Uuid, Option<AuthorSummary>> = HashMap::new();
        let mut categories: HashMap<Uuid, Option<CategorySummary>> = HashMap::new();
        let mut views = Vec::with_capacity(posts.len());

        for post in posts {
            if !authors.contains_key(&post.author_id) {
                let author = self.users.find_by_id(post.author_id).await?;
                authors.insert(post.author_id, author.as_ref().map(AuthorSummary::from));
            }
            if !categories.contains_key(&post.category_id) {
                let category = self.categories.find_by_id(post.category_id).await?;
                categories.insert(post.category_id, category.as_ref().map(CategorySummary::from));
            }

            views.push(PostView {
                author: authors.get(&post.author_id).cloned().flatten(),
                category: categories.get(&post.category_id).cloned().flatten(),
                post,
            });
        }

        Ok(views)
    }
}

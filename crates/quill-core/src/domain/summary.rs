//! Read-time projections of referenced entities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Category, Post, User};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
}

impl From<&Category> for CategorySummary {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
        }
    }
}

/// A post with its author and category resolved for presentation.
///
/// References that no longer resolve are left as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    pub post: Post,
    pub author: Option<AuthorSummary>,
    pub category: Option<CategorySummary>,
}

impl PostView {
    /// A view carrying only the raw references, as written.
    pub fn bare(post: Post) -> Self {
        Self {
            post,
            author: None,
            category: None,
        }
    }
}

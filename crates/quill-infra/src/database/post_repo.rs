//! PostgreSQL post store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait, Unchanged,
};
use uuid::Uuid;

use quill_core::domain::{Comment, Page, PageRequest, Post, PostChanges};
use quill_core::error::RepoError;
use quill_core::ports::PostRepository;

use super::entity::comment::{self, Entity as CommentEntity};
use super::entity::post::{self, Entity as PostEntity};
use super::postgres_base::map_db_err;

/// PostgreSQL post repository.
///
/// Slug uniqueness is enforced by the unique index on `posts.slug`; a
/// violation on insert or update comes back as [`RepoError::DuplicateSlug`].
pub struct PostgresPostRepository {
    db: Arc<DbConn>,
}

impl PostgresPostRepository {
    pub fn new(db: Arc<DbConn>) -> Self {
        Self { db }
    }

    async fn comments_for(&self, post_id: Uuid) -> Result<Vec<comment::Model>, RepoError> {
        CommentEntity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(map_db_err)
    }

    async fn hydrate(&self, model: post::Model) -> Result<Post, RepoError> {
        let comments = self.comments_for(model.id).await?;
        model.into_domain(comments)
    }
}

/// Name Postgres gives the unique constraint on `posts.slug`.
const SLUG_CONSTRAINT: &str = "posts_slug_key";

fn map_slug_err(err: DbErr, slug: &str) -> RepoError {
    match err.sql_err() {
        Some(violation) if is_slug_violation(&violation) => {
            RepoError::DuplicateSlug(slug.to_string())
        }
        _ => map_db_err(err),
    }
}

/// Only a clash on the slug constraint is retryable; any other unique
/// violation (a primary key, say) is a plain constraint error.
pub(crate) fn is_slug_violation(err: &SqlErr) -> bool {
    matches!(err, SqlErr::UniqueConstraintViolation(detail) if detail.contains(SLUG_CONSTRAINT))
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn insert(&self, post: Post) -> Result<Post, RepoError> {
        let slug = post.slug.clone();
        let active_model: post::ActiveModel = post.into();

        let model = active_model
            .insert(&*self.db)
            .await
            .map_err(|e| map_slug_err(e, &slug))?;

        tracing::debug!(post_id = %model.id, %slug, "Inserted post row");
        model.into_domain(Vec::new())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        let model = PostEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(map_db_err)?;

        match model {
            Some(model) => Ok(Some(self.hydrate(model).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let model = PostEntity::find()
            .filter(post::Column::Slug.eq(slug))
            .one(&*self.db)
            .await
            .map_err(map_db_err)?;

        match model {
            Some(model) => Ok(Some(self.hydrate(model).await?)),
            None => Ok(None),
        }
    }

    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Post, RepoError> {
        let mut active_model = post::ActiveModel {
            id: Unchanged(id),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        if let Some(title) = changes.title {
            active_model.title = Set(title);
        }
        if let Some(slug) = changes.slug.clone() {
            active_model.slug = Set(slug);
        }
        if let Some(content) = changes.content {
            active_model.content = Set(content);
        }
        if let Some(excerpt) = changes.excerpt {
            active_model.excerpt = Set(excerpt);
        }
        if let Some(featured_image) = changes.featured_image {
            active_model.featured_image = Set(featured_image);
        }
        if let Some(category_id) = changes.category_id {
            active_model.category_id = Set(category_id);
        }
        if let Some(tags) = changes.tags {
            active_model.tags = Set(serde_json::json!(tags));
        }
        if let Some(is_published) = changes.is_published {
            active_model.is_published = Set(is_published);
        }

        let slug = changes.slug.unwrap_or_default();
        let model = active_model
            .update(&*self.db)
            .await
            .map_err(|e| map_slug_err(e, &slug))?;

        self.hydrate(model).await
    }

    async fn remove(&self, id: Uuid) -> Result<(), RepoError> {
        // Comments go with the post via ON DELETE CASCADE.
        let result = PostEntity::delete_by_id(id)
            .exec(&*self.db)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, request: PageRequest) -> Result<Page<Post>, RepoError> {
        let total = self.count().await?;
        // Saturating offset: a page far past the end must not wrap to row 0.
        if request.page == 0 || request.page_size == 0 || request.offset() >= total {
            return Ok(Page::new(Vec::new(), request, total));
        }

        let models = PostEntity::find()
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .offset(request.offset())
            .limit(request.page_size)
            .all(&*self.db)
            .await
            .map_err(map_db_err)?;

        let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let mut comments: HashMap<Uuid, Vec<comment::Model>> = HashMap::new();
        if !ids.is_empty() {
            let rows = CommentEntity::find()
                .filter(comment::Column::PostId.is_in(ids))
                .order_by_asc(comment::Column::CreatedAt)
                .all(&*self.db)
                .await
                .map_err(map_db_err)?;
            for row in rows {
                comments.entry(row.post_id).or_default().push(row);
            }
        }

        let items = models
            .into_iter()
            .map(|m| {
                let own = comments.remove(&m.id).unwrap_or_default();
                m.into_domain(own)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, request, total))
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool, RepoError> {
        let count = PostEntity::find()
            .filter(post::Column::Slug.eq(slug))
            .count(&*self.db)
            .await
            .map_err(map_db_err)?;
        Ok(count > 0)
    }

    async fn increment_view_count(&self, id: Uuid) -> Result<u64, RepoError> {
        // Single UPDATE ... SET view_count = view_count + 1 RETURNING *
        let rows = PostEntity::update_many()
            .col_expr(
                post::Column::ViewCount,
                Expr::col(post::Column::ViewCount).add(1),
            )
            .filter(post::Column::Id.eq(id))
            .exec_with_returning(&*self.db)
            .await
            .map_err(map_db_err)?;

        let row = rows.into_iter().next().ok_or(RepoError::NotFound)?;
        Ok(u64::try_from(row.view_count).unwrap_or(0))
    }

    async fn push_comment(&self, id: Uuid, comment: Comment) -> Result<Post, RepoError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let touched = PostEntity::update_many()
            .col_expr(post::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(post::Column::Id.eq(id))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;
        if touched.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }

        comment::ActiveModel::for_post(id, comment)
            .insert(&txn)
            .await
            .map_err(map_db_err)?;
        txn.commit().await.map_err(map_db_err)?;

        self.find_by_id(id).await?.ok_or(RepoError::NotFound)
    }

    async fn count(&self) -> Result<u64, RepoError> {
        PostEntity::find()
            .count(&*self.db)
            .await
            .map_err(map_db_err)
    }
}

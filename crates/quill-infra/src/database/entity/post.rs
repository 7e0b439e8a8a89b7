//! Post entity for SeaORM.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

use quill_core::error::RepoError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub excerpt: String,
    pub featured_image: String,
    pub author_id: Uuid,
    pub category_id: Uuid,
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: Json,
    pub is_published: bool,
    pub view_count: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id"
    )]
    Author,
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Assemble the domain post from its row and its comment rows.
    pub fn into_domain(
        self,
        comments: Vec<super::comment::Model>,
    ) -> Result<quill_core::domain::Post, RepoError> {
        let tags: Vec<String> = serde_json::from_value(self.tags)
            .map_err(|e| RepoError::Query(format!("Malformed tags column: {e}")))?;

        Ok(quill_core::domain::Post {
            id: self.id,
            title: self.title,
            content: self.content,
            slug: self.slug,
            excerpt: self.excerpt,
            featured_image: self.featured_image,
            author_id: self.author_id,
            category_id: self.category_id,
            tags,
            is_published: self.is_published,
            view_count: u64::try_from(self.view_count).unwrap_or(0),
            comments: comments.into_iter().map(Into::into).collect(),
            created_at: self.created_at.into(),
            updated_at: self.updated_at.into(),
        })
    }
}

/// Conversion from domain Post to SeaORM ActiveModel. Comments live in
/// their own table and are not part of the row.
impl From<quill_core::domain::Post> for ActiveModel {
    fn from(post: quill_core::domain::Post) -> Self {
        Self {
            id: Set(post.id),
            title: Set(post.title),
            content: Set(post.content),
            slug: Set(post.slug),
            excerpt: Set(post.excerpt),
            featured_image: Set(post.featured_image),
            author_id: Set(post.author_id),
            category_id: Set(post.category_id),
            tags: Set(serde_json::json!(post.tags)),
            is_published: Set(post.is_published),
            view_count: Set(i64::try_from(post.view_count).unwrap_or(i64::MAX)),
            created_at: Set(post.created_at.into()),
            updated_at: Set(post.updated_at.into()),
        }
    }
}

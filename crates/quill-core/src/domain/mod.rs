//! Domain entities - the core business objects.

mod category;
mod page;
mod post;
mod summary;
mod user;

pub use category::Category;
pub use page::{Page, PageRequest};
pub use post::{
    Comment, DEFAULT_FEATURED_IMAGE, EXCERPT_MAX_CHARS, NewPost, Post, PostChanges, PostPatch,
    TITLE_MAX_CHARS,
};
pub use summary::{AuthorSummary, CategorySummary, PostView};
pub use user::User;

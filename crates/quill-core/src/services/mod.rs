//! Application services built on top of the ports.

mod listing;
mod posts;
pub mod slug;
mod views;

pub use listing::{ListingConfig, PostListing};
pub use posts::{CreatePostInput, PostService, PostServiceConfig};
pub use views::PostViewResolver;

//! Post lifecycle behavior against the in-memory stores.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use quill_core::domain::{Category, Comment, Page, PageRequest, Post, PostChanges, PostPatch, User};
use quill_core::error::{DomainError, RepoError};
use quill_core::ports::{BaseRepository, PostRepository};
use quill_core::services::{
    CreatePostInput, ListingConfig, PostListing, PostService, PostServiceConfig, PostViewResolver,
};
use quill_infra::{InMemoryCategoryRepository, InMemoryPostRepository, InMemoryUserRepository};

struct Fixture {
    service: PostService,
    listing: PostListing,
    posts: Arc<dyn PostRepository>,
    author: User,
    other: User,
    category: Category,
}

async fn fixture_with(posts: Arc<dyn PostRepository>, config: PostServiceConfig) -> Fixture {
    let users = Arc::new(InMemoryUserRepository::new());
    let categories = Arc::new(InMemoryCategoryRepository::new());

    let author = users
        .save(User::new("author".into(), "author@example.com".into(), "h".into()))
        .await
        .unwrap();
    let other = users
        .save(User::new("other".into(), "other@example.com".into(), "h".into()))
        .await
        .unwrap();
    let category = categories.save(Category::new("General".into())).await.unwrap();

    let service = PostService::new(posts.clone(), users.clone(), categories.clone(), config);
    let listing = PostListing::new(
        posts.clone(),
        PostViewResolver::new(users, categories),
        ListingConfig::default(),
    );

    Fixture {
        service,
        listing,
        posts,
        author,
        other,
        category,
    }
}

async fn fixture() -> Fixture {
    fixture_with(
        Arc::new(InMemoryPostRepository::new()),
        PostServiceConfig::default(),
    )
    .await
}

impl Fixture {
    fn input(&self, title: &str) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            content: "Some content".to_string(),
            category_id: Some(self.category.id),
            author_id: self.author.id,
            ..Default::default()
        }
    }

    async fn create(&self, title: &str) -> Post {
        self.service.create_post(self.input(title)).await.unwrap()
    }
}

#[tokio::test]
async fn test_same_normalized_title_yields_distinct_slugs() {
    let fx = fixture().await;

    let first = fx.create("T1 title").await;
    let second = fx.create("T1 Title!").await;

    assert_eq!(first.slug, "t1-title");
    assert_eq!(second.slug, "t1-title-1");
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn test_create_assigns_defaults() {
    let fx = fixture().await;
    let post = fx.create("  Hello World  ").await;

    assert_eq!(post.title, "Hello World");
    assert_eq!(post.featured_image, "default-post.jpg");
    assert_eq!(post.author_id, fx.author.id);
    assert_eq!(post.view_count, 0);
    assert!(!post.is_published);
}

#[tokio::test]
async fn test_create_with_empty_title_is_rejected_without_mutation() {
    let fx = fixture().await;
    fx.create("Existing").await;
    let before = fx.posts.count().await.unwrap();

    let result = fx.service.create_post(fx.input("   ")).await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert_eq!(fx.posts.count().await.unwrap(), before);
}

#[tokio::test]
async fn test_create_requires_content_and_category() {
    let fx = fixture().await;

    let mut no_content = fx.input("Title");
    no_content.content = String::new();
    assert!(matches!(
        fx.service.create_post(no_content).await,
        Err(DomainError::Validation(_))
    ));

    let mut no_category = fx.input("Title");
    no_category.category_id = None;
    assert!(matches!(
        fx.service.create_post(no_category).await,
        Err(DomainError::Validation(_))
    ));
}

#[tokio::test]
async fn test_create_rejects_overlong_title() {
    let fx = fixture().await;
    let result = fx.service.create_post(fx.input(&"a".repeat(101))).await;
    assert!(matches!(result, Err(DomainError::Validation(_))));
}

#[tokio::test]
async fn test_create_with_unknown_references() {
    let fx = fixture().await;

    let mut bad_category = fx.input("Title");
    bad_category.category_id = Some(Uuid::new_v4());
    assert!(matches!(
        fx.service.create_post(bad_category).await,
        Err(DomainError::InvalidReference { entity_type: "Category", .. })
    ));

    let mut bad_author = fx.input("Title");
    bad_author.author_id = Uuid::new_v4();
    assert!(matches!(
        fx.service.create_post(bad_author).await,
        Err(DomainError::InvalidReference { entity_type: "User", .. })
    ));
    assert_eq!(fx.posts.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_get_post_resolves_summaries() {
    let fx = fixture().await;
    let post = fx.create("Resolved").await;

    let view = fx.service.get_post(post.id).await.unwrap();

    assert_eq!(view.author.unwrap().username, "author");
    assert_eq!(view.category.unwrap().name, "General");

    let missing = fx.service.get_post(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(DomainError::NotFound { .. })));
}

#[tokio::test]
async fn test_get_post_by_slug() {
    let fx = fixture().await;
    let post = fx.create("Find Me").await;

    let view = fx.service.get_post_by_slug("find-me").await.unwrap().unwrap();
    assert_eq!(view.post.id, post.id);
    assert!(fx.service.get_post_by_slug("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_by_non_owner_is_unauthorized_and_leaves_post_unchanged() {
    let fx = fixture().await;
    let post = fx.create("Owned").await;

    let result = fx
        .service
        .update_post(
            post.id,
            fx.other.id,
            PostPatch {
                title: Some("Hijacked".into()),
                content: Some("Hijacked".into()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(DomainError::Unauthorized)));
    let stored = fx.posts.find_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(stored, post);
}

#[tokio::test]
async fn test_update_title_regenerates_slug() {
    let fx = fixture().await;
    fx.create("Taken Name").await;
    let post = fx.create("Original").await;

    let updated = fx
        .service
        .update_post(
            post.id,
            fx.author.id,
            PostPatch {
                title: Some("Taken Name".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "Taken Name");
    assert_eq!(updated.slug, "taken-name-1");
    assert!(!fx.posts.exists_by_slug("original").await.unwrap());
}

#[tokio::test]
async fn test_update_title_to_same_base_keeps_own_slug() {
    let fx = fixture().await;
    let post = fx.create("Hello").await;

    let updated = fx
        .service
        .update_post(
            post.id,
            fx.author.id,
            PostPatch {
                title: Some("Hello!".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "Hello!");
    assert_eq!(updated.slug, "hello");
}

#[tokio::test]
async fn test_update_without_title_keeps_slug() {
    let fx = fixture().await;
    let post = fx.create("Stable").await;

    let updated = fx
        .service
        .update_post(
            post.id,
            fx.author.id,
            PostPatch {
                content: Some("Rewritten".into()),
                featured_image: Some("cover.png".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.slug, "stable");
    assert_eq!(updated.content, "Rewritten");
    assert_eq!(updated.featured_image, "cover.png");
}

#[tokio::test]
async fn test_update_to_unknown_category_is_invalid_reference() {
    let fx = fixture().await;
    let post = fx.create("Categorized").await;

    let result = fx
        .service
        .update_post(
            post.id,
            fx.author.id,
            PostPatch {
                category_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(DomainError::InvalidReference { .. })));
}

#[tokio::test]
async fn test_update_missing_post_is_not_found() {
    let fx = fixture().await;
    let result = fx
        .service
        .update_post(Uuid::new_v4(), fx.author.id, PostPatch::default())
        .await;
    assert!(matches!(result, Err(DomainError::NotFound { .. })));
}

#[tokio::test]
async fn test_delete_twice_is_not_found() {
    let fx = fixture().await;
    let post = fx.create("Short lived").await;

    let deleted = fx.service.delete_post(post.id, fx.author.id).await.unwrap();
    assert_eq!(deleted.id, post.id);

    let again = fx.service.delete_post(post.id, fx.author.id).await;
    assert!(matches!(again, Err(DomainError::NotFound { .. })));
}

#[tokio::test]
async fn test_delete_by_non_owner_is_unauthorized() {
    let fx = fixture().await;
    let post = fx.create("Keep me").await;

    let result = fx.service.delete_post(post.id, fx.other.id).await;

    assert!(matches!(result, Err(DomainError::Unauthorized)));
    assert!(fx.posts.find_by_id(post.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_add_comment() {
    let fx = fixture().await;
    let post = fx.create("Discuss").await;

    let updated = fx
        .service
        .add_comment(post.id, fx.other.id, "First!")
        .await
        .unwrap();

    assert_eq!(updated.comments.len(), 1);
    assert_eq!(updated.comments[0].content, "First!");
    assert_eq!(updated.comments[0].author_id, fx.other.id);

    let empty = fx.service.add_comment(post.id, fx.other.id, " ").await;
    assert!(matches!(empty, Err(DomainError::Validation(_))));

    let missing = fx.service.add_comment(Uuid::new_v4(), fx.other.id, "hi").await;
    assert!(matches!(missing, Err(DomainError::NotFound { .. })));
}

#[tokio::test]
async fn test_comment_keeps_its_whitespace() {
    let fx = fixture().await;
    let post = fx.create("Snippets").await;
    let body = "  Try this:\n\n    let x = 1;\n";

    let updated = fx
        .service
        .add_comment(post.id, fx.other.id, body)
        .await
        .unwrap();

    assert_eq!(updated.comments[0].content, body);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_view_increments_are_not_lost() {
    let fx = fixture().await;
    let post = fx.create("Popular").await;
    let initial = fx.posts.find_by_id(post.id).await.unwrap().unwrap().view_count;

    const N: u64 = 64;
    let handles: Vec<_> = (0..N)
        .map(|_| {
            let service = fx.service.clone();
            tokio::spawn(async move { service.increment_view(post.id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = fx.posts.find_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(stored.view_count, initial + N);
}

#[tokio::test]
async fn test_increment_view_missing_post() {
    let fx = fixture().await;
    let result = fx.service.increment_view(Uuid::new_v4()).await;
    assert!(matches!(result, Err(DomainError::NotFound { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_with_same_title_get_unique_slugs() {
    let fx = fixture_with(
        Arc::new(InMemoryPostRepository::new()),
        PostServiceConfig {
            slug_insert_attempts: 10,
        },
    )
    .await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let service = fx.service.clone();
            let input = fx.input("Race Condition");
            tokio::spawn(async move { service.create_post(input).await })
        })
        .collect();

    let mut slugs = HashSet::new();
    for handle in handles {
        let post = handle.await.unwrap().unwrap();
        assert!(slugs.insert(post.slug));
    }
    assert_eq!(slugs.len(), 10);
}

#[tokio::test]
async fn test_list_first_page_newest_first() {
    let fx = fixture().await;
    for i in 1..=5 {
        fx.create(&format!("Post {i}")).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let page = fx.listing.list_posts(1, 2).await.unwrap();

    let titles: Vec<_> = page.items.iter().map(|v| v.post.title.as_str()).collect();
    assert_eq!(titles, vec!["Post 5", "Post 4"]);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.total, 5);
    assert_eq!(page.items[0].author.as_ref().unwrap().username, "author");
}

#[tokio::test]
async fn test_list_out_of_range_page_is_empty() {
    let fx = fixture().await;
    for i in 1..=3 {
        fx.create(&format!("Post {i}")).await;
    }

    let past_end = fx.listing.list_posts(9, 2).await.unwrap();
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.page, 2);
    assert_eq!(past_end.total_pages, 2);

    let zero = fx.listing.list_posts(0, 2).await.unwrap();
    assert!(zero.items.is_empty());
    assert_eq!(zero.page, 1);
}

#[tokio::test]
async fn test_list_empty_store() {
    let fx = fixture().await;
    let page = fx.listing.list_posts(1, 10).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_pages, 0);
    assert_eq!(page.page, 1);
}

/// Store whose slug probe reports stale "free" answers for the first few calls,
/// simulating a concurrent writer grabbing the slug between probe and insert.
struct StaleProbeRepository {
    inner: InMemoryPostRepository,
    stale_probes: AtomicUsize,
}

#[async_trait]
impl PostRepository for StaleProbeRepository {
    async fn insert(&self, post: Post) -> Result<Post, RepoError> {
        self.inner.insert(post).await
    }
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        self.inner.find_by_id(id).await
    }
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        self.inner.find_by_slug(slug).await
    }
    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Post, RepoError> {
        self.inner.update(id, changes).await
    }
    async fn remove(&self, id: Uuid) -> Result<(), RepoError> {
        self.inner.remove(id).await
    }
    async fn list(&self, request: PageRequest) -> Result<Page<Post>, RepoError> {
        self.inner.list(request).await
    }
    async fn exists_by_slug(&self, slug: &str) -> Result<bool, RepoError> {
        let stale = self
            .stale_probes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(false);
        }
        self.inner.exists_by_slug(slug).await
    }
    async fn increment_view_count(&self, id: Uuid) -> Result<u64, RepoError> {
        self.inner.increment_view_count(id).await
    }
    async fn push_comment(&self, id: Uuid, comment: Comment) -> Result<Post, RepoError> {
        self.inner.push_comment(id, comment).await
    }
    async fn count(&self) -> Result<u64, RepoError> {
        self.inner.count().await
    }
}

#[tokio::test]
async fn test_duplicate_slug_at_insert_is_retried() {
    let repo = Arc::new(StaleProbeRepository {
        inner: InMemoryPostRepository::new(),
        stale_probes: AtomicUsize::new(0),
    });
    let fx = fixture_with(repo.clone(), PostServiceConfig::default()).await;

    fx.create("Contested").await;
    repo.stale_probes.store(1, Ordering::SeqCst);

    let second = fx.create("Contested").await;
    assert_eq!(second.slug, "contested-1");
}

#[tokio::test]
async fn test_duplicate_slug_retries_are_bounded() {
    let repo = Arc::new(StaleProbeRepository {
        inner: InMemoryPostRepository::new(),
        stale_probes: AtomicUsize::new(0),
    });
    let fx = fixture_with(
        repo.clone(),
        PostServiceConfig {
            slug_insert_attempts: 3,
        },
    )
    .await;

    fx.create("Contested").await;
    repo.stale_probes.store(usize::MAX, Ordering::SeqCst);

    let result = fx.service.create_post(fx.input("Contested")).await;

    let err = result.unwrap_err();
    assert!(matches!(err, DomainError::DuplicateSlug(_)));
    assert!(!err.is_client_error());
    assert_eq!(repo.count().await.unwrap(), 1);
}

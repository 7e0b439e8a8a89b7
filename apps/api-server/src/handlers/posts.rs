//! Post lifecycle handlers.

use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use uuid::Uuid;

use quill_core::domain::{Comment, DEFAULT_FEATURED_IMAGE, Page, PostView};
use quill_shared::MessageResponse;
use quill_shared::dto::{
    AddCommentRequest, CommentResponse, ListPostsQuery, PostListResponse, PostResponse,
    ReferenceResponse, ViewCountResponse,
};

use super::form::{PostForm, discard_image, stage_image};
use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn comment_response(comment: Comment) -> CommentResponse {
    CommentResponse {
        id: comment.id.to_string(),
        user: comment.author_id.to_string(),
        content: comment.content,
        created_at: comment.created_at.to_rfc3339(),
    }
}

pub(crate) fn post_response(view: PostView) -> PostResponse {
    let PostView {
        post,
        author,
        category,
    } = view;

    PostResponse {
        url: post.url(),
        id: post.id.to_string(),
        title: post.title,
        content: post.content,
        slug: post.slug,
        excerpt: post.excerpt,
        featured_image: post.featured_image,
        author: ReferenceResponse {
            id: post.author_id.to_string(),
            name: author.map(|a| a.username),
        },
        category: ReferenceResponse {
            id: post.category_id.to_string(),
            name: category.map(|c| c.name),
        },
        tags: post.tags,
        is_published: post.is_published,
        view_count: post.view_count,
        comments: post.comments.into_iter().map(comment_response).collect(),
        created_at: post.created_at.to_rfc3339(),
        updated_at: post.updated_at.to_rfc3339(),
    }
}

fn list_response(page: Page<PostView>) -> PostListResponse {
    PostListResponse {
        page: page.page,
        page_size: page.page_size,
        total: page.total,
        total_pages: page.total_pages,
        posts: page.items.into_iter().map(post_response).collect(),
    }
}

/// Drop a post's previous image once nothing refers to it.
async fn release_image(state: &AppState, reference: &str) {
    if reference != DEFAULT_FEATURED_IMAGE {
        discard_image(state.media.as_ref(), Some(reference)).await;
    }
}

/// POST /api/posts
pub async fn create_post(
    state: web::Data<AppState>,
    identity: Identity,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let form = PostForm::parse(payload, state.upload_limit).await?;
    let (mut input, image) = form.into_create(identity.user_id)?;

    let staged = stage_image(state.media.as_ref(), image).await?;
    input.featured_image = staged.clone();

    match state.posts.create_post(input).await {
        Ok(post) => Ok(HttpResponse::Created().json(post_response(PostView::bare(post)))),
        Err(e) => {
            discard_image(state.media.as_ref(), staged.as_deref()).await;
            Err(e.into())
        }
    }
}

/// GET /api/posts?page=&pageSize=
pub async fn list_posts(
    state: web::Data<AppState>,
    query: web::Query<ListPostsQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let page = state
        .listing
        .list_posts(query.page.unwrap_or(1), query.page_size.unwrap_or(0))
        .await?;

    Ok(HttpResponse::Ok().json(list_response(page)))
}

/// GET /api/posts/{id}
pub async fn get_post(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let view = state.posts.get_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post_response(view)))
}

/// GET /api/posts/slug/{slug}
pub async fn get_post_by_slug(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let slug = path.into_inner();
    let view = state
        .posts
        .get_post_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post with slug '{}' not found", slug)))?;

    Ok(HttpResponse::Ok().json(post_response(view)))
}

/// PUT /api/posts/{id}
pub async fn update_post(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let form = PostForm::parse(payload, state.upload_limit).await?;
    let (mut patch, image) = form.into_patch()?;

    let staged = stage_image(state.media.as_ref(), image).await?;
    patch.featured_image = staged.clone();

    // Needed to release the replaced image after a successful write.
    let previous_image = match &staged {
        Some(_) => match state.posts.get_post(id).await {
            Ok(view) => Some(view.post.featured_image),
            Err(e) => {
                discard_image(state.media.as_ref(), staged.as_deref()).await;
                return Err(e.into());
            }
        },
        None => None,
    };

    match state.posts.update_post(id, identity.user_id, patch).await {
        Ok(post) => {
            if let Some(previous) = previous_image.filter(|p| *p != post.featured_image) {
                release_image(&state, &previous).await;
            }
            Ok(HttpResponse::Ok().json(post_response(PostView::bare(post))))
        }
        Err(e) => {
            discard_image(state.media.as_ref(), staged.as_deref()).await;
            Err(e.into())
        }
    }
}

/// DELETE /api/posts/{id}
pub async fn delete_post(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let removed = state
        .posts
        .delete_post(path.into_inner(), identity.user_id)
        .await?;
    release_image(&state, &removed.featured_image).await;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Post deleted")))
}

/// POST /api/posts/{id}/comments
pub async fn add_comment(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<AddCommentRequest>,
) -> AppResult<HttpResponse> {
    let post = state
        .posts
        .add_comment(path.into_inner(), identity.user_id, &body.content)
        .await?;

    Ok(HttpResponse::Created().json(post_response(PostView::bare(post))))
}

/// POST /api/posts/{id}/views
pub async fn record_view(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let view_count = state.posts.increment_view(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ViewCountResponse { view_count }))
}

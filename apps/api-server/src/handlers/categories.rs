//! Category handlers.

use actix_web::{HttpResponse, web};

use quill_core::domain::Category;
use quill_core::ports::BaseRepository;
use quill_shared::dto::{CategoryResponse, CreateCategoryRequest};

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn category_response(category: Category) -> CategoryResponse {
    CategoryResponse {
        id: category.id.to_string(),
        name: category.name,
    }
}

/// GET /api/categories
pub async fn list_categories(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let categories = state.categories.list_all().await?;
    let body: Vec<_> = categories.into_iter().map(category_response).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /api/categories
pub async fn create_category(
    state: web::Data<AppState>,
    _identity: Identity,
    body: web::Json<CreateCategoryRequest>,
) -> AppResult<HttpResponse> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Category name is required".to_string()));
    }

    if state.categories.find_by_name(name).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Category '{}' already exists",
            name
        )));
    }

    let saved = state.categories.save(Category::new(name.to_string())).await?;
    tracing::info!(category_id = %saved.id, "Category created");

    Ok(HttpResponse::Created().json(category_response(saved)))
}

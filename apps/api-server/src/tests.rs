//! HTTP-level tests against in-memory stores.

use std::path::PathBuf;

use actix_web::http::{StatusCode, header};
use actix_web::{App, test, web};
use serde_json::{Value, json};
use uuid::Uuid;

use quill_core::domain::{Category, DEFAULT_FEATURED_IMAGE, User};
use quill_core::ports::BaseRepository;
use quill_core::services::{ListingConfig, PostServiceConfig};
use quill_infra::{JwtConfig, LocalMediaConfig};

use crate::config::AppConfig;
use crate::handlers::configure_routes;
use crate::state::AppState;

const BOUNDARY: &str = "quill-test-boundary";

fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: None,
        media: LocalMediaConfig {
            root: std::env::temp_dir().join(format!("quill-api-{}", Uuid::new_v4())),
            max_bytes: 1024,
        },
        listing: ListingConfig::default(),
        posts: PostServiceConfig::default(),
        jwt: JwtConfig::default(),
    }
}

struct Seed {
    state: AppState,
    upload_dir: PathBuf,
    author_token: String,
    other_token: String,
    category_id: Uuid,
}

async fn seed() -> Seed {
    let config = test_config();
    let state = AppState::in_memory(&config);

    let author = state
        .users
        .save(User::new("author".into(), "author@example.com".into(), "h".into()))
        .await
        .unwrap();
    let other = state
        .users
        .save(User::new("other".into(), "other@example.com".into(), "h".into()))
        .await
        .unwrap();
    let category = state
        .categories
        .save(Category::new("General".into()))
        .await
        .unwrap();

    Seed {
        author_token: state.tokens.generate_token(author.id, &author.username).unwrap(),
        other_token: state.tokens.generate_token(other.id, &other.username).unwrap(),
        category_id: category.id,
        upload_dir: config.media.root.clone(),
        state,
    }
}

fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn form_request(
    req: test::TestRequest,
    token: Option<&str>,
    fields: &[(&str, &str)],
    image: Option<(&str, &str, &[u8])>,
) -> test::TestRequest {
    let req = req
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(multipart_body(fields, image));
    match token {
        Some(token) => req.insert_header((header::AUTHORIZATION, format!("Bearer {token}"))),
        None => req,
    }
}

fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn test_post_lifecycle_over_http() {
    let seed = seed().await;
    let app = app!(seed.state);
    let category = seed.category_id.to_string();

    let req = form_request(
        test::TestRequest::post().uri("/api/posts"),
        Some(&seed.author_token),
        &[
            ("title", "Hello, World!"),
            ("content", "First post"),
            ("categoryId", &category),
            ("tags", "intro, rust"),
        ],
        None,
    );
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(res).await;
    assert_eq!(created["slug"], "hello-world");
    assert_eq!(created["url"], "/posts/hello-world");
    assert_eq!(created["featuredImage"], DEFAULT_FEATURED_IMAGE);
    assert_eq!(created["tags"], json!(["intro", "rust"]));
    let id = created["id"].as_str().unwrap().to_string();

    // Same title again gets the next free slug.
    let req = form_request(
        test::TestRequest::post().uri("/api/posts"),
        Some(&seed.author_token),
        &[
            ("title", "hello world"),
            ("content", "Second post"),
            ("categoryId", &category),
        ],
        None,
    );
    let res = test::call_service(&app, req.to_request()).await;
    let second: Value = test::read_body_json(res).await;
    assert_eq!(second["slug"], "hello-world-1");

    let req = test::TestRequest::get().uri(&format!("/api/posts/{id}"));
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: Value = test::read_body_json(res).await;
    assert_eq!(fetched["author"]["name"], "author");
    assert_eq!(fetched["category"]["name"], "General");

    let req = test::TestRequest::get().uri("/api/posts/slug/hello-world-1");
    let res = test::call_service(&app, req.to_request()).await;
    let by_slug: Value = test::read_body_json(res).await;
    assert_eq!(by_slug["content"], "Second post");

    let req = test::TestRequest::get().uri("/api/posts?page=1&pageSize=1");
    let res = test::call_service(&app, req.to_request()).await;
    let list: Value = test::read_body_json(res).await;
    assert_eq!(list["total"], 2);
    assert_eq!(list["totalPages"], 2);
    assert_eq!(list["pageSize"], 1);
    assert_eq!(list["posts"][0]["slug"], "hello-world-1");

    let req = test::TestRequest::post().uri(&format!("/api/posts/{id}/views"));
    let res = test::call_service(&app, req.to_request()).await;
    let views: Value = test::read_body_json(res).await;
    assert_eq!(views["viewCount"], 1);

    let req = test::TestRequest::post()
        .uri(&format!("/api/posts/{id}/comments"))
        .insert_header(bearer(&seed.other_token))
        .set_json(json!({ "content": "Nice one" }));
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let commented: Value = test::read_body_json(res).await;
    assert_eq!(commented["comments"][0]["content"], "Nice one");

    let req = form_request(
        test::TestRequest::put().uri(&format!("/api/posts/{id}")),
        Some(&seed.author_token),
        &[("title", "Renamed post")],
        None,
    );
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(res).await;
    assert_eq!(updated["slug"], "renamed-post");
    assert_eq!(updated["content"], "First post");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/posts/{id}"))
        .insert_header(bearer(&seed.author_token));
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["message"], "Post deleted");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/posts/{id}"))
        .insert_header(bearer(&seed.author_token));
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_only_author_may_change_post() {
    let seed = seed().await;
    let app = app!(seed.state);
    let category = seed.category_id.to_string();

    let req = form_request(
        test::TestRequest::post().uri("/api/posts"),
        Some(&seed.author_token),
        &[("title", "Mine"), ("content", "Body"), ("categoryId", &category)],
        None,
    );
    let created: Value = test::call_and_read_body_json(&app, req.to_request()).await;
    let id = created["id"].as_str().unwrap().to_string();

    let req = form_request(
        test::TestRequest::put().uri(&format!("/api/posts/{id}")),
        Some(&seed.other_token),
        &[("title", "Hijacked")],
        None,
    );
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/posts/{id}"))
        .insert_header(bearer(&seed.other_token));
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get().uri(&format!("/api/posts/{id}"));
    let current: Value = test::call_and_read_body_json(&app, req.to_request()).await;
    assert_eq!(current["title"], "Mine");
}

#[actix_web::test]
async fn test_mutations_require_token() {
    let seed = seed().await;
    let app = app!(seed.state);

    let req = form_request(
        test::TestRequest::post().uri("/api/posts"),
        None,
        &[("title", "Anon"), ("content", "Body")],
        None,
    );
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let req = form_request(
        test::TestRequest::post().uri("/api/posts"),
        Some("garbage"),
        &[("title", "Anon"), ("content", "Body")],
        None,
    );
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(seed.state.posts.count_posts().await.unwrap(), 0);
}

#[actix_web::test]
async fn test_create_rejects_bad_input() {
    let seed = seed().await;
    let app = app!(seed.state);
    let category = seed.category_id.to_string();

    let req = form_request(
        test::TestRequest::post().uri("/api/posts"),
        Some(&seed.author_token),
        &[("content", "No title"), ("categoryId", &category)],
        None,
    );
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let unknown = Uuid::new_v4().to_string();
    let req = form_request(
        test::TestRequest::post().uri("/api/posts"),
        Some(&seed.author_token),
        &[("title", "T"), ("content", "C"), ("categoryId", &unknown)],
        None,
    );
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert_eq!(seed.state.posts.count_posts().await.unwrap(), 0);
}

#[actix_web::test]
async fn test_image_upload_is_stored_and_cleaned_up_on_failure() {
    let seed = seed().await;
    let app = app!(seed.state);
    let category = seed.category_id.to_string();
    let png: &[u8] = &[0x89, b'P', b'N', b'G'];

    let req = form_request(
        test::TestRequest::post().uri("/api/posts"),
        Some(&seed.author_token),
        &[("title", "With image"), ("content", "C"), ("categoryId", &category)],
        Some(("cover.png", "image/png", png)),
    );
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(res).await;
    let reference = created["featuredImage"].as_str().unwrap().to_string();
    assert!(reference.ends_with(".png"));
    assert!(seed.upload_dir.join(&reference).exists());

    // Dispatch fails on the unknown category, so the staged file goes away.
    let unknown = Uuid::new_v4().to_string();
    let req = form_request(
        test::TestRequest::post().uri("/api/posts"),
        Some(&seed.author_token),
        &[("title", "Orphan"), ("content", "C"), ("categoryId", &unknown)],
        Some(("orphan.png", "image/png", png)),
    );
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let mut entries = std::fs::read_dir(&seed.upload_dir).unwrap();
    let only = entries.next().unwrap().unwrap();
    assert_eq!(only.file_name().to_string_lossy(), reference);
    assert!(entries.next().is_none());

    let req = form_request(
        test::TestRequest::post().uri("/api/posts"),
        Some(&seed.author_token),
        &[("title", "Text file"), ("content", "C"), ("categoryId", &category)],
        Some(("notes.txt", "text/plain", &b"hello"[..])),
    );
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let _ = std::fs::remove_dir_all(&seed.upload_dir);
}

#[actix_web::test]
async fn test_replacing_image_removes_previous_file() {
    let seed = seed().await;
    let app = app!(seed.state);
    let category = seed.category_id.to_string();
    let png: &[u8] = &[0x89, b'P', b'N', b'G'];

    let req = form_request(
        test::TestRequest::post().uri("/api/posts"),
        Some(&seed.author_token),
        &[("title", "Cover swap"), ("content", "C"), ("categoryId", &category)],
        Some(("first.png", "image/png", png)),
    );
    let created: Value = test::call_and_read_body_json(&app, req.to_request()).await;
    let id = created["id"].as_str().unwrap().to_string();
    let first = created["featuredImage"].as_str().unwrap().to_string();
    assert!(seed.upload_dir.join(&first).exists());

    let req = form_request(
        test::TestRequest::put().uri(&format!("/api/posts/{id}")),
        Some(&seed.author_token),
        &[],
        Some(("second.png", "image/png", png)),
    );
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(res).await;
    let second = updated["featuredImage"].as_str().unwrap().to_string();

    assert_ne!(first, second);
    assert!(!seed.upload_dir.join(&first).exists());
    assert!(seed.upload_dir.join(&second).exists());

    // Unknown post: the lookup fails and the staged upload is dropped.
    let req = form_request(
        test::TestRequest::put().uri(&format!("/api/posts/{}", Uuid::new_v4())),
        Some(&seed.author_token),
        &[],
        Some(("stray.png", "image/png", png)),
    );
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(std::fs::read_dir(&seed.upload_dir).unwrap().count(), 1);

    let _ = std::fs::remove_dir_all(&seed.upload_dir);
}

#[actix_web::test]
async fn test_register_login_and_me() {
    let seed = seed().await;
    let app = app!(seed.state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "username": "ada",
            "email": "ada@example.com",
            "password": "correct horse"
        }));
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "username": "ada2",
            "email": "ADA@example.com",
            "password": "correct horse"
        }));
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "ada@example.com", "password": "wrong" }));
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "ada@example.com", "password": "correct horse" }));
    let login: Value = test::call_and_read_body_json(&app, req.to_request()).await;
    assert_eq!(login["tokenType"], "Bearer");
    let token = login["accessToken"].as_str().unwrap();

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer(token));
    let me: Value = test::call_and_read_body_json(&app, req.to_request()).await;
    assert_eq!(me["username"], "ada");
}

#[actix_web::test]
async fn test_category_names_are_unique() {
    let seed = seed().await;
    let app = app!(seed.state);

    let req = test::TestRequest::post()
        .uri("/api/categories")
        .insert_header(bearer(&seed.author_token))
        .set_json(json!({ "name": "general" }));
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/categories")
        .insert_header(bearer(&seed.author_token))
        .set_json(json!({ "name": "Rust" }));
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let req = test::TestRequest::get().uri("/api/categories");
    let list: Value = test::call_and_read_body_json(&app, req.to_request()).await;
    let names: Vec<_> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["General", "Rust"]);
}

#[actix_web::test]
async fn test_health_reports_post_count() {
    let seed = seed().await;
    let app = app!(seed.state);

    let req = test::TestRequest::get()
        .uri("/api/health")
        .insert_header(("X-Request-ID", "health-1"));
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["posts"], 0);
}

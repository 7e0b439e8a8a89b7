//! Multipart post form shared by the create and update routes.

use actix_multipart::{Field, Multipart};
use futures::TryStreamExt;
use uuid::Uuid;

use quill_core::domain::PostPatch;
use quill_core::ports::{MediaStore, Upload};
use quill_core::services::CreatePostInput;

use crate::middleware::error::{AppError, AppResult};

/// Raw text fields and image of a post form, as sent by the client.
///
/// Empty text fields count as not supplied.
#[derive(Debug, Default)]
pub struct PostForm {
    title: Option<String>,
    content: Option<String>,
    category_id: Option<String>,
    excerpt: Option<String>,
    tags: Option<Vec<String>>,
    is_published: Option<String>,
    image: Option<Upload>,
}

impl PostForm {
    /// Drain the multipart stream, rejecting bodies larger than `limit` bytes.
    pub async fn parse(mut payload: Multipart, limit: usize) -> AppResult<Self> {
        let mut form = PostForm::default();
        let mut received = 0usize;

        while let Some(mut field) = payload.try_next().await.map_err(multipart_err)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let file_name = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(str::to_string);
            let content_type = field.content_type().map(|m| m.essence_str().to_string());

            let bytes = read_field(&mut field, limit, &mut received).await?;

            if name == "image" {
                if bytes.is_empty() {
                    continue;
                }
                form.image = Some(Upload {
                    file_name: file_name.unwrap_or_else(|| "upload".to_string()),
                    content_type,
                    bytes,
                });
                continue;
            }

            let value = String::from_utf8(bytes)
                .map_err(|_| AppError::BadRequest(format!("Field '{}' is not valid UTF-8", name)))?;
            form.set_text(&name, value);
        }

        tracing::debug!(bytes = received, has_image = form.image.is_some(), "Parsed post form");
        Ok(form)
    }

    /// Blank values count as not supplied. Body text keeps its whitespace.
    fn set_text(&mut self, name: &str, value: String) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return;
        }

        match name {
            "title" => self.title = Some(trimmed.to_string()),
            "content" => self.content = Some(value),
            "categoryId" | "category" => self.category_id = Some(trimmed.to_string()),
            "excerpt" => self.excerpt = Some(value),
            "tags" => self.tags.get_or_insert_with(Vec::new).extend(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            ),
            "isPublished" => self.is_published = Some(trimmed.to_string()),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    /// Input for a new post by `author_id`, plus the image still to be stored.
    pub fn into_create(self, author_id: Uuid) -> AppResult<(CreatePostInput, Option<Upload>)> {
        let input = CreatePostInput {
            title: self.title.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            category_id: self.category_id.as_deref().map(parse_category_id).transpose()?,
            author_id,
            excerpt: self.excerpt,
            featured_image: None,
            tags: self.tags.unwrap_or_default(),
            is_published: self
                .is_published
                .as_deref()
                .map(parse_flag)
                .transpose()?
                .unwrap_or(false),
        };
        Ok((input, self.image))
    }

    /// Partial update, plus the image still to be stored.
    pub fn into_patch(self) -> AppResult<(PostPatch, Option<Upload>)> {
        let patch = PostPatch {
            title: self.title,
            content: self.content,
            category_id: self.category_id.as_deref().map(parse_category_id).transpose()?,
            excerpt: self.excerpt,
            featured_image: None,
            tags: self.tags,
            is_published: self.is_published.as_deref().map(parse_flag).transpose()?,
        };
        Ok((patch, self.image))
    }
}

async fn read_field(field: &mut Field, limit: usize, received: &mut usize) -> AppResult<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(multipart_err)? {
        *received += chunk.len();
        if *received > limit {
            return Err(AppError::PayloadTooLarge(format!(
                "Request body exceeds {} bytes",
                limit
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn multipart_err(err: actix_multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("Malformed multipart body: {}", err))
}

fn parse_category_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("Invalid category ID: {}", raw)))
}

fn parse_flag(raw: &str) -> AppResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(AppError::Validation(format!(
            "isPublished must be a boolean, got '{}'",
            raw
        ))),
    }
}

/// Store the uploaded image, if any, returning its reference.
pub async fn stage_image(
    media: &dyn MediaStore,
    image: Option<Upload>,
) -> AppResult<Option<String>> {
    match image {
        Some(upload) => Ok(Some(media.store(upload).await?)),
        None => Ok(None),
    }
}

/// Remove an image staged for a request that did not go through.
pub async fn discard_image(media: &dyn MediaStore, reference: Option<&str>) {
    let Some(reference) = reference else {
        return;
    };
    if let Err(e) = media.remove(reference).await {
        tracing::warn!(%reference, error = %e, "Failed to remove orphaned upload");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(fields: &[(&str, &str)]) -> PostForm {
        let mut form = PostForm::default();
        for (name, value) in fields {
            form.set_text(name, value.to_string());
        }
        form
    }

    #[test]
    fn test_tags_split_and_accumulate() {
        let form = form(&[("tags", "rust, web ,"), ("tags", "async")]);
        assert_eq!(
            form.tags,
            Some(vec!["rust".to_string(), "web".to_string(), "async".to_string()])
        );
    }

    #[test]
    fn test_blank_fields_are_not_supplied() {
        let (patch, image) = form(&[("title", "   "), ("content", "")])
            .into_patch()
            .unwrap();
        assert!(patch.is_empty());
        assert!(image.is_none());
    }

    #[test]
    fn test_content_keeps_indentation_and_newlines() {
        let body = "    fn main() {}\n";
        let form = form(&[("content", body), ("excerpt", " Short. "), ("title", " Hi ")]);
        assert_eq!(form.content.as_deref(), Some(body));
        assert_eq!(form.excerpt.as_deref(), Some(" Short. "));
        assert_eq!(form.title.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_bad_category_id_is_validation_error() {
        let result = form(&[("categoryId", "not-a-uuid")]).into_create(Uuid::new_v4());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_create_defaults_to_draft() {
        let category = Uuid::new_v4();
        let (input, _) = form(&[
            ("title", "Hello"),
            ("content", "Body"),
            ("categoryId", &category.to_string()),
        ])
        .into_create(Uuid::nil())
        .unwrap();

        assert_eq!(input.title, "Hello");
        assert_eq!(input.category_id, Some(category));
        assert!(!input.is_published);
    }

    #[test]
    fn test_published_flag_parsing() {
        assert!(!parse_flag("False").unwrap());
        assert!(parse_flag("on").unwrap());
        assert!(parse_flag("maybe").is_err());
    }
}

/// Post handlers - HTTP endpoints for post operations
use super::multipart::parse_post_form;
use crate::error::{AppError, Result};
use crate::middleware::UserId;
use crate::services::PostService;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub content: String,
}

/// Create a post from a multipart form (`content`, `files`*)
pub async fn create_post(
    service: web::Data<PostService>,
    user_id: UserId,
    payload: Multipart,
) -> Result<HttpResponse> {
    let form = parse_post_form(payload).await?;
    let content = form
        .content
        .ok_or_else(|| AppError::ValidationError("content is required".into()))?;

    let post = service.create_post(user_id.0, content, form.files).await?;
    Ok(HttpResponse::Created().json(post))
}

/// Get a post by ID
pub async fn get_post(service: web::Data<PostService>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let post = service.get_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Newest-first page of posts
pub async fn list_posts(
    service: web::Data<PostService>,
    query: web::Query<ListPostsQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let page = service.list_posts(query.cursor, query.limit).await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn update_post(
    service: web::Data<PostService>,
    user_id: UserId,
    path: web::Path<Uuid>,
    req: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse> {
    let post = service
        .update_post(path.into_inner(), user_id.0, req.into_inner().content)
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn delete_post(
    service: web::Data<PostService>,
    user_id: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    service.delete_post(path.into_inner(), user_id.0).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Like the post, or unlike it when already liked
pub async fn toggle_like(
    service: web::Data<PostService>,
    user_id: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let toggle = service.toggle_like(path.into_inner(), user_id.0).await?;
    Ok(HttpResponse::Ok().json(toggle))
}

use crate::error::{AppError, Result};
use crate::middleware::UserId;
use crate::models::{CreateUserRequest, UpdateUserRequest};
use crate::services::UserService;
use actix_web::{web, HttpResponse};
use uuid::Uuid;

fn ensure_self(caller: UserId, user_id: Uuid) -> Result<()> {
    if caller.0 != user_id {
        return Err(AppError::Forbidden("cannot modify another user".into()));
    }
    Ok(())
}

/// POST /api/v1/users
pub async fn create_user(
    service: web::Data<UserService>,
    body: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    let user = service.create_user(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(user))
}

/// GET /api/v1/users/{id}
pub async fn get_user(service: web::Data<UserService>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let user = service.get_user(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// PATCH /api/v1/users/{id}
pub async fn update_user(
    service: web::Data<UserService>,
    caller: UserId,
    path: web::Path<Uuid>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    ensure_self(caller, user_id)?;
    let user = service.update_user(user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// DELETE /api/v1/users/{id}
pub async fn delete_user(
    service: web::Data<UserService>,
    caller: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    ensure_self(caller, user_id)?;
    service.delete_user(user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

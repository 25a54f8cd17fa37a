/// Notification read handlers
use crate::error::Result;
use crate::middleware::UserId;
use crate::services::NotificationService;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

/// GET /api/v1/notifications
pub async fn list_notifications(
    service: web::Data<NotificationService>,
    user: UserId,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let notifications = service.list(user.0, query.limit).await?;
    let unread = notifications.iter().filter(|n| !n.is_read).count();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "notifications": notifications,
        "unread": unread,
    })))
}

/// PUT /api/v1/notifications/{id}/read
pub async fn mark_as_read(
    service: web::Data<NotificationService>,
    user: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    service.mark_read(user.0, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

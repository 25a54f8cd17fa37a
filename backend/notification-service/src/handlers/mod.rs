use actix_web::web;

pub mod notifications;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/notifications")
            .route("", web::get().to(notifications::list_notifications))
            .route("/{id}/read", web::put().to(notifications::mark_as_read)),
    );
}

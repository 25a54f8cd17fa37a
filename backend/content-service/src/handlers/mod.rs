/// HTTP handlers for content-related endpoints
///
/// - Posts: create (with media), read, page, edit, delete
/// - Likes: toggle
pub mod multipart;
pub mod posts;

use actix_web::web;

pub use posts::{create_post, delete_post, get_post, list_posts, toggle_like, update_post};

/// Post routes, mounted under `/api/v1`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/posts")
            .service(
                web::resource("")
                    .route(web::post().to(create_post))
                    .route(web::get().to(list_posts)),
            )
            .service(
                web::resource("/{post_id}")
                    .route(web::get().to(get_post))
                    .route(web::patch().to(update_post))
                    .route(web::delete().to(delete_post)),
            )
            .route("/{post_id}/like", web::post().to(toggle_like)),
    );
}

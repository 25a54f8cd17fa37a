/// HTTP handlers for media endpoints
///
/// - `POST /media/ingest`: multipart `postId` + `files`, returns `{ urls }`
/// - `GET /media/posts/{post_id}`: stored items of a post
pub mod media;

use actix_web::web;

pub use media::{ingest, list_post_media};

/// Media routes, mounted under `/api/v1`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/media")
            .route("/ingest", web::post().to(ingest))
            .route("/posts/{post_id}", web::get().to(list_post_media)),
    );
}

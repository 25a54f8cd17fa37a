use actix_web::web;

pub mod search;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/search")
            .route("/posts", web::get().to(search::search_posts))
            .route("/users", web::get().to(search::search_users)),
    );
}

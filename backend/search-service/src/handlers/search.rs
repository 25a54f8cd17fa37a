use crate::error::Result;
use crate::services::SearchService;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
}

/// GET /api/v1/search/posts?q=&limit=
pub async fn search_posts(
    service: web::Data<SearchService>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    let hits = service.search_posts(&query.q, query.limit).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "query": query.q,
        "results": hits,
    })))
}

/// GET /api/v1/search/users?q=&limit=
pub async fn search_users(
    service: web::Data<SearchService>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    let hits = service.search_users(&query.q, query.limit).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "query": query.q,
        "results": hits,
    })))
}

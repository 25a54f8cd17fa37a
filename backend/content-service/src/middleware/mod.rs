/// HTTP request extractors for content-service
///
/// Authentication happens at the gateway, which forwards the caller's id in
/// the `X-User-Id` header.
use actix_web::{error::ErrorUnauthorized, Error, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-Id";

/// Authenticated caller
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

impl FromRequest for UserId {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(
            req.headers()
                .get(USER_ID_HEADER)
                .and_then(|h| h.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
                .map(UserId)
                .ok_or_else(|| ErrorUnauthorized("User ID missing")),
        )
    }
}

//! Profile endpoints and the posts counter over the in-memory broker

use actix_web::{http::StatusCode, test, web, App};
use cache_invalidation::{CacheInvalidator, InMemoryCacheStore};
use chrono::Utc;
use event_bus::{AckPolicy, EventBus, EventBusConfig, InMemoryBroker};
use event_schema::{DomainEvent, PostCreated};
use idempotent_consumer::{IdempotencyGuard, IdempotentHandler, InMemoryProcessedEventStore};
use resilience::RetryConfig;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use transactional_outbox::InMemoryOutbox;
use user_service::consumers::{PostCounterConsumer, POST_COUNTER_BINDINGS};
use user_service::db::memory::InMemoryUserRepository;
use user_service::handlers;
use user_service::middleware::USER_ID_HEADER;
use user_service::services::UserService;
use uuid::Uuid;

fn service() -> (Arc<UserService>, Arc<InMemoryUserRepository>) {
    let repo = Arc::new(InMemoryUserRepository::new(
        Arc::new(InMemoryOutbox::new()),
        RetryConfig::new(3, Duration::from_millis(1)),
    ));
    let cache = Arc::new(CacheInvalidator::new(
        Arc::new(InMemoryCacheStore::new()),
        "user-http-test",
    ));
    (Arc::new(UserService::new(repo.clone(), cache)), repo)
}

#[actix_web::test]
async fn test_profile_crud() {
    let (service, repo) = service();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(service))
            .service(web::scope("/api/v1").configure(handlers::configure)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(json!({ "username": "frank", "email": "Frank@Example.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: serde_json::Value = test::read_body_json(resp).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["email"], "frank@example.com");

    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(json!({ "username": "frank", "email": "other@example.com" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/users/{}", id))
        .insert_header((USER_ID_HEADER, Uuid::new_v4().to_string()))
        .set_json(json!({ "bio": "intruder" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/users/{}", id))
        .insert_header((USER_ID_HEADER, id.clone()))
        .set_json(json!({ "display_name": "Frank" }))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["display_name"], "Frank");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/users/{}", id))
        .insert_header((USER_ID_HEADER, id.clone()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/users/{}", id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let types: Vec<_> = repo.outbox().events().into_iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec!["user.created", "user.updated", "user.deleted"]);
}

#[actix_web::test]
async fn test_redelivered_post_created_counts_once() {
    let (service, repo) = service();
    let user = service
        .create_user(user_service::models::CreateUserRequest {
            username: "grace".into(),
            email: "grace@example.com".into(),
            display_name: None,
        })
        .await
        .unwrap();

    let broker = InMemoryBroker::new();
    let bus = EventBus::new(
        EventBusConfig::new("user-test").with_ack_policy(AckPolicy::default()),
        Arc::new(broker.connector()),
    );
    let guard = IdempotencyGuard::new(
        Arc::new(InMemoryProcessedEventStore::new()),
        Duration::from_secs(3600),
    );
    let handler = Arc::new(IdempotentHandler::new(PostCounterConsumer::new(service), guard));
    for binding in POST_COUNTER_BINDINGS {
        bus.subscribe(binding, handler.clone()).await.unwrap();
    }

    let message = event_schema::EventMessage::new(DomainEvent::PostCreated(PostCreated {
        post_id: Uuid::new_v4(),
        user_id: user.id,
        content: "first".into(),
        media_urls: Vec::new(),
        created_at: Utc::now(),
    }));
    bus.publish(&message).await.unwrap();
    bus.publish(&message).await.unwrap();
    assert!(broker.wait_for_acks(2, Duration::from_secs(2)).await);

    assert_eq!(repo.get(user.id).unwrap().posts_count, 1);
}

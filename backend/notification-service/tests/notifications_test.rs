//! Like notifications delivered through the bus and read over HTTP

use actix_web::{http::StatusCode, test, web, App};
use cache_invalidation::{CacheInvalidator, InMemoryCacheStore};
use chrono::Utc;
use event_bus::{AckPolicy, EventBus, EventBusConfig, InMemoryBroker};
use event_schema::{DomainEvent, EventMessage, PostLiked};
use idempotent_consumer::{IdempotencyGuard, IdempotentHandler, InMemoryProcessedEventStore};
use notification_service::consumers::{PostLikedConsumer, POST_LIKED_BINDING};
use notification_service::db::InMemoryNotificationRepository;
use notification_service::handlers;
use notification_service::middleware::USER_ID_HEADER;
use notification_service::services::NotificationService;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

async fn setup() -> (InMemoryBroker, EventBus, Arc<NotificationService>) {
    let broker = InMemoryBroker::new();
    let bus = EventBus::new(
        EventBusConfig::new("notification-test").with_ack_policy(AckPolicy::default()),
        Arc::new(broker.connector()),
    );
    let cache = Arc::new(CacheInvalidator::new(
        Arc::new(InMemoryCacheStore::new()),
        "notification-test",
    ));
    let service = Arc::new(NotificationService::new(
        Arc::new(InMemoryNotificationRepository::new()),
        cache,
    ));
    let guard = IdempotencyGuard::new(
        Arc::new(InMemoryProcessedEventStore::new()),
        Duration::from_secs(3600),
    );
    bus.subscribe(
        POST_LIKED_BINDING,
        Arc::new(IdempotentHandler::new(PostLikedConsumer::new(service.clone()), guard)),
    )
    .await
    .unwrap();
    (broker, bus, service)
}

fn liked(owner: Uuid, liker: Uuid) -> EventMessage {
    EventMessage::new(DomainEvent::PostLiked(PostLiked {
        post_id: Uuid::new_v4(),
        post_owner_id: owner,
        user_id: liker,
        likes_count: 1,
        liked_at: Utc::now(),
    }))
}

#[actix_web::test]
async fn test_owner_sees_like_notification() {
    let (broker, bus, service) = setup().await;
    let owner = Uuid::new_v4();
    let liker = Uuid::new_v4();

    let message = liked(owner, liker);
    bus.publish(&message).await.unwrap();
    bus.publish(&message).await.unwrap();
    bus.publish(&liked(owner, owner)).await.unwrap();
    assert!(broker.wait_for_acks(3, WAIT).await);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(service))
            .service(web::scope("/api/v1").configure(handlers::configure)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header((USER_ID_HEADER, owner.to_string()))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let list = body["notifications"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["actor_id"], liker.to_string());
    assert_eq!(list[0]["notification_type"], "like");
    assert_eq!(body["unread"], 1);

    let id = list[0]["id"].as_str().unwrap().to_string();
    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/notifications/{}/read", id))
        .insert_header((USER_ID_HEADER, owner.to_string()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header((USER_ID_HEADER, owner.to_string()))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["unread"], 0);
}

#[actix_web::test]
async fn test_missing_user_header_is_unauthorized() {
    let (_broker, _bus, service) = setup().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(service))
            .service(web::scope("/api/v1").configure(handlers::configure)),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/notifications").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

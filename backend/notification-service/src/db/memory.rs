use super::NotificationRepository;
use crate::error::{AppError, Result};
use crate::models::Notification;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    rows: Mutex<Vec<Notification>>,
    offline: AtomicBool,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<Notification> {
        self.rows.lock().clone()
    }

    fn check(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<bool> {
        self.check()?;
        let mut rows = self.rows.lock();
        if rows.iter().any(|n| n.id == notification.id) {
            return Ok(false);
        }
        rows.push(notification.clone());
        Ok(true)
    }

    async fn list_for_recipient(&self, recipient_id: Uuid, limit: u32) -> Result<Vec<Notification>> {
        self.check()?;
        let mut found: Vec<Notification> = self
            .rows
            .lock()
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool> {
        self.check()?;
        let mut rows = self.rows.lock();
        match rows
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == recipient_id)
        {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

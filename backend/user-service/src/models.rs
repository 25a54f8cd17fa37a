use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const MAX_DISPLAY_NAME_LEN: usize = 100;
pub const MAX_BIO_LEN: usize = 500;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]{3,32}$").expect("valid username regex"));

/// Profile as stored and as cached under `user_profile:<id>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub posts_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, email: String, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email: email.to_lowercase(),
            display_name,
            bio: None,
            avatar_url: None,
            posts_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: &UpdateUserRequest) {
        if let Some(display_name) = &update.display_name {
            self.display_name = Some(display_name.clone());
        }
        if let Some(bio) = &update.bio {
            self.bio = Some(bio.clone());
        }
        if let Some(avatar_url) = &update.avatar_url {
            self.avatar_url = Some(avatar_url.clone());
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        if !USERNAME_RE.is_match(&self.username) {
            return Err("username must be 3-32 letters, digits or underscores".into());
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err("email is not valid".into()),
        }
        validate_display_name(self.display_name.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.display_name.is_none() && self.bio.is_none() && self.avatar_url.is_none() {
            return Err("nothing to update".into());
        }
        validate_display_name(self.display_name.as_deref())?;
        if self.bio.as_deref().is_some_and(|bio| bio.chars().count() > MAX_BIO_LEN) {
            return Err(format!("bio exceeds {} characters", MAX_BIO_LEN));
        }
        Ok(())
    }
}

fn validate_display_name(display_name: Option<&str>) -> Result<(), String> {
    match display_name {
        Some(name) if name.trim().is_empty() => Err("display_name must not be blank".into()),
        Some(name) if name.chars().count() > MAX_DISPLAY_NAME_LEN => Err(format!(
            "display_name exceeds {} characters",
            MAX_DISPLAY_NAME_LEN
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(username: &str, email: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.into(),
            email: email.into(),
            display_name: None,
        }
    }

    #[test]
    fn test_create_validation() {
        assert!(create("alice_1", "alice@example.com").validate().is_ok());
        assert!(create("al", "alice@example.com").validate().is_err());
        assert!(create("alice!", "alice@example.com").validate().is_err());
        assert!(create("alice", "alice.example.com").validate().is_err());
        assert!(create("alice", "@example.com").validate().is_err());
    }

    #[test]
    fn test_empty_update_rejected() {
        assert!(UpdateUserRequest::default().validate().is_err());
        let update = UpdateUserRequest {
            bio: Some("x".repeat(MAX_BIO_LEN + 1)),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }
}

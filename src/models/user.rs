//! # User
//!
//! Accounts with role-based access. The stored `password` is an Argon2id
//! hash and never leaves the server; `passwordConfirm` is only ever read
//! from requests.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{is_email, present_text, Resource, Violations};
use crate::auth::crypto;
use crate::store::{FilterExpr, FilterSet, StoreResult};

/// Lifetime of a password reset token
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// Default avatar
pub const DEFAULT_PHOTO: &str = "default.jpg";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    User,
    Guide,
    LeadGuide,
    Admin,
}

fn default_photo() -> String {
    DEFAULT_PHOTO.to_string()
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: Option<String>,

    pub email: Option<String>,

    #[serde(default = "default_photo")]
    pub photo: String,

    #[serde(default)]
    pub role: Role,

    /// Argon2id hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing)]
    pub password_confirm: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_changed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_expires: Option<DateTime<Utc>>,

    #[serde(default = "default_active")]
    pub active: bool,
}

impl User {
    /// A new, not yet stored user without a password
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            email: Some(email.into()),
            photo: default_photo(),
            role: Role::User,
            password: None,
            password_confirm: None,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
        }
    }

    /// Store a freshly computed hash. Changing the password of a stored
    /// user records the change one second in the past so that a token
    /// issued in the same second stays valid.
    pub fn apply_password_hash(&mut self, hash: String) {
        self.password = Some(hash);
        self.password_confirm = None;
        if self.id.is_some() {
            self.password_changed_at = Some(Utc::now() - Duration::seconds(1));
        }
    }

    /// Whether the password changed after a token issued at `iat` (seconds)
    pub fn changed_password_after(&self, iat: i64) -> bool {
        self.password_changed_at
            .map(|changed| changed.timestamp() > iat)
            .unwrap_or(false)
    }

    pub fn check_password(&self, candidate: &str) -> bool {
        self.password
            .as_deref()
            .map(|hash| crypto::verify_password(candidate, hash))
            .unwrap_or(false)
    }

    /// Start a password reset: store the digest and expiry, return the raw token
    pub fn create_password_reset_token(&mut self) -> String {
        let token = crypto::generate_token();
        self.password_reset_token = Some(crypto::hash_token(&token));
        self.password_reset_expires = Some(Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES));
        token
    }

    pub fn clear_password_reset(&mut self) {
        self.password_reset_token = None;
        self.password_reset_expires = None;
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

impl Resource for User {
    const COLLECTION: &'static str = "users";
    const HIDDEN: &'static [&'static str] = &[
        "password",
        "active",
        "passwordResetToken",
        "passwordResetExpires",
    ];
    const PROTECTED: &'static [&'static str] = &[
        "password",
        "passwordConfirm",
        "passwordChangedAt",
        "passwordResetToken",
        "passwordResetExpires",
        "active",
    ];

    type Captured = ();

    fn validate(&self) -> StoreResult<()> {
        let mut v = Violations::default();
        v.check(present_text(&self.name), "Please tell us your name!");
        match self.email.as_deref() {
            Some(email) if !email.trim().is_empty() => {
                v.check(is_email(email), "Please provide a valid email")
            }
            _ => v.check(false, "Please provide your email"),
        }
        v.check(self.password.is_some(), "Please provide a password");
        v.finish()
    }

    fn before_save(&mut self) {
        if let Some(email) = &mut self.email {
            *email = email.trim().to_lowercase();
        }
        if let Some(name) = &mut self.name {
            *name = name.trim().to_string();
        }
        self.password_confirm = None;
    }

    fn default_filter() -> FilterSet {
        FilterExpr::ne("active", false).into()
    }

    fn capture(&self) -> Self::Captured {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{encode, present};
    use crate::store::Database;
    use serde_json::json;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_value(Role::LeadGuide).unwrap(), json!("lead-guide"));
        let role: Role = serde_json::from_value(json!("admin")).unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_password_hash_never_presented() {
        let mut user = User::new("Jonas", "Admin@Example.com ");
        user.apply_password_hash("$argon2id$stub".to_string());
        user.password_confirm = Some("pass1234".to_string());

        let (_, stored) = encode(user).unwrap();
        assert_eq!(stored["email"], "admin@example.com");
        assert_eq!(stored["password"], "$argon2id$stub");
        assert!(stored.get("passwordConfirm").is_none());

        let shown = present::<User>(&Database::in_memory(), stored).unwrap();
        assert!(shown.get("password").is_none());
        assert!(shown.get("active").is_none());
        assert_eq!(shown["role"], "user");
        assert_eq!(shown["photo"], DEFAULT_PHOTO);
    }

    #[test]
    fn test_new_user_has_no_password_changed_at() {
        let mut user = User::new("Jonas", "jonas@example.com");
        user.apply_password_hash("hash".to_string());
        assert!(user.password_changed_at.is_none());
    }

    #[test]
    fn test_changed_password_after() {
        let mut user = User::new("Jonas", "jonas@example.com");
        user.id = Some(uuid::Uuid::new_v4().to_string());
        user.apply_password_hash("hash".to_string());

        let changed = user.password_changed_at.unwrap().timestamp();
        assert!(user.changed_password_after(changed - 3600));
        assert!(!user.changed_password_after(changed));
        assert!(!user.changed_password_after(changed + 10));
    }

    #[test]
    fn test_reset_token_stores_digest() {
        let mut user = User::new("Jonas", "jonas@example.com");
        let token = user.create_password_reset_token();

        assert_eq!(user.password_reset_token, Some(crypto::hash_token(&token)));
        let expires = user.password_reset_expires.unwrap();
        assert!(expires > Utc::now() + Duration::minutes(9));

        user.clear_password_reset();
        assert!(user.password_reset_token.is_none());
    }

    #[test]
    fn test_validation_messages() {
        let user: User = serde_json::from_value(json!({"email": "nope"})).unwrap();
        match encode(user) {
            Err(crate::store::StoreError::Validation(m)) => assert_eq!(
                m,
                vec![
                    "Please tell us your name!",
                    "Please provide a valid email",
                    "Please provide a password",
                ]
            ),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

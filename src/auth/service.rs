//! # Auth Service
//!
//! Account flows on top of the user collection: signup, login, token
//! verification, password reset and self-service updates. Cookie handling
//! stays in the HTTP layer; everything here works on typed users.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::crypto::{self, PasswordPolicy};
use super::email::{EmailSender, EmailTemplate};
use super::errors::AuthError;
use super::jwt::{JwtConfig, JwtManager};
use crate::models::{decode, encode, present, Resource, User};
use crate::rest_api::factory::update_document;
use crate::rest_api::{ApiError, ApiResult};
use crate::store::{Database, FilterExpr, Query, StoreError};

/// Fields a user may change through `updateMe`
const SELF_EDITABLE: [&str; 2] = ["name", "email"];

/// Signup request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// New password plus confirmation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: Option<String>,
}

/// Password change for a logged-in user
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub password_current: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: Option<String>,
}

/// Forgot-password request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: Option<String>,
}

/// Auth service
pub struct AuthService {
    db: Database,
    jwt: JwtManager,
    policy: PasswordPolicy,
    email: Arc<dyn EmailSender>,
}

impl AuthService {
    pub fn new(db: Database, jwt_config: JwtConfig, email: Arc<dyn EmailSender>) -> Self {
        Self {
            db,
            jwt: JwtManager::new(jwt_config),
            policy: PasswordPolicy::default(),
            email,
        }
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    /// Sign a session token for a stored user
    pub fn issue(&self, user: &User) -> ApiResult<String> {
        Ok(self.jwt.sign(user.id())?)
    }

    /// User as clients see it
    pub fn present(&self, user: &User) -> ApiResult<Value> {
        let doc = serde_json::to_value(user).map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(present::<User>(&self.db, doc)?)
    }

    /// Register a new user with the default role
    pub fn signup(&self, request: SignupRequest) -> ApiResult<User> {
        let violations = self
            .policy
            .violations(&request.password, request.password_confirm.as_deref());
        if !violations.is_empty() {
            return Err(ApiError::Validation(violations));
        }

        let mut user = User::new(String::new(), String::new());
        user.name = request.name;
        user.email = request.email;
        user.apply_password_hash(crypto::hash_password(&request.password)?);

        let (_, value) = encode(user)?;
        let saved = self.db.create(User::COLLECTION, value)?;
        let user: User = decode(saved)?;

        tracing::info!(user = user.id(), "user signed up");
        Ok(user)
    }

    /// Check credentials; unknown email and wrong password look the same
    pub fn login(&self, request: LoginRequest) -> ApiResult<User> {
        let (Some(email), Some(password)) = (
            request.email.filter(|e| !e.trim().is_empty()),
            request.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AuthError::MissingCredentials.into());
        };

        let user = self
            .find_by_email(&email)?
            .filter(|user| user.check_password(&password))
            .ok_or(AuthError::InvalidCredentials)?;
        Ok(user)
    }

    /// Resolve a token to its live user
    pub fn authenticate(&self, token: &str) -> ApiResult<User> {
        let claims = self.jwt.validate_token(token)?;

        let found = match self.db.find_by_id(User::COLLECTION, &claims.sub) {
            Ok(found) => found,
            // A subject that is not a user id cannot name a live user
            Err(StoreError::Cast { .. }) => None,
            Err(err) => return Err(err.into()),
        };
        let user = found
            .filter(|doc| User::default_filter().matches(doc))
            .ok_or(AuthError::UserNoLongerExists)?;
        let user: User = decode(user)?;

        if user.changed_password_after(claims.iat) {
            return Err(AuthError::PasswordChanged.into());
        }
        Ok(user)
    }

    /// Mail a reset link valid for ten minutes
    pub async fn forgot_password(&self, email: Option<String>, base_url: &str) -> ApiResult<()> {
        let email = email.unwrap_or_default();
        let mut user = self
            .find_by_email(&email)?
            .ok_or(AuthError::UnknownEmail)?;

        let token = user.create_password_reset_token();
        let mut user = self.save(user)?;

        let template = EmailTemplate::PasswordReset {
            to: user.email.clone().unwrap_or_default(),
            reset_url: format!("{base_url}/api/v1/users/resetPassword/{token}"),
        };
        let sender = Arc::clone(&self.email);
        let sent = tokio::task::spawn_blocking(move || sender.send(template))
            .await
            .map_err(|e| ApiError::Internal(format!("email task failed: {e}")))?;

        if let Err(err) = sent {
            tracing::error!(user = user.id(), error = %err, "reset email failed");
            user.clear_password_reset();
            self.save(user)?;
            return Err(ApiError::Email(err));
        }
        Ok(())
    }

    /// Set a new password with a valid, unexpired reset token
    pub fn reset_password(&self, token: &str, request: ResetPasswordRequest) -> ApiResult<User> {
        let filter = User::default_filter()
            .and(FilterExpr::eq("passwordResetToken", crypto::hash_token(token)));
        let mut user: User = self
            .db
            .find_one(User::COLLECTION, &filter)?
            .map(decode::<User>)
            .transpose()?
            .filter(|user: &User| {
                user.password_reset_expires
                    .map(|expires| expires > Utc::now())
                    .unwrap_or(false)
            })
            .ok_or(AuthError::InvalidResetToken)?;

        self.set_password(&mut user, &request.password, request.password_confirm.as_deref())?;
        user.clear_password_reset();
        self.save(user)
    }

    /// Change the password of a logged-in user
    pub fn update_password(&self, user: &User, request: UpdatePasswordRequest) -> ApiResult<User> {
        let mut user: User = self
            .db
            .find_by_id(User::COLLECTION, user.id())?
            .map(decode::<User>)
            .transpose()?
            .ok_or(AuthError::UserNoLongerExists)?;

        if !user.check_password(&request.password_current) {
            return Err(AuthError::WrongCurrentPassword.into());
        }

        self.set_password(&mut user, &request.password, request.password_confirm.as_deref())?;
        self.save(user)
    }

    /// Update name and email of the current user
    pub fn update_me(&self, user: &User, body: Value) -> ApiResult<Value> {
        let Value::Object(body) = body else {
            return Err(ApiError::BadRequest(
                "Request body must be a JSON object".to_string(),
            ));
        };
        if body.contains_key("password") || body.contains_key("passwordConfirm") {
            return Err(ApiError::BadRequest(
                "This route is not for password updates. Please use /updateMyPassword."
                    .to_string(),
            ));
        }

        let patch: Map<String, Value> = body
            .into_iter()
            .filter(|(key, _)| SELF_EDITABLE.contains(&key.as_str()))
            .collect();
        update_document::<User>(&self.db, user.id(), Value::Object(patch))
    }

    /// Soft delete: the account stays stored but is hidden from every find
    pub fn delete_me(&self, user: &User) -> ApiResult<()> {
        self.db
            .find_by_id_and_update(User::COLLECTION, user.id(), &serde_json::json!({"active": false}))?
            .ok_or_else(ApiError::no_document)?;
        tracing::info!(user = user.id(), "user deactivated");
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let query = Query::new(User::COLLECTION)
            .filter(User::default_filter())
            .and(FilterExpr::eq("email", email.trim().to_lowercase()))
            .limit(1);
        self.db
            .find(&query)?
            .into_iter()
            .next()
            .map(decode::<User>)
            .transpose()
            .map_err(ApiError::from)
    }

    fn set_password(&self, user: &mut User, password: &str, confirm: Option<&str>) -> ApiResult<()> {
        let violations = self.policy.violations(password, confirm);
        if !violations.is_empty() {
            return Err(ApiError::Validation(violations));
        }
        user.apply_password_hash(crypto::hash_password(password)?);
        Ok(())
    }

    fn save(&self, user: User) -> ApiResult<User> {
        let (_, value) = encode(user)?;
        Ok(decode(self.db.replace(User::COLLECTION, value)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::email::MockEmailSender;
    use crate::models::register_indexes;
    use chrono::Duration;

    struct Fixture {
        service: AuthService,
        mailbox: Arc<MockEmailSender>,
    }

    fn fixture() -> Fixture {
        let db = Database::in_memory();
        register_indexes(&db).unwrap();
        let mailbox = Arc::new(MockEmailSender::new());
        let service = AuthService::new(db, JwtConfig::default(), mailbox.clone());
        Fixture { service, mailbox }
    }

    fn signup(service: &AuthService, email: &str) -> User {
        service
            .signup(SignupRequest {
                name: Some("Laura Wilson".into()),
                email: Some(email.into()),
                password: "pass1234".into(),
                password_confirm: Some("pass1234".into()),
            })
            .unwrap()
    }

    fn login(service: &AuthService, email: &str, password: &str) -> ApiResult<User> {
        service.login(LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        })
    }

    #[test]
    fn test_signup_and_login() {
        let f = fixture();
        let user = signup(&f.service, "Laura@Example.com");

        assert_eq!(user.email.as_deref(), Some("laura@example.com"));
        assert!(user.password_changed_at.is_none());
        assert!(login(&f.service, "laura@example.com", "pass1234").is_ok());
    }

    #[test]
    fn test_signup_password_rules() {
        let f = fixture();
        let err = f
            .service
            .signup(SignupRequest {
                name: Some("Laura".into()),
                email: Some("laura@example.com".into()),
                password: "pass1234".into(),
                password_confirm: Some("pass4321".into()),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid input data. Passwords are not the same!");
    }

    #[test]
    fn test_duplicate_email() {
        let f = fixture();
        signup(&f.service, "laura@example.com");
        let err = f
            .service
            .signup(SignupRequest {
                name: Some("Other".into()),
                email: Some("laura@example.com".into()),
                password: "pass1234".into(),
                password_confirm: Some("pass1234".into()),
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::Duplicate(_)));
    }

    #[test]
    fn test_login_failures() {
        let f = fixture();
        signup(&f.service, "laura@example.com");

        let missing = f.service.login(LoginRequest {
            email: Some("laura@example.com".into()),
            password: None,
        });
        assert!(matches!(missing, Err(ApiError::Auth(AuthError::MissingCredentials))));

        assert!(matches!(
            login(&f.service, "laura@example.com", "wrong-pass"),
            Err(ApiError::Auth(AuthError::InvalidCredentials))
        ));
        assert!(matches!(
            login(&f.service, "nobody@example.com", "pass1234"),
            Err(ApiError::Auth(AuthError::InvalidCredentials))
        ));
    }

    #[test]
    fn test_authenticate() {
        let f = fixture();
        let user = signup(&f.service, "laura@example.com");
        let token = f.service.issue(&user).unwrap();

        assert_eq!(f.service.authenticate(&token).unwrap().id(), user.id());
        assert!(matches!(
            f.service.authenticate("loggedout"),
            Err(ApiError::Auth(AuthError::MalformedToken))
        ));
    }

    #[test]
    fn test_authenticate_unknown_subjects() {
        let f = fixture();
        let stranger = f.service.jwt().sign(&uuid::Uuid::new_v4().to_string()).unwrap();
        let malformed = f.service.jwt().sign("not-a-user-id").unwrap();

        for token in [stranger, malformed] {
            assert!(matches!(
                f.service.authenticate(&token),
                Err(ApiError::Auth(AuthError::UserNoLongerExists))
            ));
        }
    }

    #[test]
    fn test_authenticate_surfaces_store_failures() {
        struct Unreachable;

        impl crate::store::Backend for Unreachable {
            fn scan(&self, _: &str) -> crate::store::StoreResult<Vec<Value>> {
                Err(StoreError::Backend("unreachable".into()))
            }
            fn get(&self, _: &str, _: &str) -> crate::store::StoreResult<Option<Value>> {
                Err(StoreError::Backend("unreachable".into()))
            }
            fn put(&self, _: &str, _: &str, _: &Value) -> crate::store::StoreResult<()> {
                Err(StoreError::Backend("unreachable".into()))
            }
            fn remove(&self, _: &str, _: &str) -> crate::store::StoreResult<Option<Value>> {
                Err(StoreError::Backend("unreachable".into()))
            }
        }

        let db = Database::new(Arc::new(Unreachable));
        let service = AuthService::new(db, JwtConfig::default(), Arc::new(MockEmailSender::new()));
        let token = service.jwt().sign(&uuid::Uuid::new_v4().to_string()).unwrap();

        assert!(matches!(
            service.authenticate(&token),
            Err(ApiError::Store(StoreError::Backend(_)))
        ));
    }

    #[test]
    fn test_token_from_before_password_change_is_rejected() {
        let f = fixture();
        let user = signup(&f.service, "laura@example.com");
        let old = f
            .service
            .jwt()
            .sign_at(user.id(), Utc::now() - Duration::hours(1))
            .unwrap();

        let changed = f
            .service
            .update_password(
                &user,
                UpdatePasswordRequest {
                    password_current: "pass1234".into(),
                    password: "newpass123".into(),
                    password_confirm: Some("newpass123".into()),
                },
            )
            .unwrap();

        assert!(matches!(
            f.service.authenticate(&old),
            Err(ApiError::Auth(AuthError::PasswordChanged))
        ));
        let fresh = f.service.issue(&changed).unwrap();
        assert!(f.service.authenticate(&fresh).is_ok());
    }

    #[test]
    fn test_update_password_requires_current() {
        let f = fixture();
        let user = signup(&f.service, "laura@example.com");
        let err = f
            .service
            .update_password(
                &user,
                UpdatePasswordRequest {
                    password_current: "wrong".into(),
                    password: "newpass123".into(),
                    password_confirm: Some("newpass123".into()),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::WrongCurrentPassword)));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let f = fixture();
        signup(&f.service, "laura@example.com");

        f.service
            .forgot_password(Some("laura@example.com".into()), "http://localhost:3000")
            .await
            .unwrap();

        let sent = f.mailbox.sent();
        assert_eq!(sent.len(), 1);
        let EmailTemplate::PasswordReset { reset_url, .. } = &sent[0];
        let token = reset_url.rsplit('/').next().unwrap();
        assert!(reset_url.starts_with("http://localhost:3000/api/v1/users/resetPassword/"));

        let request = ResetPasswordRequest {
            password: "newpass123".into(),
            password_confirm: Some("newpass123".into()),
        };
        let user = f.service.reset_password(token, request.clone()).unwrap();
        assert!(user.password_reset_token.is_none());
        assert!(login(&f.service, "laura@example.com", "newpass123").is_ok());

        // single use
        assert!(matches!(
            f.service.reset_password(token, request),
            Err(ApiError::Auth(AuthError::InvalidResetToken))
        ));
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email() {
        let f = fixture();
        let err = f
            .service
            .forgot_password(Some("nobody@example.com".into()), "http://localhost")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::UnknownEmail)));
        assert!(f.mailbox.sent().is_empty());
    }

    #[test]
    fn test_update_me_ignores_other_fields() {
        let f = fixture();
        let user = signup(&f.service, "laura@example.com");

        let updated = f
            .service
            .update_me(&user, serde_json::json!({"name": "Laura W", "role": "admin"}))
            .unwrap();
        assert_eq!(updated["name"], "Laura W");
        assert_eq!(updated["role"], "user");

        let err = f
            .service
            .update_me(&user, serde_json::json!({"password": "x"}))
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_delete_me_deactivates() {
        let f = fixture();
        let user = signup(&f.service, "laura@example.com");
        let token = f.service.issue(&user).unwrap();

        f.service.delete_me(&user).unwrap();
        assert!(matches!(
            login(&f.service, "laura@example.com", "pass1234"),
            Err(ApiError::Auth(AuthError::InvalidCredentials))
        ));
        assert!(matches!(
            f.service.authenticate(&token),
            Err(ApiError::Auth(AuthError::UserNoLongerExists))
        ));
    }
}

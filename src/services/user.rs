//! User service
//!
//! Registration, login/logout, session validation and the contributor
//! onboarding profile.

use crate::db::repositories::{is_unique_violation, SessionRepository, UserRepository};
use crate::models::{ExperienceLevel, ProfileInput, Session, User};
use crate::services::password::{hash_password, validate_password_strength, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("{0}")]
    AuthenticationError(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    UserExists(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days,
        }
    }

    /// Register a new contributor account.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a missing or malformed email or a weak password
    /// - `UserExists` if the email is already registered
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let email = normalize_email(&input.email);
        if email.is_empty() || input.password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Email and password are required".to_string(),
            ));
        }
        if !is_valid_email(&email) {
            return Err(UserServiceError::ValidationError(
                "Invalid email format".to_string(),
            ));
        }
        validate_password_strength(&input.password).map_err(UserServiceError::ValidationError)?;

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(
                "An account with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = match self.user_repo.create(&User::new(email, password_hash)).await {
            Ok(user) => user,
            // lost a race with a concurrent registration
            Err(e) if is_unique_violation(&e) => {
                return Err(UserServiceError::UserExists(
                    "An account with this email already exists".to_string(),
                ))
            }
            Err(e) => return Err(e.context("Failed to create user").into()),
        };

        tracing::info!(user_id = user.id, "Registered contributor");
        Ok(user)
    }

    /// Check credentials and open a session.
    ///
    /// Unknown emails and wrong passwords give the same error.
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let email = normalize_email(&input.email);
        if email.is_empty() || input.password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Missing email or password".to_string(),
            ));
        }

        let invalid = || UserServiceError::AuthenticationError("Invalid credentials".to_string());

        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
            .ok_or_else(invalid)?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            tracing::debug!(user_id = user.id, "Rejected login with wrong password");
            return Err(invalid());
        }

        let session = self.start_session(user.id).await?;
        Ok((session, user))
    }

    /// Open a session for an already authenticated user
    pub async fn start_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(self.session_expiration_days),
            created_at: now,
        };

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(created)
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Missing and expired sessions both yield `None`; expired ones are removed.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    /// Save the onboarding profile.
    ///
    /// Name, country and experience are required; phone number and bio are
    /// optional and blank values are stored as absent.
    pub async fn setup_profile(
        &self,
        user_id: i64,
        input: SetupProfileInput,
    ) -> Result<User, UserServiceError> {
        let profile = input.validate()?;
        self.user_repo
            .update_profile(user_id, &profile)
            .await
            .context("Failed to update profile")?
            .ok_or(UserServiceError::UserNotFound)
    }

    /// Store a quality-check outcome; passing activates the account.
    pub async fn record_quality_check(
        &self,
        user_id: i64,
        passed: bool,
    ) -> Result<User, UserServiceError> {
        self.user_repo
            .record_quality_check(user_id, passed, Utc::now())
            .await
            .context("Failed to record quality check")?
            .ok_or(UserServiceError::UserNotFound)
    }

    /// Delete expired sessions; run periodically by the server.
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shape check only: one `@`, non-empty local part, dotted domain, no spaces.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Profile form as submitted by the onboarding page
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupProfileInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
}

impl SetupProfileInput {
    fn validate(self) -> Result<ProfileInput, UserServiceError> {
        let (name, country, experience) = match (
            non_blank(self.name),
            non_blank(self.country),
            non_blank(self.experience),
        ) {
            (Some(name), Some(country), Some(experience)) => (name, country, experience),
            _ => {
                return Err(UserServiceError::ValidationError(
                    "Name, country, and experience are required".to_string(),
                ))
            }
        };

        let experience: ExperienceLevel = experience.parse().map_err(|_| {
            UserServiceError::ValidationError(format!("Invalid experience level: {}", experience))
        })?;

        Ok(ProfileInput {
            name,
            country,
            phone_number: non_blank(self.phone_number),
            bio: non_blank(self.bio),
            experience,
        })
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use proptest::prelude::*;

    async fn setup_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(10))]

        /// A session opened by login always resolves back to the same account.
        #[test]
        fn login_session_resolves_to_registered_user(
            local in "[a-z]{3,10}",
            password in "[a-zA-Z0-9!@#$%^&*]{8,20}"
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let service = setup_service().await;
                let email = format!("{}@example.com", local);

                let registered = service
                    .register(RegisterInput::new(email.clone(), password.clone()))
                    .await
                    .expect("Registration should succeed");
                let (session, _) = service
                    .login(LoginInput::new(email.to_uppercase(), password.clone()))
                    .await
                    .expect("Login should succeed");

                let validated = service
                    .validate_session(&session.id)
                    .await
                    .expect("Validation should not error")
                    .expect("Session should resolve");
                prop_assert_eq!(validated.id, registered.id);
                prop_assert_eq!(validated.email, email);
                Ok(())
            });
            result?;
        }
    }
}

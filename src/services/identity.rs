//! Caller identity resolution
//!
//! Tokens are issued by the external identity provider; this service only
//! validates them and loads the caller's role and profile.

use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::caller::{Caller, TokenClaims},
    repository::ProfilesRepository,
};

#[derive(Clone)]
pub struct IdentityService {
    profiles: Arc<dyn ProfilesRepository>,
    config: AuthConfig,
}

impl IdentityService {
    pub fn new(profiles: Arc<dyn ProfilesRepository>, config: AuthConfig) -> Self {
        Self { profiles, config }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        match self.config.audience {
            Some(ref audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }

    /// Decode and verify a bearer token
    pub fn verify_token(&self, token: &str) -> AppResult<TokenClaims> {
        let data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &self.validation(),
        )
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;
        Ok(data.claims)
    }

    /// Resolve the caller behind a bearer token
    pub async fn authenticate(&self, token: &str) -> AppResult<Caller> {
        let claims = self.verify_token(token)?;
        let profile = self.profiles.find(claims.sub).await?;

        let role = profile.role.ok_or_else(|| {
            tracing::warn!(user_id = %claims.sub, "Authenticated user has no role");
            AppError::Forbidden("No role assigned to this user".to_string())
        })?;

        Ok(Caller::new(
            claims.sub,
            claims.email,
            role,
            profile.name,
            profile.department,
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use mockall::predicate::eq;
    use uuid::Uuid;

    use super::*;
    use crate::{
        models::caller::{CallerProfile, Role},
        repository::MockProfilesRepository,
    };

    const SECRET: &str = "test-secret";

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: SECRET.to_string(),
            audience: None,
        }
    }

    fn token(sub: Uuid, secret: &str, expires_in: Duration) -> String {
        let claims = TokenClaims {
            sub,
            email: Some("carla@example.com".to_string()),
            exp: (Utc::now() + expires_in).timestamp(),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[tokio::test]
    async fn test_authenticate_loads_role_and_department() {
        let user_id = Uuid::new_v4();
        let mut profiles = MockProfilesRepository::new();
        profiles.expect_find().with(eq(user_id)).times(1).returning(|_| {
            Ok(CallerProfile {
                role: Some(Role::Coordinator),
                name: Some("Carla Coord".to_string()),
                department: Some("Growth e Tecnologia".to_string()),
            })
        });
        let service = IdentityService::new(Arc::new(profiles), config());

        let caller = service
            .authenticate(&token(user_id, SECRET, Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(caller.user_id, user_id);
        assert_eq!(caller.role, Role::Coordinator);
        assert_eq!(caller.department_key.as_deref(), Some("growthetecnologia"));
        assert_eq!(caller.email.as_deref(), Some("carla@example.com"));
    }

    #[tokio::test]
    async fn test_missing_role_is_forbidden() {
        let mut profiles = MockProfilesRepository::new();
        profiles
            .expect_find()
            .returning(|_| Ok(CallerProfile::default()));
        let service = IdentityService::new(Arc::new(profiles), config());

        let result = service
            .authenticate(&token(Uuid::new_v4(), SECRET, Duration::hours(1)))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_bad_tokens_are_unauthorized_without_lookup() {
        let mut profiles = MockProfilesRepository::new();
        profiles.expect_find().never();
        let service = IdentityService::new(Arc::new(profiles), config());

        let wrong_secret = service
            .authenticate(&token(Uuid::new_v4(), "other-secret", Duration::hours(1)))
            .await;
        assert!(matches!(wrong_secret, Err(AppError::Unauthorized(_))));

        let expired = service
            .authenticate(&token(Uuid::new_v4(), SECRET, Duration::hours(-2)))
            .await;
        assert!(matches!(expired, Err(AppError::Unauthorized(_))));

        let garbage = service.authenticate("not-a-token").await;
        assert!(matches!(garbage, Err(AppError::Unauthorized(_))));
    }
}

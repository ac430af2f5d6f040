//! Access tokens
//!
//! A token carries the caller's uid, role and club, so approval handlers
//! can authorize without reading the `users` collection. Tokens are HS256
//! and short lived; sign-out revocation lives in [`SessionRegistry`].
//!
//! [`SessionRegistry`]: crate::auth::SessionRegistry

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::models::{AuthIdentity, CallerIdentity, User, UserRole};
use thiserror::Error;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HMAC key, at least 32 bytes
    pub secret: String,
    pub expiration_minutes: i64,
    pub issuer: String,
    pub audience: String,
}

impl JwtConfig {
    /// `JWT_SECRET` is mandatory; the rest have defaults
    pub fn from_env() -> Result<Self, JwtError> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| JwtError::Config("JWT_SECRET is not set".into()))?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(JwtError::Config(format!(
                "JWT_SECRET is {} bytes, need at least {MIN_SECRET_LEN}",
                secret.len()
            )));
        }
        let var = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.into());
        Ok(Self {
            secret,
            expiration_minutes: var("JWT_EXPIRATION_MINUTES", "60").parse().unwrap_or(60),
            issuer: var("JWT_ISSUER", "club-server"),
            audience: var("JWT_AUDIENCE", "club-clients"),
        })
    }
}

impl Default for JwtConfig {
    /// Debug builds fall back to a throwaway key so a fresh checkout runs;
    /// release builds refuse to start without a configured secret.
    fn default() -> Self {
        match Self::from_env() {
            Ok(config) => config,
            #[cfg(debug_assertions)]
            Err(e) => {
                tracing::warn!(error = %e, "Using a temporary JWT key; tokens die with this process");
                Self {
                    secret: generate_dev_secret(),
                    expiration_minutes: 60,
                    issuer: "club-server".into(),
                    audience: "club-clients".into(),
                }
            }
            #[cfg(not(debug_assertions))]
            Err(e) => panic!("JWT configuration invalid: {e}"),
        }
    }
}

/// Random 64-character key for development runs and tests
pub fn generate_dev_secret() -> String {
    let (a, b) = (uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
    format!("{}{}", a.simple(), b.simple())
}

/// Token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_id: Option<String>,
    /// Identity provider, e.g. `google.com` or `password`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("token expired")]
    Expired,

    #[error("token signed with a different key")]
    BadSignature,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("could not sign token: {0}")]
    Encode(String),

    #[error("JWT configuration: {0}")]
    Config(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            JwtErrorKind::ExpiredSignature => Self::Expired,
            JwtErrorKind::InvalidSignature => Self::BadSignature,
            _ => Self::Malformed(e.to_string()),
        }
    }
}

/// Issues and checks access tokens for one key
#[derive(Clone)]
pub struct JwtService {
    pub config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn with_config(config: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.set_required_spec_claims(&["sub", "iat", "exp", "iss", "aud"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
        }
    }

    /// Sign a token describing `user` as stored in the `users` collection
    pub fn generate_token(&self, user: &User) -> Result<String, JwtError> {
        let issued = Utc::now();
        let claims = Claims {
            sub: user.uid.clone(),
            email: user.email.clone(),
            name: Some(user.display_name.clone()),
            role: user.role,
            club_id: user.club_id.clone(),
            provider: user.provider.clone(),
            iat: issued.timestamp(),
            exp: (issued + Duration::minutes(self.config.expiration_minutes)).timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Encode(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Token part of an `Authorization: Bearer ...` header
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .finish_non_exhaustive()
    }
}

/// Authenticated caller of a request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub club_id: Option<String>,
    pub provider: Option<String>,
    /// Token `iat`, compared against the caller's last sign-out
    pub issued_at: i64,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            display_name: claims.name,
            role: claims.role,
            club_id: claims.club_id,
            provider: claims.provider,
            issued_at: claims.iat,
        }
    }
}

impl CurrentUser {
    /// Identity used by the approval protocol
    pub fn caller(&self) -> CallerIdentity {
        CallerIdentity::new(&self.id, self.role, self.club_id.as_deref())
    }

    /// Identity used by profile bootstrap
    pub fn identity(&self) -> AuthIdentity {
        AuthIdentity {
            uid: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            phone_number: None,
            photo_url: None,
            provider_id: self.provider.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::models::UserStatus;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: generate_dev_secret(),
            expiration_minutes: 5,
            issuer: "club-server".into(),
            audience: "club-clients".into(),
        }
    }

    fn staff(role: UserRole, club: Option<&str>) -> User {
        User {
            uid: "u1".into(),
            email: "u1@example.com".into(),
            display_name: "Kim".into(),
            role,
            status: UserStatus::Active,
            club_id: club.map(str::to_string),
            club_name: None,
            linked_member_id: None,
            phone_number: None,
            photo_url: None,
            provider: Some("google.com".into()),
            created_at: 0,
            updated_at: 0,
            profile_error: false,
        }
    }

    #[test]
    fn test_token_carries_role_and_club() {
        let service = JwtService::with_config(config());
        let token = service
            .generate_token(&staff(UserRole::ClubManager, Some("c1")))
            .unwrap();
        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, UserRole::ClubManager);

        let caller = CurrentUser::from(claims).caller();
        assert_eq!(caller.club_id.as_deref(), Some("c1"));
        assert!(caller.is_club_staff());
    }

    #[test]
    fn test_other_key_is_bad_signature() {
        let token = JwtService::with_config(config())
            .generate_token(&staff(UserRole::Member, None))
            .unwrap();
        let err = JwtService::with_config(config()).validate_token(&token).unwrap_err();
        assert!(matches!(err, JwtError::BadSignature), "{err}");
    }

    #[test]
    fn test_expired_token() {
        let mut expired = config();
        expired.expiration_minutes = -10;
        let service = JwtService::with_config(expired);
        let token = service.generate_token(&staff(UserRole::Member, None)).unwrap();
        assert!(matches!(service.validate_token(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn test_unknown_role_is_malformed() {
        let config = config();
        let now = Utc::now().timestamp();
        let forged = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &json!({
                "sub": "u1", "email": "u1@example.com", "role": "JANITOR",
                "iat": now, "exp": now + 60, "iss": config.issuer, "aud": config.audience,
            }),
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        let err = JwtService::with_config(config).validate_token(&forged).unwrap_err();
        assert!(matches!(err, JwtError::Malformed(_)), "{err}");
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(JwtService::extract_from_header("Bearer abc"), Some("abc"));
        assert_eq!(JwtService::extract_from_header("Bearer "), None);
        assert_eq!(JwtService::extract_from_header("Basic abc"), None);
    }
}

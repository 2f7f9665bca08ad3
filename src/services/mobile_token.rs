//! Mobile app bearer tokens (HS256 JWT)

use crate::models::{User, UserRole};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a mobile token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobileClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

impl MobileClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Failed to sign token")]
    Signing,
}

pub struct MobileTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_days: i64,
}

impl MobileTokenService {
    pub fn new(secret: &str, expiry_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_days,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = MobileClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + Duration::days(self.expiry_days)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!(user_id = user.id, error = %e, "Failed to sign mobile token");
            TokenError::Signing
        })
    }

    pub fn verify(&self, token: &str) -> Result<MobileClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<MobileClaims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;

        if data.claims.user_id().is_none() {
            return Err(TokenError::Invalid);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let mut user = User::new(
            "Siti".into(),
            "siti@hakgyo.id".into(),
            "hash".into(),
            UserRole::Murid,
        );
        user.id = 42;
        user
    }

    #[test]
    fn test_issue_and_verify() {
        let service = MobileTokenService::new("mobile-secret", 30);
        let token = service.issue(&user()).unwrap();

        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.email, "siti@hakgyo.id");
        assert_eq!(claims.role, UserRole::Murid);
        assert_eq!(claims.exp - claims.iat, 30 * 86400);
    }

    #[test]
    fn test_expired_token() {
        let service = MobileTokenService::new("mobile-secret", -1);
        let token = service.issue(&user()).unwrap();
        assert_eq!(service.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn test_wrong_secret_and_garbage() {
        let issuer = MobileTokenService::new("one-secret", 30);
        let verifier = MobileTokenService::new("another-secret", 30);
        let token = issuer.issue(&user()).unwrap();

        assert_eq!(verifier.verify(&token).unwrap_err(), TokenError::Invalid);
        assert_eq!(verifier.verify("not.a.jwt").unwrap_err(), TokenError::Invalid);
        assert_eq!(verifier.verify("").unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn test_non_numeric_subject_rejected() {
        let service = MobileTokenService::new("mobile-secret", 30);
        let now = Utc::now().timestamp();
        let claims = MobileClaims {
            sub: "abc".into(),
            email: "x@hakgyo.id".into(),
            role: UserRole::Murid,
            iat: now,
            exp: now + 3600,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"mobile-secret")).unwrap();
        assert_eq!(service.verify(&token).unwrap_err(), TokenError::Invalid);
    }
}

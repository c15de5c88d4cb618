use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::database::models::UserRole;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub organization_id: Uuid,
    /// "access" or "refresh"
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn access(user_id: Uuid, email: String, role: UserRole, organization_id: Uuid) -> Self {
        let expiry_hours = config::config().security.jwt_expiry_hours;
        Self::with_expiry(user_id, email, role, organization_id, "access", expiry_hours)
    }

    pub fn refresh(user_id: Uuid, email: String, role: UserRole, organization_id: Uuid) -> Self {
        let expiry_hours = config::config().security.refresh_expiry_hours;
        Self::with_expiry(user_id, email, role, organization_id, "refresh", expiry_hours)
    }

    fn with_expiry(
        user_id: Uuid,
        email: String,
        role: UserRole,
        organization_id: Uuid,
        token_type: &str,
        expiry_hours: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email,
            role,
            organization_id,
            token_type: token_type.to_string(),
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Access/refresh token pair returned by register, login and refresh
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("JWT secret not configured")]
    MissingSecret,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token generation error: {0}")]
    TokenGeneration(String),
    #[error("Password hashing error: {0}")]
    Hashing(String),
}

pub fn generate_jwt(claims: &Claims) -> Result<String, AuthError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

pub fn generate_token_pair(
    user_id: Uuid,
    email: &str,
    role: UserRole,
    organization_id: Uuid,
) -> Result<TokenPair, AuthError> {
    let access = Claims::access(user_id, email.to_string(), role, organization_id);
    let refresh = Claims::refresh(user_id, email.to_string(), role, organization_id);
    Ok(TokenPair {
        access_token: generate_jwt(&access)?,
        refresh_token: generate_jwt(&refresh)?,
    })
}

pub fn verify_jwt(token: &str) -> Result<Claims, AuthError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?;

    Ok(token_data.claims)
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let cost = config::config().security.bcrypt_cost;
    bcrypt::hash(password, cost).map_err(|e| AuthError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash).map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Password policy: at least 8 chars with one lowercase, one uppercase, one digit
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        return Err(
            "Password must contain at least one uppercase letter, one lowercase letter, and one number"
                .to_string(),
        );
    }
    Ok(())
}

/// Basic email shape check, same level of strictness as the request validators
pub fn validate_email_format(email: &str) -> Result<(), String> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() || !parts[1].contains('.') {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trip_preserves_claims() {
        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();
        let claims = Claims::access(user_id, "agent@demo.cl".into(), UserRole::Agent, org_id);
        let token = generate_jwt(&claims).unwrap();
        let decoded = verify_jwt(&token).unwrap();
        assert_eq!(decoded.user_id, user_id);
        assert_eq!(decoded.organization_id, org_id);
        assert_eq!(decoded.role, UserRole::Agent);
        assert_eq!(decoded.token_type, "access");
    }

    #[test]
    fn tampered_token_rejected() {
        let claims = Claims::access(Uuid::new_v4(), "x@y.cl".into(), UserRole::User, Uuid::new_v4());
        let mut token = generate_jwt(&claims).unwrap();
        token.push('x');
        assert!(matches!(verify_jwt(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("Secreto123").unwrap();
        assert!(verify_password("Secreto123", &hash).unwrap());
        assert!(!verify_password("Secreto124", &hash).unwrap());
    }

    #[test]
    fn password_policy_branches() {
        assert!(validate_password_strength("Abcdef12").is_ok());
        assert!(validate_password_strength("short1A").is_err());
        assert!(validate_password_strength("alllowercase1").is_err());
        assert!(validate_password_strength("NODIGITSHERE").is_err());
    }

    #[test]
    fn email_format_branches() {
        assert!(validate_email_format("user@example.com").is_ok());
        assert!(validate_email_format("no-at-sign").is_err());
        assert!(validate_email_format("user@nodot").is_err());
        assert!(validate_email_format("@example.com").is_err());
    }
}

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::models::{User, UserRole};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
    #[error("bad role")]
    Role,
}

pub fn sign_session(email: &str, role: UserRole, key: &[u8]) -> Result<String, SessionError> {
    let exp = Utc::now() + Duration::hours(24);
    let payload = format!("{}|{}|{}", email, role_string(role), exp.timestamp());
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::STANDARD.encode(payload.as_bytes()),
        general_purpose::STANDARD.encode(sig)
    ))
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 2 {
        return Err(SessionError::Invalid);
    }
    let payload_bytes = general_purpose::STANDARD
        .decode(parts[0])
        .map_err(|_| SessionError::Invalid)?;
    let sig_bytes = general_purpose::STANDARD
        .decode(parts[1])
        .map_err(|_| SessionError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload_bytes);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| SessionError::Signature)?;

    let payload = String::from_utf8(payload_bytes).map_err(|_| SessionError::Invalid)?;
    // E-mails are the account key, so the payload splits from the right:
    // the last two pieces are role and expiry.
    let mut pieces = payload.rsplitn(3, '|');
    let exp: i64 = pieces
        .next()
        .ok_or(SessionError::Invalid)?
        .parse()
        .map_err(|_| SessionError::Invalid)?;
    let role = parse_role(pieces.next().ok_or(SessionError::Invalid)?)?;
    let email = pieces.next().ok_or(SessionError::Invalid)?.to_string();
    if email.is_empty() {
        return Err(SessionError::Invalid);
    }
    if Utc::now().timestamp() > exp {
        return Err(SessionError::Expired);
    }
    Ok(SessionClaims { email, role, exp })
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(val) = auth.to_str() {
            if let Some(bearer) = val.strip_prefix("Bearer ") {
                return Some(bearer.trim().to_string());
            }
        }
    }
    if let Some(cookie) = headers.get(axum::http::header::COOKIE) {
        if let Ok(val) = cookie.to_str() {
            for pair in val.split(';') {
                if let Some(rest) = pair.trim().strip_prefix("session=") {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

fn role_string(role: UserRole) -> &'static str {
    match role {
        UserRole::SiteAdmin => "SITE_ADMIN",
        UserRole::CompanyAdmin => "COMPANY_ADMIN",
        UserRole::User => "USER",
    }
}

fn parse_role(raw: &str) -> Result<UserRole, SessionError> {
    match raw {
        "SITE_ADMIN" => Ok(UserRole::SiteAdmin),
        "COMPANY_ADMIN" => Ok(UserRole::CompanyAdmin),
        "USER" => Ok(UserRole::User),
        _ => Err(SessionError::Role),
    }
}

/// Axum extractor that validates the session token and loads the account
/// behind it. Handlers receive the full user record.
pub struct UserSession(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for UserSession
where
    S: Send + Sync,
    crate::state::SharedState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared = crate::state::SharedState::from_ref(state);

        let token = extract_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;
        let claims = verify_session(&token, &shared.session_key).map_err(|e| {
            tracing::warn!("Session verification failed: {}", e);
            StatusCode::UNAUTHORIZED
        })?;

        let user = shared
            .store
            .find_user(&claims.email)
            .await
            .map_err(|e| {
                tracing::warn!("User lookup failed for session: {}", e);
                StatusCode::UNAUTHORIZED
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(UserSession(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"chave-de-teste-com-32-bytes-ok!!";

    #[test]
    fn test_sign_and_verify_round_trip() {
        let token =
            sign_session("usuario@email.com", UserRole::User, KEY).expect("token signs");
        let claims = verify_session(&token, KEY).expect("token verifies");
        assert_eq!(claims.email, "usuario@email.com");
        assert_eq!(claims.role, UserRole::User);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let token = sign_session("admin@admin.com", UserRole::SiteAdmin, KEY).expect("signs");
        let mut forged = token.clone();
        forged.replace_range(0..4, "AAAA");
        assert!(verify_session(&forged, KEY).is_err());
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let token = sign_session("admin@admin.com", UserRole::SiteAdmin, KEY).expect("signs");
        let other = b"outra-chave-de-teste-com-32-byte";
        assert!(matches!(
            verify_session(&token, other),
            Err(SessionError::Signature)
        ));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        assert!(matches!(
            verify_session("nem.token", KEY),
            Err(SessionError::Invalid)
        ));
        assert!(matches!(
            verify_session("sem-ponto", KEY),
            Err(SessionError::Invalid)
        ));
    }
}

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::net::SocketAddr;

use crate::domain::models::{User, UserRole};
use crate::state::SharedState;
use crate::web::{internal_error, reject, session, ApiError, UserProfile};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(state)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(rand_core::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(internal_error)
}

async fn register(
    State(state): State<SharedState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&payload.email);
    let full_name = payload.full_name.trim().to_string();
    if email.is_empty() || full_name.is_empty() {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Preencha todos os campos obrigatórios.",
        ));
    }
    if payload.password.is_empty() {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Erro: A senha é obrigatória para novos usuários.",
        ));
    }

    let existing = state.store.find_user(&email).await.map_err(internal_error)?;
    if existing.is_some() {
        return Err(reject(
            StatusCode::CONFLICT,
            "Este e-mail já está cadastrado.",
        ));
    }

    let user = User {
        email,
        password_hash: hash_password(&payload.password)?,
        role: UserRole::User,
        full_name,
        birth_date: payload.birth_date,
        company_name: None,
    };
    state.store.put_user(&user).await.map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

async fn login(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = addr.ip().to_string();
    if !state.login_limiter.allow(&ip).await {
        tracing::warn!("Login rate limit exceeded for IP: {}", ip);
        return Err(reject(
            StatusCode::TOO_MANY_REQUESTS,
            "Muitas tentativas de login. Aguarde um minuto.",
        ));
    }

    let invalid = || reject(StatusCode::UNAUTHORIZED, "E-mail ou senha inválidos.");

    let user = state
        .store
        .find_user(&normalize_email(&payload.email))
        .await
        .map_err(internal_error)?
        .ok_or_else(invalid)?;

    let parsed_hash = PasswordHash::new(&user.password_hash).map_err(|_| invalid())?;
    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    let token =
        session::sign_session(&user.email, user.role, &state.session_key).map_err(internal_error)?;

    let secure_flag = if std::env::var("PRODUCTION").is_ok() {
        "; Secure"
    } else {
        ""
    };
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        format!("session={token}; HttpOnly; SameSite=Lax; Path=/{secure_flag}")
            .parse()
            .map_err(internal_error)?,
    );

    Ok((headers, Json(UserProfile::from(&user))))
}

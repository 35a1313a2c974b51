pub mod account;
pub mod admin;
pub mod auth;
pub mod public;
pub mod session;
pub mod submissions;

use axum::{http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::domain::models::{User, UserRole};
use crate::state::SharedState;

/// User-facing error payload; messages are shown as-is by the client.
#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorMessage>);

pub fn reject(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorMessage {
            message: message.to_string(),
        }),
    )
}

pub fn internal_error<E: std::fmt::Display>(err: E) -> ApiError {
    tracing::error!("Falha ao acessar o banco de dados: {err}");
    reject(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Não foi possível carregar os dados. Por favor, tente novamente.",
    )
}

/// Account shape returned to clients; never carries the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: String,
    pub role: UserRole,
    pub full_name: String,
    pub birth_date: chrono::NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            role: user.role,
            full_name: user.full_name.clone(),
            birth_date: user.birth_date,
            company_name: user.company_name.clone(),
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .merge(public::router(state.clone()))
        .nest("/submissions", submissions::router(state.clone()))
        .nest("/me", account::router(state.clone()))
        .nest("/admin", admin::router(state))
}

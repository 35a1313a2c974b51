use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;

use crate::state::SharedState;
use crate::web::auth::hash_password;
use crate::web::session::UserSession;
use crate::web::{internal_error, reject, ApiError, UserProfile};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub full_name: String,
    pub password: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(current_profile).put(update_profile))
        .with_state(state)
}

async fn current_profile(UserSession(user): UserSession) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}

async fn update_profile(
    UserSession(mut user): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    let full_name = payload.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "O nome não pode estar vazio.",
        ));
    }

    user.full_name = full_name;
    if let Some(password) = payload.password.filter(|p| !p.is_empty()) {
        user.password_hash = hash_password(&password)?;
    }
    state.store.put_user(&user).await.map_err(internal_error)?;

    Ok(Json(UserProfile::from(&user)))
}

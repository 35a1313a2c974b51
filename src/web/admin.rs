use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::duplicates::{self, DuplicateGroup};
use crate::domain::merge::{self, FieldChoice};
use crate::domain::models::{
    is_valid_rating, ProjectDelay, SubmissionStatus, Theme, User, UserRole,
};
use crate::services::analysis;
use crate::state::SharedState;
use crate::web::auth::{hash_password, normalize_email};
use crate::web::session::UserSession;
use crate::web::{internal_error, reject, ApiError, UserProfile};

#[derive(Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DismissRequest {
    pub group_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub choices: Vec<FieldChoice>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub company_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub password: Option<String>,
    pub role: UserRole,
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub company_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub theme: Option<Theme>,
    /// An empty string clears the stored key.
    pub api_key: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/pending", get(list_pending))
        .route("/submissions", get(list_managed))
        .route("/submissions/:id", put(edit_submission))
        .route("/submissions/:id/approve", post(approve_submission))
        .route("/submissions/:id/reject", post(reject_submission))
        .route("/duplicates", get(list_duplicates))
        .route("/duplicates/dismiss", post(dismiss_duplicates))
        .route("/duplicates/merge", post(merge_duplicates))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:email", put(update_user))
        .route("/settings", get(get_settings).put(update_settings))
        .with_state(state)
}

fn require_site_admin(user: &User) -> Result<(), ApiError> {
    if user.role != UserRole::SiteAdmin {
        return Err(reject(
            StatusCode::FORBIDDEN,
            "Apenas administradores têm acesso a este painel.",
        ));
    }
    Ok(())
}

// ---------- Moderation queue ----------

/// Only Pending submissions sit in the moderation queue.
async fn list_pending(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<ProjectDelay>>, ApiError> {
    require_site_admin(&user)?;
    let projects = state.store.all_projects().await.map_err(internal_error)?;
    Ok(Json(
        projects
            .into_iter()
            .filter(|p| p.status == SubmissionStatus::Pending)
            .collect(),
    ))
}

/// Everything already moderated, approved or rejected.
async fn list_managed(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<ProjectDelay>>, ApiError> {
    require_site_admin(&user)?;
    let projects = state.store.all_projects().await.map_err(internal_error)?;
    Ok(Json(
        projects
            .into_iter()
            .filter(|p| p.status != SubmissionStatus::Pending)
            .collect(),
    ))
}

async fn approve_submission(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ProjectDelay>, ApiError> {
    require_site_admin(&user)?;
    let mut project = state
        .store
        .get_project(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Envio não encontrado."))?;

    state
        .store
        .ensure_company(&project.company_name)
        .await
        .map_err(internal_error)?;
    project.status = SubmissionStatus::Approved;
    state
        .store
        .put_project(&project)
        .await
        .map_err(internal_error)?;

    maybe_refresh_analysis(&state, &project.company_name).await?;
    Ok(Json(project))
}

async fn reject_submission(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<RejectRequest>,
) -> Result<Json<ProjectDelay>, ApiError> {
    require_site_admin(&user)?;
    let mut project = state
        .store
        .get_project(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Envio não encontrado."))?;

    project.status = SubmissionStatus::Rejected;
    project.rejection_reason = payload
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    state
        .store
        .put_project(&project)
        .await
        .map_err(internal_error)?;
    Ok(Json(project))
}

/// Full-record correction; any status transition is permitted through here.
async fn edit_submission(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<ProjectDelay>,
) -> Result<Json<ProjectDelay>, ApiError> {
    require_site_admin(&user)?;
    if payload.id != id {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "O identificador do envio não pode ser alterado.",
        ));
    }
    if Url::parse(&payload.crowdfunding_link).is_err() {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Por favor, insira um link de financiamento coletivo válido.",
        ));
    }
    if !is_valid_rating(payload.rating) {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "A nota deve estar entre 0 e 5, em meios pontos.",
        ));
    }

    let previous = state
        .store
        .get_project(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Envio não encontrado."))?;

    state
        .store
        .ensure_company(&payload.company_name)
        .await
        .map_err(internal_error)?;
    state
        .store
        .put_project(&payload)
        .await
        .map_err(internal_error)?;

    if previous.status != SubmissionStatus::Approved
        && payload.status == SubmissionStatus::Approved
    {
        maybe_refresh_analysis(&state, &payload.company_name).await?;
    }
    Ok(Json(payload))
}

// Approval transitions only regenerate the cached analysis when a key is
// configured; without one, nothing is queued and no error is cached.
async fn maybe_refresh_analysis(state: &SharedState, company_name: &str) -> Result<(), ApiError> {
    let api_key: Option<String> = state
        .store
        .get_setting("apiKey")
        .await
        .map_err(internal_error)?;
    if api_key.is_some() {
        analysis::spawn_company_analysis(state.clone(), company_name.to_string());
    }
    Ok(())
}

// ---------- Duplicates ----------

async fn list_duplicates(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<DuplicateGroup>>, ApiError> {
    require_site_admin(&user)?;
    let projects = state.store.all_projects().await.map_err(internal_error)?;
    let dismissed: HashSet<String> = state
        .store
        .dismissed_duplicates()
        .await
        .map_err(internal_error)?
        .into_iter()
        .collect();
    Ok(Json(duplicates::find_duplicate_groups(
        &projects, &dismissed,
    )))
}

/// Permanently hides the group behind this normalized link; submissions
/// arriving later with the same link stay hidden too.
async fn dismiss_duplicates(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<DismissRequest>,
) -> Result<StatusCode, ApiError> {
    require_site_admin(&user)?;
    state
        .store
        .put_dismissed_duplicate(&payload.group_key)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Destructive and non-reversible: the merged record replaces every member.
async fn merge_duplicates(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<MergeRequest>,
) -> Result<Json<ProjectDelay>, ApiError> {
    require_site_admin(&user)?;

    let mut group = Vec::with_capacity(payload.member_ids.len());
    for id in &payload.member_ids {
        let member = state
            .store
            .get_project(id)
            .await
            .map_err(internal_error)?
            .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Envio não encontrado."))?;
        group.push(member);
    }

    let merged_id = format!("merged-{}", Utc::now().timestamp_millis());
    let outcome = merge::merge_group(&group, &payload.choices, merged_id)
        .map_err(|e| reject(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()))?;

    state
        .store
        .ensure_company(&outcome.merged.company_name)
        .await
        .map_err(internal_error)?;
    state
        .store
        .put_project(&outcome.merged)
        .await
        .map_err(internal_error)?;
    state
        .store
        .remove_projects(&outcome.removed_ids)
        .await
        .map_err(internal_error)?;

    Ok(Json(outcome.merged))
}

// ---------- Users ----------

async fn list_users(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    require_site_admin(&user)?;
    let users = state.store.all_users().await.map_err(internal_error)?;
    Ok(Json(users.iter().map(UserProfile::from).collect()))
}

fn validate_company_role(role: UserRole, company_name: &Option<String>) -> Result<(), ApiError> {
    if role == UserRole::CompanyAdmin && company_name.is_none() {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Administradores de empresa precisam de uma empresa associada.",
        ));
    }
    Ok(())
}

async fn create_user(
    UserSession(admin): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    require_site_admin(&admin)?;

    let email = normalize_email(&payload.email);
    if email.is_empty() {
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
    let company_name = payload
        .company_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    validate_company_role(payload.role, &company_name)?;

    if state
        .store
        .find_user(&email)
        .await
        .map_err(internal_error)?
        .is_some()
    {
        return Err(reject(
            StatusCode::CONFLICT,
            "Erro: Este e-mail já está em uso.",
        ));
    }

    if let Some(name) = &company_name {
        state
            .store
            .ensure_company(name)
            .await
            .map_err(internal_error)?;
    }

    let user = User {
        email,
        password_hash: hash_password(&payload.password)?,
        role: payload.role,
        full_name: payload.full_name.trim().to_string(),
        birth_date: payload.birth_date,
        company_name,
    };
    state.store.put_user(&user).await.map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

async fn update_user(
    UserSession(admin): UserSession,
    State(state): State<SharedState>,
    Path(email): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    require_site_admin(&admin)?;

    let mut user = state
        .store
        .find_user(&normalize_email(&email))
        .await
        .map_err(internal_error)?
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Usuário não encontrado."))?;

    let company_name = payload
        .company_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    validate_company_role(payload.role, &company_name)?;

    if let Some(name) = &company_name {
        state
            .store
            .ensure_company(name)
            .await
            .map_err(internal_error)?;
    }

    user.role = payload.role;
    user.full_name = payload.full_name.trim().to_string();
    user.birth_date = payload.birth_date;
    user.company_name = company_name;
    if let Some(password) = payload.password.filter(|p| !p.is_empty()) {
        user.password_hash = hash_password(&password)?;
    }
    state.store.put_user(&user).await.map_err(internal_error)?;
    Ok(Json(UserProfile::from(&user)))
}

// ---------- Settings ----------

async fn get_settings(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<SettingsView>, ApiError> {
    require_site_admin(&user)?;
    let theme = state
        .store
        .get_setting("theme")
        .await
        .map_err(internal_error)?;
    let api_key = state
        .store
        .get_setting("apiKey")
        .await
        .map_err(internal_error)?;
    Ok(Json(SettingsView { theme, api_key }))
}

async fn update_settings(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<SettingsUpdate>,
) -> Result<Json<SettingsView>, ApiError> {
    require_site_admin(&user)?;

    if let Some(theme) = payload.theme {
        state
            .store
            .put_setting("theme", &theme)
            .await
            .map_err(internal_error)?;
    }
    if let Some(api_key) = payload.api_key {
        let trimmed = api_key.trim();
        if trimmed.is_empty() {
            // Clearing an already-absent key is a no-op.
            state
                .store
                .remove_setting("apiKey")
                .await
                .map_err(internal_error)?;
        } else {
            state
                .store
                .put_setting("apiKey", trimmed)
                .await
                .map_err(internal_error)?;
        }
    }

    let theme = state
        .store
        .get_setting("theme")
        .await
        .map_err(internal_error)?;
    let api_key = state
        .store
        .get_setting("apiKey")
        .await
        .map_err(internal_error)?;
    Ok(Json(SettingsView { theme, api_key }))
}

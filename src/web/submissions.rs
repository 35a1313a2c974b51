use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use url::Url;

use crate::domain::models::{is_valid_rating, ProjectDelay, SubmissionStatus, UserRole};
use crate::state::SharedState;
use crate::web::session::UserSession;
use crate::web::{internal_error, reject, ApiError};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    pub company_name: String,
    pub project_name: String,
    pub crowdfunding_link: String,
    pub promised_date: NaiveDate,
    pub actual_date: Option<NaiveDate>,
    pub rating: f64,
    pub comment: Option<String>,
    pub would_buy_again: Option<bool>,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub reply: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewUpdate {
    pub rating: f64,
    pub rebuttal: Option<String>,
    pub would_buy_again: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", post(create_submission))
        .route("/:id/reply", post(save_company_reply))
        .route("/:id/review", post(update_review))
        .with_state(state)
}

fn validate_rating(rating: f64) -> Result<(), ApiError> {
    if !is_valid_rating(rating) || rating == 0.0 {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Por favor, selecione uma nota (a avaliação por estrelas é obrigatória).",
        ));
    }
    Ok(())
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// New reports always enter the moderation queue as Pending; the company
/// record is created on the fly for unseen names.
async fn create_submission(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<NewSubmission>,
) -> Result<(StatusCode, Json<ProjectDelay>), ApiError> {
    let company_name = payload.company_name.trim().to_string();
    let project_name = payload.project_name.trim().to_string();
    if company_name.is_empty() || project_name.is_empty() {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Preencha todos os campos obrigatórios.",
        ));
    }
    if Url::parse(&payload.crowdfunding_link).is_err() {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Por favor, insira um link de financiamento coletivo válido.",
        ));
    }
    validate_rating(payload.rating)?;

    state
        .store
        .ensure_company(&company_name)
        .await
        .map_err(internal_error)?;

    let submission = ProjectDelay {
        id: Utc::now().timestamp_millis().to_string(),
        company_name,
        project_name,
        crowdfunding_link: payload.crowdfunding_link.trim().to_string(),
        promised_date: payload.promised_date,
        actual_date: payload.actual_date,
        status: SubmissionStatus::Pending,
        rating: payload.rating,
        comment: non_empty(payload.comment),
        submitter_email: user.email,
        company_reply: None,
        user_rebuttal: None,
        rejection_reason: None,
        would_buy_again: payload.would_buy_again,
    };
    state
        .store
        .put_project(&submission)
        .await
        .map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(submission)))
}

/// Company representatives may answer reports about their own company only.
async fn save_company_reply(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<ReplyRequest>,
) -> Result<Json<ProjectDelay>, ApiError> {
    if user.role != UserRole::CompanyAdmin {
        return Err(reject(
            StatusCode::FORBIDDEN,
            "Apenas representantes de empresa podem responder.",
        ));
    }
    let reply = payload.reply.trim().to_string();
    if reply.is_empty() {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "A resposta não pode estar vazia.",
        ));
    }

    let mut project = state
        .store
        .get_project(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Envio não encontrado."))?;

    if user.company_name.as_deref() != Some(project.company_name.as_str()) {
        return Err(reject(
            StatusCode::FORBIDDEN,
            "Este envio pertence a outra empresa.",
        ));
    }

    project.company_reply = Some(reply);
    state
        .store
        .put_project(&project)
        .await
        .map_err(internal_error)?;
    Ok(Json(project))
}

/// Submitters can revise rating, rebuttal and the buy-again answer while the
/// report is not rejected. The rebuttal only opens up once the company has
/// replied.
async fn update_review(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<ReviewUpdate>,
) -> Result<Json<ProjectDelay>, ApiError> {
    let mut project = state
        .store
        .get_project(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Envio não encontrado."))?;

    if project.submitter_email != user.email {
        return Err(reject(
            StatusCode::FORBIDDEN,
            "Este envio pertence a outro usuário.",
        ));
    }
    if project.status == SubmissionStatus::Rejected {
        return Err(reject(
            StatusCode::CONFLICT,
            "Envios rejeitados não podem ser atualizados.",
        ));
    }
    validate_rating(payload.rating)?;

    let rebuttal = non_empty(payload.rebuttal);
    if rebuttal.is_some() && project.company_reply.is_none() {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Você poderá responder após a empresa publicar uma réplica.",
        ));
    }

    project.rating = payload.rating;
    project.user_rebuttal = rebuttal;
    project.would_buy_again = Some(payload.would_buy_again);
    state
        .store
        .put_project(&project)
        .await
        .map_err(internal_error)?;
    Ok(Json(project))
}

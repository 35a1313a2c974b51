use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use crate::domain::models::{AnalysisResult, ProjectDelay, SubmissionStatus};
use crate::domain::reputation::{
    self, CompanyReputation, CompanyStats, ProjectRollup, ProjectStats,
};
use crate::services::analysis;
use crate::state::SharedState;
use crate::web::session::UserSession;
use crate::web::{internal_error, reject, ApiError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetail {
    pub company_name: String,
    pub stats: CompanyStats,
    pub projects: Vec<ProjectRollup>,
    pub submissions: Vec<ProjectDelay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    pub is_analysis_loading: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    pub project_name: String,
    pub company_name: String,
    pub crowdfunding_link: String,
    pub stats: ProjectStats,
    pub submissions: Vec<ProjectDelay>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/reputations", get(list_reputations))
        .route("/companies/:name", get(company_detail))
        .route("/companies/:name/analysis", post(request_analysis))
        .route("/projects/:company/:project", get(project_detail))
        .with_state(state)
}

/// Ranked list of every company with at least one approved submission.
async fn list_reputations(
    State(state): State<SharedState>,
) -> Result<Json<Vec<CompanyReputation>>, ApiError> {
    let projects = state.store.all_projects().await.map_err(internal_error)?;
    let analyses = state.store.all_analyses().await.map_err(internal_error)?;
    let loading = state.loading_analyses.read().await.clone();

    Ok(Json(reputation::compute_reputations(
        &projects,
        &analyses,
        &loading,
        Utc::now(),
    )))
}

async fn company_detail(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<CompanyDetail>, ApiError> {
    let projects = state.store.all_projects().await.map_err(internal_error)?;
    let company_projects: Vec<ProjectDelay> = projects
        .into_iter()
        .filter(|p| p.company_name == name)
        .collect();
    if company_projects.is_empty() {
        return Err(reject(StatusCode::NOT_FOUND, "Empresa não encontrada."));
    }

    let now = Utc::now();
    let approved: Vec<ProjectDelay> = company_projects
        .into_iter()
        .filter(|p| p.status == SubmissionStatus::Approved)
        .collect();
    let analysis = state
        .store
        .get(crate::store::Collection::Analyses, &name)
        .await
        .map_err(internal_error)?;
    let is_analysis_loading = state.loading_analyses.read().await.contains(&name);

    Ok(Json(CompanyDetail {
        stats: reputation::company_stats(&approved, now),
        projects: reputation::rollup_projects(&approved, now),
        submissions: approved,
        analysis,
        is_analysis_loading,
        company_name: name,
    }))
}

/// Queues a fresh analysis for the company; the result lands in the cache
/// when the external call resolves.
async fn request_analysis(
    UserSession(_user): UserSession,
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    analysis::spawn_company_analysis(state, name);
    Ok(StatusCode::ACCEPTED)
}

async fn project_detail(
    State(state): State<SharedState>,
    Path((company, project)): Path<(String, String)>,
) -> Result<Json<ProjectDetail>, ApiError> {
    let projects = state.store.all_projects().await.map_err(internal_error)?;
    let matching: Vec<&ProjectDelay> = projects
        .iter()
        .filter(|p| p.project_name == project && p.company_name == company)
        .collect();
    let Some(first) = matching.first() else {
        return Err(reject(StatusCode::NOT_FOUND, "Projeto não encontrado."));
    };
    let crowdfunding_link = first.crowdfunding_link.clone();

    let stats = reputation::project_stats(&projects, &project, &company, Utc::now());
    let submissions: Vec<ProjectDelay> = matching
        .into_iter()
        .filter(|p| p.status == SubmissionStatus::Approved)
        .cloned()
        .collect();

    Ok(Json(ProjectDetail {
        project_name: project,
        company_name: company,
        crowdfunding_link,
        stats,
        submissions,
    }))
}

use chrono::Utc;
use serde_json::json;
use tokio::time::{sleep, Duration};

use crate::domain::models::AnalysisResult;
use crate::domain::reputation;
use crate::state::SharedState;

const ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

pub const MISSING_KEY_MESSAGE: &str =
    "Erro: Nenhuma chave de API configurada no painel do administrador.";
const INVALID_KEY_MESSAGE: &str =
    "Erro: A chave de API fornecida não é válida. Verifique a chave no painel de administração.";
const FAILURE_MESSAGE: &str =
    "Erro: Não foi possível gerar a análise da IA. Verifique sua chave de API e conexão com a internet.";

/// The four numbers the collaborator consumes.
#[derive(Clone, Debug)]
pub struct ReputationSummary {
    pub company_name: String,
    pub project_count: usize,
    pub average_delay_days: f64,
    pub average_rating: f64,
}

/// Thin client for the external reputation-analysis collaborator. The outcome
/// is always an [`AnalysisResult`]; failures come back as error-flagged text
/// and are never fatal.
#[derive(Clone)]
pub struct AnalysisService {
    http: reqwest::Client,
}

impl AnalysisService {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    pub async fn analyze_reputation(
        &self,
        summary: &ReputationSummary,
        api_key: &str,
    ) -> AnalysisResult {
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(summary) }] }]
        });

        let mut retries: u64 = 0;
        loop {
            let response = self
                .http
                .post(ENDPOINT)
                .query(&[("key", api_key)])
                .json(&body)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let payload: serde_json::Value = match resp.json().await {
                        Ok(value) => value,
                        Err(err) => {
                            tracing::error!("resposta da análise ilegível: {err}");
                            return error_result(FAILURE_MESSAGE);
                        }
                    };
                    let text = payload["candidates"][0]["content"]["parts"][0]["text"].as_str();
                    return match text {
                        Some(text) => AnalysisResult {
                            is_error: text.starts_with("Erro:"),
                            text: text.to_string(),
                        },
                        None => error_result(FAILURE_MESSAGE),
                    };
                }
                Ok(resp) => {
                    let status = resp.status();
                    let detail = resp.text().await.unwrap_or_default();
                    if status == reqwest::StatusCode::BAD_REQUEST
                        || status == reqwest::StatusCode::FORBIDDEN
                        || detail.contains("API key not valid")
                    {
                        return error_result(INVALID_KEY_MESSAGE);
                    }
                    tracing::error!("análise externa falhou com status {status}: {detail}");
                    return error_result(FAILURE_MESSAGE);
                }
                Err(err) => {
                    retries += 1;
                    if retries > 3 {
                        tracing::error!("análise externa inacessível: {err}");
                        return error_result(FAILURE_MESSAGE);
                    }
                    sleep(Duration::from_millis(500 * retries)).await;
                }
            }
        }
    }
}

impl Default for AnalysisService {
    fn default() -> Self {
        Self::new()
    }
}

/// Fire-and-forget regeneration of a company's cached analysis. Progress is
/// tracked through the per-company loading flag; completion (success or
/// error) writes the cached result. In-flight calls cannot be cancelled, so a
/// resolved analysis may reflect slightly older statistics.
pub fn spawn_company_analysis(state: SharedState, company_name: String) {
    tokio::spawn(async move {
        run_company_analysis(&state, &company_name).await;
    });
}

pub async fn run_company_analysis(state: &SharedState, company_name: &str) {
    let api_key: Option<String> = match state.store.get_setting("apiKey").await {
        Ok(key) => key,
        Err(err) => {
            tracing::error!("não foi possível ler a chave de API: {err}");
            return;
        }
    };
    let Some(api_key) = api_key else {
        tracing::warn!("análise solicitada para {company_name} sem chave de API configurada");
        let result = error_result(MISSING_KEY_MESSAGE);
        if let Err(err) = state.store.put_analysis(company_name, &result).await {
            tracing::error!("falha ao gravar análise de {company_name}: {err}");
        }
        return;
    };

    state
        .loading_analyses
        .write()
        .await
        .insert(company_name.to_string());

    let outcome = analyze_from_store(state, company_name, &api_key).await;
    if let Some(result) = outcome {
        if let Err(err) = state.store.put_analysis(company_name, &result).await {
            tracing::error!("falha ao gravar análise de {company_name}: {err}");
        }
    }

    state.loading_analyses.write().await.remove(company_name);
}

// A company without approved submissions produces no analysis at all.
async fn analyze_from_store(
    state: &SharedState,
    company_name: &str,
    api_key: &str,
) -> Option<AnalysisResult> {
    let projects = match state.store.all_projects().await {
        Ok(projects) => projects,
        Err(err) => {
            tracing::error!("falha ao carregar envios para análise: {err}");
            return None;
        }
    };
    let averages = reputation::approved_averages(&projects, company_name, Utc::now())?;
    let summary = ReputationSummary {
        company_name: company_name.to_string(),
        project_count: averages.project_count,
        average_delay_days: averages.average_delay_days,
        average_rating: averages.average_rating,
    };
    Some(state.analysis.analyze_reputation(&summary, api_key).await)
}

fn build_prompt(summary: &ReputationSummary) -> String {
    format!(
        r#"Analise a reputação de entrega da empresa de financiamento coletivo "{name}".

Aqui estão os dados:
- Número total de projetos rastreados: {count}
- Média de dias de atraso na entrega: {delay}
- Avaliação média dos usuários: {rating:.1} de 5 estrelas.

Com base nesses dados, forneça um resumo curto, de um parágrafo, sobre o desempenho da empresa para um potencial apoiador.
Incorpore a avaliação média na sua análise.
Use um tom neutro e informativo. Comece o resumo diretamente, sem preâmbulos.
Por exemplo: "Com um atraso médio de X dias e uma avaliação de Y estrelas em Z projetos, a [Nome da Empresa] mostra um padrão de..."
Se o atraso for 0 ou negativo, elogie a pontualidade.
Responda em português do Brasil."#,
        name = summary.company_name,
        count = summary.project_count,
        delay = reputation::round_half_up(summary.average_delay_days),
        rating = summary.average_rating,
    )
}

fn error_result(message: &str) -> AnalysisResult {
    AnalysisResult {
        text: message.to_string(),
        is_error: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_the_four_numbers() {
        let prompt = build_prompt(&ReputationSummary {
            company_name: "Relógios Geniais".to_string(),
            project_count: 3,
            average_delay_days: 51.4,
            average_rating: 4.25,
        });
        assert!(prompt.contains("\"Relógios Geniais\""));
        assert!(prompt.contains("rastreados: 3"));
        assert!(prompt.contains("atraso na entrega: 51"));
        assert!(prompt.contains("4.2 de 5 estrelas"));
    }

    #[test]
    fn test_error_result_is_flagged() {
        let result = error_result(MISSING_KEY_MESSAGE);
        assert!(result.is_error);
        assert!(result.text.starts_with("Erro:"));
    }
}

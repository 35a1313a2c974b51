use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::domain::models::{AnalysisResult, ProjectDelay, SubmissionStatus};

/// Company-level ranking entry, ordered by average delay.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyReputation {
    pub name: String,
    pub projects: Vec<ProjectDelay>,
    pub average_delay_days: f64,
    pub delayed_projects_count: usize,
    pub average_rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<AnalysisResult>,
    pub is_ai_analysis_loading: bool,
}

/// Detail-page metrics for one company's approved submissions.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompanyStats {
    pub average_rating: f64,
    pub average_delay_days: f64,
    pub on_time_percentage: f64,
    pub would_buy_again_percentage: f64,
    pub buy_again_count: usize,
    pub approved_count: usize,
}

/// One project name aggregated across its approved submissions.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRollup {
    pub project_name: String,
    pub complaint_count: usize,
    pub average_delay_days: f64,
}

/// Detail-page metrics for a single project name within a company.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    pub average_rating: f64,
    pub average_delay_days: f64,
    pub would_buy_again_percentage: f64,
    pub buy_again_count: usize,
    pub approved_count: usize,
}

/// Plain averages used as input to the external analysis call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompanyAverages {
    pub project_count: usize,
    pub average_delay_days: f64,
    pub average_rating: f64,
}

/// Days between the promised and effective delivery dates. An undelivered
/// project counts against "now", so its delay keeps growing until delivery;
/// that branch yields fractional days, delivered ones are whole.
pub fn delay_in_days(promised: NaiveDate, actual: Option<NaiveDate>, now: DateTime<Utc>) -> f64 {
    match actual {
        Some(actual) => (actual - promised).num_days() as f64,
        None => {
            let promised_start = promised.and_time(NaiveTime::MIN).and_utc();
            (now - promised_start).num_seconds() as f64 / 86_400.0
        }
    }
}

/// Rounding with round-half-up semantics, also for negative values
/// (-1.5 rounds to -1, not -2).
pub fn round_half_up(days: f64) -> i64 {
    (days + 0.5).floor() as i64
}

pub fn delay_in_days_rounded(
    promised: NaiveDate,
    actual: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> i64 {
    round_half_up(delay_in_days(promised, actual, now))
}

// The ranking accumulation never lets a not-yet-due undelivered project pull
// a company's average below zero; delivered-early projects still do.
fn ranking_delay(project: &ProjectDelay, now: DateTime<Utc>) -> f64 {
    let delay = delay_in_days(project.promised_date, project.actual_date, now);
    if project.actual_date.is_none() {
        delay.max(0.0)
    } else {
        delay
    }
}

fn approved<'a>(projects: &'a [ProjectDelay]) -> impl Iterator<Item = &'a ProjectDelay> {
    projects
        .iter()
        .filter(|p| p.status == SubmissionStatus::Approved)
}

/// Ranks every company with at least one approved submission: ascending
/// average delay, ties broken by descending tracked-project count.
/// Companies without approved submissions are absent from the result.
pub fn compute_reputations(
    projects: &[ProjectDelay],
    analyses: &HashMap<String, AnalysisResult>,
    loading: &HashSet<String>,
    now: DateTime<Utc>,
) -> Vec<CompanyReputation> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<ProjectDelay>> = HashMap::new();
    for project in approved(projects) {
        if !grouped.contains_key(&project.company_name) {
            order.push(project.company_name.clone());
        }
        grouped
            .entry(project.company_name.clone())
            .or_default()
            .push(project.clone());
    }

    let mut reputations: Vec<CompanyReputation> = order
        .into_iter()
        .filter_map(|name| grouped.remove(&name).map(|group| (name, group)))
        .map(|(name, group)| {
            let count = group.len();
            let total_delay: f64 = group.iter().map(|p| ranking_delay(p, now)).sum();
            let total_rating: f64 = group.iter().map(|p| p.rating).sum();
            CompanyReputation {
                ai_analysis: analyses.get(&name).cloned(),
                is_ai_analysis_loading: loading.contains(&name),
                name,
                projects: group,
                average_delay_days: total_delay / count as f64,
                delayed_projects_count: count,
                average_rating: total_rating / count as f64,
            }
        })
        .collect();

    reputations.sort_by(|a, b| {
        a.average_delay_days
            .partial_cmp(&b.average_delay_days)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.delayed_projects_count.cmp(&a.delayed_projects_count))
    });
    reputations
}

/// Averages fed to the external analysis. `None` when the company has no
/// approved submissions, which skips the call entirely.
pub fn approved_averages(
    projects: &[ProjectDelay],
    company_name: &str,
    now: DateTime<Utc>,
) -> Option<CompanyAverages> {
    let group: Vec<&ProjectDelay> = approved(projects)
        .filter(|p| p.company_name == company_name)
        .collect();
    if group.is_empty() {
        return None;
    }
    let total_delay: f64 = group.iter().map(|p| ranking_delay(p, now)).sum();
    let total_rating: f64 = group.iter().map(|p| p.rating).sum();
    Some(CompanyAverages {
        project_count: group.len(),
        average_delay_days: total_delay / group.len() as f64,
        average_rating: total_rating / group.len() as f64,
    })
}

/// Detail stats over a company's submissions. Uses whole-day delays and
/// counts a submission as on time when its delay is zero or negative.
pub fn company_stats(projects: &[ProjectDelay], now: DateTime<Utc>) -> CompanyStats {
    let group: Vec<&ProjectDelay> = approved(projects).collect();
    if group.is_empty() {
        return CompanyStats::default();
    }
    let count = group.len();
    let total_rating: f64 = group.iter().map(|p| p.rating).sum();
    let delays: Vec<i64> = group
        .iter()
        .map(|p| delay_in_days_rounded(p.promised_date, p.actual_date, now))
        .collect();
    let total_delay: i64 = delays.iter().sum();
    let on_time_count = delays.iter().filter(|d| **d <= 0).count();

    let answered: Vec<bool> = group.iter().filter_map(|p| p.would_buy_again).collect();
    let would_buy_again_percentage = if answered.is_empty() {
        0.0
    } else {
        answered.iter().filter(|v| **v).count() as f64 / answered.len() as f64 * 100.0
    };

    CompanyStats {
        average_rating: total_rating / count as f64,
        average_delay_days: total_delay as f64 / count as f64,
        on_time_percentage: on_time_count as f64 / count as f64 * 100.0,
        would_buy_again_percentage,
        buy_again_count: answered.len(),
        approved_count: count,
    }
}

/// Groups a company's approved submissions by project name, keeping first-seen
/// order.
pub fn rollup_projects(projects: &[ProjectDelay], now: DateTime<Utc>) -> Vec<ProjectRollup> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<&ProjectDelay>> = HashMap::new();
    for project in approved(projects) {
        if !grouped.contains_key(&project.project_name) {
            order.push(project.project_name.clone());
        }
        grouped
            .entry(project.project_name.clone())
            .or_default()
            .push(project);
    }

    order
        .into_iter()
        .filter_map(|name| grouped.remove(&name).map(|group| (name, group)))
        .map(|(project_name, group)| {
            let total_delay: i64 = group
                .iter()
                .map(|p| delay_in_days_rounded(p.promised_date, p.actual_date, now))
                .sum();
            ProjectRollup {
                project_name,
                complaint_count: group.len(),
                average_delay_days: total_delay as f64 / group.len() as f64,
            }
        })
        .collect()
}

/// Detail stats for a single project name within a company. Unset
/// `would_buy_again` answers are excluded from the percentage denominator,
/// not treated as "no".
pub fn project_stats(
    projects: &[ProjectDelay],
    project_name: &str,
    company_name: &str,
    now: DateTime<Utc>,
) -> ProjectStats {
    let group: Vec<&ProjectDelay> = approved(projects)
        .filter(|p| p.project_name == project_name && p.company_name == company_name)
        .collect();
    if group.is_empty() {
        return ProjectStats::default();
    }
    let count = group.len();
    let total_rating: f64 = group.iter().map(|p| p.rating).sum();
    let total_delay: i64 = group
        .iter()
        .map(|p| delay_in_days_rounded(p.promised_date, p.actual_date, now))
        .sum();

    let answered: Vec<bool> = group.iter().filter_map(|p| p.would_buy_again).collect();
    let would_buy_again_percentage = if answered.is_empty() {
        0.0
    } else {
        answered.iter().filter(|v| **v).count() as f64 / answered.len() as f64 * 100.0
    };

    ProjectStats {
        average_rating: total_rating / count as f64,
        average_delay_days: total_delay as f64 / count as f64,
        would_buy_again_percentage,
        buy_again_count: answered.len(),
        approved_count: count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(raw: &str) -> NaiveDate {
        raw.parse().expect("valid date")
    }

    fn submission(id: &str, company: &str, status: SubmissionStatus) -> ProjectDelay {
        ProjectDelay {
            id: id.to_string(),
            company_name: company.to_string(),
            project_name: format!("Projeto {id}"),
            crowdfunding_link: format!("https://example.com/{id}"),
            promised_date: date("2023-01-01"),
            actual_date: Some(date("2023-01-11")),
            status,
            rating: 4.0,
            comment: None,
            submitter_email: "usuario@email.com".to_string(),
            company_reply: None,
            user_rebuttal: None,
            rejection_reason: None,
            would_buy_again: None,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().expect("valid instant")
    }

    #[test]
    fn test_delay_sign_follows_delivery_order() {
        let late = delay_in_days(date("2015-05-30"), Some(date("2015-07-20")), noon());
        assert_eq!(late, 51.0);

        let early = delay_in_days(date("2023-12-31"), Some(date("2023-12-25")), noon());
        assert_eq!(early, -6.0);

        let same_day = delay_in_days(date("2023-12-31"), Some(date("2023-12-31")), noon());
        assert_eq!(same_day, 0.0);
    }

    #[test]
    fn test_undelivered_delay_grows_with_now() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid");
        let later = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).single().expect("valid");
        let d1 = delay_in_days(date("2022-01-01"), None, earlier);
        let d2 = delay_in_days(date("2022-01-01"), None, later);
        assert!(d2 > d1);
    }

    #[test]
    fn test_only_approved_submissions_are_ranked() {
        let projects = vec![
            submission("1", "Aprovada", SubmissionStatus::Approved),
            submission("2", "Pendente", SubmissionStatus::Pending),
            submission("3", "Rejeitada", SubmissionStatus::Rejected),
        ];
        let reputations =
            compute_reputations(&projects, &HashMap::new(), &HashSet::new(), noon());
        assert_eq!(reputations.len(), 1);
        assert_eq!(reputations[0].name, "Aprovada");
    }

    #[test]
    fn test_ranking_order_and_tie_break() {
        let mut fast_a = submission("1", "Rápida A", SubmissionStatus::Approved);
        fast_a.actual_date = Some(date("2023-01-03"));
        let mut fast_b1 = submission("2", "Rápida B", SubmissionStatus::Approved);
        fast_b1.actual_date = Some(date("2023-01-03"));
        let mut fast_b2 = submission("3", "Rápida B", SubmissionStatus::Approved);
        fast_b2.actual_date = Some(date("2023-01-03"));
        let slow = submission("4", "Lenta", SubmissionStatus::Approved);

        let projects = vec![fast_a, fast_b1, fast_b2, slow];
        let reputations =
            compute_reputations(&projects, &HashMap::new(), &HashSet::new(), noon());
        let names: Vec<&str> = reputations.iter().map(|r| r.name.as_str()).collect();
        // Equal two-day averages: the company with more tracked projects wins.
        assert_eq!(names, vec!["Rápida B", "Rápida A", "Lenta"]);
    }

    #[test]
    fn test_averages_never_nan_on_empty_sets() {
        let stats = company_stats(&[], noon());
        assert_eq!(stats, CompanyStats::default());
        assert_eq!(stats.average_rating, 0.0);
        assert_eq!(stats.average_delay_days, 0.0);

        let stats = project_stats(&[], "Projeto X", "Empresa X", noon());
        assert_eq!(stats, ProjectStats::default());

        assert!(approved_averages(&[], "Empresa X", noon()).is_none());
    }

    #[test]
    fn test_buy_again_percentage_ignores_unset_answers() {
        let mut a = submission("1", "Empresa", SubmissionStatus::Approved);
        a.would_buy_again = Some(true);
        let mut b = submission("2", "Empresa", SubmissionStatus::Approved);
        b.would_buy_again = Some(false);
        let c = submission("3", "Empresa", SubmissionStatus::Approved);

        let stats = company_stats(&[a, b, c], noon());
        assert_eq!(stats.buy_again_count, 2);
        assert_eq!(stats.would_buy_again_percentage, 50.0);
    }

    #[test]
    fn test_on_time_percentage_counts_zero_and_early() {
        let mut early = submission("1", "Empresa", SubmissionStatus::Approved);
        early.actual_date = Some(date("2022-12-25"));
        let mut exact = submission("2", "Empresa", SubmissionStatus::Approved);
        exact.actual_date = Some(date("2023-01-01"));
        let late = submission("3", "Empresa", SubmissionStatus::Approved);

        let stats = company_stats(&[early, exact, late], noon());
        assert_eq!(stats.approved_count, 3);
        assert!((stats.on_time_percentage - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rollup_groups_by_project_name() {
        let mut a = submission("1", "Empresa", SubmissionStatus::Approved);
        a.project_name = "Relógio".to_string();
        let mut b = submission("2", "Empresa", SubmissionStatus::Approved);
        b.project_name = "Relógio".to_string();
        b.actual_date = Some(date("2023-01-21"));
        let mut c = submission("3", "Empresa", SubmissionStatus::Approved);
        c.project_name = "Cooler".to_string();

        let rollups = rollup_projects(&[a, b, c], noon());
        assert_eq!(rollups.len(), 2);
        assert_eq!(rollups[0].project_name, "Relógio");
        assert_eq!(rollups[0].complaint_count, 2);
        assert_eq!(rollups[0].average_delay_days, 15.0);
        assert_eq!(rollups[1].project_name, "Cooler");
    }
}

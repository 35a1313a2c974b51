use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    SiteAdmin,
    CompanyAdmin,
    User,
}

/// Registered account, keyed by e-mail in the store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub full_name: String,
    pub birth_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

/// Companies exist implicitly: a record is created the first time a
/// submission or user references an unseen name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Company {
    pub name: String,
}

/// A single user-reported record of a crowdfunding project's delivery
/// timeline and rating. Keyed by `id` in the store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDelay {
    pub id: String,
    pub company_name: String,
    pub project_name: String,
    pub crowdfunding_link: String,
    pub promised_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_date: Option<NaiveDate>,
    pub status: SubmissionStatus,
    pub rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub submitter_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_rebuttal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub would_buy_again: Option<bool>,
}

/// Cached outcome of the external reputation analysis, keyed by company name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub text: String,
    pub is_error: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    System,
    Light,
    Dark,
}

/// Ratings go from 0 to 5 stars in half-star steps.
pub fn is_valid_rating(rating: f64) -> bool {
    (0.0..=5.0).contains(&rating) && (rating * 2.0).fract() == 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_steps() {
        assert!(is_valid_rating(0.0));
        assert!(is_valid_rating(3.5));
        assert!(is_valid_rating(5.0));
        assert!(!is_valid_rating(5.5));
        assert!(!is_valid_rating(-0.5));
        assert!(!is_valid_rating(4.2));
    }

    #[test]
    fn test_project_json_shape() {
        let project = ProjectDelay {
            id: "1".to_string(),
            company_name: "Relógios Geniais".to_string(),
            project_name: "Relógio Tempo Certo".to_string(),
            crowdfunding_link: "https://example.com/relogio".to_string(),
            promised_date: NaiveDate::from_ymd_opt(2015, 5, 30).expect("valid date"),
            actual_date: None,
            status: SubmissionStatus::Pending,
            rating: 4.0,
            comment: None,
            submitter_email: "usuario@email.com".to_string(),
            company_reply: None,
            user_rebuttal: None,
            rejection_reason: None,
            would_buy_again: None,
        };
        let json = serde_json::to_value(&project).expect("serializes");
        assert_eq!(json["companyName"], "Relógios Geniais");
        assert_eq!(json["promisedDate"], "2015-05-30");
        assert_eq!(json["status"], "Pending");
        // Absent optionals are omitted, matching the stored record shape.
        assert!(json.get("actualDate").is_none());
        assert!(json.get("wouldBuyAgain").is_none());
    }
}

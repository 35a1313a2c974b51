use serde::{Deserialize, Serialize};

use crate::domain::models::{ProjectDelay, SubmissionStatus};

/// Separator placed between concatenated texts of merged submissions.
pub const TEXT_SEPARATOR: &str = "\n---\n";

/// Every field a merge can touch, with a fixed strategy each. There is no
/// generic "any field from any record" path.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MergeableField {
    SubmitterEmail,
    CompanyName,
    ProjectName,
    CrowdfundingLink,
    PromisedDate,
    ActualDate,
    Comment,
    CompanyReply,
    UserRebuttal,
    Rating,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeStrategy {
    /// The administrator picks one member's value.
    SingleSelect,
    /// Values from every member are joined with [`TEXT_SEPARATOR`].
    Concatenate,
    /// Arithmetic mean across all members.
    Average,
}

impl MergeableField {
    pub fn strategy(self) -> MergeStrategy {
        match self {
            Self::Comment | Self::CompanyReply | Self::UserRebuttal => MergeStrategy::Concatenate,
            Self::Rating => MergeStrategy::Average,
            _ => MergeStrategy::SingleSelect,
        }
    }
}

/// Administrator's pick of which member supplies a single-select field.
/// Fields without a choice fall back to the first member of the group.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChoice {
    pub field: MergeableField,
    pub source_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("um grupo precisa de pelo menos dois envios para mesclagem")]
    TooFewMembers,
    #[error("o envio {0} não pertence ao grupo selecionado")]
    UnknownSource(String),
    #[error("o campo {0:?} é combinado automaticamente e não aceita seleção")]
    NotSelectable(MergeableField),
}

#[derive(Clone, Debug)]
pub struct MergeOutcome {
    pub merged: ProjectDelay,
    pub removed_ids: Vec<String>,
}

/// Collapses a duplicate group into one fresh record. Single-select fields
/// come from the chosen member (first member when unchosen), the three text
/// fields are concatenated in member order, the rating is averaged, and the
/// merged record starts out Approved under the given id. The caller deletes
/// the original members; there is no audit trail beyond the concatenated
/// texts.
pub fn merge_group(
    group: &[ProjectDelay],
    choices: &[FieldChoice],
    merged_id: String,
) -> Result<MergeOutcome, MergeError> {
    if group.len() < 2 {
        return Err(MergeError::TooFewMembers);
    }

    let mut merged = group[0].clone();
    for choice in choices {
        if choice.field.strategy() != MergeStrategy::SingleSelect {
            return Err(MergeError::NotSelectable(choice.field));
        }
        let source = group
            .iter()
            .find(|p| p.id == choice.source_id)
            .ok_or_else(|| MergeError::UnknownSource(choice.source_id.clone()))?;
        match choice.field {
            MergeableField::SubmitterEmail => {
                merged.submitter_email = source.submitter_email.clone();
            }
            MergeableField::CompanyName => merged.company_name = source.company_name.clone(),
            MergeableField::ProjectName => merged.project_name = source.project_name.clone(),
            MergeableField::CrowdfundingLink => {
                merged.crowdfunding_link = source.crowdfunding_link.clone();
            }
            MergeableField::PromisedDate => merged.promised_date = source.promised_date,
            MergeableField::ActualDate => merged.actual_date = source.actual_date,
            MergeableField::Comment
            | MergeableField::CompanyReply
            | MergeableField::UserRebuttal
            | MergeableField::Rating => unreachable!("filtered by strategy above"),
        }
    }

    merged.comment = join_texts(group.iter().map(|p| p.comment.as_deref()));
    merged.company_reply = join_texts(group.iter().map(|p| p.company_reply.as_deref()));
    merged.user_rebuttal = join_texts(group.iter().map(|p| p.user_rebuttal.as_deref()));
    merged.rating = group.iter().map(|p| p.rating).sum::<f64>() / group.len() as f64;
    merged.status = SubmissionStatus::Approved;
    merged.id = merged_id;

    Ok(MergeOutcome {
        removed_ids: group.iter().map(|p| p.id.clone()).collect(),
        merged,
    })
}

fn join_texts<'a>(texts: impl Iterator<Item = Option<&'a str>>) -> Option<String> {
    let present: Vec<&str> = texts.flatten().filter(|t| !t.is_empty()).collect();
    if present.is_empty() {
        None
    } else {
        Some(present.join(TEXT_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn member(id: &str, rating: f64, comment: Option<&str>) -> ProjectDelay {
        ProjectDelay {
            id: id.to_string(),
            company_name: "Relógios Geniais".to_string(),
            project_name: "Relógio Tempo Certo".to_string(),
            crowdfunding_link: "https://example.com/relogio".to_string(),
            promised_date: NaiveDate::from_ymd_opt(2015, 5, 30).expect("valid date"),
            actual_date: None,
            status: SubmissionStatus::Pending,
            rating,
            comment: comment.map(str::to_string),
            submitter_email: format!("{id}@email.com"),
            company_reply: None,
            user_rebuttal: None,
            rejection_reason: None,
            would_buy_again: None,
        }
    }

    #[test]
    fn test_rating_is_averaged_and_comments_concatenated_in_order() {
        let group = vec![
            member("1", 4.0, Some("primeiro relato")),
            member("2", 2.0, None),
            member("3", 5.0, Some("terceiro relato")),
        ];
        let outcome =
            merge_group(&group, &[], "merged-1".to_string()).expect("merge succeeds");

        assert!((outcome.merged.rating - 11.0 / 3.0).abs() < 1e-12);
        assert_eq!(
            outcome.merged.comment.as_deref(),
            Some("primeiro relato\n---\nterceiro relato")
        );
        assert_eq!(outcome.merged.status, SubmissionStatus::Approved);
        assert_eq!(outcome.merged.id, "merged-1");
        assert_eq!(outcome.removed_ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_unchosen_fields_fall_back_to_first_member() {
        let group = vec![member("1", 4.0, None), member("2", 2.0, None)];
        let outcome = merge_group(&group, &[], "merged-2".to_string()).expect("merge succeeds");
        assert_eq!(outcome.merged.submitter_email, "1@email.com");
    }

    #[test]
    fn test_field_choice_picks_another_member() {
        let group = vec![member("1", 4.0, None), member("2", 2.0, None)];
        let choices = vec![FieldChoice {
            field: MergeableField::SubmitterEmail,
            source_id: "2".to_string(),
        }];
        let outcome =
            merge_group(&group, &choices, "merged-3".to_string()).expect("merge succeeds");
        assert_eq!(outcome.merged.submitter_email, "2@email.com");
    }

    #[test]
    fn test_choice_outside_group_is_rejected() {
        let group = vec![member("1", 4.0, None), member("2", 2.0, None)];
        let choices = vec![FieldChoice {
            field: MergeableField::ProjectName,
            source_id: "99".to_string(),
        }];
        assert!(matches!(
            merge_group(&group, &choices, "merged-4".to_string()),
            Err(MergeError::UnknownSource(id)) if id == "99"
        ));
    }

    #[test]
    fn test_automatic_fields_cannot_be_selected() {
        let group = vec![member("1", 4.0, None), member("2", 2.0, None)];
        let choices = vec![FieldChoice {
            field: MergeableField::Rating,
            source_id: "1".to_string(),
        }];
        assert!(matches!(
            merge_group(&group, &choices, "merged-5".to_string()),
            Err(MergeError::NotSelectable(MergeableField::Rating))
        ));
    }

    #[test]
    fn test_single_member_is_not_mergeable() {
        let group = vec![member("1", 4.0, None)];
        assert!(matches!(
            merge_group(&group, &[], "merged-6".to_string()),
            Err(MergeError::TooFewMembers)
        ));
    }

    #[test]
    fn test_strategies_are_fixed_per_field() {
        assert_eq!(
            MergeableField::Comment.strategy(),
            MergeStrategy::Concatenate
        );
        assert_eq!(MergeableField::Rating.strategy(), MergeStrategy::Average);
        assert_eq!(
            MergeableField::PromisedDate.strategy(),
            MergeStrategy::SingleSelect
        );
    }
}

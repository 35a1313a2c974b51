use std::collections::{HashMap, HashSet};

use serde::Serialize;
use url::Url;

use crate::domain::models::ProjectDelay;

/// Submissions sharing one normalized crowdfunding link.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub key: String,
    pub members: Vec<ProjectDelay>,
}

/// Normalizes a crowdfunding link to `hostname + path` with a trailing slash
/// stripped; query strings and fragments are dropped, so links differing only
/// in tracking parameters collapse to the same key. Unparsable links yield
/// `None` and never take part in duplicate detection.
pub fn normalize_link(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?;
    let mut key = format!("{}{}", host, url.path());
    if key.ends_with('/') {
        key.pop();
    }
    Some(key)
}

/// Groups submissions of every status by normalized link, skipping dismissed
/// keys, and keeps only groups with at least two members. Group and member
/// order follow the input order.
pub fn find_duplicate_groups(
    projects: &[ProjectDelay],
    dismissed: &HashSet<String>,
) -> Vec<DuplicateGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<ProjectDelay>> = HashMap::new();

    for project in projects {
        let Some(key) = normalize_link(&project.crowdfunding_link) else {
            continue;
        };
        if dismissed.contains(&key) {
            continue;
        }
        if !grouped.contains_key(&key) {
            order.push(key.clone());
        }
        grouped.entry(key).or_default().push(project.clone());
    }

    order
        .into_iter()
        .filter_map(|key| {
            grouped
                .remove(&key)
                .filter(|members| members.len() > 1)
                .map(|members| DuplicateGroup { key, members })
        })
        .collect()
}

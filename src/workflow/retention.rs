//! Which assets of a sub-page a cleanup pass would delete

use serde::{Deserialize, Serialize};

/// Cleanup policy for incomplete assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep the first asset when every asset is incomplete, otherwise delete
    /// only the incomplete ones.
    #[default]
    KeepFirstWhenAllIncomplete,
    /// Delete every incomplete asset.
    DeleteIncompleteOnly,
}

/// Decision for one group of assets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionPlan {
    pub keep: Option<u64>,
    pub delete: Vec<u64>,
    pub all_incomplete: bool,
}

/// `assets` are `(macro_id, incomplete)` in table order.
pub fn plan_retention(assets: &[(u64, bool)], policy: RetentionPolicy) -> RetentionPlan {
    if assets.is_empty() {
        return RetentionPlan::default();
    }
    let all_incomplete = assets.iter().all(|(_, incomplete)| *incomplete);
    match policy {
        RetentionPolicy::KeepFirstWhenAllIncomplete if all_incomplete => RetentionPlan {
            keep: Some(assets[0].0),
            delete: assets[1..].iter().map(|(id, _)| *id).collect(),
            all_incomplete,
        },
        _ => RetentionPlan {
            keep: None,
            delete: assets
                .iter()
                .filter(|(_, incomplete)| *incomplete)
                .map(|(id, _)| *id)
                .collect(),
            all_incomplete,
        },
    }
}

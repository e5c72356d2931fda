//! Combining per-source result lists before deduplication.

use serde::{Deserialize, Serialize};

use crate::catalog::SearchResultItem;

/// How per-source result lists are ordered in the merged list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum MergePolicy {
    /// Sources are appended in configuration order.
    #[default]
    PrimaryFirst,
    /// Sources are round-robined so no source dominates the head.
    Interleave,
}

pub fn merge(lists: Vec<Vec<SearchResultItem>>, policy: MergePolicy) -> Vec<SearchResultItem> {
    match policy {
        MergePolicy::PrimaryFirst => lists.into_iter().flatten().collect(),
        MergePolicy::Interleave => {
            let total = lists.iter().map(Vec::len).sum();
            let mut iters: Vec<_> = lists.into_iter().map(Vec::into_iter).collect();
            let mut merged = Vec::with_capacity(total);
            while merged.len() < total {
                for iter in &mut iters {
                    if let Some(item) = iter.next() {
                        merged.push(item);
                    }
                }
            }
            merged
        }
    }
}

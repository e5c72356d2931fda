//! Near-duplicate collapsing for merged search results.
//!
//! Results from different platforms describing the same song, artist or
//! album are grouped on a normalized key, and one representative per group
//! survives. Selection is point-based so richer rows (real source id,
//! artwork, base edition) win over sparse ones.

mod merge;

pub use merge::{merge, MergePolicy};

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::catalog::{ItemKind, SearchResultItem};
use crate::normalize::{normalize, normalize_album_title};

const SOURCE_ID_POINTS: i64 = 20;
const ARTWORK_POINTS: i64 = 10;
const TITLE_SUBSTANCE_POINTS: i64 = 5;
const GENRES_POINTS: i64 = 3;
const BASE_EDITION_POINTS: i64 = 15;
const ALBUM_SHORT_TITLE_POINTS: i64 = 8;
const ALBUM_LONG_TITLE_PENALTY: i64 = 5;
const POPULARITY_POINTS_CAP: i64 = 5;

#[derive(Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    kind: ItemKind,
    base_title: String,
    artist_key: String,
}

fn group_key(item: &SearchResultItem) -> GroupKey {
    let artist = normalize(&item.artist);
    match item.kind {
        // Album listings often append collaborators to the artist field.
        // Key on the leading artist token so editions still collide.
        ItemKind::Album => GroupKey {
            kind: item.kind,
            base_title: normalize_album_title(&item.title),
            artist_key: artist
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
        },
        _ => GroupKey {
            kind: item.kind,
            base_title: normalize(&item.title),
            artist_key: artist,
        },
    }
}

fn is_base_edition(item: &SearchResultItem) -> bool {
    match item.kind {
        ItemKind::Album => normalize_album_title(&item.title) == normalize(&item.title),
        _ => true,
    }
}

fn representative_score(item: &SearchResultItem) -> i64 {
    let mut points = 0;
    if item.valid_source_id().is_some() {
        points += SOURCE_ID_POINTS;
    }
    if item.artwork_url.as_deref().is_some_and(|u| !u.trim().is_empty()) {
        points += ARTWORK_POINTS;
    }
    if item.title.trim().chars().count() >= 3 {
        points += TITLE_SUBSTANCE_POINTS;
    }
    if !item.genres.is_empty() {
        points += GENRES_POINTS;
    }
    if is_base_edition(item) {
        points += BASE_EDITION_POINTS;
    }
    if item.kind == ItemKind::Album {
        let len = item.title.chars().count() as i64;
        if len < 30 {
            points += ALBUM_SHORT_TITLE_POINTS;
        } else if len > 50 {
            points -= ALBUM_LONG_TITLE_PENALTY;
        }
    }
    if let Some(popularity) = item.popularity {
        points += (popularity as i64 / 10).min(POPULARITY_POINTS_CAP);
    }
    points
}

/// Collapses near-duplicate results. Groups appear in the order their first
/// member appeared in the input, each represented by its best-scoring row.
/// Idempotent.
pub fn deduplicate(items: Vec<SearchResultItem>) -> Vec<SearchResultItem> {
    let input_len = items.len();

    // First position and current best per group. Ties keep the earliest
    // item so output stays stable across runs.
    let mut best_by_group: HashMap<GroupKey, (usize, usize, i64)> = HashMap::new();
    for (index, item) in items.iter().enumerate() {
        let key = group_key(item);
        let score = representative_score(item);
        match best_by_group.get_mut(&key) {
            None => {
                best_by_group.insert(key, (index, index, score));
            }
            Some((_, best_index, best_score)) => {
                if score > *best_score {
                    *best_index = index;
                    *best_score = score;
                }
            }
        }
    }

    let mut order: Vec<(usize, usize)> = best_by_group
        .values()
        .map(|(first, best, _)| (*first, *best))
        .collect();
    order.sort_by_key(|(first, _)| *first);
    let survivors: Vec<usize> = order.into_iter().map(|(_, best)| best).collect();

    let mut slots: Vec<Option<SearchResultItem>> = items.into_iter().map(Some).collect();
    let mut seen_source_ids: HashSet<(String, String)> = HashSet::new();
    let mut output = Vec::with_capacity(survivors.len());
    for index in survivors {
        let Some(item) = slots[index].take() else {
            continue;
        };
        // Safety net: the same platform row can survive in two groups,
        // for example a song and an album with the same name will not,
        // but mis-kinded source rows can. Drop exact repeats.
        if let Some(source_id) = item.valid_source_id() {
            let pair = (item.platform.as_str().to_string(), source_id.to_string());
            if !seen_source_ids.insert(pair) {
                continue;
            }
        }
        output.push(item);
    }

    if output.len() < input_len {
        debug!(
            input = input_len,
            output = output.len(),
            "collapsed duplicate search results"
        );
    }
    output
}

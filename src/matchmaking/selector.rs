//! Skill-window group selection
//!
//! Pure function over a pool snapshot. The pool is sorted by rating (stable,
//! so equal ratings keep queue order) and a window of `group_size` entries
//! slides from the low end; the first window whose rating spread fits is the
//! group.

use crate::types::{PlayerEntry, SkillRating};

/// Pick the first skill-compatible group of exactly `group_size` players.
///
/// Returns `None` when `group_size` is zero, the pool is too small, or no
/// window has `max - min <= max_spread`. The returned group is sorted
/// ascending by rating.
pub fn select_group(
    pool: &[PlayerEntry],
    group_size: usize,
    max_spread: SkillRating,
) -> Option<Vec<PlayerEntry>> {
    if group_size == 0 || pool.len() < group_size {
        return None;
    }

    let mut sorted: Vec<&PlayerEntry> = pool.iter().collect();
    sorted.sort_by_key(|entry| entry.skill_rating);

    sorted
        .windows(group_size)
        .find(|window| {
            let spread = window[group_size - 1].skill_rating - window[0].skill_rating;
            spread <= max_spread
        })
        .map(|window| window.iter().map(|entry| (*entry).clone()).collect())
}

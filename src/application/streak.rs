use crate::application::schedule::resolve_effective_items;
use crate::domain::models::{CalendarEntry, Template};
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakSummary {
    pub current: u32,
    pub longest: u32,
}

/// A date is perfect when its effective schedule is non-empty and fully
/// completed. Days without an entry, or whose entry resolves to nothing,
/// never qualify.
pub fn is_perfect_day(
    entries: &HashMap<String, CalendarEntry>,
    templates: &[Template],
    date: NaiveDate,
) -> bool {
    let key = date.format("%Y-%m-%d").to_string();
    let items = resolve_effective_items(entries.get(&key), templates);
    !items.is_empty() && items.iter().all(|item| item.completed)
}

/// Counts today once, then walks backward from yesterday until the first
/// non-perfect day. Today failing does not cut the walk short: the day
/// is still in progress, so a run ending yesterday keeps showing.
pub fn recompute(
    entries: &HashMap<String, CalendarEntry>,
    templates: &[Template],
    today: NaiveDate,
    longest_so_far: u32,
) -> StreakSummary {
    let mut current = 0;
    if is_perfect_day(entries, templates, today) {
        current += 1;
    }

    let mut day = today.pred_opt();
    while let Some(date) = day {
        if !is_perfect_day(entries, templates, date) {
            break;
        }
        current += 1;
        day = date.pred_opt();
    }

    StreakSummary {
        current,
        longest: longest_so_far.max(current),
    }
}

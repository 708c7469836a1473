use crate::domain::models::{
    format_minutes_of_day, minutes_of_day, CalendarEntry, ScheduleItem, Template,
};

const FALLBACK_SLOT_START: &str = "12:00";
const FALLBACK_SLOT_END: &str = "13:00";

/// Resolves the effective schedule for one date. A materialized entry is
/// its own source of truth; a reference entry falls back to its template
/// with completion flags cleared. Missing entry or template resolves to
/// an empty list.
pub fn resolve_effective_items(
    entry: Option<&CalendarEntry>,
    templates: &[Template],
) -> Vec<ScheduleItem> {
    let Some(entry) = entry else {
        return Vec::new();
    };
    if let Some(items) = &entry.custom_items {
        return items.clone();
    }
    templates
        .iter()
        .find(|template| template.id == entry.template_id)
        .map(|template| {
            template
                .items
                .iter()
                .cloned()
                .map(|mut item| {
                    item.completed = false;
                    item
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Copy-on-write step: the first mutation of a reference entry clones the
/// resolved template items onto the entry, after which the template is no
/// longer consulted for this date.
pub fn materialize_items<'a>(
    entry: &'a mut CalendarEntry,
    templates: &[Template],
) -> &'a mut Vec<ScheduleItem> {
    if !entry.is_materialized() {
        let resolved = templates
            .iter()
            .find(|template| template.id == entry.template_id)
            .map(|template| {
                template
                    .items
                    .iter()
                    .cloned()
                    .map(|mut item| {
                        item.completed = false;
                        item
                    })
                    .collect()
            })
            .unwrap_or_default();
        entry.custom_items = Some(resolved);
    }
    entry
        .custom_items
        .as_mut()
        .expect("entry items were just materialized")
}

/// Flips one item's completion flag, returning the new state, or `None`
/// when the id does not match anything.
pub fn toggle_item(items: &mut [ScheduleItem], item_id: &str) -> Option<bool> {
    let item = items.iter_mut().find(|item| item.id == item_id)?;
    item.completed = !item.completed;
    Some(item.completed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemField {
    StartTime,
    EndTime,
    Activity,
}

impl ItemField {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "startTime" => Some(Self::StartTime),
            "endTime" => Some(Self::EndTime),
            "activity" => Some(Self::Activity),
            _ => None,
        }
    }
}

/// Edits one field of one item. Time fields must already be validated as
/// HH:MM by the caller. Returns false on an id miss.
pub fn update_item_field(
    items: &mut [ScheduleItem],
    item_id: &str,
    field: ItemField,
    value: &str,
) -> bool {
    let Some(item) = items.iter_mut().find(|item| item.id == item_id) else {
        return false;
    };
    match field {
        ItemField::StartTime => item.start_time = value.to_string(),
        ItemField::EndTime => item.end_time = value.to_string(),
        ItemField::Activity => item.activity = value.to_string(),
    }
    true
}

/// Default slot for a newly added item: one hour starting where the last
/// item ends (wrapping past midnight), or 12:00-13:00 on an empty list.
pub fn next_default_slot(items: &[ScheduleItem]) -> (String, String) {
    let Some(last) = items.last() else {
        return (FALLBACK_SLOT_START.to_string(), FALLBACK_SLOT_END.to_string());
    };
    let Some(start) = minutes_of_day(&last.end_time) else {
        return (FALLBACK_SLOT_START.to_string(), FALLBACK_SLOT_END.to_string());
    };
    (
        format_minutes_of_day(start),
        format_minutes_of_day(start + 60),
    )
}

pub fn push_new_item(items: &mut Vec<ScheduleItem>, id: String) -> ScheduleItem {
    let (start_time, end_time) = next_default_slot(items);
    let item = ScheduleItem {
        id,
        start_time,
        end_time,
        activity: String::new(),
        completed: false,
    };
    items.push(item.clone());
    item
}

pub fn delete_item(items: &mut Vec<ScheduleItem>, item_id: &str) -> bool {
    let before = items.len();
    items.retain(|item| item.id != item_id);
    items.len() != before
}

/// Moves the item at `from` to position `to`. Out-of-range indices are a
/// silent no-op; in-range moves are pure permutations.
pub fn reorder_items(items: &mut Vec<ScheduleItem>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}

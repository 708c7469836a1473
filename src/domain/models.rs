use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const BACKUP_VERSION: u32 = 3;

/// Sentinel ids for day plans that were written directly on an entry
/// instead of referencing a stored template.
pub const CUSTOM_TEMPLATE_ID: &str = "tpl_custom";
pub const CUSTOM_CATEGORY_ID: &str = "cat_custom";

pub const ITEM_COMPLETION_XP: i64 = 15;
pub const POMODORO_COMPLETION_XP: i64 = 25;
pub const GOAL_COMPLETION_XP: i64 = 500;
pub const XP_PER_LEVEL: i64 = 1000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayType {
    Work,
    Off,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestPriority {
    Low,
    High,
    Critical,
}

impl QuestPriority {
    /// XP granted when a quest of this priority is completed; the same
    /// amount is taken back when it is un-completed.
    pub fn xp_reward(self) -> i64 {
        match self {
            Self::Low => 25,
            Self::High => 50,
            Self::Critical => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    Work,
    Break,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCategory {
    pub id: String,
    pub name: String,
    pub base_type: DayType,
    pub color: String,
}

impl TemplateCategory {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "category.id")?;
        validate_non_empty(&self.name, "category.name")?;
        Ok(())
    }

    /// Synthetic category backing entries whose plan was written by hand.
    /// Never stored in the category collection.
    pub fn custom_sentinel() -> Self {
        Self {
            id: CUSTOM_CATEGORY_ID.to_string(),
            name: "CUSTOM".to_string(),
            base_type: DayType::Off,
            color: "cyber-purple".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub id: String,
    pub start_time: String,
    pub end_time: String,
    pub activity: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub completed: bool,
}

impl ScheduleItem {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "item.id")?;
        validate_hhmm(&self.start_time, "item.startTime")?;
        validate_hhmm(&self.end_time, "item.endTime")?;
        Ok(())
    }

    /// Minutes between start and end. An end before the start means the
    /// slot runs past midnight into the next day.
    pub fn duration_minutes(&self) -> Option<u32> {
        let start = minutes_of_day(&self.start_time)?;
        let end = minutes_of_day(&self.end_time)?;
        Some((end - start).rem_euclid(24 * 60) as u32)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub category_id: String,
    pub items: Vec<ScheduleItem>,
}

impl Template {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "template.id")?;
        validate_non_empty(&self.name, "template.name")?;
        validate_non_empty(&self.category_id, "template.categoryId")?;
        validate_unique_item_ids(&self.items, "template.items")?;
        for item in &self.items {
            item.validate()?;
        }
        Ok(())
    }

    /// Synthetic template paired with [`TemplateCategory::custom_sentinel`].
    pub fn custom_sentinel() -> Self {
        Self {
            id: CUSTOM_TEMPLATE_ID.to_string(),
            name: "CUSTOM PLAN".to_string(),
            category_id: CUSTOM_CATEGORY_ID.to_string(),
            items: Vec::new(),
        }
    }
}

/// One calendar date with an assigned plan. Without `custom_items` the
/// entry is a bare reference to its template; once the day is edited the
/// items are materialized onto the entry and the template is no longer
/// consulted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEntry {
    pub date: String,
    pub template_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_items: Option<Vec<ScheduleItem>>,
}

impl CalendarEntry {
    pub fn validate(&self) -> Result<(), String> {
        validate_date(&self.date, "entry.date")?;
        validate_non_empty(&self.template_id, "entry.templateId")?;
        if let Some(items) = &self.custom_items {
            validate_unique_item_ids(items, "entry.customItems")?;
            for item in items {
                item.validate()?;
            }
        }
        Ok(())
    }

    pub fn is_materialized(&self) -> bool {
        self.custom_items.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub id: String,
    pub title: String,
    pub deadline: String,
    pub priority: QuestPriority,
    pub completed: bool,
}

impl Quest {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "quest.id")?;
        validate_non_empty(&self.title, "quest.title")?;
        validate_date(&self.deadline, "quest.deadline")?;
        Ok(())
    }
}

/// Append-only record of a finished timer interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quest_id: Option<String>,
}

impl PomodoroSession {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "session.id")?;
        if self.duration_minutes == 0 {
            return Err("session.durationMinutes must be > 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LongTermGoal {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub tagline: String,
    pub xp: i64,
    #[serde(default)]
    pub long_term_goals: Vec<LongTermGoal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_scale: Option<f64>,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
}

impl UserProfile {
    /// Euclidean division keeps the projection consistent below zero:
    /// xp of -500 sits halfway through level 0.
    pub fn level(&self) -> i64 {
        self.xp.div_euclid(XP_PER_LEVEL) + 1
    }

    pub fn next_level_xp(&self) -> i64 {
        (self.xp.div_euclid(XP_PER_LEVEL) + 1) * XP_PER_LEVEL
    }

    pub fn progress_percent(&self) -> f64 {
        self.xp.rem_euclid(XP_PER_LEVEL) as f64 / 10.0
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            username: "NEW_USER".to_string(),
            tagline: "Level 1 Planner".to_string(),
            xp: 0,
            long_term_goals: Vec::new(),
            theme: Some("dark".to_string()),
            font_scale: Some(1.0),
            current_streak: 0,
            longest_streak: 0,
        }
    }
}

/// Version-3 backup document. Export always writes every field; import
/// accepts any subset (see [`BackupDocument`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    pub version: u32,
    pub categories: Vec<TemplateCategory>,
    pub templates: Vec<Template>,
    pub entries: Vec<CalendarEntry>,
    pub quests: Vec<Quest>,
    pub pomodoro_history: Vec<PomodoroSession>,
    pub profile: UserProfile,
}

/// Import-side view of a backup: each collection is independently
/// optional, and an absent field leaves the live collection untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub categories: Option<Vec<TemplateCategory>>,
    #[serde(default)]
    pub templates: Option<Vec<Template>>,
    #[serde(default)]
    pub entries: Option<Vec<CalendarEntry>>,
    #[serde(default)]
    pub quests: Option<Vec<Quest>>,
    #[serde(default)]
    pub pomodoro_history: Option<Vec<PomodoroSession>>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

pub fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    minutes_of_day(value)
        .map(|_| ())
        .ok_or_else(|| format!("{field_name} must be HH:MM"))
}

pub fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))?;
    Ok(())
}

fn validate_unique_item_ids(items: &[ScheduleItem], field_name: &str) -> Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for item in items {
        if !seen.insert(item.id.as_str()) {
            return Err(format!("{field_name} contains duplicate item id: {}", item.id));
        }
    }
    Ok(())
}

/// Parses "HH:MM" into minutes since midnight.
pub fn minutes_of_day(value: &str) -> Option<i32> {
    let (hour_str, minute_str) = value.split_once(':')?;
    if hour_str.len() != 2 || minute_str.len() != 2 {
        return None;
    }
    let hour: i32 = hour_str.parse().ok()?;
    let minute: i32 = minute_str.parse().ok()?;
    if !(0..24).contains(&hour) || !(0..60).contains(&minute) {
        return None;
    }
    Some(hour * 60 + minute)
}

/// Renders minutes since midnight back to "HH:MM", wrapping past 24:00.
pub fn format_minutes_of_day(minutes: i32) -> String {
    let wrapped = minutes.rem_euclid(24 * 60);
    format!("{:02}:{:02}", wrapped / 60, wrapped % 60)
}

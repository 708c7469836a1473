use crate::application::bootstrap::bootstrap_workspace;
use crate::application::schedule::{self, ItemField};
use crate::application::streak;
use crate::domain::models::{
    validate_date, validate_hhmm, BackupData, BackupDocument, CalendarEntry, DayType,
    LongTermGoal, PomodoroSession, Quest, QuestPriority, ScheduleItem, SessionType, Template,
    TemplateCategory, UserProfile, BACKUP_VERSION, CUSTOM_CATEGORY_ID, CUSTOM_TEMPLATE_ID,
    GOAL_COMPLETION_XP, ITEM_COMPLETION_XP, POMODORO_COMPLETION_XP,
};
use crate::domain::timer::{PomodoroTimer, TickOutcome, TimerMode, WORK_SECONDS};
use crate::infrastructure::config::{
    read_generation_model, read_generation_timeout_seconds, read_timezone,
};
use crate::infrastructure::credential_store::{ApiKeyStore, KeychainApiKeyStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::schedule_generator::{
    GeminiScheduleGenerator, GenerationRequest, ScheduleGenerator,
};
use crate::infrastructure::store::JsonDocumentStore;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

const GENERATION_API_KEY_ENV_KEYS: &[&str] =
    &["DAYMASTER_GENERATION_API_KEY", "GEMINI_API_KEY"];

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub struct AppState {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    store: JsonDocumentStore,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");
        let store = JsonDocumentStore::new(bootstrap.state_dir);

        let runtime = RuntimeState {
            categories: store.load_categories()?,
            templates: store.load_templates()?,
            entries: store
                .load_entries()?
                .into_iter()
                .map(|entry| (entry.date.clone(), entry))
                .collect(),
            quests: store.load_quests()?,
            pomodoro_history: store.load_pomodoro_history()?,
            profile: store.load_profile()?,
            timer: PomodoroTimer::new(),
        };

        Ok(Self {
            config_dir,
            logs_dir,
            store,
            runtime: Mutex::new(runtime),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn timezone(&self) -> Tz {
        read_timezone(self.config_dir())
            .ok()
            .flatten()
            .and_then(|name| name.parse::<Tz>().ok())
            .unwrap_or(chrono_tz::UTC)
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone()).date_naive()
    }

    /// Fire-and-forget persistence: a failed write is logged and the
    /// in-memory state stays authoritative.
    fn persist(&self, runtime: &RuntimeState, documents: &[Document]) {
        for document in documents {
            let result = match document {
                Document::Categories => self.store.save_categories(&runtime.categories),
                Document::Templates => self.store.save_templates(&runtime.templates),
                Document::Entries => self.store.save_entries(&sorted_entries(&runtime.entries)),
                Document::Quests => self.store.save_quests(&runtime.quests),
                Document::PomodoroHistory => {
                    self.store.save_pomodoro_history(&runtime.pomodoro_history)
                }
                Document::Profile => self.store.save_profile(&runtime.profile),
            };
            if let Err(error) = result {
                self.log_error(
                    "persist",
                    &format!("failed to write {}: {error}", document.name()),
                );
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Document {
    Categories,
    Templates,
    Entries,
    Quests,
    PomodoroHistory,
    Profile,
}

impl Document {
    fn name(self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Templates => "templates",
            Self::Entries => "entries",
            Self::Quests => "quests",
            Self::PomodoroHistory => "pomodoro history",
            Self::Profile => "profile",
        }
    }
}

#[derive(Debug)]
struct RuntimeState {
    categories: Vec<TemplateCategory>,
    templates: Vec<Template>,
    entries: HashMap<String, CalendarEntry>,
    quests: Vec<Quest>,
    pomodoro_history: Vec<PomodoroSession>,
    profile: UserProfile,
    timer: PomodoroTimer,
}

impl RuntimeState {
    /// Narrow mutation surface for the XP account: everything funnels
    /// through a signed delta, never a direct assignment.
    fn apply_xp_delta(&mut self, delta: i64) -> i64 {
        self.profile.xp += delta;
        self.profile.xp
    }

    fn set_streak(&mut self, summary: streak::StreakSummary) {
        self.profile.current_streak = summary.current;
        self.profile.longest_streak = summary.longest;
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayScheduleResponse {
    pub date: String,
    pub template_id: Option<String>,
    pub template_name: Option<String>,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub items: Vec<ScheduleItem>,
    pub completed_count: usize,
    pub progress_percent: u32,
    pub planned_minutes: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToggleDayItemResponse {
    pub matched: bool,
    pub item_completed: Option<bool>,
    pub xp_delta: i64,
    pub xp: i64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToggleQuestResponse {
    pub matched: bool,
    pub completed: Option<bool>,
    pub xp_delta: i64,
    pub xp: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToggleGoalResponse {
    pub matched: bool,
    pub completed: Option<bool>,
    pub xp_delta: i64,
    pub xp: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PomodoroStateResponse {
    pub mode: String,
    pub remaining_seconds: u32,
    pub running: bool,
    pub linked_quest_id: Option<String>,
    pub today_work_sessions: u32,
    pub today_focus_minutes: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TickPomodoroResponse {
    pub completed_phase: Option<String>,
    pub xp_delta: i64,
    pub state: PomodoroStateResponse,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileResponse {
    pub profile: UserProfile,
    pub level: i64,
    pub next_level_xp: i64,
    pub progress_percent: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatsResponse {
    pub quests_done: usize,
    pub focus_hours: f64,
    pub category_counts: HashMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImportBackupResponse {
    pub applied: Vec<String>,
}

pub fn list_categories_impl(state: &AppState) -> Result<Vec<TemplateCategory>, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.categories.clone())
}

pub fn create_category_impl(
    state: &AppState,
    name: String,
    base_type: String,
    color: String,
) -> Result<TemplateCategory, InfraError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(InfraError::Validation(
            "category name must not be empty".to_string(),
        ));
    }
    let color = color.trim();
    if color.is_empty() {
        return Err(InfraError::Validation(
            "category color must not be empty".to_string(),
        ));
    }
    let base_type = parse_day_type(&base_type)?;

    let category = TemplateCategory {
        id: next_id("cat"),
        name: name.to_string(),
        base_type,
        color: color.to_string(),
    };
    category.validate().map_err(InfraError::Validation)?;

    {
        let mut runtime = lock_runtime(state)?;
        runtime.categories.push(category.clone());
        state.persist(&runtime, &[Document::Categories]);
    }

    state.log_info(
        "create_category",
        &format!("created category_id={}", category.id),
    );
    Ok(category)
}

pub fn delete_category_impl(state: &AppState, category_id: String) -> Result<bool, InfraError> {
    let category_id = category_id.trim();
    if category_id.is_empty() {
        return Err(InfraError::Validation(
            "category_id must not be empty".to_string(),
        ));
    }

    let mut runtime = lock_runtime(state)?;
    let before = runtime.categories.len();
    runtime
        .categories
        .retain(|category| category.id != category_id);
    let removed = runtime.categories.len() != before;
    if removed {
        state.persist(&runtime, &[Document::Categories]);
        drop(runtime);
        state.log_info(
            "delete_category",
            &format!("deleted category_id={category_id}"),
        );
    }
    Ok(removed)
}

pub fn list_templates_impl(state: &AppState) -> Result<Vec<Template>, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.templates.clone())
}

pub fn save_template_impl(
    state: &AppState,
    template_id: Option<String>,
    name: String,
    category_id: String,
    items: Vec<ScheduleItem>,
) -> Result<Template, InfraError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(InfraError::Validation(
            "template name is required".to_string(),
        ));
    }
    let category_id = category_id.trim();
    if category_id.is_empty() {
        return Err(InfraError::Validation("category is required".to_string()));
    }

    // Blueprints are stateless: stored items never carry completion.
    let items: Vec<ScheduleItem> = items
        .into_iter()
        .map(|mut item| {
            if item.id.trim().is_empty() {
                item.id = next_id("itm");
            }
            item.completed = false;
            item
        })
        .collect();

    let normalized_template_id = template_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    let template = Template {
        id: normalized_template_id
            .clone()
            .unwrap_or_else(|| next_id("tpl")),
        name: name.to_string(),
        category_id: category_id.to_string(),
        items,
    };
    template.validate().map_err(InfraError::Validation)?;

    let mut runtime = lock_runtime(state)?;
    if !runtime
        .categories
        .iter()
        .any(|category| category.id == category_id)
    {
        return Err(InfraError::Validation(format!(
            "category not found: {category_id}"
        )));
    }

    match normalized_template_id {
        Some(existing_id) => {
            let Some(slot) = runtime
                .templates
                .iter_mut()
                .find(|candidate| candidate.id == existing_id)
            else {
                return Err(InfraError::Validation(format!(
                    "template not found: {existing_id}"
                )));
            };
            *slot = template.clone();
        }
        None => runtime.templates.push(template.clone()),
    }

    state.persist(&runtime, &[Document::Templates]);
    drop(runtime);
    state.log_info(
        "save_template",
        &format!("saved template_id={}", template.id),
    );
    Ok(template)
}

pub fn delete_template_impl(state: &AppState, template_id: String) -> Result<bool, InfraError> {
    let template_id = template_id.trim();
    if template_id.is_empty() {
        return Err(InfraError::Validation(
            "template_id must not be empty".to_string(),
        ));
    }

    let mut runtime = lock_runtime(state)?;
    let before = runtime.templates.len();
    runtime
        .templates
        .retain(|template| template.id != template_id);
    let removed = runtime.templates.len() != before;
    if removed {
        state.persist(&runtime, &[Document::Templates]);
        drop(runtime);
        state.log_info(
            "delete_template",
            &format!("deleted template_id={template_id}"),
        );
    }
    Ok(removed)
}

pub fn list_entries_impl(state: &AppState) -> Result<Vec<CalendarEntry>, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(sorted_entries(&runtime.entries))
}

pub fn get_day_impl(state: &AppState, date: String) -> Result<DayScheduleResponse, InfraError> {
    let date = date.trim().to_string();
    let runtime = lock_runtime(state)?;
    let entry = runtime.entries.get(&date);
    let items = schedule::resolve_effective_items(entry, &runtime.templates);

    let template = entry.and_then(|entry| lookup_template(&runtime.templates, &entry.template_id));
    let category = template
        .as_ref()
        .and_then(|template| lookup_category(&runtime.categories, &template.category_id));

    let completed_count = items.iter().filter(|item| item.completed).count();
    let planned_minutes = items
        .iter()
        .filter_map(ScheduleItem::duration_minutes)
        .sum();
    Ok(DayScheduleResponse {
        date,
        template_id: template.as_ref().map(|template| template.id.clone()),
        template_name: template.map(|template| template.name),
        category_name: category.as_ref().map(|category| category.name.clone()),
        category_color: category.map(|category| category.color),
        progress_percent: progress_percent(completed_count, items.len()),
        planned_minutes,
        completed_count,
        items,
    })
}

pub fn assign_template_impl(
    state: &AppState,
    date: String,
    template_id: String,
) -> Result<CalendarEntry, InfraError> {
    let date = date.trim().to_string();
    validate_date(&date, "date").map_err(InfraError::Validation)?;
    let template_id = template_id.trim().to_string();
    if template_id.is_empty() {
        return Err(InfraError::Validation(
            "template_id must not be empty".to_string(),
        ));
    }

    let mut runtime = lock_runtime(state)?;
    if template_id != CUSTOM_TEMPLATE_ID
        && !runtime
            .templates
            .iter()
            .any(|template| template.id == template_id)
    {
        return Err(InfraError::Validation(format!(
            "template not found: {template_id}"
        )));
    }

    let entry = CalendarEntry {
        date: date.clone(),
        template_id,
        custom_items: None,
    };
    entry.validate().map_err(InfraError::Validation)?;
    runtime.entries.insert(date.clone(), entry.clone());
    refresh_streak(state, &mut runtime);
    state.persist(&runtime, &[Document::Entries, Document::Profile]);
    drop(runtime);
    state.log_info("assign_template", &format!("assigned date={date}"));
    Ok(entry)
}

pub fn init_custom_day_impl(state: &AppState, date: String) -> Result<CalendarEntry, InfraError> {
    let date = date.trim().to_string();
    validate_date(&date, "date").map_err(InfraError::Validation)?;

    let entry = CalendarEntry {
        date: date.clone(),
        template_id: CUSTOM_TEMPLATE_ID.to_string(),
        custom_items: Some(vec![ScheduleItem {
            id: next_id("itm"),
            start_time: "08:00".to_string(),
            end_time: "09:00".to_string(),
            activity: String::new(),
            completed: false,
        }]),
    };

    let mut runtime = lock_runtime(state)?;
    runtime.entries.insert(date.clone(), entry.clone());
    refresh_streak(state, &mut runtime);
    state.persist(&runtime, &[Document::Entries, Document::Profile]);
    drop(runtime);
    state.log_info("init_custom_day", &format!("initialized date={date}"));
    Ok(entry)
}

pub fn clear_entry_impl(state: &AppState, date: String) -> Result<bool, InfraError> {
    let date = date.trim().to_string();

    let mut runtime = lock_runtime(state)?;
    let removed = runtime.entries.remove(&date).is_some();
    if removed {
        refresh_streak(state, &mut runtime);
        state.persist(&runtime, &[Document::Entries, Document::Profile]);
        drop(runtime);
        state.log_info("clear_entry", &format!("cleared date={date}"));
    }
    Ok(removed)
}

pub fn toggle_day_item_impl(
    state: &AppState,
    date: String,
    item_id: String,
) -> Result<ToggleDayItemResponse, InfraError> {
    let date = date.trim().to_string();
    let item_id = item_id.trim().to_string();

    let mut runtime = lock_runtime(state)?;
    let toggled = with_entry_items(&mut runtime, &date, |items| {
        schedule::toggle_item(items, &item_id)
    })
    .flatten();

    // Unknown date or item id is a recoverable miss, not an error.
    let Some(item_completed) = toggled else {
        return Ok(ToggleDayItemResponse {
            matched: false,
            item_completed: None,
            xp_delta: 0,
            xp: runtime.profile.xp,
            current_streak: runtime.profile.current_streak,
            longest_streak: runtime.profile.longest_streak,
        });
    };

    let xp_delta = if item_completed {
        ITEM_COMPLETION_XP
    } else {
        -ITEM_COMPLETION_XP
    };
    let xp = runtime.apply_xp_delta(xp_delta);
    refresh_streak(state, &mut runtime);
    state.persist(&runtime, &[Document::Entries, Document::Profile]);

    let response = ToggleDayItemResponse {
        matched: true,
        item_completed: Some(item_completed),
        xp_delta,
        xp,
        current_streak: runtime.profile.current_streak,
        longest_streak: runtime.profile.longest_streak,
    };
    drop(runtime);
    state.log_info(
        "toggle_day_item",
        &format!("toggled date={date} item_id={item_id}"),
    );
    Ok(response)
}

pub fn update_day_item_impl(
    state: &AppState,
    date: String,
    item_id: String,
    field: String,
    value: String,
) -> Result<bool, InfraError> {
    let Some(field) = ItemField::parse(&field) else {
        return Err(InfraError::Validation(format!(
            "unsupported item field: {field}"
        )));
    };
    if matches!(field, ItemField::StartTime | ItemField::EndTime) {
        validate_hhmm(value.trim(), "value").map_err(InfraError::Validation)?;
    }
    let date = date.trim().to_string();
    let item_id = item_id.trim().to_string();
    let value = value.trim().to_string();

    let mut runtime = lock_runtime(state)?;
    let matched = with_entry_items(&mut runtime, &date, |items| {
        schedule::update_item_field(items, &item_id, field, &value)
    })
    .unwrap_or(false);

    if matched {
        refresh_streak(state, &mut runtime);
        state.persist(&runtime, &[Document::Entries, Document::Profile]);
        drop(runtime);
        state.log_info(
            "update_day_item",
            &format!("updated date={date} item_id={item_id}"),
        );
    }
    Ok(matched)
}

pub fn add_day_item_impl(
    state: &AppState,
    date: String,
) -> Result<Option<ScheduleItem>, InfraError> {
    let date = date.trim().to_string();
    let item_id = next_id("itm");

    let mut runtime = lock_runtime(state)?;
    let added = with_entry_items(&mut runtime, &date, |items| {
        schedule::push_new_item(items, item_id)
    });

    if added.is_some() {
        refresh_streak(state, &mut runtime);
        state.persist(&runtime, &[Document::Entries, Document::Profile]);
        drop(runtime);
        state.log_info("add_day_item", &format!("added item on date={date}"));
    }
    Ok(added)
}

pub fn delete_day_item_impl(
    state: &AppState,
    date: String,
    item_id: String,
) -> Result<bool, InfraError> {
    let date = date.trim().to_string();
    let item_id = item_id.trim().to_string();

    let mut runtime = lock_runtime(state)?;
    let removed = with_entry_items(&mut runtime, &date, |items| {
        schedule::delete_item(items, &item_id)
    })
    .unwrap_or(false);

    if removed {
        refresh_streak(state, &mut runtime);
        state.persist(&runtime, &[Document::Entries, Document::Profile]);
        drop(runtime);
        state.log_info(
            "delete_day_item",
            &format!("deleted date={date} item_id={item_id}"),
        );
    }
    Ok(removed)
}

pub fn reorder_day_items_impl(
    state: &AppState,
    date: String,
    from_index: usize,
    to_index: usize,
) -> Result<bool, InfraError> {
    let date = date.trim().to_string();

    let mut runtime = lock_runtime(state)?;
    let moved = with_entry_items(&mut runtime, &date, |items| {
        schedule::reorder_items(items, from_index, to_index)
    })
    .unwrap_or(false);

    if moved {
        state.persist(&runtime, &[Document::Entries]);
        drop(runtime);
        state.log_info(
            "reorder_day_items",
            &format!("moved item {from_index} -> {to_index} on date={date}"),
        );
    }
    Ok(moved)
}

pub fn list_quests_impl(state: &AppState) -> Result<Vec<Quest>, InfraError> {
    let runtime = lock_runtime(state)?;
    let mut quests = runtime.quests.clone();
    quests.sort_by(|left, right| left.deadline.cmp(&right.deadline));
    Ok(quests)
}

pub fn create_quest_impl(
    state: &AppState,
    title: String,
    priority: String,
    deadline: String,
) -> Result<Quest, InfraError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(InfraError::Validation(
            "quest title must not be empty".to_string(),
        ));
    }
    let priority = parse_quest_priority(&priority)?;
    let deadline = deadline.trim().to_string();
    validate_date(&deadline, "deadline").map_err(InfraError::Validation)?;

    let quest = Quest {
        id: next_id("qst"),
        title: title.to_uppercase(),
        deadline,
        priority,
        completed: false,
    };
    quest.validate().map_err(InfraError::Validation)?;

    {
        let mut runtime = lock_runtime(state)?;
        runtime.quests.push(quest.clone());
        state.persist(&runtime, &[Document::Quests]);
    }

    state.log_info("create_quest", &format!("created quest_id={}", quest.id));
    Ok(quest)
}

pub fn toggle_quest_impl(
    state: &AppState,
    quest_id: String,
) -> Result<ToggleQuestResponse, InfraError> {
    let quest_id = quest_id.trim().to_string();

    let mut runtime = lock_runtime(state)?;
    let toggled = runtime
        .quests
        .iter_mut()
        .find(|quest| quest.id == quest_id)
        .map(|quest| {
            quest.completed = !quest.completed;
            (quest.completed, quest.priority)
        });

    let Some((completed, priority)) = toggled else {
        return Ok(ToggleQuestResponse {
            matched: false,
            completed: None,
            xp_delta: 0,
            xp: runtime.profile.xp,
        });
    };

    let xp_delta = if completed {
        priority.xp_reward()
    } else {
        -priority.xp_reward()
    };
    let xp = runtime.apply_xp_delta(xp_delta);
    state.persist(&runtime, &[Document::Quests, Document::Profile]);
    drop(runtime);
    state.log_info("toggle_quest", &format!("toggled quest_id={quest_id}"));
    Ok(ToggleQuestResponse {
        matched: true,
        completed: Some(completed),
        xp_delta,
        xp,
    })
}

/// Deletion never claws back XP a completed quest already granted; the
/// un-toggle path is the only reversal.
pub fn delete_quest_impl(state: &AppState, quest_id: String) -> Result<bool, InfraError> {
    let quest_id = quest_id.trim().to_string();

    let mut runtime = lock_runtime(state)?;
    let before = runtime.quests.len();
    runtime.quests.retain(|quest| quest.id != quest_id);
    let removed = runtime.quests.len() != before;
    if removed {
        if runtime.timer.linked_quest_id() == Some(quest_id.as_str()) {
            runtime.timer.link_quest(None);
        }
        state.persist(&runtime, &[Document::Quests]);
        drop(runtime);
        state.log_info("delete_quest", &format!("deleted quest_id={quest_id}"));
    }
    Ok(removed)
}

pub fn get_pomodoro_state_impl(state: &AppState) -> Result<PomodoroStateResponse, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(to_pomodoro_state_response(state, &runtime))
}

pub fn toggle_pomodoro_impl(state: &AppState) -> Result<PomodoroStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let running = runtime.timer.toggle();
    let response = to_pomodoro_state_response(state, &runtime);
    drop(runtime);
    state.log_info(
        "toggle_pomodoro",
        if running { "timer started" } else { "timer paused" },
    );
    Ok(response)
}

/// One externally-scheduled second of timer progress. The UI owns the
/// clock; the state machine only reacts.
pub fn tick_pomodoro_impl(state: &AppState) -> Result<TickPomodoroResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let outcome = runtime.timer.tick();

    let (completed_phase, xp_delta) = match outcome {
        TickOutcome::WorkCompleted { quest_id } => {
            let session = PomodoroSession {
                id: next_id("pom"),
                timestamp: Utc::now(),
                duration_minutes: WORK_SECONDS / 60,
                session_type: SessionType::Work,
                quest_id,
            };
            runtime.pomodoro_history.push(session);
            runtime.apply_xp_delta(POMODORO_COMPLETION_XP);
            state.persist(&runtime, &[Document::PomodoroHistory, Document::Profile]);
            state.log_info("tick_pomodoro", "work interval completed");
            (Some("WORK".to_string()), POMODORO_COMPLETION_XP)
        }
        TickOutcome::BreakCompleted => {
            state.log_info("tick_pomodoro", "break interval completed");
            (Some("BREAK".to_string()), 0)
        }
        TickOutcome::Ticked | TickOutcome::Idle => (None, 0),
    };

    Ok(TickPomodoroResponse {
        completed_phase,
        xp_delta,
        state: to_pomodoro_state_response(state, &runtime),
    })
}

pub fn reset_pomodoro_impl(state: &AppState) -> Result<PomodoroStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.timer.reset();
    let response = to_pomodoro_state_response(state, &runtime);
    drop(runtime);
    state.log_info("reset_pomodoro", "timer reset");
    Ok(response)
}

pub fn switch_pomodoro_mode_impl(
    state: &AppState,
    mode: String,
) -> Result<PomodoroStateResponse, InfraError> {
    let target = parse_timer_mode(&mode)?;
    let mut runtime = lock_runtime(state)?;
    runtime.timer.switch_mode(target);
    let response = to_pomodoro_state_response(state, &runtime);
    drop(runtime);
    state.log_info(
        "switch_pomodoro_mode",
        &format!("switched to {}", target.as_str()),
    );
    Ok(response)
}

pub fn link_pomodoro_quest_impl(
    state: &AppState,
    quest_id: Option<String>,
) -> Result<PomodoroStateResponse, InfraError> {
    let normalized = quest_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    let mut runtime = lock_runtime(state)?;
    if let Some(quest_id) = normalized.as_deref() {
        if !runtime.quests.iter().any(|quest| quest.id == quest_id) {
            return Err(InfraError::Validation(format!(
                "quest not found: {quest_id}"
            )));
        }
    }
    runtime.timer.link_quest(normalized);
    Ok(to_pomodoro_state_response(state, &runtime))
}

pub fn get_profile_impl(state: &AppState) -> Result<ProfileResponse, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(to_profile_response(&runtime.profile))
}

pub fn update_profile_impl(
    state: &AppState,
    username: Option<String>,
    tagline: Option<String>,
) -> Result<UserProfile, InfraError> {
    let mut runtime = lock_runtime(state)?;

    if let Some(username) = username {
        let username = username.trim();
        if username.is_empty() {
            return Err(InfraError::Validation(
                "username must not be empty".to_string(),
            ));
        }
        runtime.profile.username = username.to_string();
    }
    if let Some(tagline) = tagline {
        runtime.profile.tagline = tagline.trim().to_string();
    }

    state.persist(&runtime, &[Document::Profile]);
    let updated = runtime.profile.clone();
    drop(runtime);
    state.log_info("update_profile", "updated profile info");
    Ok(updated)
}

pub fn add_goal_impl(state: &AppState, title: String) -> Result<LongTermGoal, InfraError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(InfraError::Validation(
            "goal title must not be empty".to_string(),
        ));
    }

    let goal = LongTermGoal {
        id: next_id("goal"),
        title: title.to_uppercase(),
        completed: false,
    };

    {
        let mut runtime = lock_runtime(state)?;
        runtime.profile.long_term_goals.push(goal.clone());
        state.persist(&runtime, &[Document::Profile]);
    }

    state.log_info("add_goal", &format!("added goal_id={}", goal.id));
    Ok(goal)
}

pub fn toggle_goal_impl(
    state: &AppState,
    goal_id: String,
) -> Result<ToggleGoalResponse, InfraError> {
    let goal_id = goal_id.trim().to_string();

    let mut runtime = lock_runtime(state)?;
    let toggled = runtime
        .profile
        .long_term_goals
        .iter_mut()
        .find(|goal| goal.id == goal_id)
        .map(|goal| {
            goal.completed = !goal.completed;
            goal.completed
        });

    let Some(completed) = toggled else {
        return Ok(ToggleGoalResponse {
            matched: false,
            completed: None,
            xp_delta: 0,
            xp: runtime.profile.xp,
        });
    };

    let xp_delta = if completed {
        GOAL_COMPLETION_XP
    } else {
        -GOAL_COMPLETION_XP
    };
    let xp = runtime.apply_xp_delta(xp_delta);
    state.persist(&runtime, &[Document::Profile]);
    drop(runtime);
    state.log_info("toggle_goal", &format!("toggled goal_id={goal_id}"));
    Ok(ToggleGoalResponse {
        matched: true,
        completed: Some(completed),
        xp_delta,
        xp,
    })
}

pub fn delete_goal_impl(state: &AppState, goal_id: String) -> Result<bool, InfraError> {
    let goal_id = goal_id.trim().to_string();

    let mut runtime = lock_runtime(state)?;
    let before = runtime.profile.long_term_goals.len();
    runtime
        .profile
        .long_term_goals
        .retain(|goal| goal.id != goal_id);
    let removed = runtime.profile.long_term_goals.len() != before;
    if removed {
        state.persist(&runtime, &[Document::Profile]);
        drop(runtime);
        state.log_info("delete_goal", &format!("deleted goal_id={goal_id}"));
    }
    Ok(removed)
}

pub fn get_stats_impl(state: &AppState) -> Result<StatsResponse, InfraError> {
    let runtime = lock_runtime(state)?;

    let quests_done = runtime
        .quests
        .iter()
        .filter(|quest| quest.completed)
        .count();

    let total_minutes: u64 = runtime
        .pomodoro_history
        .iter()
        .map(|session| session.duration_minutes as u64)
        .sum();
    let focus_hours = (total_minutes as f64 / 60.0 * 10.0).round() / 10.0;

    let mut category_counts: HashMap<String, u32> = HashMap::new();
    for entry in runtime.entries.values() {
        if entry.template_id == CUSTOM_TEMPLATE_ID {
            let name = TemplateCategory::custom_sentinel().name;
            *category_counts.entry(name).or_insert(0) += 1;
            continue;
        }
        let Some(template) = runtime
            .templates
            .iter()
            .find(|template| template.id == entry.template_id)
        else {
            continue;
        };
        let Some(category) = runtime
            .categories
            .iter()
            .find(|category| category.id == template.category_id)
        else {
            continue;
        };
        *category_counts.entry(category.name.clone()).or_insert(0) += 1;
    }

    Ok(StatsResponse {
        quests_done,
        focus_hours,
        category_counts,
    })
}

pub fn export_backup_impl(state: &AppState) -> Result<BackupData, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(BackupData {
        version: BACKUP_VERSION,
        categories: runtime.categories.clone(),
        templates: runtime.templates.clone(),
        entries: sorted_entries(&runtime.entries),
        quests: runtime.quests.clone(),
        pomodoro_history: runtime.pomodoro_history.clone(),
        profile: runtime.profile.clone(),
    })
}

/// Field-wise all-or-nothing restore: each collection present in the
/// document fully replaces its live counterpart, absent fields stay
/// untouched, and a document that fails to parse mutates nothing.
pub fn import_backup_impl(
    state: &AppState,
    raw: String,
) -> Result<ImportBackupResponse, InfraError> {
    let document: BackupDocument = serde_json::from_str(raw.trim())?;

    let mut runtime = lock_runtime(state)?;
    let mut applied = Vec::new();
    let mut documents = Vec::new();

    if let Some(categories) = document.categories {
        runtime.categories = categories;
        applied.push("categories".to_string());
        documents.push(Document::Categories);
    }
    if let Some(templates) = document.templates {
        runtime.templates = templates;
        applied.push("templates".to_string());
        documents.push(Document::Templates);
    }
    if let Some(entries) = document.entries {
        runtime.entries = entries
            .into_iter()
            .map(|entry| (entry.date.clone(), entry))
            .collect();
        applied.push("entries".to_string());
        documents.push(Document::Entries);
    }
    if let Some(quests) = document.quests {
        runtime.quests = quests;
        applied.push("quests".to_string());
        documents.push(Document::Quests);
    }
    if let Some(history) = document.pomodoro_history {
        runtime.pomodoro_history = history;
        applied.push("pomodoroHistory".to_string());
        documents.push(Document::PomodoroHistory);
    }
    if let Some(profile) = document.profile {
        runtime.profile = profile;
        applied.push("profile".to_string());
        documents.push(Document::Profile);
    }

    if applied.iter().any(|field| field == "entries" || field == "templates") {
        refresh_streak(state, &mut runtime);
        if !documents.contains(&Document::Profile) {
            documents.push(Document::Profile);
        }
    }

    state.persist(&runtime, &documents);
    drop(runtime);
    state.log_info(
        "import_backup",
        &format!("applied fields: {}", applied.join(", ")),
    );
    Ok(ImportBackupResponse { applied })
}

pub async fn generate_schedule_impl(
    state: &AppState,
    day_type: String,
    focus: Option<String>,
) -> Result<Vec<ScheduleItem>, InfraError> {
    let day_type = parse_day_type(&day_type)?;
    let model = read_generation_model(state.config_dir())?;
    let timeout_seconds = read_generation_timeout_seconds(state.config_dir())?;
    let api_key = resolve_generation_api_key_from_lookup(
        |key| std::env::var(key).ok(),
        &KeychainApiKeyStore::default(),
    )?;

    let generator = GeminiScheduleGenerator::new(model, timeout_seconds);
    let request = GenerationRequest { day_type, focus };
    let generated = generator.generate(&api_key, &request).await?;

    // Ids are assigned on receipt; nothing is committed to any entry or
    // template here, so a failed call cannot leave partial state.
    let items: Vec<ScheduleItem> = generated
        .into_iter()
        .map(|item| ScheduleItem {
            id: next_id("itm"),
            start_time: item.start_time,
            end_time: item.end_time,
            activity: item.activity,
            completed: false,
        })
        .collect();

    state.log_info(
        "generate_schedule",
        &format!("generated {} schedule items", items.len()),
    );
    Ok(items)
}

pub fn set_generation_api_key_impl(state: &AppState, api_key: String) -> Result<(), InfraError> {
    KeychainApiKeyStore::default().save_key(&api_key)?;
    state.log_info("set_generation_api_key", "stored generation api key");
    Ok(())
}

pub fn clear_generation_api_key_impl(state: &AppState) -> Result<(), InfraError> {
    KeychainApiKeyStore::default().delete_key()?;
    state.log_info("clear_generation_api_key", "cleared generation api key");
    Ok(())
}

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("runtime lock poisoned: {error}")))
}

fn with_entry_items<T>(
    runtime: &mut RuntimeState,
    date: &str,
    apply: impl FnOnce(&mut Vec<ScheduleItem>) -> T,
) -> Option<T> {
    let RuntimeState {
        entries, templates, ..
    } = runtime;
    let entry = entries.get_mut(date)?;
    let items = schedule::materialize_items(entry, templates);
    Some(apply(items))
}

fn refresh_streak(state: &AppState, runtime: &mut RuntimeState) {
    let summary = streak::recompute(
        &runtime.entries,
        &runtime.templates,
        state.today(),
        runtime.profile.longest_streak,
    );
    runtime.set_streak(summary);
}

fn sorted_entries(entries: &HashMap<String, CalendarEntry>) -> Vec<CalendarEntry> {
    let mut entries: Vec<CalendarEntry> = entries.values().cloned().collect();
    entries.sort_by(|left, right| left.date.cmp(&right.date));
    entries
}

fn lookup_template(templates: &[Template], template_id: &str) -> Option<Template> {
    if template_id == CUSTOM_TEMPLATE_ID {
        return Some(Template::custom_sentinel());
    }
    templates
        .iter()
        .find(|template| template.id == template_id)
        .cloned()
}

fn lookup_category(categories: &[TemplateCategory], category_id: &str) -> Option<TemplateCategory> {
    if category_id == CUSTOM_CATEGORY_ID {
        return Some(TemplateCategory::custom_sentinel());
    }
    categories
        .iter()
        .find(|category| category.id == category_id)
        .cloned()
}

fn progress_percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u32
}

fn to_pomodoro_state_response(state: &AppState, runtime: &RuntimeState) -> PomodoroStateResponse {
    let timezone = state.timezone();
    let today = Utc::now().with_timezone(&timezone).date_naive();
    let (today_work_sessions, today_focus_minutes) = runtime
        .pomodoro_history
        .iter()
        .filter(|session| session.session_type == SessionType::Work)
        .filter(|session| session.timestamp.with_timezone(&timezone).date_naive() == today)
        .fold((0, 0), |(count, minutes), session| {
            (count + 1, minutes + session.duration_minutes)
        });

    PomodoroStateResponse {
        mode: runtime.timer.mode().as_str().to_string(),
        remaining_seconds: runtime.timer.remaining_seconds(),
        running: runtime.timer.is_running(),
        linked_quest_id: runtime.timer.linked_quest_id().map(ToOwned::to_owned),
        today_work_sessions,
        today_focus_minutes,
    }
}

fn to_profile_response(profile: &UserProfile) -> ProfileResponse {
    ProfileResponse {
        profile: profile.clone(),
        level: profile.level(),
        next_level_xp: profile.next_level_xp(),
        progress_percent: profile.progress_percent(),
    }
}

fn parse_day_type(value: &str) -> Result<DayType, InfraError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "work" => Ok(DayType::Work),
        "off" => Ok(DayType::Off),
        other => Err(InfraError::InvalidConfig(format!(
            "unsupported day type: {}",
            other
        ))),
    }
}

fn parse_quest_priority(value: &str) -> Result<QuestPriority, InfraError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" => Ok(QuestPriority::Low),
        "high" => Ok(QuestPriority::High),
        "critical" => Ok(QuestPriority::Critical),
        other => Err(InfraError::InvalidConfig(format!(
            "unsupported quest priority: {}",
            other
        ))),
    }
}

fn parse_timer_mode(value: &str) -> Result<TimerMode, InfraError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "work" => Ok(TimerMode::Work),
        "break" => Ok(TimerMode::Break),
        other => Err(InfraError::InvalidConfig(format!(
            "unsupported timer mode: {}",
            other
        ))),
    }
}

fn resolve_generation_api_key_from_lookup<F>(
    lookup: F,
    store: &dyn ApiKeyStore,
) -> Result<String, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    for key in GENERATION_API_KEY_ENV_KEYS {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Ok(normalized.to_string());
            }
        }
    }
    if let Some(stored) = store.load_key()? {
        let normalized = stored.trim();
        if !normalized.is_empty() {
            return Ok(normalized.to_string());
        }
    }
    Err(InfraError::Credential(format!(
        "missing generation api key (set one of: {}, or store one with set_generation_api_key)",
        GENERATION_API_KEY_ENV_KEYS.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timer::BREAK_SECONDS;
    use crate::infrastructure::credential_store::InMemoryApiKeyStore;
    use std::fs;
    use std::sync::atomic::AtomicUsize;

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "daymaster-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self) -> AppState {
            AppState::new(self.path.clone()).expect("initialize app state")
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn today_string() -> String {
        Utc::now().date_naive().format("%Y-%m-%d").to_string()
    }

    fn current_xp(state: &AppState) -> i64 {
        get_profile_impl(state).expect("get profile").profile.xp
    }

    fn three_item_template(state: &AppState) -> Template {
        let items = ["07:00", "09:00", "11:00"]
            .iter()
            .enumerate()
            .map(|(index, start)| ScheduleItem {
                id: String::new(),
                start_time: (*start).to_string(),
                end_time: format!("{:02}:00", index * 2 + 8),
                activity: format!("Slot {index}"),
                completed: false,
            })
            .collect();
        save_template_impl(
            state,
            None,
            "STANDARD".to_string(),
            "cat_work".to_string(),
            items,
        )
        .expect("save template")
    }

    #[test]
    fn create_quest_rejects_empty_title() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = create_quest_impl(
            &state,
            "   ".to_string(),
            "high".to_string(),
            "2024-05-01".to_string(),
        );
        assert!(matches!(result, Err(InfraError::Validation(_))));
        assert!(list_quests_impl(&state).expect("list quests").is_empty());
    }

    #[test]
    fn quest_titles_are_uppercased_and_listed_by_deadline() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        create_quest_impl(
            &state,
            "later task".to_string(),
            "low".to_string(),
            "2024-06-01".to_string(),
        )
        .expect("create quest");
        create_quest_impl(
            &state,
            "sooner task".to_string(),
            "high".to_string(),
            "2024-05-01".to_string(),
        )
        .expect("create quest");

        let quests = list_quests_impl(&state).expect("list quests");
        assert_eq!(quests.len(), 2);
        assert_eq!(quests[0].title, "SOONER TASK");
        assert_eq!(quests[0].deadline, "2024-05-01");
        assert_eq!(quests[1].title, "LATER TASK");
    }

    #[test]
    fn quest_toggle_grants_and_reverses_priority_xp() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let quest = create_quest_impl(
            &state,
            "Breach the mainframe".to_string(),
            "critical".to_string(),
            "2024-05-01".to_string(),
        )
        .expect("create quest");

        let completed = toggle_quest_impl(&state, quest.id.clone()).expect("toggle quest");
        assert!(completed.matched);
        assert_eq!(completed.xp_delta, 100);
        assert_eq!(completed.xp, 100);

        let reverted = toggle_quest_impl(&state, quest.id).expect("toggle quest");
        assert_eq!(reverted.xp_delta, -100);
        assert_eq!(reverted.xp, 0);
    }

    #[test]
    fn toggle_unknown_quest_is_a_silent_no_op() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let response = toggle_quest_impl(&state, "missing".to_string()).expect("toggle quest");
        assert!(!response.matched);
        assert_eq!(response.xp_delta, 0);
        assert_eq!(response.xp, 0);
    }

    #[test]
    fn deleting_a_completed_quest_keeps_granted_xp() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let quest = create_quest_impl(
            &state,
            "Ship it".to_string(),
            "low".to_string(),
            "2024-05-01".to_string(),
        )
        .expect("create quest");

        toggle_quest_impl(&state, quest.id.clone()).expect("toggle quest");
        assert!(delete_quest_impl(&state, quest.id).expect("delete quest"));
        assert_eq!(current_xp(&state), 25);
        assert!(list_quests_impl(&state).expect("list quests").is_empty());
    }

    #[test]
    fn assign_template_and_resolve_day_flow() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let template = three_item_template(&state);

        assign_template_impl(&state, "2024-05-01".to_string(), template.id.clone())
            .expect("assign template");

        let day = get_day_impl(&state, "2024-05-01".to_string()).expect("get day");
        assert_eq!(day.items.len(), 3);
        assert_eq!(day.completed_count, 0);
        assert_eq!(day.progress_percent, 0);
        assert_eq!(day.template_name.as_deref(), Some("STANDARD"));
        assert_eq!(day.category_name.as_deref(), Some("WORK"));
        assert_eq!(day.planned_minutes, 180);
        assert!(day.items.iter().all(|item| !item.completed));
    }

    #[test]
    fn resolve_day_without_entry_is_empty() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let day = get_day_impl(&state, "2030-01-01".to_string()).expect("get day");
        assert!(day.items.is_empty());
        assert_eq!(day.progress_percent, 0);
        assert!(day.template_id.is_none());
    }

    #[test]
    fn deleted_template_resolves_to_an_empty_day() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let template = three_item_template(&state);
        assign_template_impl(&state, "2024-05-01".to_string(), template.id.clone())
            .expect("assign template");

        assert!(delete_template_impl(&state, template.id).expect("delete template"));
        let day = get_day_impl(&state, "2024-05-01".to_string()).expect("get day");
        assert!(day.items.is_empty());
    }

    #[test]
    fn assign_template_rejects_unknown_template() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result =
            assign_template_impl(&state, "2024-05-01".to_string(), "tpl-missing".to_string());
        assert!(matches!(result, Err(InfraError::Validation(_))));
    }

    #[test]
    fn toggle_day_item_materializes_the_entry_and_moves_xp() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let template = three_item_template(&state);
        assign_template_impl(&state, "2024-05-01".to_string(), template.id.clone())
            .expect("assign template");

        let item_id = get_day_impl(&state, "2024-05-01".to_string()).expect("get day").items[0]
            .id
            .clone();
        let toggled = toggle_day_item_impl(&state, "2024-05-01".to_string(), item_id.clone())
            .expect("toggle item");
        assert!(toggled.matched);
        assert_eq!(toggled.item_completed, Some(true));
        assert_eq!(toggled.xp_delta, 15);
        assert_eq!(toggled.xp, 15);

        // First mutation copies the blueprint onto the entry.
        let entries = list_entries_impl(&state).expect("list entries");
        assert!(entries[0].is_materialized());
        let templates = list_templates_impl(&state).expect("list templates");
        let stored = templates
            .iter()
            .find(|candidate| candidate.id == template.id)
            .expect("template still stored");
        assert!(stored.items.iter().all(|item| !item.completed));

        let reverted = toggle_day_item_impl(&state, "2024-05-01".to_string(), item_id)
            .expect("toggle item");
        assert_eq!(reverted.xp_delta, -15);
        assert_eq!(reverted.xp, 0);
    }

    #[test]
    fn toggle_misses_report_no_match_and_zero_delta() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let response = toggle_day_item_impl(&state, "2024-05-01".to_string(), "itm-1".to_string())
            .expect("toggle item");
        assert!(!response.matched);
        assert_eq!(response.xp_delta, 0);

        init_custom_day_impl(&state, "2024-05-01".to_string()).expect("init day");
        let response =
            toggle_day_item_impl(&state, "2024-05-01".to_string(), "unknown".to_string())
                .expect("toggle item");
        assert!(!response.matched);
        assert_eq!(current_xp(&state), 0);
    }

    #[test]
    fn completing_every_item_makes_today_a_perfect_day() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let template = three_item_template(&state);
        let today = today_string();
        assign_template_impl(&state, today.clone(), template.id).expect("assign template");

        let items = get_day_impl(&state, today.clone()).expect("get day").items;
        let mut last = None;
        for item in &items {
            last = Some(
                toggle_day_item_impl(&state, today.clone(), item.id.clone())
                    .expect("toggle item"),
            );
        }

        let day = get_day_impl(&state, today).expect("get day");
        assert_eq!(day.progress_percent, 100);
        assert_eq!(day.completed_count, 3);

        let final_toggle = last.expect("toggled at least one item");
        assert!(final_toggle.current_streak >= 1);
        assert!(final_toggle.longest_streak >= final_toggle.current_streak);
        assert_eq!(current_xp(&state), 45);
    }

    #[test]
    fn init_custom_day_creates_a_single_default_slot() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let entry = init_custom_day_impl(&state, "2024-05-02".to_string()).expect("init day");
        assert_eq!(entry.template_id, CUSTOM_TEMPLATE_ID);
        let items = entry.custom_items.expect("materialized items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].start_time, "08:00");
        assert_eq!(items[0].end_time, "09:00");
        assert!(!items[0].completed);

        let day = get_day_impl(&state, "2024-05-02".to_string()).expect("get day");
        assert_eq!(day.template_name.as_deref(), Some("CUSTOM PLAN"));
        assert_eq!(day.category_name.as_deref(), Some("CUSTOM"));
    }

    #[test]
    fn day_item_editing_flow() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        init_custom_day_impl(&state, "2024-05-01".to_string()).expect("init day");

        let added = add_day_item_impl(&state, "2024-05-01".to_string())
            .expect("add item")
            .expect("entry exists");
        assert_eq!(added.start_time, "09:00");
        assert_eq!(added.end_time, "10:00");

        assert!(update_day_item_impl(
            &state,
            "2024-05-01".to_string(),
            added.id.clone(),
            "activity".to_string(),
            "Gym".to_string(),
        )
        .expect("update item"));
        assert!(update_day_item_impl(
            &state,
            "2024-05-01".to_string(),
            added.id.clone(),
            "endTime".to_string(),
            "10:30".to_string(),
        )
        .expect("update item"));

        assert!(reorder_day_items_impl(&state, "2024-05-01".to_string(), 1, 0)
            .expect("reorder items"));
        let day = get_day_impl(&state, "2024-05-01".to_string()).expect("get day");
        assert_eq!(day.items[0].id, added.id);
        assert_eq!(day.items[0].activity, "Gym");
        assert_eq!(day.items[0].end_time, "10:30");

        assert!(
            delete_day_item_impl(&state, "2024-05-01".to_string(), added.id)
                .expect("delete item")
        );
        let day = get_day_impl(&state, "2024-05-01".to_string()).expect("get day");
        assert_eq!(day.items.len(), 1);
    }

    #[test]
    fn update_day_item_validates_field_and_time() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        init_custom_day_impl(&state, "2024-05-01".to_string()).expect("init day");
        let item_id = get_day_impl(&state, "2024-05-01".to_string()).expect("get day").items[0]
            .id
            .clone();

        let result = update_day_item_impl(
            &state,
            "2024-05-01".to_string(),
            item_id.clone(),
            "completed".to_string(),
            "true".to_string(),
        );
        assert!(matches!(result, Err(InfraError::Validation(_))));

        let result = update_day_item_impl(
            &state,
            "2024-05-01".to_string(),
            item_id,
            "startTime".to_string(),
            "25:99".to_string(),
        );
        assert!(matches!(result, Err(InfraError::Validation(_))));

        // Misses on date are recoverable, not errors.
        assert!(!update_day_item_impl(
            &state,
            "2030-01-01".to_string(),
            "x".to_string(),
            "activity".to_string(),
            "y".to_string(),
        )
        .expect("update item"));
    }

    #[test]
    fn add_day_item_without_entry_is_a_no_op() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert!(add_day_item_impl(&state, "2030-01-01".to_string())
            .expect("add item")
            .is_none());
    }

    #[test]
    fn save_template_requires_name_and_existing_category() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let result = save_template_impl(
            &state,
            None,
            "  ".to_string(),
            "cat_work".to_string(),
            Vec::new(),
        );
        assert!(matches!(result, Err(InfraError::Validation(_))));

        let result = save_template_impl(
            &state,
            None,
            "PLAN".to_string(),
            "cat-missing".to_string(),
            Vec::new(),
        );
        assert!(matches!(result, Err(InfraError::Validation(_))));
    }

    #[test]
    fn save_template_assigns_item_ids_and_strips_completion() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let template = save_template_impl(
            &state,
            None,
            "PLAN".to_string(),
            "cat_work".to_string(),
            vec![ScheduleItem {
                id: "".to_string(),
                start_time: "08:00".to_string(),
                end_time: "09:00".to_string(),
                activity: "Morning".to_string(),
                completed: true,
            }],
        )
        .expect("save template");

        assert!(!template.items[0].id.is_empty());
        assert!(!template.items[0].completed);

        let updated = save_template_impl(
            &state,
            Some(template.id.clone()),
            "PLAN V2".to_string(),
            "cat_work".to_string(),
            template.items.clone(),
        )
        .expect("update template");
        assert_eq!(updated.id, template.id);
        assert_eq!(updated.name, "PLAN V2");
        assert_eq!(
            list_templates_impl(&state).expect("list templates").len(),
            3
        );
    }

    #[test]
    fn category_create_and_delete_flow() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let category = create_category_impl(
            &state,
            "STUDY".to_string(),
            "WORK".to_string(),
            "cyber-green".to_string(),
        )
        .expect("create category");
        assert_eq!(category.base_type, DayType::Work);
        assert_eq!(
            list_categories_impl(&state).expect("list categories").len(),
            4
        );

        assert!(delete_category_impl(&state, category.id).expect("delete category"));
        assert!(!delete_category_impl(&state, "cat-missing".to_string())
            .expect("delete category"));
    }

    #[test]
    fn pomodoro_work_cycle_records_session_and_xp() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let quest = create_quest_impl(
            &state,
            "Focus target".to_string(),
            "high".to_string(),
            "2024-05-01".to_string(),
        )
        .expect("create quest");
        link_pomodoro_quest_impl(&state, Some(quest.id.clone())).expect("link quest");

        let started = toggle_pomodoro_impl(&state).expect("start timer");
        assert!(started.running);
        assert_eq!(started.mode, "WORK");
        assert_eq!(started.remaining_seconds, WORK_SECONDS);

        let mut completions = 0;
        let mut final_tick = None;
        for _ in 0..WORK_SECONDS {
            let tick = tick_pomodoro_impl(&state).expect("tick timer");
            if tick.completed_phase.is_some() {
                completions += 1;
                final_tick = Some(tick);
            }
        }

        let tick = final_tick.expect("work interval completed");
        assert_eq!(completions, 1);
        assert_eq!(tick.completed_phase.as_deref(), Some("WORK"));
        assert_eq!(tick.xp_delta, 25);
        assert_eq!(tick.state.mode, "BREAK");
        assert_eq!(tick.state.remaining_seconds, BREAK_SECONDS);
        assert!(!tick.state.running);
        assert_eq!(tick.state.today_work_sessions, 1);
        assert_eq!(tick.state.today_focus_minutes, 25);

        assert_eq!(current_xp(&state), 25);

        let backup = export_backup_impl(&state).expect("export backup");
        assert_eq!(backup.pomodoro_history.len(), 1);
        let session = &backup.pomodoro_history[0];
        assert_eq!(session.duration_minutes, 25);
        assert_eq!(session.session_type, SessionType::Work);
        assert_eq!(session.quest_id.as_deref(), Some(quest.id.as_str()));
    }

    #[test]
    fn pomodoro_tick_while_paused_does_nothing() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let tick = tick_pomodoro_impl(&state).expect("tick timer");
        assert!(tick.completed_phase.is_none());
        assert_eq!(tick.state.remaining_seconds, WORK_SECONDS);
    }

    #[test]
    fn pomodoro_reset_and_mode_switch() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        toggle_pomodoro_impl(&state).expect("start timer");
        for _ in 0..120 {
            tick_pomodoro_impl(&state).expect("tick timer");
        }
        let reset = reset_pomodoro_impl(&state).expect("reset timer");
        assert!(!reset.running);
        assert_eq!(reset.remaining_seconds, WORK_SECONDS);

        let switched =
            switch_pomodoro_mode_impl(&state, "BREAK".to_string()).expect("switch mode");
        assert_eq!(switched.mode, "BREAK");
        assert_eq!(switched.remaining_seconds, BREAK_SECONDS);
        assert!(!switched.running);
    }

    #[test]
    fn link_pomodoro_quest_requires_an_existing_quest() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = link_pomodoro_quest_impl(&state, Some("missing".to_string()));
        assert!(matches!(result, Err(InfraError::Validation(_))));
        assert!(link_pomodoro_quest_impl(&state, None)
            .expect("unlink quest")
            .linked_quest_id
            .is_none());
    }

    #[test]
    fn deleting_a_linked_quest_unlinks_the_timer() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let quest = create_quest_impl(
            &state,
            "Focus".to_string(),
            "low".to_string(),
            "2024-05-01".to_string(),
        )
        .expect("create quest");
        link_pomodoro_quest_impl(&state, Some(quest.id.clone())).expect("link quest");

        delete_quest_impl(&state, quest.id).expect("delete quest");
        let snapshot = get_pomodoro_state_impl(&state).expect("get timer state");
        assert!(snapshot.linked_quest_id.is_none());
    }

    #[test]
    fn goal_toggle_applies_fixed_xp_both_ways() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        assert!(matches!(
            add_goal_impl(&state, " ".to_string()),
            Err(InfraError::Validation(_))
        ));

        let goal = add_goal_impl(&state, "learn rust".to_string()).expect("add goal");
        assert_eq!(goal.title, "LEARN RUST");

        let completed = toggle_goal_impl(&state, goal.id.clone()).expect("toggle goal");
        assert_eq!(completed.xp_delta, 500);
        let reverted = toggle_goal_impl(&state, goal.id.clone()).expect("toggle goal");
        assert_eq!(reverted.xp_delta, -500);
        assert_eq!(reverted.xp, 0);

        toggle_goal_impl(&state, goal.id.clone()).expect("toggle goal");
        assert!(delete_goal_impl(&state, goal.id).expect("delete goal"));
        assert_eq!(current_xp(&state), 500);
    }

    #[test]
    fn profile_update_and_level_projection() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let updated = update_profile_impl(
            &state,
            Some("nightrunner".to_string()),
            Some(" city planner ".to_string()),
        )
        .expect("update profile");
        assert_eq!(updated.username, "nightrunner");
        assert_eq!(updated.tagline, "city planner");

        assert!(matches!(
            update_profile_impl(&state, Some("  ".to_string()), None),
            Err(InfraError::Validation(_))
        ));

        let profile = get_profile_impl(&state).expect("get profile");
        assert_eq!(profile.level, 1);
        assert_eq!(profile.next_level_xp, 1000);
        assert_eq!(profile.progress_percent, 0.0);
    }

    #[test]
    fn stats_combine_quests_focus_time_and_category_tallies() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let quest = create_quest_impl(
            &state,
            "Done deal".to_string(),
            "high".to_string(),
            "2024-05-01".to_string(),
        )
        .expect("create quest");
        toggle_quest_impl(&state, quest.id).expect("toggle quest");

        assign_template_impl(&state, "2024-05-01".to_string(), "tpl_1".to_string())
            .expect("assign template");
        assign_template_impl(&state, "2024-05-02".to_string(), "tpl_1".to_string())
            .expect("assign template");
        init_custom_day_impl(&state, "2024-05-03".to_string()).expect("init custom day");

        let history = serde_json::json!({
            "version": 3,
            "pomodoroHistory": [
                {"id": "pom-1", "timestamp": 1714555500000i64, "durationMinutes": 25, "type": "WORK"},
                {"id": "pom-2", "timestamp": 1714556500000i64, "durationMinutes": 20, "type": "WORK"}
            ]
        });
        import_backup_impl(&state, history.to_string()).expect("import history");

        let stats = get_stats_impl(&state).expect("get stats");
        assert_eq!(stats.quests_done, 1);
        assert_eq!(stats.focus_hours, 0.8);
        assert_eq!(stats.category_counts.get("WORK"), Some(&2));
        assert_eq!(stats.category_counts.get("CUSTOM"), Some(&1));
    }

    #[test]
    fn import_with_only_quests_leaves_other_collections_untouched() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assign_template_impl(&state, "2024-05-01".to_string(), "tpl_1".to_string())
            .expect("assign template");
        let categories_before = list_categories_impl(&state).expect("list categories");
        let templates_before = list_templates_impl(&state).expect("list templates");
        let profile_before = get_profile_impl(&state).expect("get profile").profile;

        let payload = serde_json::json!({
            "version": 3,
            "quests": [
                {"id": "qst-1", "title": "RESTORED", "deadline": "2024-05-05",
                 "priority": "HIGH", "completed": false}
            ]
        });
        let response = import_backup_impl(&state, payload.to_string()).expect("import backup");
        assert_eq!(response.applied, vec!["quests".to_string()]);

        assert_eq!(
            list_categories_impl(&state).expect("list categories"),
            categories_before
        );
        assert_eq!(
            list_templates_impl(&state).expect("list templates"),
            templates_before
        );
        assert_eq!(
            list_entries_impl(&state).expect("list entries").len(),
            1
        );
        assert_eq!(
            get_profile_impl(&state).expect("get profile").profile.xp,
            profile_before.xp
        );
        let quests = list_quests_impl(&state).expect("list quests");
        assert_eq!(quests.len(), 1);
        assert_eq!(quests[0].title, "RESTORED");
    }

    #[test]
    fn malformed_import_mutates_nothing() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        create_quest_impl(
            &state,
            "Keep me".to_string(),
            "low".to_string(),
            "2024-05-01".to_string(),
        )
        .expect("create quest");

        let result = import_backup_impl(&state, "{not valid json".to_string());
        assert!(matches!(result, Err(InfraError::Json(_))));

        let quests = list_quests_impl(&state).expect("list quests");
        assert_eq!(quests.len(), 1);
        assert_eq!(quests[0].title, "KEEP ME");
    }

    #[test]
    fn export_import_roundtrip_restores_identical_state() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let template = three_item_template(&state);
        assign_template_impl(&state, "2024-05-01".to_string(), template.id)
            .expect("assign template");
        let quest = create_quest_impl(
            &state,
            "Export me".to_string(),
            "critical".to_string(),
            "2024-05-02".to_string(),
        )
        .expect("create quest");
        toggle_quest_impl(&state, quest.id).expect("toggle quest");

        let exported = export_backup_impl(&state).expect("export backup");
        assert_eq!(exported.version, BACKUP_VERSION);
        let raw = serde_json::to_string(&exported).expect("serialize backup");

        let other_workspace = TempWorkspace::new();
        let other_state = other_workspace.app_state();
        let response = import_backup_impl(&other_state, raw).expect("import backup");
        assert_eq!(response.applied.len(), 6);

        let reimported = export_backup_impl(&other_state).expect("export backup");
        assert_eq!(reimported, exported);
    }

    #[test]
    fn state_documents_survive_a_restart() {
        let workspace = TempWorkspace::new();
        {
            let state = workspace.app_state();
            create_quest_impl(
                &state,
                "Persist me".to_string(),
                "high".to_string(),
                "2024-05-01".to_string(),
            )
            .expect("create quest");
            assign_template_impl(&state, "2024-05-01".to_string(), "tpl_2".to_string())
                .expect("assign template");
        }

        let reopened = workspace.app_state();
        let quests = list_quests_impl(&reopened).expect("list quests");
        assert_eq!(quests.len(), 1);
        assert_eq!(quests[0].title, "PERSIST ME");
        let entries = list_entries_impl(&reopened).expect("list entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].template_id, "tpl_2");
    }

    #[test]
    fn generation_api_key_resolution_prefers_env_lookup() {
        let store = InMemoryApiKeyStore::default();
        store.save_key("stored-key").expect("save key");

        let resolved = resolve_generation_api_key_from_lookup(
            |key| match key {
                "DAYMASTER_GENERATION_API_KEY" => Some("env-key".to_string()),
                _ => None,
            },
            &store,
        )
        .expect("resolve key");
        assert_eq!(resolved, "env-key");

        let resolved =
            resolve_generation_api_key_from_lookup(|_| None, &store).expect("resolve key");
        assert_eq!(resolved, "stored-key");

        let empty_store = InMemoryApiKeyStore::default();
        let result = resolve_generation_api_key_from_lookup(|_| None, &empty_store);
        assert!(matches!(result, Err(InfraError::Credential(_))));
    }
}

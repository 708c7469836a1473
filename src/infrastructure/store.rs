use crate::domain::models::{
    CalendarEntry, DayType, PomodoroSession, Quest, ScheduleItem, Template, TemplateCategory,
    UserProfile,
};
use crate::infrastructure::error::InfraError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

const CATEGORIES_JSON: &str = "categories.json";
const TEMPLATES_JSON: &str = "templates.json";
const ENTRIES_JSON: &str = "entries.json";
const QUESTS_JSON: &str = "quests.json";
const POMODORO_HISTORY_JSON: &str = "pomodoro_history.json";
const PROFILE_JSON: &str = "profile.json";

/// One JSON document per logical collection under the workspace `state/`
/// directory. A missing document falls back to the built-in seed data;
/// documents share their entity encoding with the version-3 backup
/// format.
#[derive(Debug, Clone)]
pub struct JsonDocumentStore {
    state_dir: PathBuf,
}

impl JsonDocumentStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    fn load_document<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, InfraError> {
        let path = self.state_dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save_document<T: Serialize>(&self, name: &str, value: &T) -> Result<(), InfraError> {
        fs::create_dir_all(&self.state_dir)?;
        let formatted = serde_json::to_string_pretty(value)?;
        fs::write(self.state_dir.join(name), format!("{formatted}\n"))?;
        Ok(())
    }

    pub fn load_categories(&self) -> Result<Vec<TemplateCategory>, InfraError> {
        Ok(self
            .load_document(CATEGORIES_JSON)?
            .unwrap_or_else(seed_categories))
    }

    pub fn save_categories(&self, categories: &[TemplateCategory]) -> Result<(), InfraError> {
        self.save_document(CATEGORIES_JSON, &categories)
    }

    pub fn load_templates(&self) -> Result<Vec<Template>, InfraError> {
        Ok(self
            .load_document(TEMPLATES_JSON)?
            .unwrap_or_else(seed_templates))
    }

    pub fn save_templates(&self, templates: &[Template]) -> Result<(), InfraError> {
        self.save_document(TEMPLATES_JSON, &templates)
    }

    pub fn load_entries(&self) -> Result<Vec<CalendarEntry>, InfraError> {
        Ok(self.load_document(ENTRIES_JSON)?.unwrap_or_default())
    }

    pub fn save_entries(&self, entries: &[CalendarEntry]) -> Result<(), InfraError> {
        self.save_document(ENTRIES_JSON, &entries)
    }

    pub fn load_quests(&self) -> Result<Vec<Quest>, InfraError> {
        Ok(self.load_document(QUESTS_JSON)?.unwrap_or_default())
    }

    pub fn save_quests(&self, quests: &[Quest]) -> Result<(), InfraError> {
        self.save_document(QUESTS_JSON, &quests)
    }

    pub fn load_pomodoro_history(&self) -> Result<Vec<PomodoroSession>, InfraError> {
        Ok(self
            .load_document(POMODORO_HISTORY_JSON)?
            .unwrap_or_default())
    }

    pub fn save_pomodoro_history(&self, history: &[PomodoroSession]) -> Result<(), InfraError> {
        self.save_document(POMODORO_HISTORY_JSON, &history)
    }

    pub fn load_profile(&self) -> Result<UserProfile, InfraError> {
        Ok(self.load_document(PROFILE_JSON)?.unwrap_or_default())
    }

    pub fn save_profile(&self, profile: &UserProfile) -> Result<(), InfraError> {
        self.save_document(PROFILE_JSON, profile)
    }
}

fn seed_item(id: &str, start: &str, end: &str, activity: &str) -> ScheduleItem {
    ScheduleItem {
        id: id.to_string(),
        start_time: start.to_string(),
        end_time: end.to_string(),
        activity: activity.to_string(),
        completed: false,
    }
}

pub fn seed_categories() -> Vec<TemplateCategory> {
    vec![
        TemplateCategory {
            id: "cat_work".to_string(),
            name: "WORK".to_string(),
            base_type: DayType::Work,
            color: "cyber-red".to_string(),
        },
        TemplateCategory {
            id: "cat_home".to_string(),
            name: "DAY OFF".to_string(),
            base_type: DayType::Off,
            color: "cyber-blue".to_string(),
        },
        TemplateCategory {
            id: "cat_dev".to_string(),
            name: "GROWTH".to_string(),
            base_type: DayType::Work,
            color: "cyber-yellow".to_string(),
        },
    ]
}

pub fn seed_templates() -> Vec<Template> {
    vec![
        Template {
            id: "tpl_1".to_string(),
            name: "WORK STANDARD".to_string(),
            category_id: "cat_work".to_string(),
            items: vec![
                seed_item("1", "07:00", "08:00", "Wake up / Morning routine"),
                seed_item("2", "08:00", "10:00", "Inbox / Coffee"),
                seed_item("3", "10:00", "13:00", "Deep work"),
                seed_item("4", "13:00", "13:45", "Lunch break"),
                seed_item("5", "13:45", "16:00", "Meetings / Ongoing work"),
                seed_item("6", "16:00", "17:00", "Commute home"),
                seed_item("7", "18:00", "19:30", "Training / Walk"),
                seed_item("8", "22:00", "23:00", "Evening wind-down"),
            ],
        },
        Template {
            id: "tpl_2".to_string(),
            name: "WEEKEND OFF".to_string(),
            category_id: "cat_home".to_string(),
            items: vec![
                seed_item("1", "09:00", "10:00", "Wake up without an alarm"),
                seed_item("2", "10:00", "12:00", "Breakfast / Family"),
                seed_item("3", "12:00", "15:00", "Free time / Hobby"),
                seed_item("4", "15:00", "16:00", "Dinner"),
                seed_item("5", "20:00", "23:00", "Movie / Series"),
            ],
        },
    ]
}

mod application;
mod domain;
mod infrastructure;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    add_day_item_impl, add_goal_impl, assign_template_impl, clear_entry_impl,
    clear_generation_api_key_impl, create_category_impl, create_quest_impl, delete_category_impl,
    delete_day_item_impl, delete_goal_impl, delete_quest_impl, delete_template_impl,
    export_backup_impl, generate_schedule_impl, get_day_impl, get_pomodoro_state_impl,
    get_profile_impl, get_stats_impl, import_backup_impl, init_custom_day_impl,
    link_pomodoro_quest_impl, list_categories_impl, list_entries_impl, list_quests_impl,
    list_templates_impl, reorder_day_items_impl, reset_pomodoro_impl, save_template_impl,
    set_generation_api_key_impl, switch_pomodoro_mode_impl, tick_pomodoro_impl,
    toggle_day_item_impl, toggle_goal_impl, toggle_pomodoro_impl, toggle_quest_impl,
    update_day_item_impl, update_profile_impl, AppState, DayScheduleResponse,
    ImportBackupResponse, PomodoroStateResponse, ProfileResponse, StatsResponse,
    TickPomodoroResponse, ToggleDayItemResponse, ToggleGoalResponse, ToggleQuestResponse,
};
use domain::models::{
    BackupData, CalendarEntry, LongTermGoal, Quest, ScheduleItem, Template, TemplateCategory,
    UserProfile,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct BootstrapResponse {
    workspace_root: String,
    state_dir: String,
}

#[tauri::command]
fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        state_dir: result.state_dir.display().to_string(),
    })
}

#[tauri::command]
fn ping() -> &'static str {
    "pong"
}

#[tauri::command]
fn list_categories(state: tauri::State<'_, AppState>) -> Result<Vec<TemplateCategory>, String> {
    list_categories_impl(state.inner())
        .map_err(|error| state.command_error("list_categories", &error))
}

#[tauri::command]
fn create_category(
    state: tauri::State<'_, AppState>,
    name: String,
    base_type: String,
    color: String,
) -> Result<TemplateCategory, String> {
    create_category_impl(state.inner(), name, base_type, color)
        .map_err(|error| state.command_error("create_category", &error))
}

#[tauri::command]
fn delete_category(
    state: tauri::State<'_, AppState>,
    category_id: String,
) -> Result<bool, String> {
    delete_category_impl(state.inner(), category_id)
        .map_err(|error| state.command_error("delete_category", &error))
}

#[tauri::command]
fn list_templates(state: tauri::State<'_, AppState>) -> Result<Vec<Template>, String> {
    list_templates_impl(state.inner())
        .map_err(|error| state.command_error("list_templates", &error))
}

#[tauri::command]
fn save_template(
    state: tauri::State<'_, AppState>,
    template_id: Option<String>,
    name: String,
    category_id: String,
    items: Vec<ScheduleItem>,
) -> Result<Template, String> {
    save_template_impl(state.inner(), template_id, name, category_id, items)
        .map_err(|error| state.command_error("save_template", &error))
}

#[tauri::command]
fn delete_template(
    state: tauri::State<'_, AppState>,
    template_id: String,
) -> Result<bool, String> {
    delete_template_impl(state.inner(), template_id)
        .map_err(|error| state.command_error("delete_template", &error))
}

#[tauri::command]
fn list_entries(state: tauri::State<'_, AppState>) -> Result<Vec<CalendarEntry>, String> {
    list_entries_impl(state.inner()).map_err(|error| state.command_error("list_entries", &error))
}

#[tauri::command]
fn get_day(state: tauri::State<'_, AppState>, date: String) -> Result<DayScheduleResponse, String> {
    get_day_impl(state.inner(), date).map_err(|error| state.command_error("get_day", &error))
}

#[tauri::command]
fn assign_template(
    state: tauri::State<'_, AppState>,
    date: String,
    template_id: String,
) -> Result<CalendarEntry, String> {
    assign_template_impl(state.inner(), date, template_id)
        .map_err(|error| state.command_error("assign_template", &error))
}

#[tauri::command]
fn init_custom_day(
    state: tauri::State<'_, AppState>,
    date: String,
) -> Result<CalendarEntry, String> {
    init_custom_day_impl(state.inner(), date)
        .map_err(|error| state.command_error("init_custom_day", &error))
}

#[tauri::command]
fn clear_entry(state: tauri::State<'_, AppState>, date: String) -> Result<bool, String> {
    clear_entry_impl(state.inner(), date)
        .map_err(|error| state.command_error("clear_entry", &error))
}

#[tauri::command]
fn toggle_day_item(
    state: tauri::State<'_, AppState>,
    date: String,
    item_id: String,
) -> Result<ToggleDayItemResponse, String> {
    toggle_day_item_impl(state.inner(), date, item_id)
        .map_err(|error| state.command_error("toggle_day_item", &error))
}

#[tauri::command]
fn update_day_item(
    state: tauri::State<'_, AppState>,
    date: String,
    item_id: String,
    field: String,
    value: String,
) -> Result<bool, String> {
    update_day_item_impl(state.inner(), date, item_id, field, value)
        .map_err(|error| state.command_error("update_day_item", &error))
}

#[tauri::command]
fn add_day_item(
    state: tauri::State<'_, AppState>,
    date: String,
) -> Result<Option<ScheduleItem>, String> {
    add_day_item_impl(state.inner(), date)
        .map_err(|error| state.command_error("add_day_item", &error))
}

#[tauri::command]
fn delete_day_item(
    state: tauri::State<'_, AppState>,
    date: String,
    item_id: String,
) -> Result<bool, String> {
    delete_day_item_impl(state.inner(), date, item_id)
        .map_err(|error| state.command_error("delete_day_item", &error))
}

#[tauri::command]
fn reorder_day_items(
    state: tauri::State<'_, AppState>,
    date: String,
    from_index: usize,
    to_index: usize,
) -> Result<bool, String> {
    reorder_day_items_impl(state.inner(), date, from_index, to_index)
        .map_err(|error| state.command_error("reorder_day_items", &error))
}

#[tauri::command]
fn list_quests(state: tauri::State<'_, AppState>) -> Result<Vec<Quest>, String> {
    list_quests_impl(state.inner()).map_err(|error| state.command_error("list_quests", &error))
}

#[tauri::command]
fn create_quest(
    state: tauri::State<'_, AppState>,
    title: String,
    priority: String,
    deadline: String,
) -> Result<Quest, String> {
    create_quest_impl(state.inner(), title, priority, deadline)
        .map_err(|error| state.command_error("create_quest", &error))
}

#[tauri::command]
fn toggle_quest(
    state: tauri::State<'_, AppState>,
    quest_id: String,
) -> Result<ToggleQuestResponse, String> {
    toggle_quest_impl(state.inner(), quest_id)
        .map_err(|error| state.command_error("toggle_quest", &error))
}

#[tauri::command]
fn delete_quest(state: tauri::State<'_, AppState>, quest_id: String) -> Result<bool, String> {
    delete_quest_impl(state.inner(), quest_id)
        .map_err(|error| state.command_error("delete_quest", &error))
}

#[tauri::command]
fn get_pomodoro_state(
    state: tauri::State<'_, AppState>,
) -> Result<PomodoroStateResponse, String> {
    get_pomodoro_state_impl(state.inner())
        .map_err(|error| state.command_error("get_pomodoro_state", &error))
}

#[tauri::command]
fn toggle_pomodoro(state: tauri::State<'_, AppState>) -> Result<PomodoroStateResponse, String> {
    toggle_pomodoro_impl(state.inner())
        .map_err(|error| state.command_error("toggle_pomodoro", &error))
}

#[tauri::command]
fn tick_pomodoro(state: tauri::State<'_, AppState>) -> Result<TickPomodoroResponse, String> {
    tick_pomodoro_impl(state.inner())
        .map_err(|error| state.command_error("tick_pomodoro", &error))
}

#[tauri::command]
fn reset_pomodoro(state: tauri::State<'_, AppState>) -> Result<PomodoroStateResponse, String> {
    reset_pomodoro_impl(state.inner())
        .map_err(|error| state.command_error("reset_pomodoro", &error))
}

#[tauri::command]
fn switch_pomodoro_mode(
    state: tauri::State<'_, AppState>,
    mode: String,
) -> Result<PomodoroStateResponse, String> {
    switch_pomodoro_mode_impl(state.inner(), mode)
        .map_err(|error| state.command_error("switch_pomodoro_mode", &error))
}

#[tauri::command]
fn link_pomodoro_quest(
    state: tauri::State<'_, AppState>,
    quest_id: Option<String>,
) -> Result<PomodoroStateResponse, String> {
    link_pomodoro_quest_impl(state.inner(), quest_id)
        .map_err(|error| state.command_error("link_pomodoro_quest", &error))
}

#[tauri::command]
fn get_profile(state: tauri::State<'_, AppState>) -> Result<ProfileResponse, String> {
    get_profile_impl(state.inner()).map_err(|error| state.command_error("get_profile", &error))
}

#[tauri::command]
fn update_profile(
    state: tauri::State<'_, AppState>,
    username: Option<String>,
    tagline: Option<String>,
) -> Result<UserProfile, String> {
    update_profile_impl(state.inner(), username, tagline)
        .map_err(|error| state.command_error("update_profile", &error))
}

#[tauri::command]
fn add_goal(state: tauri::State<'_, AppState>, title: String) -> Result<LongTermGoal, String> {
    add_goal_impl(state.inner(), title).map_err(|error| state.command_error("add_goal", &error))
}

#[tauri::command]
fn toggle_goal(
    state: tauri::State<'_, AppState>,
    goal_id: String,
) -> Result<ToggleGoalResponse, String> {
    toggle_goal_impl(state.inner(), goal_id)
        .map_err(|error| state.command_error("toggle_goal", &error))
}

#[tauri::command]
fn delete_goal(state: tauri::State<'_, AppState>, goal_id: String) -> Result<bool, String> {
    delete_goal_impl(state.inner(), goal_id)
        .map_err(|error| state.command_error("delete_goal", &error))
}

#[tauri::command]
fn get_stats(state: tauri::State<'_, AppState>) -> Result<StatsResponse, String> {
    get_stats_impl(state.inner()).map_err(|error| state.command_error("get_stats", &error))
}

#[tauri::command]
fn export_backup(state: tauri::State<'_, AppState>) -> Result<BackupData, String> {
    export_backup_impl(state.inner())
        .map_err(|error| state.command_error("export_backup", &error))
}

#[tauri::command]
fn import_backup(
    state: tauri::State<'_, AppState>,
    raw: String,
) -> Result<ImportBackupResponse, String> {
    import_backup_impl(state.inner(), raw)
        .map_err(|error| state.command_error("import_backup", &error))
}

#[tauri::command]
async fn generate_schedule(
    state: tauri::State<'_, AppState>,
    day_type: String,
    focus: Option<String>,
) -> Result<Vec<ScheduleItem>, String> {
    generate_schedule_impl(state.inner(), day_type, focus)
        .await
        .map_err(|error| state.command_error("generate_schedule", &error))
}

#[tauri::command]
fn set_generation_api_key(
    state: tauri::State<'_, AppState>,
    api_key: String,
) -> Result<(), String> {
    set_generation_api_key_impl(state.inner(), api_key)
        .map_err(|error| state.command_error("set_generation_api_key", &error))
}

#[tauri::command]
fn clear_generation_api_key(state: tauri::State<'_, AppState>) -> Result<(), String> {
    clear_generation_api_key_impl(state.inner())
        .map_err(|error| state.command_error("clear_generation_api_key", &error))
}

pub fn run() {
    let workspace_root = std::env::current_dir().expect("failed to resolve current directory");
    let app_state = AppState::new(workspace_root).expect("failed to initialize app state");

    tauri::Builder::default()
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            ping,
            bootstrap,
            list_categories,
            create_category,
            delete_category,
            list_templates,
            save_template,
            delete_template,
            list_entries,
            get_day,
            assign_template,
            init_custom_day,
            clear_entry,
            toggle_day_item,
            update_day_item,
            add_day_item,
            delete_day_item,
            reorder_day_items,
            list_quests,
            create_quest,
            toggle_quest,
            delete_quest,
            get_pomodoro_state,
            toggle_pomodoro,
            tick_pomodoro,
            reset_pomodoro,
            switch_pomodoro_mode,
            link_pomodoro_quest,
            get_profile,
            update_profile,
            add_goal,
            toggle_goal,
            delete_goal,
            get_stats,
            export_backup,
            import_backup,
            generate_schedule,
            set_generation_api_key,
            clear_generation_api_key
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}

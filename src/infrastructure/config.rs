use crate::infrastructure::error::InfraError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const GENERATION_JSON: &str = "generation.json";

const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_GENERATION_TIMEOUT_SECONDS: u64 = 30;

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "DayMaster",
                "timezone": "UTC"
            }),
        ),
        (
            GENERATION_JSON,
            serde_json::json!({
                "schema": 1,
                "model": DEFAULT_GENERATION_MODEL,
                "timeoutSeconds": DEFAULT_GENERATION_TIMEOUT_SECONDS
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn read_timezone(config_dir: &Path) -> Result<Option<String>, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned))
}

pub fn read_generation_model(config_dir: &Path) -> Result<String, InfraError> {
    let generation = read_config(&config_dir.join(GENERATION_JSON))?;
    Ok(generation
        .get("model")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_GENERATION_MODEL)
        .to_string())
}

pub fn read_generation_timeout_seconds(config_dir: &Path) -> Result<u64, InfraError> {
    let generation = read_config(&config_dir.join(GENERATION_JSON))?;
    Ok(generation
        .get("timeoutSeconds")
        .and_then(serde_json::Value::as_u64)
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECONDS))
}

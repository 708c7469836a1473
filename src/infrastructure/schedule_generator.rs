use crate::domain::models::{validate_hhmm, DayType};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const GENERATION_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models/";

const SYSTEM_PROMPT: &str = "You are a productivity assistant. Generate realistic, \
concise day plans with sensible time slots.";

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub day_type: DayType,
    pub focus: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScheduleItem {
    pub start_time: String,
    pub end_time: String,
    pub activity: String,
}

/// Remote schedule generation seam. The core only ever sees the finished
/// item list; ids are assigned by the caller on receipt.
#[async_trait]
pub trait ScheduleGenerator: Send + Sync {
    async fn generate(
        &self,
        api_key: &str,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedScheduleItem>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct GeminiScheduleGenerator {
    client: Client,
    model: String,
}

impl GeminiScheduleGenerator {
    pub fn new(model: impl Into<String>, timeout_seconds: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .unwrap_or_default();
        Self {
            client,
            model: model.into(),
        }
    }

    fn endpoint(&self) -> Result<Url, InfraError> {
        let mut url = Url::parse(GENERATION_API_BASE).map_err(|error| {
            InfraError::Generation(format!("invalid generation api base url: {error}"))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Generation("generation api base URL cannot be a base".to_string())
            })?;
            segments.push(&format!("{}:generateContent", self.model));
        }
        Ok(url)
    }

    fn generation_http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("generation api error: http {}", status.as_u16())
        } else {
            format!("generation api error: http {}; body={body}", status.as_u16())
        };
        InfraError::Generation(message)
    }
}

pub fn build_generation_prompt(request: &GenerationRequest) -> String {
    let day_label = match request.day_type {
        DayType::Work => "working day",
        DayType::Off => "day off",
    };
    let focus = request
        .focus
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("a balanced day");
    format!(
        "Create a day plan. Day type: {day_label}. Main focus: {focus}. \
The plan should contain roughly 5-10 slots from morning to evening. \
For each slot give the start time (startTime) and end time (endTime) in HH:MM format."
    )
}

fn generation_payload(prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "startTime": { "type": "STRING", "description": "Start time HH:MM (e.g. 08:00)" },
                        "endTime": { "type": "STRING", "description": "End time HH:MM (e.g. 09:30)" },
                        "activity": { "type": "STRING", "description": "Short activity description" }
                    },
                    "required": ["startTime", "endTime", "activity"]
                }
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<GenerateContentCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentCandidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGeneratedItem {
    start_time: String,
    end_time: String,
    activity: String,
}

/// Parses the model's JSON payload into validated items. Any malformed
/// slot rejects the whole payload so the caller never commits a partial
/// list.
pub fn parse_generation_payload(raw: &str) -> Result<Vec<GeneratedScheduleItem>, InfraError> {
    let parsed: Vec<RawGeneratedItem> = serde_json::from_str(raw)
        .map_err(|error| InfraError::Generation(format!("invalid generation payload: {error}")))?;

    let mut items = Vec::with_capacity(parsed.len());
    for raw_item in parsed {
        let start_time = raw_item.start_time.trim().to_string();
        let end_time = raw_item.end_time.trim().to_string();
        validate_hhmm(&start_time, "generated.startTime").map_err(InfraError::Generation)?;
        validate_hhmm(&end_time, "generated.endTime").map_err(InfraError::Generation)?;
        items.push(GeneratedScheduleItem {
            start_time,
            end_time,
            activity: raw_item.activity.trim().to_string(),
        });
    }
    Ok(items)
}

#[async_trait]
impl ScheduleGenerator for GeminiScheduleGenerator {
    async fn generate(
        &self,
        api_key: &str,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedScheduleItem>, InfraError> {
        if api_key.trim().is_empty() {
            return Err(InfraError::Generation(
                "api key must not be empty".to_string(),
            ));
        }

        let endpoint = self.endpoint()?;
        let prompt = build_generation_prompt(request);
        let response = self
            .client
            .post(endpoint)
            .header("x-goog-api-key", api_key.trim())
            .json(&generation_payload(&prompt))
            .send()
            .await
            .map_err(|error| {
                InfraError::Generation(format!("network error while generating schedule: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Generation(format!("failed reading generation response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::generation_http_error(status, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::Generation(format!("invalid generation response: {error}; body={body}"))
        })?;

        let text = parsed
            .candidates
            .unwrap_or_default()
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .filter_map(|content| content.parts)
            .flatten()
            .filter_map(|part| part.text)
            .next()
            .ok_or_else(|| {
                InfraError::Generation("generation response contained no content".to_string())
            })?;

        parse_generation_payload(&text)
    }
}

use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{Extraction, ExtractionContext, ExtractionError, Intent, Stage};

/// External NLU capability: free text in, intent and entities out. The
/// conversation engine only ever talks to this trait, so tests drive the
/// state machine with a scripted implementation instead of a model.
#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn extract(
        &self,
        text: &str,
        ctx: &ExtractionContext,
    ) -> Result<Extraction, ExtractionError>;
}

/// OpenAI chat-completions backed extractor. Model output is advisory: a
/// deterministic keyword pass runs over the raw message afterwards and fills
/// in anything the model missed (departments, dates, times, yes/no).
pub struct OpenAiIntentExtractor {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiIntentExtractor {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
            model: config.openai_model.clone(),
        }
    }

    fn build_prompt(&self, text: &str, ctx: &ExtractionContext) -> String {
        format!(
            "Analyze this hospital booking message and extract:\n\
             1. intent: one of \"greeting\", \"book_appointment\", \"provide_name\", \
             \"select_department\", \"select_doctor\", \"select_date\", \"select_time\", \
             \"confirm\", \"deny\", \"cancel\", \"other\"\n\
             2. patient_name (if mentioned)\n\
             3. department (if mentioned) - look for: {}\n\
             4. doctor_name (if mentioned)\n\
             5. date (if mentioned, format as YYYY-MM-DD)\n\
             6. time (if mentioned, format as HH:MM)\n\
             7. problem_description (if mentioned)\n\n\
             The conversation is currently at the \"{}\" step.\n\n\
             Message: \"{}\"\n\n\
             Return only a JSON object with those keys; omit fields that are absent.",
            ctx.departments.join(", "),
            ctx.stage,
            text
        )
    }
}

#[async_trait]
impl IntentExtractor for OpenAiIntentExtractor {
    async fn extract(
        &self,
        text: &str,
        ctx: &ExtractionContext,
    ) -> Result<Extraction, ExtractionError> {
        let body = json!({
            "model": self.model,
            "temperature": 0.1,
            "messages": [
                { "role": "user", "content": self.build_prompt(text, ctx) }
            ]
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractionError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExtractionError::Unavailable(format!(
                "extraction endpoint returned {}",
                response.status()
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        let mut extraction = parse_model_output(content).unwrap_or_else(|| {
            warn!("unparseable extraction output, falling back to keywords");
            Extraction::of(Intent::Other)
        });

        apply_text_heuristics(&mut extraction, text, ctx);
        debug!("extracted intent {:?} from message", extraction.intent);
        Ok(extraction)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawExtraction {
    intent: Option<String>,
    patient_name: Option<String>,
    department: Option<String>,
    doctor_name: Option<String>,
    date: Option<String>,
    time: Option<String>,
    problem_description: Option<String>,
}

fn parse_model_output(content: &str) -> Option<Extraction> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let raw: RawExtraction = serde_json::from_str(trimmed).ok()?;

    let intent = raw
        .intent
        .as_deref()
        .and_then(|s| serde_json::from_value(json!(s)).ok())
        .unwrap_or(Intent::Other);

    Some(Extraction {
        intent,
        patient_name: clean(raw.patient_name),
        department: clean(raw.department),
        doctor_name: clean(raw.doctor_name),
        date: clean(raw.date).and_then(|s| parse_date(&s)),
        time: clean(raw.time).and_then(|s| parse_time(&s)),
        problem_description: clean(raw.problem_description),
    })
}

/// Models like to echo placeholders instead of omitting fields.
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "..." && s.to_lowercase() != "null")
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("valid regex"))
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("valid regex"))
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bmy name is\s+([A-Za-z][A-Za-z .'-]*)").expect("valid regex")
    })
}

/// Deterministic pass over the raw message. Only fills gaps; never
/// overrides something the model already extracted.
pub fn apply_text_heuristics(extraction: &mut Extraction, text: &str, ctx: &ExtractionContext) {
    let lower = text.to_lowercase();

    if matches!(
        lower.trim(),
        "hi" | "hello" | "start over" | "reset" | "new appointment"
    ) {
        extraction.intent = Intent::Greeting;
    }

    if extraction.department.is_none() {
        for department in &ctx.departments {
            if lower.contains(&department.to_lowercase()) {
                extraction.department = Some(department.clone());
                if extraction.intent == Intent::Other {
                    extraction.intent = Intent::SelectDepartment;
                }
                break;
            }
        }
    }

    if extraction.patient_name.is_none() {
        if let Some(captures) = name_regex().captures(text) {
            extraction.patient_name = Some(captures[1].trim().to_string());
            if extraction.intent == Intent::Other {
                extraction.intent = Intent::ProvideName;
            }
        }
    }

    if extraction.date.is_none() {
        let today = Utc::now().date_naive();
        if lower.contains("tomorrow") {
            extraction.date = Some(today + Duration::days(1));
        } else if lower.contains("today") {
            extraction.date = Some(today);
        } else if let Some(captures) = date_regex().captures(&lower) {
            extraction.date = parse_date(&captures[1]);
        }
    }

    if extraction.time.is_none() {
        if let Some(captures) = time_regex().captures(&lower) {
            extraction.time = parse_time(&captures[0]);
        }
    }

    if ctx.stage == Stage::Confirming && extraction.intent == Intent::Other {
        if lower.contains("yes") || lower.contains("confirm") || lower.contains("correct") {
            extraction.intent = Intent::Confirm;
        } else if lower.contains("no") || lower.contains("change") {
            extraction.intent = Intent::Deny;
        }
    }

    if lower.contains("cancel") || lower.contains("never mind") || lower.contains("goodbye") {
        extraction.intent = Intent::Cancel;
    }
}

/// Symptom keywords to departments, used when a user describes a problem
/// instead of naming a department.
pub fn infer_department_from_symptoms(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let mapping: &[(&[&str], &str)] = &[
        (&["heart", "chest", "cardiac"], "Cardiology"),
        (&["skin", "rash", "dermatitis"], "Dermatology"),
        (&["child", "baby", "pediatric"], "Pediatrics"),
        (&["bone", "joint", "fracture"], "Orthopedics"),
        (&["eye", "vision", "sight"], "Ophthalmology"),
        (&["brain", "headache", "neurological"], "Neurology"),
        (&["stomach", "digestive", "gastro"], "Gastroenterology"),
        (&["kidney", "renal", "urinary"], "Nephrology"),
        (&["cancer", "tumor", "oncology"], "Oncology"),
        (&["operation", "surgical", "surgery"], "Surgery"),
        (&["family", "general", "primary"], "Family Medicine"),
        (&["emergency", "urgent", "acute"], "Emergency Medicine"),
        (&["x-ray", "scan", "imaging"], "Radiology"),
        (&["lab", "test", "pathology"], "Pathology"),
    ];

    for (keywords, department) in mapping {
        if keywords.iter().any(|k| lower.contains(k)) {
            return Some(department);
        }
    }
    None
}

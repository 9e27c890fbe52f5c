use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use appointment_cell::models::Booking;

/// Conversation stage. Each stage declares the field it is trying to fill;
/// `Completed` and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Greeting,
    CollectingName,
    CollectingDepartment,
    CollectingDoctor,
    CollectingDate,
    CollectingTime,
    Confirming,
    Completed,
    Abandoned,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Abandoned)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Greeting => "greeting",
            Stage::CollectingName => "collecting_name",
            Stage::CollectingDepartment => "collecting_department",
            Stage::CollectingDoctor => "collecting_doctor",
            Stage::CollectingDate => "collecting_date",
            Stage::CollectingTime => "collecting_time",
            Stage::Confirming => "confirming",
            Stage::Completed => "completed",
            Stage::Abandoned => "abandoned",
        };
        write!(f, "{}", name)
    }
}

/// What the NLU layer resolved a message to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    BookAppointment,
    ProvideName,
    SelectDepartment,
    SelectDoctor,
    SelectDate,
    SelectTime,
    Confirm,
    Deny,
    Cancel,
    #[serde(other)]
    Other,
}

/// Intent plus whatever entities were mentioned. Every field except the
/// intent is optional; the state machine decides what it can use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub intent: Intent,
    pub patient_name: Option<String>,
    pub department: Option<String>,
    pub doctor_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub problem_description: Option<String>,
}

impl Extraction {
    pub fn of(intent: Intent) -> Self {
        Self {
            intent,
            patient_name: None,
            department: None,
            doctor_name: None,
            date: None,
            time: None,
            problem_description: None,
        }
    }
}

/// Context handed to the extractor so prompts can name the live department
/// list and bias on the current stage.
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    pub stage: Stage,
    pub departments: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("extraction service unavailable: {0}")]
    Unavailable(String),

    #[error("could not interpret extraction output: {0}")]
    Malformed(String),
}

/// Fields collected so far. Valid values survive corrections and stage
/// reversions; only a full reset clears them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectedFields {
    pub patient_name: Option<String>,
    pub department: Option<String>,
    pub doctor_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub stage: Stage,
    pub fields: CollectedFields,
    pub extraction_retries: u32,
    /// Turns answered with a rejected value (unknown doctor, off-day date,
    /// taken time) since the last accepted one.
    #[serde(default)]
    pub invalid_value_reprompts: u32,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            stage: Stage::Greeting,
            fields: CollectedFields::default(),
            extraction_retries: 0,
            invalid_value_reprompts: 0,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Back to a fresh greeting, dropping every collected field.
    pub fn reset(&mut self) {
        self.stage = Stage::Greeting;
        self.fields = CollectedFields::default();
        self.extraction_retries = 0;
        self.invalid_value_reprompts = 0;
        self.touch();
    }
}

/// One chat turn in.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

/// One chat turn out: the next prompt plus enough state for the caller to
/// know whether the flow finished.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub stage: Stage,
    pub done: bool,
    pub booking: Option<Booking>,
}

impl TurnOutcome {
    pub fn prompt(reply: impl Into<String>, stage: Stage) -> Self {
        Self {
            reply: reply.into(),
            stage,
            done: false,
            booking: None,
        }
    }

    pub fn booked(reply: impl Into<String>, booking: Booking) -> Self {
        Self {
            reply: reply.into(),
            stage: Stage::Completed,
            done: true,
            booking: Some(booking),
        }
    }
}

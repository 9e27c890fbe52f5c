use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable reference data for one doctor. Working hours and off-days are
/// explicit fields here; nothing else in the system hardcodes schedules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub department: String,
    #[serde(default)]
    pub off_days: Vec<Weekday>,
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: i64,
}

fn default_slot_minutes() -> i64 {
    20
}

impl Doctor {
    pub fn is_off_on(&self, date: NaiveDate) -> bool {
        self.off_days.contains(&date.weekday())
    }

    /// Off-days rendered for prompts, e.g. "Fri" or "Fri, Sat".
    pub fn off_days_label(&self) -> String {
        self.off_days
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A bookable window: one doctor, one date, one aligned start time. The end
/// time follows from the doctor's fixed appointment duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i64,
}

impl Slot {
    pub fn end_time(&self) -> NaiveTime {
        self.start_time + Duration::minutes(self.duration_minutes)
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AvailabilityError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// Seed-file entry; ids are assigned at load time.
#[derive(Debug, Clone, Deserialize)]
pub struct DoctorSeed {
    pub name: String,
    pub department: String,
    #[serde(default)]
    pub off_days: Vec<Weekday>,
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorSeedFile {
    pub doctors: Vec<DoctorSeed>,
}

impl From<DoctorSeed> for Doctor {
    fn from(seed: DoctorSeed) -> Self {
        Doctor {
            id: Uuid::new_v4(),
            name: seed.name,
            department: seed.department,
            off_days: seed.off_days,
            work_start: seed.work_start,
            work_end: seed.work_end,
            slot_minutes: seed.slot_minutes,
        }
    }
}

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::{info, warn};

use appointment_cell::{BookingCommitter, BookingError};
use doctor_cell::models::Doctor;
use doctor_cell::services::registry::DoctorRegistry;

use crate::models::{
    CollectedFields, Extraction, ExtractionContext, Intent, SessionState, Stage, TurnOutcome,
};
use crate::services::extractor::{infer_department_from_symptoms, IntentExtractor};

const SLOT_DISPLAY_LIMIT: usize = 10;
const ALTERNATIVE_COUNT: usize = 3;

/// Slot-filling state machine for the booking dialogue. Each turn merges
/// whatever the extractor pulled out of the message into the session, then
/// moves to the first stage whose field is still missing. The committer is
/// only called from the confirmation stage.
pub struct ConversationEngine {
    registry: Arc<dyn DoctorRegistry>,
    committer: Arc<BookingCommitter>,
    extractor: Arc<dyn IntentExtractor>,
    max_extraction_retries: u32,
}

impl ConversationEngine {
    pub fn new(
        registry: Arc<dyn DoctorRegistry>,
        committer: Arc<BookingCommitter>,
        extractor: Arc<dyn IntentExtractor>,
        max_extraction_retries: u32,
    ) -> Self {
        Self {
            registry,
            committer,
            extractor,
            max_extraction_retries,
        }
    }

    pub async fn handle_turn(&self, state: &mut SessionState, message: &str) -> TurnOutcome {
        state.touch();

        let ctx = ExtractionContext {
            stage: state.stage,
            departments: self.registry.departments(),
        };

        let extraction = match self.extractor.extract(message, &ctx).await {
            Ok(extraction) => {
                state.extraction_retries = 0;
                extraction
            }
            Err(err) => {
                state.extraction_retries += 1;
                warn!(
                    "extraction failed for session {} (attempt {}): {}",
                    state.session_id, state.extraction_retries, err
                );
                if state.extraction_retries >= self.max_extraction_retries {
                    state.stage = Stage::Abandoned;
                    return TurnOutcome::prompt(
                        "I'm sorry, I'm having trouble understanding right now. \
                         Please try again later or call our front desk.",
                        Stage::Abandoned,
                    );
                }
                return TurnOutcome::prompt(
                    "Sorry, I didn't quite catch that. Could you say it again?",
                    state.stage,
                );
            }
        };

        if extraction.intent == Intent::Cancel {
            state.stage = Stage::Abandoned;
            return TurnOutcome::prompt(
                "No problem, I've cancelled this booking. Feel free to come back any time. Goodbye!",
                Stage::Abandoned,
            );
        }

        if extraction.intent == Intent::Greeting && state.stage != Stage::Greeting {
            state.reset();
            return TurnOutcome::prompt(
                "Hello! Let's start fresh. I can help you book an appointment. \
                 May I have your name?",
                Stage::Greeting,
            );
        }

        if state.stage.is_terminal() {
            let reply = match state.stage {
                Stage::Completed => {
                    "Your appointment is already booked. Say hello if you'd like to make another."
                }
                _ => "This conversation has ended. Say hello to start a new booking.",
            };
            return TurnOutcome::prompt(reply, state.stage);
        }

        if let Some(outcome) = self.merge_extraction(state, &extraction, message).await {
            return outcome;
        }

        if state.stage == Stage::Confirming {
            match extraction.intent {
                Intent::Confirm => return self.finalize(state).await,
                Intent::Deny => {
                    state.fields.date = None;
                    state.fields.time = None;
                    state.stage = Stage::CollectingDate;
                    return TurnOutcome::prompt(
                        "No problem, let's adjust. What date would you like instead?",
                        Stage::CollectingDate,
                    );
                }
                _ => {}
            }
        }

        state.stage = next_stage(&state.fields);
        let reply = self.prompt_for_stage(state).await;
        TurnOutcome::prompt(reply, state.stage)
    }

    /// Folds extracted entities into the session, validating each against
    /// the registry and the live schedule. Returns an outcome early when a
    /// value is rejected and the user needs to be re-asked.
    async fn merge_extraction(
        &self,
        state: &mut SessionState,
        extraction: &Extraction,
        message: &str,
    ) -> Option<TurnOutcome> {
        if let Some(name) = &extraction.patient_name {
            state.fields.patient_name = Some(name.clone());
        }

        if let Some(raw) = &extraction.department {
            match self.resolve_department(raw) {
                Some(department) => self.set_department(state, department),
                None if state.stage == Stage::CollectingDepartment => {
                    state.invalid_value_reprompts += 1;
                    return Some(TurnOutcome::prompt(
                        format!(
                            "We don't have a {} department. Our departments are: {}.",
                            raw,
                            self.registry.departments().join(", ")
                        ),
                        Stage::CollectingDepartment,
                    ));
                }
                None => {}
            }
        } else if state.fields.department.is_none() {
            if let Some(department) = infer_department_from_symptoms(message) {
                self.set_department(state, department.to_string());
            }
        }

        if let Some(raw) = &extraction.doctor_name {
            match self.registry.find_by_name(raw) {
                Some(doctor) => {
                    if state.fields.doctor_name.as_deref() != Some(doctor.name.as_str()) {
                        state.fields.date = None;
                        state.fields.time = None;
                    }
                    state.fields.department = Some(doctor.department.clone());
                    state.fields.doctor_name = Some(doctor.name);
                }
                None if state.stage == Stage::CollectingDoctor => {
                    state.invalid_value_reprompts += 1;
                    return Some(TurnOutcome::prompt(
                        format!(
                            "I couldn't find a doctor named {}. Could you check the spelling?",
                            raw
                        ),
                        Stage::CollectingDoctor,
                    ));
                }
                None => {}
            }
        }

        if let Some(date) = extraction.date {
            if let Some(doctor) = self.current_doctor(state) {
                match self.validate_date(&doctor, date).await {
                    Ok(()) => {
                        if state.fields.date != Some(date) {
                            state.fields.time = None;
                        }
                        state.fields.date = Some(date);
                        state.invalid_value_reprompts = 0;
                    }
                    Err(reply) => {
                        state.invalid_value_reprompts += 1;
                        state.stage = Stage::CollectingDate;
                        return Some(TurnOutcome::prompt(reply, Stage::CollectingDate));
                    }
                }
            }
        }

        if let Some(time) = extraction.time {
            if let (Some(doctor), Some(date)) = (self.current_doctor(state), state.fields.date) {
                match self.validate_time(&doctor, date, time).await {
                    Ok(()) => {
                        state.fields.time = Some(time);
                        state.invalid_value_reprompts = 0;
                    }
                    Err(reply) => {
                        state.invalid_value_reprompts += 1;
                        state.stage = Stage::CollectingTime;
                        return Some(TurnOutcome::prompt(reply, Stage::CollectingTime));
                    }
                }
            }
        }

        None
    }

    async fn finalize(&self, state: &mut SessionState) -> TurnOutcome {
        let fields = state.fields.clone();
        let (Some(patient_name), Some(doctor_name), Some(date), Some(time)) =
            (fields.patient_name, fields.doctor_name, fields.date, fields.time)
        else {
            state.stage = next_stage(&state.fields);
            let reply = self.prompt_for_stage(state).await;
            return TurnOutcome::prompt(reply, state.stage);
        };

        let Some(doctor) = self.registry.find_by_name(&doctor_name) else {
            state.fields.doctor_name = None;
            state.stage = Stage::CollectingDoctor;
            let reply = self.prompt_for_stage(state).await;
            return TurnOutcome::prompt(reply, state.stage);
        };

        match self.committer.commit(&patient_name, &doctor, date, time).await {
            Ok(booking) => {
                info!(
                    "session {} completed with booking {}",
                    state.session_id, booking.id
                );
                state.stage = Stage::Completed;
                let reply = format!(
                    "You're all set, {}! Your appointment with {} ({}) is booked for {} at {}. \
                     Your booking reference is {}.",
                    booking.patient_name,
                    booking.doctor_name,
                    doctor.department,
                    booking.date,
                    fmt_time(booking.start_time),
                    booking.id
                );
                TurnOutcome::booked(reply, booking)
            }
            Err(BookingError::SlotConflict) => {
                state.fields.time = None;
                state.stage = Stage::CollectingTime;
                let times = self.available_starts(&doctor, date).await;
                TurnOutcome::prompt(
                    format!(
                        "I'm sorry, {} was just taken by someone else. \
                         Times still available on {}: {}. Which would you like?",
                        fmt_time(time),
                        date,
                        fmt_times(&times)
                    ),
                    Stage::CollectingTime,
                )
            }
            Err(BookingError::InvalidSlot(_)) => {
                state.fields.date = None;
                state.fields.time = None;
                state.stage = Stage::CollectingDate;
                TurnOutcome::prompt(
                    "That slot is no longer valid. What date would you like instead?",
                    Stage::CollectingDate,
                )
            }
            Err(err) => {
                warn!(
                    "booking commit failed for session {}: {}",
                    state.session_id, err
                );
                TurnOutcome::prompt(
                    "Something went wrong on our side while saving your booking. \
                     Your details are safe; say yes to try again.",
                    Stage::Confirming,
                )
            }
        }
    }

    async fn prompt_for_stage(&self, state: &mut SessionState) -> String {
        match state.stage {
            Stage::Greeting | Stage::CollectingName => {
                "Hello! I can help you book an appointment. May I have your name?".to_string()
            }
            Stage::CollectingDepartment => {
                let name = state.fields.patient_name.as_deref().unwrap_or("there");
                format!(
                    "Nice to meet you, {}! Which department would you like to visit? \
                     We have: {}.",
                    name,
                    self.registry.departments().join(", ")
                )
            }
            Stage::CollectingDoctor => {
                let department = state.fields.department.clone().unwrap_or_default();
                let doctors = self.registry.find_by_department(&department);
                if doctors.is_empty() {
                    state.fields.department = None;
                    state.stage = Stage::CollectingDepartment;
                    return format!(
                        "There are no doctors available in {} right now. \
                         Our departments are: {}.",
                        department,
                        self.registry.departments().join(", ")
                    );
                }
                let listing = doctors
                    .iter()
                    .map(|d| {
                        if d.off_days.is_empty() {
                            format!("- {}", d.name)
                        } else {
                            format!("- {} (off on {})", d.name, d.off_days_label())
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "Here are our {} doctors:\n{}\nWho would you like to see?",
                    department, listing
                )
            }
            Stage::CollectingDate => {
                let doctor = state.fields.doctor_name.clone().unwrap_or_default();
                let off_note = self
                    .current_doctor(state)
                    .filter(|d| !d.off_days.is_empty())
                    .map(|d| format!(" Note that {} is off on {}.", d.name, d.off_days_label()))
                    .unwrap_or_default();
                format!(
                    "What date works for you to see {}? You can say today, tomorrow, \
                     or a date like 2026-09-15.{}",
                    doctor, off_note
                )
            }
            Stage::CollectingTime => {
                let (Some(doctor), Some(date)) = (self.current_doctor(state), state.fields.date)
                else {
                    state.stage = Stage::CollectingDate;
                    return "What date would you like to come in?".to_string();
                };
                let times = self.available_starts(&doctor, date).await;
                if times.is_empty() {
                    state.fields.date = None;
                    state.stage = Stage::CollectingDate;
                    return format!(
                        "{} has no remaining openings on {}. What other date works for you?",
                        doctor.name, date
                    );
                }
                format!(
                    "{} is available on {} at: {}. Which time suits you?",
                    doctor.name,
                    date,
                    fmt_times(&times)
                )
            }
            Stage::Confirming => {
                let fields = &state.fields;
                format!(
                    "Let me confirm: {} with {} ({}) on {} at {}. Shall I book it? (yes/no)",
                    fields.patient_name.as_deref().unwrap_or_default(),
                    fields.doctor_name.as_deref().unwrap_or_default(),
                    fields.department.as_deref().unwrap_or_default(),
                    fields.date.map(|d| d.to_string()).unwrap_or_default(),
                    fields.time.map(fmt_time).unwrap_or_default()
                )
            }
            Stage::Completed => {
                "Your appointment is booked. Say hello if you'd like to make another.".to_string()
            }
            Stage::Abandoned => {
                "This conversation has ended. Say hello to start a new booking.".to_string()
            }
        }
    }

    async fn validate_date(&self, doctor: &Doctor, date: NaiveDate) -> Result<(), String> {
        if doctor.is_off_on(date) {
            let hint = next_working_day(doctor, date)
                .map(|d| format!(" The next day they're in is {}.", d))
                .unwrap_or_default();
            return Err(format!(
                "{} is off on {}s.{} Which date would you like?",
                doctor.name,
                date.format("%A"),
                hint
            ));
        }
        match self.committer.availability().compute_slots(doctor, date).await {
            Err(BookingError::InvalidSlot(_)) => Err(
                "That date has already passed. Which upcoming date works for you?".to_string(),
            ),
            Err(err) => {
                warn!("availability lookup failed: {}", err);
                Err("I couldn't check the schedule just now. Could you give me the date again?"
                    .to_string())
            }
            Ok(slots) if slots.is_empty() => Err(format!(
                "{} is fully booked on {}. Which other date works for you?",
                doctor.name, date
            )),
            Ok(_) => Ok(()),
        }
    }

    async fn validate_time(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<(), String> {
        let starts = self.available_starts(doctor, date).await;
        if starts.contains(&time) {
            return Ok(());
        }
        if !doctor.is_off_on(date) && doctor_cell::slot_grid(doctor).contains(&time) {
            let alternatives = closest_alternatives(&starts, time, ALTERNATIVE_COUNT);
            if alternatives.is_empty() {
                return Err(format!(
                    "{} is already taken and no other times remain on {}. \
                     Which other date works for you?",
                    fmt_time(time),
                    date
                ));
            }
            return Err(format!(
                "{} is already taken. The closest open times are: {}. Which would you like?",
                fmt_time(time),
                fmt_times(&alternatives)
            ));
        }
        Err(format!(
            "{} isn't one of {}'s appointment times. Available on {}: {}.",
            fmt_time(time),
            doctor.name,
            date,
            fmt_times(&starts)
        ))
    }

    async fn available_starts(&self, doctor: &Doctor, date: NaiveDate) -> Vec<NaiveTime> {
        self.committer
            .availability()
            .compute_slots(doctor, date)
            .await
            .map(|slots| slots.into_iter().map(|s| s.start_time).collect())
            .unwrap_or_default()
    }

    fn current_doctor(&self, state: &SessionState) -> Option<Doctor> {
        state
            .fields
            .doctor_name
            .as_deref()
            .and_then(|name| self.registry.find_by_name(name))
    }

    fn resolve_department(&self, raw: &str) -> Option<String> {
        let lower = raw.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        self.registry
            .departments()
            .into_iter()
            .find(|d| {
                let known = d.to_lowercase();
                known.contains(&lower) || lower.contains(&known)
            })
    }

    fn set_department(&self, state: &mut SessionState, department: String) {
        if state.fields.department.as_deref() != Some(department.as_str()) {
            state.fields.doctor_name = None;
            state.fields.date = None;
            state.fields.time = None;
        }
        state.fields.department = Some(department);
    }
}

/// The first stage whose field is still missing; Confirming once all are in.
fn next_stage(fields: &CollectedFields) -> Stage {
    if fields.patient_name.is_none() {
        Stage::CollectingName
    } else if fields.department.is_none() {
        Stage::CollectingDepartment
    } else if fields.doctor_name.is_none() {
        Stage::CollectingDoctor
    } else if fields.date.is_none() {
        Stage::CollectingDate
    } else if fields.time.is_none() {
        Stage::CollectingTime
    } else {
        Stage::Confirming
    }
}

/// Next date within a week of `from` on which the doctor works.
fn next_working_day(doctor: &Doctor, from: NaiveDate) -> Option<NaiveDate> {
    (1..=7)
        .map(|offset| from + Duration::days(offset))
        .find(|d| !doctor.is_off_on(*d))
}

/// Up to `count` open start times ranked by distance from the wanted time.
fn closest_alternatives(starts: &[NaiveTime], wanted: NaiveTime, count: usize) -> Vec<NaiveTime> {
    let mut ranked: Vec<NaiveTime> = starts.to_vec();
    ranked.sort_by_key(|t| (*t - wanted).num_seconds().abs());
    ranked.truncate(count);
    ranked.sort();
    ranked
}

fn fmt_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn fmt_times(times: &[NaiveTime]) -> String {
    times
        .iter()
        .take(SLOT_DISPLAY_LIMIT)
        .map(|t| fmt_time(*t))
        .collect::<Vec<_>>()
        .join(", ")
}

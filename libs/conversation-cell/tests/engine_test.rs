use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use uuid::Uuid;

use appointment_cell::services::store::{BookingStore, InMemoryBookingStore};
use appointment_cell::BookingCommitter;
use conversation_cell::{
    ConversationEngine, Extraction, ExtractionContext, ExtractionError, Intent, IntentExtractor,
    SessionState, Stage,
};
use doctor_cell::models::Doctor;
use doctor_cell::services::registry::DoctorRegistry;
use doctor_cell::InMemoryDoctorRegistry;

/// Replays a fixed sequence of extractor results, one per turn, so the
/// state machine can be exercised without any network service.
struct ScriptedExtractor {
    script: Mutex<VecDeque<Result<Extraction, ExtractionError>>>,
}

impl ScriptedExtractor {
    fn new(script: Vec<Result<Extraction, ExtractionError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

#[async_trait]
impl IntentExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        _text: &str,
        _ctx: &ExtractionContext,
    ) -> Result<Extraction, ExtractionError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("script exhausted")
    }
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn doctors() -> Vec<Doctor> {
    vec![
        Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Ayesha Rahman".to_string(),
            department: "Cardiology".to_string(),
            off_days: vec![Weekday::Fri],
            work_start: t(9, 0),
            work_end: t(10, 20),
            slot_minutes: 20,
        },
        Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Miguel Santos".to_string(),
            department: "Neurology".to_string(),
            off_days: vec![],
            work_start: t(9, 0),
            work_end: t(17, 0),
            slot_minutes: 20,
        },
    ]
}

fn upcoming_working_date() -> NaiveDate {
    let mut date = Utc::now().date_naive() + Duration::days(1);
    while date.weekday() == Weekday::Fri {
        date += Duration::days(1);
    }
    date
}

fn upcoming_friday() -> NaiveDate {
    let mut date = Utc::now().date_naive() + Duration::days(1);
    while date.weekday() != Weekday::Fri {
        date += Duration::days(1);
    }
    date
}

struct Harness {
    engine: ConversationEngine,
    registry: Arc<InMemoryDoctorRegistry>,
    store: Arc<InMemoryBookingStore>,
    committer: Arc<BookingCommitter>,
}

fn harness(script: Vec<Result<Extraction, ExtractionError>>) -> Harness {
    let registry = Arc::new(InMemoryDoctorRegistry::new(doctors()));
    let store = Arc::new(InMemoryBookingStore::new());
    let committer = Arc::new(BookingCommitter::new(
        store.clone() as Arc<dyn BookingStore>
    ));
    let engine = ConversationEngine::new(
        registry.clone(),
        committer.clone(),
        Arc::new(ScriptedExtractor::new(script)),
        3,
    );
    Harness {
        engine,
        registry,
        store,
        committer,
    }
}

fn named(intent: Intent, name: &str) -> Extraction {
    Extraction {
        patient_name: Some(name.to_string()),
        ..Extraction::of(intent)
    }
}

fn with_department(department: &str) -> Extraction {
    Extraction {
        department: Some(department.to_string()),
        ..Extraction::of(Intent::SelectDepartment)
    }
}

fn with_doctor(doctor: &str) -> Extraction {
    Extraction {
        doctor_name: Some(doctor.to_string()),
        ..Extraction::of(Intent::SelectDoctor)
    }
}

fn with_date(date: NaiveDate) -> Extraction {
    Extraction {
        date: Some(date),
        ..Extraction::of(Intent::SelectDate)
    }
}

fn with_time(time: NaiveTime) -> Extraction {
    Extraction {
        time: Some(time),
        ..Extraction::of(Intent::SelectTime)
    }
}

/// Session already holding everything but awaiting confirmation.
fn confirming_session(date: NaiveDate, time: NaiveTime) -> SessionState {
    let mut state = SessionState::new("s1");
    state.stage = Stage::Confirming;
    state.fields.patient_name = Some("John Smith".to_string());
    state.fields.department = Some("Cardiology".to_string());
    state.fields.doctor_name = Some("Dr. Ayesha Rahman".to_string());
    state.fields.date = Some(date);
    state.fields.time = Some(time);
    state
}

#[tokio::test]
async fn a_name_in_the_first_message_skips_straight_to_department() {
    let h = harness(vec![Ok(named(Intent::ProvideName, "John Smith"))]);
    let mut state = SessionState::new("s1");

    let outcome = h.engine.handle_turn(&mut state, "My name is John Smith").await;

    assert_eq!(outcome.stage, Stage::CollectingDepartment);
    assert_eq!(state.fields.patient_name.as_deref(), Some("John Smith"));
    assert!(state.fields.department.is_none());
    assert!(state.fields.doctor_name.is_none());
    assert!(state.fields.date.is_none());
    assert!(state.fields.time.is_none());
    assert!(outcome.reply.contains("Cardiology"));
}

#[tokio::test]
async fn full_conversation_books_an_appointment() {
    let date = upcoming_working_date();
    let h = harness(vec![
        Ok(named(Intent::ProvideName, "John Smith")),
        Ok(with_department("Cardiology")),
        Ok(with_doctor("Ayesha")),
        Ok(with_date(date)),
        Ok(with_time(t(9, 20))),
        Ok(Extraction::of(Intent::Confirm)),
    ]);
    let mut state = SessionState::new("s1");

    for message in ["My name is John Smith", "cardiology", "Ayesha", "date"] {
        let outcome = h.engine.handle_turn(&mut state, message).await;
        assert!(!outcome.done);
    }

    let outcome = h.engine.handle_turn(&mut state, "09:20").await;
    assert_eq!(outcome.stage, Stage::Confirming);
    assert!(outcome.reply.contains("John Smith"));
    assert!(outcome.reply.contains("Dr. Ayesha Rahman"));

    let outcome = h.engine.handle_turn(&mut state, "yes").await;
    assert_eq!(outcome.stage, Stage::Completed);
    assert!(outcome.done);
    let booking = outcome.booking.expect("booking present");
    assert_eq!(booking.patient_name, "John Smith");
    assert_eq!(booking.start_time, t(9, 20));

    let all = h.store.all_bookings().await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn symptoms_route_to_the_matching_department() {
    let h = harness(vec![Ok(Extraction::of(Intent::Other))]);
    let mut state = SessionState::new("s1");
    state.stage = Stage::CollectingDepartment;
    state.fields.patient_name = Some("John Smith".to_string());

    let outcome = h.engine.handle_turn(&mut state, "I have chest pain").await;

    assert_eq!(state.fields.department.as_deref(), Some("Cardiology"));
    assert_eq!(outcome.stage, Stage::CollectingDoctor);
    assert!(outcome.reply.contains("Dr. Ayesha Rahman"));
}

#[tokio::test]
async fn off_day_date_is_rejected_with_a_working_day_hint() {
    let h = harness(vec![
        Ok(with_date(upcoming_friday())),
        Ok(with_date(upcoming_working_date())),
    ]);
    let mut state = SessionState::new("s1");
    state.stage = Stage::CollectingDate;
    state.fields.patient_name = Some("John Smith".to_string());
    state.fields.department = Some("Cardiology".to_string());
    state.fields.doctor_name = Some("Dr. Ayesha Rahman".to_string());

    let outcome = h.engine.handle_turn(&mut state, "friday").await;

    assert_eq!(outcome.stage, Stage::CollectingDate);
    assert!(state.fields.date.is_none());
    assert!(outcome.reply.contains("off on Fridays"));
    assert_eq!(state.invalid_value_reprompts, 1);

    // An accepted date clears the re-prompt counter.
    let outcome = h.engine.handle_turn(&mut state, "another day").await;
    assert_eq!(outcome.stage, Stage::CollectingTime);
    assert_eq!(state.invalid_value_reprompts, 0);
}

#[tokio::test]
async fn a_taken_time_offers_the_closest_alternatives() {
    let date = upcoming_working_date();
    let h = harness(vec![Ok(with_time(t(9, 20)))]);
    let ayesha = h.registry.find_by_name("Ayesha").unwrap();
    h.committer
        .commit("Jane Doe", &ayesha, date, t(9, 20))
        .await
        .unwrap();

    let mut state = SessionState::new("s1");
    state.stage = Stage::CollectingTime;
    state.fields.patient_name = Some("John Smith".to_string());
    state.fields.department = Some("Cardiology".to_string());
    state.fields.doctor_name = Some("Dr. Ayesha Rahman".to_string());
    state.fields.date = Some(date);

    let outcome = h.engine.handle_turn(&mut state, "09:20").await;

    assert_eq!(outcome.stage, Stage::CollectingTime);
    assert!(state.fields.time.is_none());
    assert_eq!(state.invalid_value_reprompts, 1);
    assert!(outcome.reply.contains("already taken"));
    assert!(outcome.reply.contains("09:00"));
    assert!(outcome.reply.contains("09:40"));
    assert!(outcome.reply.contains("10:00"));
}

#[tokio::test]
async fn denying_the_summary_returns_to_date_but_keeps_identity() {
    let date = upcoming_working_date();
    let h = harness(vec![Ok(Extraction::of(Intent::Deny))]);
    let mut state = confirming_session(date, t(9, 0));

    let outcome = h.engine.handle_turn(&mut state, "no").await;

    assert_eq!(outcome.stage, Stage::CollectingDate);
    assert_eq!(state.fields.patient_name.as_deref(), Some("John Smith"));
    assert_eq!(
        state.fields.doctor_name.as_deref(),
        Some("Dr. Ayesha Rahman")
    );
    assert!(state.fields.date.is_none());
    assert!(state.fields.time.is_none());
}

#[tokio::test]
async fn a_slot_stolen_before_confirmation_reopens_time_selection() {
    let date = upcoming_working_date();
    let h = harness(vec![Ok(Extraction::of(Intent::Confirm))]);
    let ayesha = h.registry.find_by_name("Ayesha").unwrap();
    h.committer
        .commit("Jane Doe", &ayesha, date, t(9, 0))
        .await
        .unwrap();

    let mut state = confirming_session(date, t(9, 0));
    let outcome = h.engine.handle_turn(&mut state, "yes").await;

    assert_eq!(outcome.stage, Stage::CollectingTime);
    assert!(outcome.reply.contains("just taken"));
    assert!(state.fields.time.is_none());
    assert_eq!(state.fields.date, Some(date));
}

#[tokio::test]
async fn repeated_extraction_failures_abandon_the_session() {
    let h = harness(vec![
        Err(ExtractionError::Unavailable("timeout".to_string())),
        Err(ExtractionError::Unavailable("timeout".to_string())),
        Err(ExtractionError::Unavailable("timeout".to_string())),
    ]);
    let mut state = SessionState::new("s1");

    let first = h.engine.handle_turn(&mut state, "hello").await;
    assert_eq!(first.stage, Stage::Greeting);
    let second = h.engine.handle_turn(&mut state, "hello").await;
    assert_eq!(second.stage, Stage::Greeting);
    let third = h.engine.handle_turn(&mut state, "hello").await;

    assert_eq!(third.stage, Stage::Abandoned);
    assert_eq!(state.stage, Stage::Abandoned);
}

#[tokio::test]
async fn one_failure_then_recovery_does_not_abandon() {
    let h = harness(vec![
        Err(ExtractionError::Unavailable("timeout".to_string())),
        Ok(named(Intent::ProvideName, "John Smith")),
        Err(ExtractionError::Unavailable("timeout".to_string())),
    ]);
    let mut state = SessionState::new("s1");

    h.engine.handle_turn(&mut state, "hello").await;
    let outcome = h.engine.handle_turn(&mut state, "My name is John Smith").await;
    assert_eq!(outcome.stage, Stage::CollectingDepartment);

    // The counter reset on success, so a later failure starts over.
    let outcome = h.engine.handle_turn(&mut state, "mumble").await;
    assert_eq!(outcome.stage, Stage::CollectingDepartment);
    assert_eq!(state.extraction_retries, 1);
}

#[tokio::test]
async fn cancel_abandons_from_any_stage() {
    let h = harness(vec![Ok(Extraction::of(Intent::Cancel))]);
    let mut state = confirming_session(upcoming_working_date(), t(9, 0));

    let outcome = h.engine.handle_turn(&mut state, "cancel").await;

    assert_eq!(outcome.stage, Stage::Abandoned);
    assert!(outcome.booking.is_none());
    let all = h.store.all_bookings().await.unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn greeting_mid_flow_starts_the_conversation_over() {
    let h = harness(vec![Ok(Extraction::of(Intent::Greeting))]);
    let mut state = confirming_session(upcoming_working_date(), t(9, 0));

    let outcome = h.engine.handle_turn(&mut state, "start over").await;

    assert_eq!(outcome.stage, Stage::Greeting);
    assert!(state.fields.patient_name.is_none());
    assert!(state.fields.doctor_name.is_none());
}

#[tokio::test]
async fn switching_department_discards_doctor_and_schedule() {
    let h = harness(vec![Ok(with_department("Neurology"))]);
    let mut state = confirming_session(upcoming_working_date(), t(9, 0));

    let outcome = h.engine.handle_turn(&mut state, "neurology instead").await;

    assert_eq!(state.fields.department.as_deref(), Some("Neurology"));
    assert!(state.fields.doctor_name.is_none());
    assert!(state.fields.date.is_none());
    assert!(state.fields.time.is_none());
    assert_eq!(outcome.stage, Stage::CollectingDoctor);
    assert!(outcome.reply.contains("Dr. Miguel Santos"));
}

#[tokio::test]
async fn messages_after_completion_point_to_a_new_session() {
    let h = harness(vec![Ok(Extraction::of(Intent::Other))]);
    let mut state = SessionState::new("s1");
    state.stage = Stage::Completed;

    let outcome = h.engine.handle_turn(&mut state, "thanks").await;

    assert_eq!(outcome.stage, Stage::Completed);
    assert!(outcome.reply.contains("already booked"));
}

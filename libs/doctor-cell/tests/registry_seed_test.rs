use std::io::Write;

use chrono::{NaiveDate, NaiveTime, Weekday};
use doctor_cell::services::registry::DoctorRegistry;
use doctor_cell::{compute_slots, InMemoryDoctorRegistry};

const SEED: &str = r#"{
    "doctors": [
        {
            "name": "Dr. Ayesha Rahman",
            "department": "Cardiology",
            "off_days": ["friday"],
            "work_start": "09:00:00",
            "work_end": "17:00:00"
        },
        {
            "name": "Dr. Omar Faruk",
            "department": "Neurology",
            "off_days": ["sunday"],
            "work_start": "10:00:00",
            "work_end": "16:00:00",
            "slot_minutes": 20
        }
    ]
}"#;

#[test]
fn seed_file_round_trips_into_registry() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SEED.as_bytes()).unwrap();

    let registry = InMemoryDoctorRegistry::from_seed_file(file.path()).unwrap();

    assert_eq!(registry.all().len(), 2);
    assert_eq!(registry.departments(), vec!["Cardiology", "Neurology"]);

    let ayesha = registry.find_by_name("Ayesha Rahman").unwrap();
    assert_eq!(ayesha.department, "Cardiology");
    assert_eq!(ayesha.off_days, vec![Weekday::Fri]);
    assert_eq!(ayesha.slot_minutes, 20);
    assert_eq!(ayesha.work_start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
}

#[test]
fn seeded_doctor_has_no_slots_on_friday_off_day() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SEED.as_bytes()).unwrap();

    let registry = InMemoryDoctorRegistry::from_seed_file(file.path()).unwrap();
    let ayesha = registry.find_by_name("Ayesha").unwrap();

    // 2026-09-11 is a Friday.
    let friday = NaiveDate::from_ymd_opt(2026, 9, 11).unwrap();
    let today = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();

    let slots = compute_slots(&ayesha, friday, today, &[]).unwrap();
    assert!(slots.is_empty());
}

#[test]
fn missing_seed_file_is_an_error() {
    assert!(InMemoryDoctorRegistry::from_seed_file("/nonexistent/seed.json").is_err());
}

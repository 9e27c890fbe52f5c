use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

use crate::models::{AvailabilityError, Doctor, Slot};

/// All duration-aligned start times inside `[work_start, work_end)`. The
/// grid is anchored at `work_start`; a trailing window shorter than the
/// appointment duration is discarded, never rounded.
pub fn slot_grid(doctor: &Doctor) -> Vec<NaiveTime> {
    let step = chrono::Duration::minutes(doctor.slot_minutes);
    let mut grid = Vec::new();
    let mut current = doctor.work_start;

    loop {
        let (end, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 || end > doctor.work_end {
            break;
        }
        grid.push(current);
        current = end;
    }

    grid
}

/// Candidate slots for one doctor on one date: the aligned grid minus every
/// start time already held by a non-cancelled booking, ascending. Off-days
/// yield an empty list; dates before `today` are rejected outright.
///
/// Deterministic: identical doctor configuration and booked set always
/// produce the identical sequence.
pub fn compute_slots(
    doctor: &Doctor,
    date: NaiveDate,
    today: NaiveDate,
    booked: &[NaiveTime],
) -> Result<Vec<Slot>, AvailabilityError> {
    if date < today {
        return Err(AvailabilityError::InvalidDate(format!(
            "{} is in the past",
            date
        )));
    }

    if doctor.is_off_on(date) {
        debug!("{} is off on {}", doctor.name, date);
        return Ok(vec![]);
    }

    let slots: Vec<Slot> = slot_grid(doctor)
        .into_iter()
        .filter(|start| !booked.contains(start))
        .map(|start| Slot {
            doctor_id: doctor.id,
            doctor_name: doctor.name.clone(),
            date,
            start_time: start,
            duration_minutes: doctor.slot_minutes,
        })
        .collect();

    debug!("{} has {} open slots on {}", doctor.name, slots.len(), date);
    Ok(slots)
}

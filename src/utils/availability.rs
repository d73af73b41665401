//! Human-readable appointment availability.
//!
//! Dates arrive as `YYYY-MM-DD` and slots as 24-hour `HH:MM`. The assistant
//! speaks weekday names and 12-hour times, so both are converted here.

use thiserror::Error;
use time::macros::format_description;
use time::{Date, Time};

use crate::calls::AvailabilityDay;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AvailabilityError {
    #[error("Invalid availability date '{0}'")]
    InvalidDate(String),

    #[error("Invalid availability time '{0}'")]
    InvalidTime(String),
}

/// One day of availability, ready to be read out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedDay {
    /// ISO date as supplied
    pub date: String,
    /// Weekday name, e.g. "Monday"
    pub day: String,
    /// 12-hour times, e.g. "2:30 PM"
    pub slots: Vec<String>,
}

/// Convert a 24-hour `HH:MM` time to 12-hour form without a leading zero.
pub fn to_12_hour(value: &str) -> Result<String, AvailabilityError> {
    let time = Time::parse(value.trim(), format_description!("[hour]:[minute]"))
        .map_err(|_| AvailabilityError::InvalidTime(value.to_string()))?;
    time.format(format_description!(
        "[hour repr:12 padding:none]:[minute] [period]"
    ))
    .map_err(|_| AvailabilityError::InvalidTime(value.to_string()))
}

/// Weekday name of an ISO date.
pub fn weekday_name(value: &str) -> Result<String, AvailabilityError> {
    let date = Date::parse(value.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| AvailabilityError::InvalidDate(value.to_string()))?;
    Ok(date.weekday().to_string())
}

pub fn format_day(day: &AvailabilityDay) -> Result<FormattedDay, AvailabilityError> {
    Ok(FormattedDay {
        date: day.date.clone(),
        day: weekday_name(&day.date)?,
        slots: day
            .slots
            .iter()
            .map(|slot| to_12_hour(slot))
            .collect::<Result<_, _>>()?,
    })
}

pub fn format_availability(
    days: &[AvailabilityDay],
) -> Result<Vec<FormattedDay>, AvailabilityError> {
    days.iter().map(format_day).collect()
}

/// The earliest listed slot, as "Monday at 11:00 AM".
///
/// Days are taken in the order given; days without slots are skipped.
pub fn soonest_slot(days: &[FormattedDay]) -> Option<String> {
    days.iter()
        .find_map(|day| day.slots.first().map(|slot| format!("{} at {}", day.day, slot)))
}

/// All other slots once the soonest one has been removed. Days left empty are dropped.
pub fn remaining_slots(days: &[FormattedDay]) -> Vec<FormattedDay> {
    let mut taken = false;
    days.iter()
        .filter_map(|day| {
            let mut day = day.clone();
            if !taken && !day.slots.is_empty() {
                day.slots.remove(0);
                taken = true;
            }
            (!day.slots.is_empty()).then_some(day)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(date: &str, slots: &[&str]) -> AvailabilityDay {
        AvailabilityDay {
            date: date.to_string(),
            slots: slots.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_to_12_hour() {
        assert_eq!(to_12_hour("09:00").unwrap(), "9:00 AM");
        assert_eq!(to_12_hour("14:30").unwrap(), "2:30 PM");
        assert_eq!(to_12_hour("00:15").unwrap(), "12:15 AM");
        assert_eq!(to_12_hour("12:00").unwrap(), "12:00 PM");
        assert!(to_12_hour("25:00").is_err());
    }

    #[test]
    fn test_weekday_name() {
        assert_eq!(weekday_name("2025-02-24").unwrap(), "Monday");
        assert_eq!(weekday_name("2025-02-25").unwrap(), "Tuesday");
        assert_eq!(
            weekday_name("24/02/2025"),
            Err(AvailabilityError::InvalidDate("24/02/2025".to_string()))
        );
    }

    #[test]
    fn test_soonest_skips_empty_days() {
        let days = format_availability(&[
            day("2025-02-24", &[]),
            day("2025-02-25", &["09:00", "14:00"]),
        ])
        .unwrap();

        assert_eq!(soonest_slot(&days).as_deref(), Some("Tuesday at 9:00 AM"));
        let rest = remaining_slots(&days);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].slots, vec!["2:00 PM".to_string()]);
    }

    #[test]
    fn test_no_slots() {
        let days = format_availability(&[day("2025-02-24", &[])]).unwrap();
        assert_eq!(soonest_slot(&days), None);
        assert!(remaining_slots(&days).is_empty());
    }
}

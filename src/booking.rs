//! Slot rules shared by the API and the booking wizard.
//!
//! Appointments are booked on a date (`YYYY-MM-DD`) and a start time
//! (`HH:MM`). The shop takes bookings from 09:00 up to 17:59.

use chrono::{NaiveDate, NaiveTime, Timelike};

pub const OPENING_HOUR: u32 = 9;
pub const LAST_BOOKABLE_HOUR: u32 = 17;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("Please select a time between 9:00 AM and 5:59 PM")]
    OutsideBusinessHours,
    #[error("Cannot book a date in the past")]
    DateInPast,
}

pub fn parse_date(value: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| BookingError::InvalidDate(value.to_string()))
}

/// Accepts `HH:MM` and `HH:MM:SS`; seconds are dropped.
pub fn parse_time(value: &str) -> Result<NaiveTime, BookingError> {
    let trimmed = value.trim();
    let time = NaiveTime::parse_from_str(trimmed, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| BookingError::InvalidTime(value.to_string()))?;
    time.with_second(0)
        .ok_or_else(|| BookingError::InvalidTime(value.to_string()))
}

pub fn within_business_hours(time: NaiveTime) -> bool {
    (OPENING_HOUR..=LAST_BOOKABLE_HOUR).contains(&time.hour())
}

pub fn check_business_hours(time: NaiveTime) -> Result<NaiveTime, BookingError> {
    if within_business_hours(time) {
        Ok(time)
    } else {
        Err(BookingError::OutsideBusinessHours)
    }
}

pub fn check_not_past(date: NaiveDate, today: NaiveDate) -> Result<NaiveDate, BookingError> {
    if date < today {
        Err(BookingError::DateInPast)
    } else {
        Ok(date)
    }
}

/// Validates a requested slot and returns it in canonical storage form.
pub fn normalize_slot(date: &str, time: &str) -> Result<(String, String), BookingError> {
    let date = parse_date(date)?;
    let time = check_business_hours(parse_time(time)?)?;
    Ok((format_date(date), format_time(time)))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
    }

    #[test]
    fn business_hours_cover_nine_to_five_fifty_nine() {
        assert!(!within_business_hours(time(8, 59)));
        assert!(within_business_hours(time(9, 0)));
        assert!(within_business_hours(time(17, 59)));
        assert!(!within_business_hours(time(18, 0)));
    }

    #[test]
    fn normalize_slot_drops_seconds() {
        let slot = normalize_slot("2099-05-01", "10:30:45").expect("slot");
        assert_eq!(slot, ("2099-05-01".to_string(), "10:30".to_string()));
    }

    #[test]
    fn normalize_slot_rejects_bad_input() {
        assert_eq!(
            normalize_slot("05/01/2099", "10:00"),
            Err(BookingError::InvalidDate("05/01/2099".to_string()))
        );
        assert_eq!(
            normalize_slot("2099-05-01", "ten"),
            Err(BookingError::InvalidTime("ten".to_string()))
        );
        assert_eq!(
            normalize_slot("2099-05-01", "19:00"),
            Err(BookingError::OutsideBusinessHours)
        );
    }

    #[test]
    fn past_dates_are_rejected() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).expect("date");
        let yesterday = NaiveDate::from_ymd_opt(2025, 6, 9).expect("date");
        assert_eq!(check_not_past(yesterday, today), Err(BookingError::DateInPast));
        assert_eq!(check_not_past(today, today), Ok(today));
    }
}

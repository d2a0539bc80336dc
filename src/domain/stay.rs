//! Stay value types
//!
//! Small validated values shared by the booking and accommodation aggregates.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DomainError;

/// Arrival and departure dates of a booking.
///
/// The departure date is exclusive, so a stay from day 1 to day 3 covers two nights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting empty or inverted ranges
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DomainError> {
        if end <= start {
            return Err(DomainError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of nights covered by the range
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Check whether two ranges share at least one night
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One accommodation allocated to a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingItem {
    pub accommodation_id: Uuid,
    pub person_count: i32,
}

impl BookingItem {
    pub fn new(accommodation_id: Uuid, person_count: i32) -> Result<Self, DomainError> {
        if person_count <= 0 {
            return Err(DomainError::InvalidPersonCount(person_count));
        }
        Ok(Self {
            accommodation_id,
            person_count,
        })
    }
}

/// Booking status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Pending,
    Accepted,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" | "open" => Ok(BookingStatus::Pending),
            "accepted" | "confirmed" => Ok(BookingStatus::Accepted),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

/// Kind of sleeping accommodation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccommodationType {
    Bed,
    Couch,
    Mattress,
    #[default]
    Room,
    Tent,
    Other,
}

impl AccommodationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccommodationType::Bed => "bed",
            AccommodationType::Couch => "couch",
            AccommodationType::Mattress => "mattress",
            AccommodationType::Room => "room",
            AccommodationType::Tent => "tent",
            AccommodationType::Other => "other",
        }
    }
}

impl fmt::Display for AccommodationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccommodationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bed" => Ok(AccommodationType::Bed),
            "couch" | "sofa" => Ok(AccommodationType::Couch),
            "mattress" | "air_mattress" => Ok(AccommodationType::Mattress),
            "room" => Ok(AccommodationType::Room),
            "tent" => Ok(AccommodationType::Tent),
            "other" => Ok(AccommodationType::Other),
            other => Err(format!("unknown accommodation type '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, d).unwrap()
    }

    #[test]
    fn test_date_range_nights() {
        let range = DateRange::new(day(1), day(3)).unwrap();
        assert_eq!(range.nights(), 2);
    }

    #[test]
    fn test_date_range_rejects_empty_and_inverted() {
        assert!(matches!(
            DateRange::new(day(3), day(3)),
            Err(DomainError::InvalidDateRange { .. })
        ));
        assert!(DateRange::new(day(4), day(2)).is_err());
    }

    #[test]
    fn test_date_range_overlap_excludes_departure_day() {
        let first = DateRange::new(day(1), day(3)).unwrap();
        let second = DateRange::new(day(3), day(5)).unwrap();
        let third = DateRange::new(day(2), day(4)).unwrap();

        assert!(!first.overlaps(&second));
        assert!(first.overlaps(&third));
        assert!(third.overlaps(&second));
    }

    #[test]
    fn test_booking_item_requires_positive_persons() {
        assert!(BookingItem::new(Uuid::new_v4(), 1).is_ok());
        assert_eq!(
            BookingItem::new(Uuid::nil(), 0),
            Err(DomainError::InvalidPersonCount(0))
        );
    }

    #[test]
    fn test_status_and_type_parsing() {
        assert_eq!("Confirmed".parse::<BookingStatus>(), Ok(BookingStatus::Accepted));
        assert_eq!("canceled".parse::<BookingStatus>(), Ok(BookingStatus::Cancelled));
        assert_eq!("Sofa".parse::<AccommodationType>(), Ok(AccommodationType::Couch));
        assert!("castle".parse::<AccommodationType>().is_err());
    }
}
